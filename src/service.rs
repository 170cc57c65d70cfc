//! Task call sites. One method per task kind; each builds a request, runs
//! it through the fallback chain, records the outcome, and returns the
//! value.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{ChatBackend, ImageBackend};
use crate::config::Config;
use crate::dispatch::{
    Dispatcher, FallbackProducer, GenerationBackend, GenerationOutcome, GenerationRequest,
    QualityGate, Tier,
};
use crate::error::Result;
use crate::fallback::{PlaceholderImage, TextFallback};
use crate::store::{LatestAnswer, TaskStore};

pub struct TaskService {
    qa_dispatcher: Dispatcher,
    content_dispatcher: Dispatcher,
    image_dispatcher: Dispatcher,

    qa_primary: Arc<dyn GenerationBackend>,
    qa_secondary: Arc<dyn GenerationBackend>,
    content_primary: Arc<dyn GenerationBackend>,
    content_secondary: Arc<dyn GenerationBackend>,
    image_primary: Arc<dyn GenerationBackend>,
    image_secondary: Arc<dyn GenerationBackend>,

    text_fallback: Arc<dyn FallbackProducer>,
    image_fallback: Arc<dyn FallbackProducer>,

    store: TaskStore,
}

impl TaskService {
    /// Build the live backends from config. Reads the API key from the
    /// environment once; construction fails without it.
    pub fn new(config: &Config, store: TaskStore) -> Result<Self> {
        let api_key = Config::openrouter_api_key()?;
        let llm = &config.llm;
        let content = &config.content;

        let qa_primary = ChatBackend::new(
            config,
            api_key.clone(),
            &llm.chat_model,
            llm.chat_temperature,
            llm.chat_max_tokens,
        )?;
        let qa_secondary = ChatBackend::new(
            config,
            api_key.clone(),
            &llm.chat_model_alternative,
            llm.chat_temperature,
            llm.chat_max_tokens,
        )?;
        let content_primary = ChatBackend::new(
            config,
            api_key.clone(),
            &llm.chat_model,
            content.temperature,
            content.max_tokens,
        )?;
        let content_secondary = ChatBackend::new(
            config,
            api_key.clone(),
            &llm.chat_model_alternative,
            content.temperature,
            content.max_tokens,
        )?;
        let image_primary = ImageBackend::new(config, api_key.clone(), &config.image.model)?;
        let image_secondary =
            ImageBackend::new(config, api_key, &config.image.model_alternative)?;

        let (width, height) = config.image.dimensions()?;

        info!(
            chat_model = %llm.chat_model,
            chat_alternative = %llm.chat_model_alternative,
            image_model = %config.image.model,
            image_alternative = %config.image.model_alternative,
            "task service initialized"
        );

        Ok(Self::assemble(
            config,
            Arc::new(qa_primary),
            Arc::new(qa_secondary),
            Arc::new(content_primary),
            Arc::new(content_secondary),
            Arc::new(image_primary),
            Arc::new(image_secondary),
            Arc::new(TextFallback),
            Arc::new(PlaceholderImage::new(width, height)),
            store,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        config: &Config,
        qa_primary: Arc<dyn GenerationBackend>,
        qa_secondary: Arc<dyn GenerationBackend>,
        content_primary: Arc<dyn GenerationBackend>,
        content_secondary: Arc<dyn GenerationBackend>,
        image_primary: Arc<dyn GenerationBackend>,
        image_secondary: Arc<dyn GenerationBackend>,
        text_fallback: Arc<dyn FallbackProducer>,
        image_fallback: Arc<dyn FallbackProducer>,
        store: TaskStore,
    ) -> Self {
        let text_timeout = Duration::from_secs(config.llm.timeout_secs);
        let image_timeout = Duration::from_secs(config.image.timeout_secs);

        Self {
            qa_dispatcher: Dispatcher::new(text_timeout, QualityGate::non_empty()),
            content_dispatcher: Dispatcher::new(
                text_timeout,
                QualityGate {
                    min_chars: config.content.min_chars,
                    min_variants: config.content.expected_variants,
                },
            ),
            image_dispatcher: Dispatcher::new(image_timeout, QualityGate::non_empty()),
            qa_primary,
            qa_secondary,
            content_primary,
            content_secondary,
            image_primary,
            image_secondary,
            text_fallback,
            image_fallback,
            store,
        }
    }

    pub async fn answer_question(&self, question: &str, context: Option<&str>) -> Result<String> {
        let request = GenerationRequest::text(question).with_context(context);
        let outcome = self
            .qa_dispatcher
            .dispatch(
                &request,
                self.qa_primary.as_ref(),
                self.qa_secondary.as_ref(),
                self.text_fallback.as_ref(),
            )
            .await?;

        log_outcome("qa", &outcome);
        self.store
            .record_answer(question, &outcome.value, context, outcome.tier)
            .await?;
        Ok(outcome.value)
    }

    pub async fn latest_answer(&self) -> Result<Option<LatestAnswer>> {
        self.store.latest_answer().await
    }

    pub async fn generate_content(&self, prompt: &str, platform: &str) -> Result<String> {
        let request = GenerationRequest::text(prompt).with_platform(platform);
        let outcome = self
            .content_dispatcher
            .dispatch(
                &request,
                self.content_primary.as_ref(),
                self.content_secondary.as_ref(),
                self.text_fallback.as_ref(),
            )
            .await?;

        log_outcome("content_generation", &outcome);
        self.store
            .record_content(prompt, platform, &outcome.value, outcome.tier)
            .await?;
        Ok(outcome.value)
    }

    /// Returns the generated image as base64-encoded bytes.
    pub async fn generate_image(&self, prompt: &str) -> Result<String> {
        let request = GenerationRequest::image(prompt);
        let outcome = self
            .image_dispatcher
            .dispatch(
                &request,
                self.image_primary.as_ref(),
                self.image_secondary.as_ref(),
                self.image_fallback.as_ref(),
            )
            .await?;

        log_outcome("image_generation", &outcome);
        self.store
            .record_image(prompt, &outcome.value, outcome.tier)
            .await?;
        Ok(outcome.value)
    }
}

/// Degraded and secondary-tier outcomes are an operator concern; surface
/// them in the logs rather than the response body.
fn log_outcome(task: &str, outcome: &GenerationOutcome) {
    match outcome.tier {
        Tier::Primary => {}
        Tier::Secondary => info!(
            task,
            diagnostics = ?outcome.diagnostics,
            "served from alternative backend"
        ),
        Tier::Fallback => warn!(
            task,
            diagnostics = ?outcome.diagnostics,
            "serving degraded offline result"
        ),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::error::TaskRelayError;

    pub struct StubBackend {
        pub id: &'static str,
        pub reply: std::result::Result<String, &'static str>,
    }

    #[async_trait::async_trait]
    impl GenerationBackend for StubBackend {
        fn identifier(&self) -> &str {
            self.id
        }

        async fn invoke(&self, _request: &GenerationRequest) -> Result<String> {
            self.reply
                .clone()
                .map_err(|m| TaskRelayError::Backend(m.to_string()))
        }
    }

    /// Service whose six backends all return the given replies, over an
    /// in-memory store.
    pub fn stub_service(
        chat_reply: std::result::Result<String, &'static str>,
        image_reply: std::result::Result<String, &'static str>,
    ) -> TaskService {
        let config = Config::default();
        let store = TaskStore::new(crate::db::test_db());

        let chat = |id| {
            Arc::new(StubBackend {
                id,
                reply: chat_reply.clone(),
            }) as Arc<dyn GenerationBackend>
        };
        let image = |id| {
            Arc::new(StubBackend {
                id,
                reply: image_reply.clone(),
            }) as Arc<dyn GenerationBackend>
        };

        TaskService::assemble(
            &config,
            chat("qa-primary"),
            chat("qa-secondary"),
            chat("content-primary"),
            chat("content-secondary"),
            image("image-primary"),
            image("image-secondary"),
            Arc::new(TextFallback),
            Arc::new(PlaceholderImage::new(64, 64)),
            store,
        )
    }

    impl TaskService {
        pub(crate) fn store(&self) -> &TaskStore {
            &self.store
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::stub_service;
    use super::*;
    use crate::dispatch::variant_count;

    #[tokio::test]
    async fn answer_is_recorded_and_retrievable() {
        let service = stub_service(
            Ok("Rust is a systems programming language.".to_string()),
            Ok("unused".to_string()),
        );

        let answer = service.answer_question("what is rust?", None).await.unwrap();
        assert_eq!(answer, "Rust is a systems programming language.");

        let latest = service.latest_answer().await.unwrap().unwrap();
        assert_eq!(latest.question, "what is rust?");
        assert_eq!(latest.answer, answer);
    }

    #[tokio::test]
    async fn latest_answer_empty_store() {
        let service = stub_service(Ok("x".to_string()), Ok("x".to_string()));
        assert!(service.latest_answer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn degraded_content_still_has_three_variants() {
        let service = stub_service(Err("503 upstream down"), Ok("unused".to_string()));

        let content = service.generate_content("launch", "twitter").await.unwrap();
        assert!(variant_count(&content) >= 3);
        assert!(content.contains("launch"));

        assert_eq!(service.store().last_tier("content_records").await, "fallback");
    }

    #[tokio::test]
    async fn degraded_image_is_non_empty_base64() {
        let service = stub_service(Ok("unused".to_string()), Err("image api down"));

        let payload = service.generate_image("cat").await.unwrap();
        assert!(!payload.is_empty());

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[tokio::test]
    async fn short_qa_reply_from_primary_is_still_served() {
        // The Q&A gate only rejects empty responses; a terse answer passes.
        let service = stub_service(Ok("42".to_string()), Ok("unused".to_string()));
        let answer = service.answer_question("meaning of life?", None).await.unwrap();
        assert_eq!(answer, "42");
    }
}
