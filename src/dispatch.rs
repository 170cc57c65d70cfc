//! Resilient generation dispatcher.
//!
//! Every generation task runs through the same chain: call the primary
//! backend, check the response against a quality gate, retry against the
//! alternative backend on failure, and synthesize a deterministic offline
//! fallback when both tiers fail. The dispatcher holds no cross-request
//! state, so it is safe to call from any number of concurrent requests.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, TaskRelayError};

// -- Request -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Image,
}

/// A single generation request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: PayloadKind,
    /// The question or prompt.
    pub primary_input: String,
    /// Supporting context for Q&A.
    pub auxiliary_context: Option<String>,
    /// Target platform for content generation; selects the prompt and the
    /// offline template.
    pub platform_hint: Option<String>,
}

impl GenerationRequest {
    pub fn text(input: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            primary_input: input.into(),
            auxiliary_context: None,
            platform_hint: None,
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Image,
            primary_input: prompt.into(),
            auxiliary_context: None,
            platform_hint: None,
        }
    }

    pub fn with_context(mut self, context: Option<&str>) -> Self {
        self.auxiliary_context = context.map(str::to_string);
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform_hint = Some(platform.into());
        self
    }
}

// -- Outcome -----------------------------------------------------------------

/// Which stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Secondary,
    Fallback,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::Secondary => "secondary",
            Tier::Fallback => "fallback",
        }
    }
}

/// The result of one dispatch. `degraded` is true exactly when no live
/// upstream call succeeded; `diagnostics` carries one entry per failed tier.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Generated text, or base64-encoded image bytes.
    pub value: String,
    pub tier: Tier,
    pub degraded: bool,
    pub diagnostics: Vec<String>,
}

impl GenerationOutcome {
    fn primary(value: String) -> Self {
        Self {
            value,
            tier: Tier::Primary,
            degraded: false,
            diagnostics: Vec::new(),
        }
    }

    fn secondary(value: String, diagnostic: String) -> Self {
        Self {
            value,
            tier: Tier::Secondary,
            degraded: false,
            diagnostics: vec![diagnostic],
        }
    }

    fn fallback(value: String, diagnostics: Vec<String>) -> Self {
        Self {
            value,
            tier: Tier::Fallback,
            degraded: true,
            diagnostics,
        }
    }
}

// -- Quality gate ------------------------------------------------------------

/// Markers delimiting variant sections in generated social content.
const VARIANT_MARKERS: [&str; 4] = ["**Tweet", "**Post", "**Caption", "**Description"];

/// Count variant sections in a content response. Platforms label their
/// sections differently, so the highest marker count wins.
pub fn variant_count(text: &str) -> usize {
    VARIANT_MARKERS
        .iter()
        .map(|m| text.matches(m).count())
        .max()
        .unwrap_or(0)
}

/// Minimal heuristic check rejecting clearly incomplete output. Thresholds
/// come from config; `min_variants == 0` disables the marker check.
#[derive(Debug, Clone, Copy)]
pub struct QualityGate {
    pub min_chars: usize,
    pub min_variants: usize,
}

impl QualityGate {
    /// Gate that only rejects empty payloads (Q&A, images).
    pub const fn non_empty() -> Self {
        Self {
            min_chars: 1,
            min_variants: 0,
        }
    }

    fn accepts(&self, kind: PayloadKind, value: &str) -> std::result::Result<(), String> {
        if kind == PayloadKind::Image {
            if value.is_empty() {
                return Err("empty image payload".to_string());
            }
            return Ok(());
        }

        let trimmed = value.trim();
        if trimmed.len() < self.min_chars {
            return Err(format!(
                "response below quality gate ({} chars < {})",
                trimmed.len(),
                self.min_chars
            ));
        }
        if self.min_variants > 0 {
            let found = variant_count(trimmed);
            if found < self.min_variants {
                return Err(format!(
                    "incomplete response ({found} variants < {})",
                    self.min_variants
                ));
            }
        }
        Ok(())
    }
}

// -- Collaborator contracts --------------------------------------------------

/// A configured upstream generation backend (one model at one endpoint).
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Identifier used in diagnostics and annotations (e.g. the model id).
    fn identifier(&self) -> &str;

    /// Perform the upstream call and return the raw payload: completion
    /// text, or base64-encoded image bytes.
    async fn invoke(&self, request: &GenerationRequest) -> Result<String>;
}

/// Deterministic offline producer used when both backends fail. Must be a
/// pure function of the request: no I/O, no clock, no randomness.
pub trait FallbackProducer: Send + Sync {
    fn produce(&self, request: &GenerationRequest) -> Result<String>;
}

// -- Dispatcher --------------------------------------------------------------

pub struct Dispatcher {
    timeout: Duration,
    gate: QualityGate,
}

impl Dispatcher {
    pub fn new(timeout: Duration, gate: QualityGate) -> Self {
        Self { timeout, gate }
    }

    /// Run the fallback chain for one request.
    ///
    /// Backend failures are recorded as diagnostics, never propagated; the
    /// only error path is a failing fallback producer, which surfaces with
    /// every prior diagnostic attached.
    pub async fn dispatch(
        &self,
        request: &GenerationRequest,
        primary: &dyn GenerationBackend,
        secondary: &dyn GenerationBackend,
        fallback: &dyn FallbackProducer,
    ) -> Result<GenerationOutcome> {
        let first = match self.attempt(primary, request).await {
            Ok(value) => return Ok(GenerationOutcome::primary(value)),
            Err(diag) => diag,
        };
        warn!(
            backend = primary.identifier(),
            error = %first,
            "primary backend failed, trying alternative"
        );

        let second = match self.attempt(secondary, request).await {
            Ok(mut value) => {
                if request.kind == PayloadKind::Text {
                    value.push_str(&format!(
                        "\n\n(generated by alternative model: {})",
                        secondary.identifier()
                    ));
                }
                return Ok(GenerationOutcome::secondary(value, first));
            }
            Err(diag) => diag,
        };
        warn!(
            backend = secondary.identifier(),
            error = %second,
            "alternative backend failed, producing offline fallback"
        );

        let value = fallback.produce(request).map_err(|e| {
            TaskRelayError::Fallback(format!(
                "all tiers failed — [{first}]; [{second}]; fallback producer: {e}"
            ))
        })?;
        Ok(GenerationOutcome::fallback(value, vec![first, second]))
    }

    /// One bounded backend call plus the gate check. Returns the diagnostic
    /// string on any failure.
    async fn attempt(
        &self,
        backend: &dyn GenerationBackend,
        request: &GenerationRequest,
    ) -> std::result::Result<String, String> {
        debug!(
            backend = backend.identifier(),
            timeout_secs = self.timeout.as_secs(),
            "invoking backend"
        );

        let value = match tokio::time::timeout(self.timeout, backend.invoke(request)).await {
            Err(_) => {
                return Err(format!(
                    "{}: timed out after {}s",
                    backend.identifier(),
                    self.timeout.as_secs()
                ));
            }
            Ok(Err(e)) => return Err(format!("{}: {e}", backend.identifier())),
            Ok(Ok(v)) => v,
        };

        self.gate
            .accepts(request.kind, &value)
            .map_err(|reason| format!("{}: {reason}", backend.identifier()))?;
        Ok(value)
    }
}
