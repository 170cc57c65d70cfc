//! Prompt builders for the chat backends.

use crate::dispatch::GenerationRequest;

pub const QA_SYSTEM_PROMPT: &str =
    "You are a precise question-answering assistant. Answer directly and \
     factually. When context is provided, ground the answer in it.";

/// User message for a Q&A request: the question, with its supporting
/// context inlined when present.
pub fn qa_user_prompt(question: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.trim().is_empty() => {
            format!("Context:\n{ctx}\n\nQuestion: {question}")
        }
        _ => question.to_string(),
    }
}

pub fn content_system_prompt(platform: &str) -> String {
    format!(
        "You are a creative content writer specializing in {platform} content. \
         Create 3 engaging, platform-appropriate content variations that are \
         distinct and unique from each other."
    )
}

/// Platform-specific instruction asking for exactly 3 labeled variants.
/// The section labels ("**Tweet 1:**", …) are what the quality gate counts.
pub fn content_instruction(platform: &str, prompt: &str) -> String {
    match platform.to_lowercase().as_str() {
        "twitter" => format!(
            "Create 3 different engaging tweets about: {prompt}.\n\
             Each tweet must be under 280 characters, use a different hook, \
             include 1-3 relevant hashtags and fitting emojis, and differ in \
             style (professional, casual, humorous).\n\n\
             Format your response as:\n\
             **Tweet 1:**\n[first tweet]\n\n\
             **Tweet 2:**\n[second tweet]\n\n\
             **Tweet 3:**\n[third tweet]"
        ),
        "facebook" => format!(
            "Create 3 different Facebook posts about: {prompt}.\n\
             Use engaging hooks, keep them personal and community-driven, vary \
             the tone (inspirational, conversational, storytelling), and add a \
             call-to-action and emojis to each.\n\n\
             Format your response as:\n\
             **Post 1:**\n[first post]\n\n\
             **Post 2:**\n[second post]\n\n\
             **Post 3:**\n[third post]"
        ),
        "linkedin" => format!(
            "Create 3 different professional LinkedIn posts about: {prompt}.\n\
             Use an insightful tone, include thought-provoking questions, \
             emphasize career and industry relevance, vary the structure, and \
             include industry hashtags.\n\n\
             Format your response as:\n\
             **Post 1:**\n[first post]\n\n\
             **Post 2:**\n[second post]\n\n\
             **Post 3:**\n[third post]"
        ),
        "instagram" => format!(
            "Create 3 different Instagram captions about: {prompt}.\n\
             Make them fun, creative, and visual, with varied emoji \
             combinations, a mix of niche and popular hashtags, and a \
             different call-to-action in each.\n\n\
             Format your response as:\n\
             **Caption 1:**\n[first caption]\n\n\
             **Caption 2:**\n[second caption]\n\n\
             **Caption 3:**\n[third caption]"
        ),
        "youtube" => format!(
            "Create 3 different YouTube video descriptions about: {prompt}.\n\
             Begin each with an attention-grabbing hook, summarize the video \
             differently, include a call-to-action, and use SEO-friendly \
             keywords and hashtags naturally.\n\n\
             Format your response as:\n\
             **Description 1:**\n[first description]\n\n\
             **Description 2:**\n[second description]\n\n\
             **Description 3:**\n[third description]"
        ),
        "tiktok" => format!(
            "Create 3 different TikTok captions about: {prompt}.\n\
             Keep them short, punchy, and fun, with different trendy styles, \
             varied trending hashtags, and different engagement hooks.\n\n\
             Format your response as:\n\
             **Caption 1:**\n[first caption]\n\n\
             **Caption 2:**\n[second caption]\n\n\
             **Caption 3:**\n[third caption]"
        ),
        _ => format!(
            "Create 3 different engaging posts about: {prompt}.\n\
             Use different tones and approaches, make them appealing to broad \
             audiences, and vary the structure and style.\n\n\
             Format your response as:\n\
             **Post 1:**\n[first post]\n\n\
             **Post 2:**\n[second post]\n\n\
             **Post 3:**\n[third post]"
        ),
    }
}

/// Build the (system, user) message pair for a text request. Content
/// requests carry a platform hint; everything else is Q&A.
pub fn chat_messages(request: &GenerationRequest) -> (String, String) {
    match request.platform_hint.as_deref() {
        Some(platform) => (
            content_system_prompt(platform),
            content_instruction(platform, &request.primary_input),
        ),
        None => (
            QA_SYSTEM_PROMPT.to_string(),
            qa_user_prompt(
                &request.primary_input,
                request.auxiliary_context.as_deref(),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_prompt_inlines_context() {
        let p = qa_user_prompt("what is WAL?", Some("SQLite journaling docs"));
        assert!(p.contains("SQLite journaling docs"));
        assert!(p.contains("what is WAL?"));

        assert_eq!(qa_user_prompt("plain", None), "plain");
        assert_eq!(qa_user_prompt("plain", Some("   ")), "plain");
    }

    #[test]
    fn twitter_instruction_requests_three_labeled_tweets() {
        let p = content_instruction("twitter", "launch");
        assert!(p.contains("launch"));
        assert_eq!(p.matches("**Tweet").count(), 3);
    }

    #[test]
    fn unknown_platform_falls_back_to_posts() {
        let p = content_instruction("myspace", "launch");
        assert_eq!(p.matches("**Post").count(), 3);
    }

    #[test]
    fn platform_lookup_is_case_insensitive() {
        let p = content_instruction("TikTok", "launch");
        assert_eq!(p.matches("**Caption").count(), 3);
    }

    #[test]
    fn chat_messages_switch_on_platform_hint() {
        let content = crate::dispatch::GenerationRequest::text("launch").with_platform("twitter");
        let (system, user) = chat_messages(&content);
        assert!(system.contains("twitter"));
        assert!(user.contains("**Tweet 1:**"));

        let qa = crate::dispatch::GenerationRequest::text("what is rust?");
        let (system, user) = chat_messages(&qa);
        assert_eq!(system, QA_SYSTEM_PROMPT);
        assert_eq!(user, "what is rust?");
    }
}
