//! Deterministic offline producers, used when both upstream tiers fail.
//! Everything here is a pure function of the request: no I/O, no clock,
//! no randomness.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{Rgba, RgbaImage};

use crate::dispatch::{FallbackProducer, GenerationRequest, PayloadKind};
use crate::error::{Result, TaskRelayError};

// -- Text --------------------------------------------------------------------

/// Template-based text producer. Content requests get a per-platform
/// 3-variant template with the prompt substituted; Q&A requests get a
/// stock unavailability answer naming the question.
pub struct TextFallback;

impl FallbackProducer for TextFallback {
    fn produce(&self, request: &GenerationRequest) -> Result<String> {
        match request.platform_hint.as_deref() {
            Some(platform) => Ok(content_template(platform, &request.primary_input)),
            None => Ok(answer_template(&request.primary_input)),
        }
    }
}

fn answer_template(question: &str) -> String {
    format!(
        "I could not reach a language model to answer \"{question}\". \
         Please retry in a moment; this response was generated offline."
    )
}

fn content_template(platform: &str, prompt: &str) -> String {
    match platform.to_lowercase().as_str() {
        "twitter" => format!(
            "**Tweet 1:**\n🚀 Exciting developments in {prompt}! The future is here. #AI #Tech #Innovation\n\n\
             **Tweet 2:**\n✨ Just discovered something amazing about {prompt}! Mind = blown 🤯 #Technology #Future\n\n\
             **Tweet 3:**\n🔥 {prompt} is changing everything we know! Ready for this? #Innovation #TechNews"
        ),
        "facebook" => format!(
            "**Post 1:**\n🌟 {prompt}\n\nJust discovered something amazing about this topic! The possibilities are endless when technology meets creativity. What are your thoughts?\n\n\
             **Post 2:**\nWow! {prompt} is incredible! 🚀 The future is happening now and it's more exciting than we imagined.\n\n\
             **Post 3:**\nFriends, have you heard about {prompt}? It's fascinating how this is evolving. Drop a comment with your thoughts!"
        ),
        "linkedin" => format!(
            "**Post 1:**\n🔍 Insights on {prompt}\n\nAs we navigate the evolving landscape of technology, it's crucial to stay informed about developments like this. What's your perspective?\n\n\
             **Post 2:**\n💡 The impact of {prompt} on our industry\n\nThis advancement represents a significant shift in how we approach innovation. How is your organization adapting?\n\n\
             **Post 3:**\n🚀 Future implications of {prompt}\n\nThe intersection of technology and human creativity continues to yield remarkable results. Thoughts on the opportunities ahead?"
        ),
        "instagram" => format!(
            "**Caption 1:**\n✨ {prompt} ✨\n\nWhen technology meets creativity, magic happens! 🎨🤖\n#AI #TechLife #Innovation\n\n\
             **Caption 2:**\n🔥 Mind blown by {prompt} today! 🤯\n\nThe future is literally happening right now ✨\n#FutureTech #Innovation\n\n\
             **Caption 3:**\n💫 {prompt} vibes 💫\n\nThis is why I love technology — it never stops amazing us! 🚀\n#TechLove #Future"
        ),
        "youtube" => format!(
            "**Description 1:**\n🎥 {prompt} — Everything You Need to Know!\n\nIn this video we explore the fascinating world of this topic. Don't forget to like and subscribe!\n\n\
             **Description 2:**\n🔥 The Future is Here: {prompt} Explained\n\nJoin me as we dive deep into this incredible advancement. Subscribe for more!\n\n\
             **Description 3:**\n⚡ {prompt}: Game Changer or Hype?\n\nLet's analyze this together. Hit that notification bell for updates!"
        ),
        "tiktok" => format!(
            "**Caption 1:**\n🔥 {prompt} is trending! ✨ Mind = blown 🤯 #AI #Tech #Viral\n\n\
             **Caption 2:**\nPOV: You just discovered {prompt} 🚀 This changes everything! #TechTok #Innovation\n\n\
             **Caption 3:**\nWait until you see this! {prompt} is insane 🤯 #FYP #Technology"
        ),
        _ => format!(
            "**Post 1:**\nDiscover the amazing world of {prompt}! This topic represents the future of technology and innovation.\n\n\
             **Post 2:**\nExploring {prompt} — where creativity meets technology. The possibilities are truly endless!\n\n\
             **Post 3:**\nThe fascinating realm of {prompt} continues to evolve. What an exciting time to be alive!"
        ),
    }
}

// -- Image -------------------------------------------------------------------

/// Fixed-size placeholder image producer. Text rendering needs a font
/// rasterizer, so the prompt is encoded visually instead: the background
/// color is derived from a hash of the prompt, and the prompt bytes are
/// drawn as a gray-shade bar stripe along the bottom edge. An empty prompt
/// yields a plain solid-color image. Output is a base64-encoded PNG.
pub struct PlaceholderImage {
    width: u32,
    height: u32,
}

/// Longest prompt prefix encoded into the bar stripe.
const MAX_ENCODED_BYTES: usize = 64;

impl PlaceholderImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl FallbackProducer for PlaceholderImage {
    fn produce(&self, request: &GenerationRequest) -> Result<String> {
        debug_assert_eq!(request.kind, PayloadKind::Image);

        let prompt = request.primary_input.as_str();
        let (r, g, b) = base_color(prompt);
        let mut img = RgbaImage::from_pixel(self.width, self.height, Rgba([r, g, b, 255]));

        let bytes = &prompt.as_bytes()[..prompt.len().min(MAX_ENCODED_BYTES)];
        if !bytes.is_empty() {
            let stripe_top = self.height - (self.height / 8).max(1);
            let bar_width = (self.width / bytes.len() as u32).max(1);
            for (i, &byte) in bytes.iter().enumerate() {
                let x0 = i as u32 * bar_width;
                for x in x0..(x0 + bar_width).min(self.width) {
                    for y in stripe_top..self.height {
                        img.put_pixel(x, y, Rgba([byte, byte, byte, 255]));
                    }
                }
            }
        }

        let mut buf = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut buf),
            image::ImageFormat::Png,
        )
        .map_err(|e| TaskRelayError::Fallback(format!("placeholder encode failed: {e}")))?;

        Ok(BASE64.encode(&buf))
    }
}

/// FNV-1a over the prompt, spread across the color channels. Kept away
/// from the extremes so the bar stripe stays visible.
fn base_color(prompt: &str) -> (u8, u8, u8) {
    let mut h: u32 = 0x811c_9dc5;
    for b in prompt.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    (
        64 + (h & 0x7f) as u8,
        64 + ((h >> 8) & 0x7f) as u8,
        128 + ((h >> 16) & 0x7f) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::variant_count;

    #[test]
    fn twitter_template_has_three_variants() {
        let req = GenerationRequest::text("launch").with_platform("twitter");
        let content = TextFallback.produce(&req).unwrap();
        assert!(variant_count(&content) >= 3);
        assert_eq!(content.matches("launch").count(), 3);
    }

    #[test]
    fn every_known_platform_passes_the_variant_gate() {
        for platform in ["twitter", "facebook", "linkedin", "instagram", "youtube", "tiktok"] {
            let req = GenerationRequest::text("launch").with_platform(platform);
            let content = TextFallback.produce(&req).unwrap();
            assert!(
                variant_count(&content) >= 3,
                "platform {platform} produced {} variants",
                variant_count(&content)
            );
        }
    }

    #[test]
    fn unknown_platform_uses_default_template() {
        let req = GenerationRequest::text("launch").with_platform("myspace");
        let content = TextFallback.produce(&req).unwrap();
        assert_eq!(content.matches("**Post").count(), 3);
    }

    #[test]
    fn qa_fallback_names_the_question() {
        let req = GenerationRequest::text("what is rust?");
        let answer = TextFallback.produce(&req).unwrap();
        assert!(answer.contains("what is rust?"));
        assert!(answer.len() >= 50);
    }

    #[test]
    fn text_fallback_is_deterministic() {
        let req = GenerationRequest::text("launch").with_platform("twitter");
        assert_eq!(
            TextFallback.produce(&req).unwrap(),
            TextFallback.produce(&req).unwrap()
        );
    }

    #[test]
    fn placeholder_decodes_to_configured_dimensions() {
        let producer = PlaceholderImage::new(512, 512);
        let req = GenerationRequest::image("cat");
        let encoded = producer.produce(&req).unwrap();
        assert!(!encoded.is_empty());

        let bytes = BASE64.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 512);
        assert_eq!(decoded.height(), 512);
    }

    #[test]
    fn placeholder_is_deterministic_and_prompt_sensitive() {
        let producer = PlaceholderImage::new(256, 256);
        let cat = GenerationRequest::image("cat");
        let dog = GenerationRequest::image("dog");

        assert_eq!(
            producer.produce(&cat).unwrap(),
            producer.produce(&cat).unwrap()
        );
        assert_ne!(
            producer.produce(&cat).unwrap(),
            producer.produce(&dog).unwrap()
        );
    }

    #[test]
    fn empty_prompt_yields_solid_color() {
        let producer = PlaceholderImage::new(256, 256);
        let req = GenerationRequest::image("");
        let encoded = producer.produce(&req).unwrap();
        let bytes = BASE64.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();

        let first = decoded.get_pixel(0, 0);
        assert!(decoded.pixels().all(|p| p == first));
    }

    #[test]
    fn long_prompts_are_truncated_not_rejected() {
        let producer = PlaceholderImage::new(256, 256);
        let req = GenerationRequest::image("x".repeat(500));
        assert!(producer.produce(&req).is_ok());
    }
}
