//! Upstream model clients. One backend instance is one configured model at
//! one endpoint; the dispatcher decides which instance handles a request.

pub mod chat;
pub mod image;

pub use chat::ChatBackend;
pub use image::ImageBackend;

use serde::Deserialize;

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the upstream error message out of an error response body, falling
/// back to the raw body when it is not the expected JSON shape.
pub(crate) fn upstream_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(resp) => resp
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_structured_error_message() {
        let body = r#"{"error": {"message": "model overloaded"}}"#;
        assert_eq!(upstream_error_message(body), "model overloaded");
    }

    #[test]
    fn falls_back_to_raw_body() {
        assert_eq!(upstream_error_message("plain failure"), "plain failure");
        assert_eq!(upstream_error_message(r#"{"error": null}"#), r#"{"error": null}"#);
    }
}
