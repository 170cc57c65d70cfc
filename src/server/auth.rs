use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::routes::AppState;

/// JWT expiry: 30 minutes (in seconds).
const TOKEN_EXPIRY_SECS: u64 = 30 * 60;

/// JWT claims embedded in the token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject — the username the token was issued to.
    sub: String,
    /// Issued-at (unix timestamp).
    iat: u64,
    /// Expiry (unix timestamp).
    exp: u64,
}

/// Extract and validate the bearer JWT from the Authorization header.
fn validate_token(req: &Request<Body>, secret: &[u8]) -> bool {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };

    let key = DecodingKey::from_secret(secret);
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_required_spec_claims(&["sub", "exp", "iat"]);
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation).is_ok()
}

/// Mint a new JWT signed with the server's secret.
fn mint_token(secret: &[u8], username: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = Claims {
        sub: username.to_string(),
        iat: now,
        exp: now + TOKEN_EXPIRY_SECS,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Middleware enforcing bearer authentication on the task routes.
/// `/token` and `/healthz` are registered below this layer in the router.
pub async fn require_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if validate_token(&req, &state.jwt_secret) {
        return next.run(req).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "detail": "not authenticated" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TokenBody {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// POST /token — validate the password, return a bearer JWT.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenBody>,
) -> Response {
    if body.password != state.api_password {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "detail": "incorrect username or password" })),
        )
            .into_response();
    }

    match mint_token(&state.jwt_secret, &body.username) {
        Ok(token) => Json(TokenResponse {
            access_token: token,
            token_type: "bearer",
        })
        .into_response(),
        Err(e) => {
            tracing::error!("failed to mint JWT: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": "internal error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn request_with_auth(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/ai-task");
        if let Some(v) = value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn minted_token_validates() {
        let token = mint_token(SECRET, "alice").unwrap();
        let req = request_with_auth(Some(&format!("Bearer {token}")));
        assert!(validate_token(&req, SECRET));
    }

    #[test]
    fn missing_header_fails() {
        let req = request_with_auth(None);
        assert!(!validate_token(&req, SECRET));
    }

    #[test]
    fn wrong_scheme_fails() {
        let token = mint_token(SECRET, "alice").unwrap();
        let req = request_with_auth(Some(&format!("Basic {token}")));
        assert!(!validate_token(&req, SECRET));
    }

    #[test]
    fn token_signed_with_other_secret_fails() {
        let token = mint_token(b"other-secret", "alice").unwrap();
        let req = request_with_auth(Some(&format!("Bearer {token}")));
        assert!(!validate_token(&req, SECRET));
    }

    #[test]
    fn garbage_token_fails() {
        let req = request_with_auth(Some("Bearer not.a.jwt"));
        assert!(!validate_token(&req, SECRET));
    }
}
