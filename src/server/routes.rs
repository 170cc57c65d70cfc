use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::config::Config;
use crate::error::Result;
use crate::service::TaskService;

use super::auth;
use super::handlers;

/// State shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TaskService>,
    /// The password `/token` accepts.
    pub api_password: String,
    /// Secret bytes used to sign/verify HS256 JWTs.
    pub jwt_secret: Vec<u8>,
}

pub fn build(service: Arc<TaskService>) -> Result<Router> {
    let api_password = Config::api_password()?;
    let jwt_secret = Config::jwt_secret()?;

    let state = AppState {
        service,
        api_password,
        jwt_secret,
    };

    Ok(Router::new()
        .route("/ai-task", post(handlers::handle_task))
        // Auth middleware — applied to the route above
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        // Unauthenticated endpoints — below the auth layer
        .route("/token", post(auth::issue_token))
        .route("/healthz", get(handlers::healthz))
        .with_state(state))
}
