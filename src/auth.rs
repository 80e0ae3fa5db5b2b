//! Session gate for the back-office routes.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use serde::Serialize;

use crate::http::AppState;
use crate::KardexError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: String,
}

pub trait AuthProvider: Send + Sync {
    fn get_session(&self, token: &str) -> Option<Session>;
}

/// One shared back-office token.
pub struct StaticTokenAuth {
    token: String,
    user: String,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>, user: impl Into<String>) -> Self {
        Self { token: token.into(), user: user.into() }
    }
}

impl AuthProvider for StaticTokenAuth {
    fn get_session(&self, token: &str) -> Option<Session> {
        (!self.token.is_empty() && token == self.token).then(|| Session { user: self.user.clone() })
    }
}

fn bearer(req: &Request) -> Option<&str> {
    req.headers().get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ").map(str::trim)
}

/// Rejects requests without a valid session; otherwise stores the `Session`
/// in the request extensions.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, KardexError> {
    let session = bearer(&req).and_then(|t| state.auth.get_session(t)).ok_or_else(|| {
        tracing::debug!(path = %req.uri().path(), "request without a valid session");
        KardexError::Unauthorized
    })?;
    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
