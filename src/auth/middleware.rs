//! Validates `Settings.auth_header_name` against the `Settings.auth_api_keys` table
//! and injects the resolved role into request extensions. Grounded on the
//! extract-token / inject-claims shape of a typical JWT middleware, with the
//! JWT decode step replaced by a direct table lookup.

use crate::config::Settings;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ApiKeyPrincipal {
    pub role: String,
}

pub async fn auth_middleware(State(settings): State<Arc<Settings>>, mut req: Request, next: Next) -> Result<Response, AuthError> {
    if !settings.auth_enabled {
        req.extensions_mut().insert(ApiKeyPrincipal { role: "admin".to_string() });
        return Ok(next.run(req).await);
    }

    let key = req
        .headers()
        .get(settings.auth_header_name.as_str())
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(AuthError::MissingToken)?;

    let role = settings
        .auth_api_keys
        .iter()
        .find(|(k, _)| k == &key)
        .map(|(_, role)| role.clone())
        .ok_or(AuthError::InvalidToken)?;

    req.extensions_mut().insert(ApiKeyPrincipal { role });
    Ok(next.run(req).await)
}

pub fn extract_principal(req: &Request) -> Option<&ApiKeyPrincipal> {
    req.extensions().get::<ApiKeyPrincipal>()
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing api key"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid api key"),
        };
        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_maps_to_invalid_token_response() {
        let resp = AuthError::InvalidToken.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
