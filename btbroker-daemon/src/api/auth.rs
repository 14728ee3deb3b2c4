/*!
 * Basic-auth gate
 * Every /api/v1 route requires a username and token known to the store
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};

use super::error::ApiError;
use super::AppState;

/// Username of the caller, attached to the request once authenticated.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some((username, secret)) = basic_credentials(request.headers()) else {
        return ApiError::Unauthorized("missing or invalid basic auth".into()).into_response();
    };

    match state.tokens.verify(&username, &secret) {
        Ok(true) => {
            request.extensions_mut().insert(AuthenticatedUser(username));
            next.run(request).await
        }
        Ok(false) => {
            tracing::warn!("Rejected credentials for {}", username);
            ApiError::Unauthorized("invalid credentials".into()).into_response()
        }
        Err(e) => {
            tracing::error!("Token lookup failed: {}", e);
            ApiError::Internal("database error".into()).into_response()
        }
    }
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, secret) = decoded.split_once(':')?;
    if username.is_empty() || secret.is_empty() {
        return None;
    }
    Some((username.to_string(), secret.to_string()))
}
