use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use super::auth::AuthenticatedUser;
use super::error::{ApiError, ApiResult};
use super::{AppState, MessageResponse};
use crate::tokens::{Token, TokenError};

#[derive(Debug, Deserialize)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: String,
}

pub async fn create_token(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(caller)): Extension<AuthenticatedUser>,
    body: Result<Json<CreateTokenRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(req) = body.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    if req.username.is_empty() || req.token.is_empty() {
        return Err(ApiError::BadRequest(
            "username and token are required".into(),
        ));
    }

    match state.tokens.create(&req.username, &req.token) {
        Ok(_) => {
            tracing::info!("{} created a token for {}", caller, req.username);
            Ok((
                StatusCode::CREATED,
                Json(MessageResponse::new("token created successfully")),
            ))
        }
        Err(TokenError::Conflict(_)) => Err(ApiError::Conflict("username already exists".into())),
        Err(e) => {
            tracing::error!("Failed to create token: {}", e);
            Err(ApiError::Internal("failed to create token".into()))
        }
    }
}

pub async fn list_tokens(State(state): State<AppState>) -> ApiResult<Json<Vec<Token>>> {
    state.tokens.list().map(Json).map_err(|e| {
        tracing::error!("Failed to list tokens: {}", e);
        ApiError::Internal("database error".into())
    })
}

pub async fn get_token(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Token>> {
    match state.tokens.get(&username) {
        Ok(Some(token)) => Ok(Json(token)),
        Ok(None) => Err(ApiError::NotFound("token not found".into())),
        Err(e) => {
            tracing::error!("Failed to read token: {}", e);
            Err(ApiError::Internal("database error".into()))
        }
    }
}

pub async fn delete_token(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    match state.tokens.delete(&username) {
        Ok(()) => Ok(Json(MessageResponse::new("token deleted successfully"))),
        Err(TokenError::NotFound(_)) => Err(ApiError::NotFound("token not found".into())),
        Err(e) => {
            tracing::error!("Failed to delete token: {}", e);
            Err(ApiError::Internal("database error".into()))
        }
    }
}
