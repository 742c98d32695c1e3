//! Bearer-token auth for the board API.
//!
//! - Sessions are minted by an external service as HS256 JWTs whose `sub` is the user id
//! - When `DEV_MODE=false`, all protected endpoints require `Authorization: Bearer <jwt>`
//! - In dev mode every request runs as a fixed dev user
//!
//! Access control is single-owner: a caller may touch a resource only if they own the
//! workspace it lives in.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};

use super::routes::AppState;
use crate::error::{BoardError, BoardResult};
use crate::model::Resource;
use crate::store::BoardStore;

/// User id every request runs as in dev mode.
pub const DEV_USER_ID: &str = "dev-user";

/// The authenticated caller, inserted as a request extension by `require_auth`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
}

impl AuthUser {
    pub fn dev() -> Self {
        Self {
            id: DEV_USER_ID.to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    /// User id
    sub: String,
    /// Issued-at unix seconds
    iat: i64,
    /// Expiration unix seconds
    exp: i64,
}

/// Mint a token for `user_id`. Returns the token and its expiry (unix seconds).
pub fn issue_token(secret: &str, user_id: &str, ttl_days: i64) -> anyhow::Result<(String, i64)> {
    let now = Utc::now();
    let exp = now + Duration::days(ttl_days.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, claims.exp))
}

/// Verify a token and return the user id it was issued for.
pub fn verify_token(token: &str, secret: &str) -> BoardResult<String> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| BoardError::Unauthorized(format!("Invalid or expired token: {}", e)))?;
    if token_data.claims.sub.trim().is_empty() {
        return Err(BoardError::Unauthorized("Token has no subject".to_string()));
    }
    Ok(token_data.claims.sub)
}

fn bearer_token(req: &Request<Body>) -> &str {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .unwrap_or("")
        .trim()
}

pub async fn require_auth(
    State(state): State<std::sync::Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth.auth_required(state.config.dev_mode) {
        req.extensions_mut().insert(AuthUser::dev());
        return next.run(req).await;
    }

    // If auth isn't configured, fail closed in non-dev mode.
    let Some(secret) = state.config.auth.jwt_secret.as_deref() else {
        return BoardError::PersistenceFailure("JWT_SECRET not configured".to_string())
            .into_response();
    };

    let token = bearer_token(&req);
    if token.is_empty() {
        return BoardError::Unauthorized("Missing Authorization header".to_string())
            .into_response();
    }

    match verify_token(token, secret) {
        Ok(user_id) => {
            req.extensions_mut().insert(AuthUser { id: user_id });
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

/// Fail with `Unauthorized` unless `user` owns the workspace containing `resource`.
/// Missing resources surface as `NotFound`.
pub async fn authorize(
    store: &dyn BoardStore,
    user: &AuthUser,
    resource: Resource,
) -> BoardResult<()> {
    let owner = store.owner_of(resource).await?;
    if owner != user.id {
        tracing::warn!(
            user = %user.id,
            %resource,
            "Denied access to resource owned by another user"
        );
        return Err(BoardError::Unauthorized(format!(
            "No access to {}",
            resource
        )));
    }
    Ok(())
}
