//! Bearer authentication and login
//!
//! `AuthUser` resolves `Authorization: Bearer <jwt>` into an [`Identity`]. The role is
//! re-read from the users table so a deleted user's token stops working immediately.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts},
    Form, Json,
};
use jury_common::api::{parse_bearer, verify_password, AccessToken, Identity};
use jury_common::db::User;
use jury_common::Error;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::{db, AppState};

/// Authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| Error::Unauthenticated("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| Error::Unauthenticated("Authorization header is not ASCII".to_string()))?;

        let token = parse_bearer(header_value)?;
        let claimed = state.tokens.verify(token)?;

        let user = db::users::get_user(&state.db, claimed.user_id)
            .await?
            .ok_or_else(|| {
                Error::Unauthenticated(format!("User {} no longer exists", claimed.user_id))
            })?;

        Ok(AuthUser(Identity::new(user.id, user.role)))
    }
}

/// Login credentials; `username` carries the email
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Accepts the credentials either form-encoded or as JSON
pub struct LoginPayload(pub LoginRequest);

#[async_trait]
impl FromRequest<AppState> for LoginPayload {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        let credentials = if is_json {
            Json::<LoginRequest>::from_request(req, state).await?.0
        } else {
            Form::<LoginRequest>::from_request(req, state).await?.0
        };

        Ok(LoginPayload(credentials))
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    LoginPayload(credentials): LoginPayload,
) -> ApiResult<Json<AccessToken>> {
    let user = db::users::find_by_email(&state.db, &credentials.username).await?;

    let verified = match &user {
        Some(user) => {
            let password = credentials.password.clone();
            let hash = user.password_hash.clone();
            tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(|e| Error::Internal(format!("Password check task failed: {}", e)))?
        }
        None => false,
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!(email = %credentials.username, "Login rejected");
            return Err(Error::Unauthenticated("Invalid credentials".to_string()).into());
        }
    };

    let token = state.tokens.issue(&user)?;
    info!(user_id = user.id, role = %user.role, "User logged in");
    Ok(Json(token))
}

/// GET /auth/me
pub async fn me(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Json<User>> {
    Ok(Json(
        db::users::require_user(&state.db, identity.user_id).await?,
    ))
}
