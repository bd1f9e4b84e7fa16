//! User administration

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use jury_common::api::{hash_password, Role};
use jury_common::db::{Category, User};
use jury_common::Error;
use serde::Deserialize;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::extract::{JsonBody, PathParams};
use crate::error::ApiResult;
use crate::services::AccessPolicy;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub nom: String,
    pub email: String,
    pub mot_de_passe: String,
    pub role: Role,
}

/// POST /users (admin)
pub async fn create_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    AccessPolicy::require_admin(&identity)?;

    let password = request.mot_de_passe.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {}", e)))??;
    let user = db::users::create_user(
        &state.db,
        request.nom.trim(),
        request.email.trim(),
        &password_hash,
        request.role,
    )
    .await?;

    info!(user_id = user.id, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Vec<User>>> {
    AccessPolicy::require_admin(&identity)?;
    Ok(Json(db::users::list_users(&state.db).await?))
}

/// GET /users/:id (admin, or the user itself)
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<Json<User>> {
    AccessPolicy::require_self_or_admin(&identity, user_id)?;
    Ok(Json(db::users::require_user(&state.db, user_id).await?))
}

/// GET /users/:id/categories: categories the juror is assigned to
pub async fn user_categories(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<Json<Vec<Category>>> {
    AccessPolicy::require_self_or_admin(&identity, user_id)?;
    Ok(Json(state.membership.categories_for_juror(user_id).await?))
}

/// DELETE /users/:id (admin). Aggregates the user's scores fed into are repaired.
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    AccessPolicy::require_admin(&identity)?;
    state.engine.remove_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
