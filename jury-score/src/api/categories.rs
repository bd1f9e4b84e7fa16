//! Categories and their candidate/juror membership

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use jury_common::db::{Candidate, Category, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::extract::{JsonBody, PathParams};
use crate::error::ApiResult;
use crate::services::AccessPolicy;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub nom: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

/// POST /categories (admin)
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CreateCategoryRequest>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    AccessPolicy::require_admin(&identity)?;

    let category = db::categories::create_category(
        &state.db,
        request.nom.trim(),
        request.description.as_deref(),
    )
    .await?;

    info!(category_id = category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(db::categories::list_categories(&state.db).await?))
}

/// POST /categories/:categorie_id/add_candidat/:candidat_id (admin)
pub async fn add_candidate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((category_id, candidate_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    AccessPolicy::require_admin(&identity)?;
    state
        .membership
        .assign_candidate(category_id, candidate_id)
        .await?;
    Ok(MessageResponse::new("Candidate added to category"))
}

/// DELETE /categories/:categorie_id/remove_candidat/:candidat_id (admin)
pub async fn remove_candidate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((category_id, candidate_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    AccessPolicy::require_admin(&identity)?;
    state
        .membership
        .unassign_candidate(category_id, candidate_id)
        .await?;
    Ok(MessageResponse::new("Candidate removed from category"))
}

/// POST /categories/:categorie_id/add_jury/:jury_id (admin)
pub async fn add_juror(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((category_id, juror_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    AccessPolicy::require_admin(&identity)?;
    state.membership.assign_juror(category_id, juror_id).await?;
    Ok(MessageResponse::new("Juror added to category"))
}

/// DELETE /categories/:categorie_id/remove_jury/:jury_id (admin).
/// The juror's existing scores stay in the aggregates.
pub async fn remove_juror(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((category_id, juror_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    AccessPolicy::require_admin(&identity)?;
    state.membership.unassign_juror(category_id, juror_id).await?;
    Ok(MessageResponse::new("Juror removed from category"))
}

/// GET /categories/:categorie_id/candidats
pub async fn category_candidates(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(category_id): PathParams<i64>,
) -> ApiResult<Json<Vec<Candidate>>> {
    Ok(Json(state.membership.candidates_in_category(category_id).await?))
}

/// GET /categories/:categorie_id/jurys
pub async fn category_jurors(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(category_id): PathParams<i64>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.membership.jurors_in_category(category_id).await?))
}
