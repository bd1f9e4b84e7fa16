//! Scoring criteria

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use jury_common::db::Criterion;
use serde::Deserialize;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::extract::{JsonBody, PathParams};
use crate::error::ApiResult;
use crate::services::{AccessPolicy, RepairReport};
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCriterionRequest {
    pub categorie_id: i64,
    pub nom: String,
    pub valeur_max: i64,
}

/// POST /criteres (admin)
pub async fn create_criterion(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CreateCriterionRequest>,
) -> ApiResult<(StatusCode, Json<Criterion>)> {
    AccessPolicy::require_admin(&identity)?;

    let criterion = db::categories::create_criterion(
        &state.db,
        request.categorie_id,
        request.nom.trim(),
        request.valeur_max,
    )
    .await?;

    info!(
        criterion_id = criterion.id,
        category_id = criterion.category_id,
        max = criterion.max_value,
        "Criterion created"
    );
    Ok((StatusCode::CREATED, Json(criterion)))
}

/// GET /criteres/by_category/:categorie_id
pub async fn criteria_by_category(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(category_id): PathParams<i64>,
) -> ApiResult<Json<Vec<Criterion>>> {
    db::categories::require_category(&state.db, category_id).await?;
    Ok(Json(
        db::categories::criteria_by_category(&state.db, category_id).await?,
    ))
}

/// DELETE /criteres/:id (admin). Returns the repaired aggregates.
pub async fn delete_criterion(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams(criterion_id): PathParams<i64>,
) -> ApiResult<Json<Vec<RepairReport>>> {
    AccessPolicy::require_admin(&identity)?;
    Ok(Json(state.engine.remove_criterion(criterion_id).await?))
}
