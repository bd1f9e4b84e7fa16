//! Candidate registration

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use jury_common::db::{Candidate, Category};
use serde::Deserialize;
use tracing::info;

use crate::api::auth::AuthUser;
use crate::api::extract::{JsonBody, PathParams};
use crate::db::candidates::NewCandidate;
use crate::error::ApiResult;
use crate::services::AccessPolicy;
use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateCandidateRequest {
    pub nom: String,
    pub prenom: String,
    pub email: String,
    pub projet: Option<String>,
    pub entreprise: Option<String>,
}

/// POST /candidats (admin)
pub async fn create_candidate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CreateCandidateRequest>,
) -> ApiResult<(StatusCode, Json<Candidate>)> {
    AccessPolicy::require_admin(&identity)?;

    let candidate = db::candidates::create_candidate(
        &state.db,
        &NewCandidate {
            last_name: request.nom,
            first_name: request.prenom,
            email: request.email.trim().to_string(),
            project: request.projet,
            company: request.entreprise,
        },
    )
    .await?;

    info!(candidate_id = candidate.id, "Candidate registered");
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// GET /candidats
pub async fn list_candidates(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> ApiResult<Json<Vec<Candidate>>> {
    Ok(Json(db::candidates::list_candidates(&state.db).await?))
}

/// GET /candidats/:id
pub async fn get_candidate(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(candidate_id): PathParams<i64>,
) -> ApiResult<Json<Candidate>> {
    Ok(Json(
        db::candidates::require_candidate(&state.db, candidate_id).await?,
    ))
}

/// GET /candidats/:id/categories
pub async fn candidate_categories(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(candidate_id): PathParams<i64>,
) -> ApiResult<Json<Vec<Category>>> {
    Ok(Json(
        state.membership.categories_for_candidate(candidate_id).await?,
    ))
}

/// DELETE /candidats/:id (admin). Every score row of the candidate cascades with it.
pub async fn delete_candidate(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams(candidate_id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    AccessPolicy::require_admin(&identity)?;
    db::candidates::delete_candidate(&state.db, candidate_id).await?;
    info!(candidate_id, "Candidate deleted");
    Ok(StatusCode::NO_CONTENT)
}
