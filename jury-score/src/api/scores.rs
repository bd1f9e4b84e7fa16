//! Score submission and read endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use jury_common::db::{CriterionScore, FinalScore, JuryTotal, RankedFinalScore};
use serde::{Deserialize, Serialize};

use crate::api::auth::AuthUser;
use crate::api::extract::{JsonBody, PathParams, QueryParams};
use crate::error::ApiResult;
use crate::services::{AccessPolicy, CriterionScoreSubmission, RepairReport, ScoreSubmissionOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CriteriaScoreRequest {
    pub candidat_id: i64,
    pub jury_id: i64,
    pub categorie_id: i64,
    pub critere_id: i64,
    pub note: f64,
    pub commentaire: Option<String>,
}

impl From<CriteriaScoreRequest> for CriterionScoreSubmission {
    fn from(request: CriteriaScoreRequest) -> Self {
        Self {
            candidate_id: request.candidat_id,
            juror_id: request.jury_id,
            category_id: request.categorie_id,
            criterion_id: request.critere_id,
            note: request.note,
            comment: request.commentaire,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CriteriaScoreResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: ScoreSubmissionOutcome,
}

/// POST /scores/criteria-score
///
/// 201 on first submission, 200 when an existing score was updated.
pub async fn submit_criteria_score(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<CriteriaScoreRequest>,
) -> ApiResult<(StatusCode, Json<CriteriaScoreResponse>)> {
    let outcome = state
        .engine
        .submit_criterion_score(&identity, request.into())
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "Score created")
    } else {
        (StatusCode::OK, "Score updated")
    };

    Ok((status, Json(CriteriaScoreResponse { message, outcome })))
}

#[derive(Debug, Deserialize)]
pub struct CriteriaScoresQuery {
    pub jury_id: Option<i64>,
}

/// GET /scores/criteria-scores/:candidat_id/:categorie_id[?jury_id=]
///
/// Jurors only ever see their own notes; admins see all, optionally filtered.
pub async fn list_criteria_scores(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((candidate_id, category_id)): PathParams<(i64, i64)>,
    QueryParams(query): QueryParams<CriteriaScoresQuery>,
) -> ApiResult<Json<Vec<CriterionScore>>> {
    let juror_id = if identity.is_admin() {
        query.jury_id
    } else {
        let requested = query.jury_id.unwrap_or(identity.user_id);
        AccessPolicy::require_self_or_admin(&identity, requested)?;
        Some(requested)
    };

    Ok(Json(
        state
            .engine
            .criterion_scores(candidate_id, category_id, juror_id)
            .await?,
    ))
}

/// GET /scores/jury-scores/:candidat_id/:categorie_id
pub async fn list_jury_scores(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams((candidate_id, category_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<Vec<JuryTotal>>> {
    Ok(Json(state.engine.jury_totals(candidate_id, category_id).await?))
}

/// GET /scores/final_scores/:categorie_id: ranking, best first
pub async fn category_ranking(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams(category_id): PathParams<i64>,
) -> ApiResult<Json<Vec<RankedFinalScore>>> {
    Ok(Json(state.engine.ranking(category_id).await?))
}

/// GET /scores/final_scores/:candidat_id/:categorie_id
pub async fn get_final_score(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    PathParams((candidate_id, category_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<FinalScore>> {
    Ok(Json(state.engine.final_score(candidate_id, category_id).await?))
}

/// POST /scores/recompute/:candidat_id/:categorie_id (admin)
pub async fn recompute(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    PathParams((candidate_id, category_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<RepairReport>> {
    AccessPolicy::require_admin(&identity)?;
    Ok(Json(
        state
            .engine
            .repair_candidate_category(candidate_id, category_id)
            .await?,
    ))
}
