//! jury-score library: scoring service for competition juries
//!
//! Jurors rate candidates against per-category criteria; the aggregation engine keeps
//! per-juror totals and the averaged final score of every candidate consistent with the
//! raw criterion scores.

use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post, MethodRouter},
    Router,
};
use chrono::{DateTime, Utc};
use jury_common::api::TokenService;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod api;
pub mod db;
pub mod error;
pub mod services;

use services::{AggregationEngine, CategoryMembership};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub engine: Arc<AggregationEngine>,
    pub membership: CategoryMembership,
    pub tokens: TokenService,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, tokens: TokenService) -> Self {
        Self {
            engine: Arc::new(AggregationEngine::new(db.clone())),
            membership: CategoryMembership::new(db.clone()),
            db,
            tokens,
            startup_time: jury_common::time::now(),
        }
    }
}

/// Register `path` both with and without a trailing slash
fn both<S>(router: Router<S>, path: &str, handler: MethodRouter<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .route(path, handler.clone())
        .route(&format!("{}/", path), handler)
}

/// Build application router
///
/// `/health`, `/buildinfo` and `/auth/login` are public; every other handler requires a
/// bearer token through the `AuthUser` extractor.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(api::health_check))
        .route("/buildinfo", get(api::get_build_info))
        .route("/auth/login", post(api::auth::login))
        .route("/auth/me", get(api::auth::me));

    // Users
    router = both(
        router,
        "/users",
        get(api::users::list_users).post(api::users::create_user),
    );
    router = router
        .route(
            "/users/:id",
            get(api::users::get_user).delete(api::users::delete_user),
        )
        .route("/users/:id/categories", get(api::users::user_categories));

    // Candidates
    router = both(
        router,
        "/candidats",
        get(api::candidates::list_candidates).post(api::candidates::create_candidate),
    );
    router = router
        .route(
            "/candidats/:id",
            get(api::candidates::get_candidate).delete(api::candidates::delete_candidate),
        )
        .route(
            "/candidats/:id/categories",
            get(api::candidates::candidate_categories),
        );

    // Categories and membership
    router = both(
        router,
        "/categories",
        get(api::categories::list_categories).post(api::categories::create_category),
    );
    router = router
        .route(
            "/categories/:categorie_id/add_candidat/:candidat_id",
            post(api::categories::add_candidate),
        )
        .route(
            "/categories/:categorie_id/remove_candidat/:candidat_id",
            delete(api::categories::remove_candidate),
        )
        .route(
            "/categories/:categorie_id/add_jury/:jury_id",
            post(api::categories::add_juror),
        )
        .route(
            "/categories/:categorie_id/remove_jury/:jury_id",
            delete(api::categories::remove_juror),
        )
        .route(
            "/categories/:categorie_id/candidats",
            get(api::categories::category_candidates),
        )
        .route(
            "/categories/:categorie_id/jurys",
            get(api::categories::category_jurors),
        );

    // Criteria
    router = both(router, "/criteres", post(api::criteria::create_criterion));
    router = router
        .route(
            "/criteres/by_category/:categorie_id",
            get(api::criteria::criteria_by_category),
        )
        .route("/criteres/:id", delete(api::criteria::delete_criterion));

    // Scores. The final_scores routes share the `:id` segment name, which is the
    // category for the ranking and the candidate for the single score.
    router = router
        .route(
            "/scores/criteria-score",
            post(api::scores::submit_criteria_score),
        )
        .route(
            "/scores/criteria-scores/:candidat_id/:categorie_id",
            get(api::scores::list_criteria_scores),
        )
        .route(
            "/scores/jury-scores/:candidat_id/:categorie_id",
            get(api::scores::list_jury_scores),
        )
        .route(
            "/scores/final_scores/:id",
            get(api::scores::category_ranking),
        )
        .route(
            "/scores/final_scores/:id/:categorie_id",
            get(api::scores::get_final_score),
        )
        .route(
            "/scores/recompute/:candidat_id/:categorie_id",
            post(api::scores::recompute),
        );

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// CORS for the browser front-end. Unparseable origins are skipped with a warning.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ])
        .allow_credentials(true)
}
