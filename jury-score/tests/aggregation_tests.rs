//! Aggregation engine tests against a real SQLite file
//!
//! Covers the rollup invariants (jury total = sum, final score = mean), in-place
//! resubmission, rejected writes leaving state untouched, membership history policy,
//! cascading repairs and concurrent submissions.

use jury_common::api::{Identity, Role};
use jury_common::db::init::init_database;
use jury_common::db::{Candidate, Category, Criterion, User};
use jury_score::db;
use jury_score::db::candidates::NewCandidate;
use jury_score::services::{AggregationEngine, CategoryMembership, CriterionScoreSubmission};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    engine: Arc<AggregationEngine>,
    membership: CategoryMembership,
    admin: User,
    j1: User,
    j2: User,
    candidate: Candidate,
    tech: Category,
    innovation: Criterion,
    design: Criterion,
}

impl Fixture {
    fn submission(&self, juror: &User, criterion: &Criterion, note: f64) -> CriterionScoreSubmission {
        CriterionScoreSubmission {
            candidate_id: self.candidate.id,
            juror_id: juror.id,
            category_id: self.tech.id,
            criterion_id: criterion.id,
            note,
            comment: None,
        }
    }

    async fn submit_as_self(
        &self,
        juror: &User,
        criterion: &Criterion,
        note: f64,
    ) -> jury_common::Result<jury_score::services::ScoreSubmissionOutcome> {
        self.engine
            .submit_criterion_score(
                &Identity::new(juror.id, Role::Juror),
                self.submission(juror, criterion, note),
            )
            .await
    }

    async fn execute(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

/// Candidate C1 in "Tech" (criteria Innovation /10 and Design /5), jurors J1 and J2
/// assigned, plus one admin.
async fn setup() -> Fixture {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("jury.db")).await.unwrap();

    // Password hashes are never checked here
    let admin = db::users::create_user(&pool, "Admin", "admin@example.org", "x", Role::Admin)
        .await
        .unwrap();
    let j1 = db::users::create_user(&pool, "J1", "j1@example.org", "x", Role::Juror)
        .await
        .unwrap();
    let j2 = db::users::create_user(&pool, "J2", "j2@example.org", "x", Role::Juror)
        .await
        .unwrap();

    let candidate = db::candidates::create_candidate(
        &pool,
        &NewCandidate {
            last_name: "Martin".to_string(),
            first_name: "Claire".to_string(),
            email: "c1@example.org".to_string(),
            project: Some("Solar kiosk".to_string()),
            company: None,
        },
    )
    .await
    .unwrap();

    let tech = db::categories::create_category(&pool, "Tech", None)
        .await
        .unwrap();
    let innovation = db::categories::create_criterion(&pool, tech.id, "Innovation", 10)
        .await
        .unwrap();
    let design = db::categories::create_criterion(&pool, tech.id, "Design", 5)
        .await
        .unwrap();

    let membership = CategoryMembership::new(pool.clone());
    membership.assign_candidate(tech.id, candidate.id).await.unwrap();
    membership.assign_juror(tech.id, j1.id).await.unwrap();
    membership.assign_juror(tech.id, j2.id).await.unwrap();

    Fixture {
        engine: Arc::new(AggregationEngine::new(pool.clone())),
        _dir: dir,
        pool,
        membership,
        admin,
        j1,
        j2,
        candidate,
        tech,
        innovation,
        design,
    }
}

// =============================================================================
// Rollup
// =============================================================================

#[tokio::test]
async fn test_two_jurors_then_resubmission() {
    let f = setup().await;

    let first = f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    assert!(first.created);
    assert_eq!(first.jury_total.total, 8.0);
    assert_eq!(first.final_score.mean, 8.0);
    assert_eq!(first.final_score.jury_count, 1);

    let second = f.submit_as_self(&f.j2, &f.innovation, 6.0).await.unwrap();
    assert_eq!(second.jury_total.total, 6.0);
    assert_eq!(second.final_score.mean, 7.0);
    assert_eq!(second.final_score.jury_count, 2);

    let resubmitted = f.submit_as_self(&f.j1, &f.innovation, 9.0).await.unwrap();
    assert!(!resubmitted.created);
    assert_eq!(resubmitted.jury_total.total, 9.0);
    assert_eq!(resubmitted.final_score.mean, 7.5);
    assert_eq!(resubmitted.final_score.jury_count, 2);

    assert_eq!(f.count("criterion_scores").await, 2);
    assert_eq!(f.count("jury_scores").await, 2);
    assert_eq!(f.count("final_scores").await, 1);
}

#[tokio::test]
async fn test_jury_total_sums_all_criteria_of_category() {
    let f = setup().await;

    f.submit_as_self(&f.j1, &f.innovation, 7.5).await.unwrap();
    let outcome = f.submit_as_self(&f.j1, &f.design, 4.0).await.unwrap();

    assert_eq!(outcome.jury_total.total, 11.5);
    assert_eq!(outcome.final_score.mean, 11.5);
    assert_eq!(outcome.final_score.jury_count, 1);

    let totals = f.engine.jury_totals(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].juror_id, f.j1.id);
}

#[tokio::test]
async fn test_resubmission_updates_in_place() {
    let f = setup().await;

    let first = f.submit_as_self(&f.j1, &f.innovation, 3.0).await.unwrap();
    let mut submission = f.submission(&f.j1, &f.innovation, 5.0);
    submission.comment = Some("Better on second look".to_string());
    let second = f
        .engine
        .submit_criterion_score(&Identity::new(f.j1.id, Role::Juror), submission)
        .await
        .unwrap();

    assert_eq!(second.criterion_score.id, first.criterion_score.id);
    assert_eq!(second.criterion_score.created_at, first.criterion_score.created_at);
    assert!(second.criterion_score.updated_at >= first.criterion_score.updated_at);
    assert_eq!(second.criterion_score.comment.as_deref(), Some("Better on second look"));
    assert_eq!(f.count("criterion_scores").await, 1);
}

#[tokio::test]
async fn test_boundary_notes_accepted() {
    let f = setup().await;

    assert!(f.submit_as_self(&f.j1, &f.innovation, 0.0).await.is_ok());
    assert!(f.submit_as_self(&f.j1, &f.innovation, 10.0).await.is_ok());
}

// =============================================================================
// Rejected writes
// =============================================================================

#[tokio::test]
async fn test_out_of_range_note_rejected_without_state_change() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();

    for note in [10.5, -1.0, f64::NAN, f64::INFINITY] {
        let err = f.submit_as_self(&f.j1, &f.innovation, note).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_SCORE", "note {} should be rejected", note);
    }

    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(final_score.mean, 8.0);
    let scores = f
        .engine
        .criterion_scores(f.candidate.id, f.tech.id, Some(f.j1.id))
        .await
        .unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].note, 8.0);
}

#[tokio::test]
async fn test_criterion_category_mismatch() {
    let f = setup().await;
    let other = db::categories::create_category(&f.pool, "Design", None)
        .await
        .unwrap();
    let foreign = db::categories::create_criterion(&f.pool, other.id, "Ergonomics", 10)
        .await
        .unwrap();

    let err = f.submit_as_self(&f.j1, &foreign, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "CRITERION_CATEGORY_MISMATCH");
    assert_eq!(f.count("criterion_scores").await, 0);
}

#[tokio::test]
async fn test_unassigned_juror_unauthorized() {
    let f = setup().await;
    let outsider = db::users::create_user(&f.pool, "J3", "j3@example.org", "x", Role::Juror)
        .await
        .unwrap();

    let err = f.submit_as_self(&outsider, &f.innovation, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "UNAUTHORIZED");
    assert_eq!(f.count("criterion_scores").await, 0);
    assert_eq!(f.count("jury_scores").await, 0);
    assert_eq!(f.count("final_scores").await, 0);
}

#[tokio::test]
async fn test_juror_cannot_submit_as_another_juror() {
    let f = setup().await;

    let err = f
        .engine
        .submit_criterion_score(
            &Identity::new(f.j1.id, Role::Juror),
            f.submission(&f.j2, &f.innovation, 5.0),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_admin_submits_on_behalf_of_assigned_juror() {
    let f = setup().await;
    let admin = Identity::new(f.admin.id, Role::Admin);

    let outcome = f
        .engine
        .submit_criterion_score(&admin, f.submission(&f.j2, &f.innovation, 6.0))
        .await
        .unwrap();
    assert_eq!(outcome.criterion_score.juror_id, f.j2.id);

    // The admin itself is not a juror of the category
    let err = f
        .engine
        .submit_criterion_score(&admin, f.submission(&f.admin, &f.innovation, 6.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_entities_not_found() {
    let f = setup().await;
    let identity = Identity::new(f.j1.id, Role::Juror);

    let mut unknown_criterion = f.submission(&f.j1, &f.innovation, 5.0);
    unknown_criterion.criterion_id = 9999;
    let err = f
        .engine
        .submit_criterion_score(&identity, unknown_criterion)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");

    let mut unknown_candidate = f.submission(&f.j1, &f.innovation, 5.0);
    unknown_candidate.candidate_id = 9999;
    let err = f
        .engine
        .submit_criterion_score(&identity, unknown_candidate)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
}

#[tokio::test]
async fn test_candidate_not_registered_in_category() {
    let f = setup().await;
    f.membership
        .unassign_candidate(f.tech.id, f.candidate.id)
        .await
        .unwrap();

    let err = f.submit_as_self(&f.j1, &f.innovation, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
}

#[tokio::test]
async fn test_failed_final_score_update_rolls_back_submission() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();

    f.execute(
        "CREATE TRIGGER fail_final_update BEFORE UPDATE ON final_scores
         BEGIN SELECT RAISE(ABORT, 'final score write failed'); END",
    )
    .await;

    let err = f.submit_as_self(&f.j1, &f.innovation, 3.0).await.unwrap_err();
    assert_eq!(err.kind(), "DATABASE_ERROR");

    let scores = f
        .engine
        .criterion_scores(f.candidate.id, f.tech.id, Some(f.j1.id))
        .await
        .unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0].note, 8.0);
    let totals = f.engine.jury_totals(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total, 8.0);
    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(final_score.mean, 8.0);
}

#[tokio::test]
async fn test_juror_unassigned_during_write_is_rejected() {
    let f = setup().await;

    // Unassign lands inside the scoring transaction, after validation passed
    f.execute(
        "CREATE TRIGGER unassign_on_score AFTER INSERT ON criterion_scores
         BEGIN DELETE FROM category_jurors WHERE juror_id = NEW.juror_id; END",
    )
    .await;

    let err = f.submit_as_self(&f.j1, &f.innovation, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "UNAUTHORIZED");
    assert_eq!(f.count("criterion_scores").await, 0);
    assert_eq!(f.count("jury_scores").await, 0);
    assert_eq!(f.count("final_scores").await, 0);
    assert!(db::membership::juror_in_category(&f.pool, f.tech.id, f.j1.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_candidate_unregistered_during_write_is_rejected() {
    let f = setup().await;

    f.execute(
        "CREATE TRIGGER unregister_on_score AFTER INSERT ON criterion_scores
         BEGIN DELETE FROM category_candidates WHERE candidate_id = NEW.candidate_id; END",
    )
    .await;

    let err = f.submit_as_self(&f.j1, &f.innovation, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
    assert_eq!(f.count("criterion_scores").await, 0);
    assert!(db::membership::candidate_in_category(&f.pool, f.tech.id, f.candidate.id)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_criterion_deleted_during_write_is_not_found() {
    let f = setup().await;

    f.execute(
        "CREATE TRIGGER drop_criterion_on_score BEFORE INSERT ON criterion_scores
         BEGIN DELETE FROM criteria WHERE id = NEW.criterion_id; END",
    )
    .await;

    let err = f.submit_as_self(&f.j1, &f.innovation, 5.0).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
    assert_eq!(f.count("criterion_scores").await, 0);
    assert_eq!(f.count("jury_scores").await, 0);
    assert_eq!(f.count("criteria").await, 2);
}

// =============================================================================
// Membership history
// =============================================================================

#[tokio::test]
async fn test_unassigned_juror_history_keeps_counting() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    f.submit_as_self(&f.j2, &f.innovation, 6.0).await.unwrap();

    f.membership.unassign_juror(f.tech.id, f.j2.id).await.unwrap();

    let err = f.submit_as_self(&f.j2, &f.innovation, 10.0).await.unwrap_err();
    assert_eq!(err.kind(), "UNAUTHORIZED");

    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(final_score.mean, 7.0);
    assert_eq!(final_score.jury_count, 2);

    // A later write by J1 still averages in J2's preserved total
    let outcome = f.submit_as_self(&f.j1, &f.innovation, 10.0).await.unwrap();
    assert_eq!(outcome.final_score.mean, 8.0);
    assert_eq!(outcome.final_score.jury_count, 2);
}

// =============================================================================
// Standalone recomputation and repair
// =============================================================================

#[tokio::test]
async fn test_recompute_final_score_without_jury_data() {
    let f = setup().await;

    let err = f
        .engine
        .recompute_final_score(f.candidate.id, f.tech.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "NO_JURY_DATA");

    let err = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap_err();
    assert_eq!(err.kind(), "NO_JURY_DATA");
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    f.submit_as_self(&f.j2, &f.innovation, 5.0).await.unwrap();

    for _ in 0..2 {
        let total = f
            .engine
            .recompute_jury_total(f.candidate.id, f.j2.id, f.tech.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(total.total, 5.0);

        let final_score = f
            .engine
            .recompute_final_score(f.candidate.id, f.tech.id)
            .await
            .unwrap();
        assert_eq!(final_score.mean, 6.5);
        assert_eq!(final_score.jury_count, 2);
    }
}

#[tokio::test]
async fn test_repair_fixes_tampered_aggregates() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    f.submit_as_self(&f.j2, &f.innovation, 6.0).await.unwrap();

    sqlx::query("UPDATE jury_scores SET total = 100 WHERE juror_id = ?")
        .bind(f.j1.id)
        .execute(&f.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE final_scores SET mean = 0, jury_count = 9")
        .execute(&f.pool)
        .await
        .unwrap();

    let report = f
        .engine
        .repair_candidate_category(f.candidate.id, f.tech.id)
        .await
        .unwrap();

    assert_eq!(report.jury_totals.len(), 2);
    let final_score = report.final_score.unwrap();
    assert_eq!(final_score.mean, 7.0);
    assert_eq!(final_score.jury_count, 2);
}

#[tokio::test]
async fn test_removing_criterion_repairs_totals() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    f.submit_as_self(&f.j1, &f.design, 4.0).await.unwrap();
    f.submit_as_self(&f.j2, &f.design, 2.0).await.unwrap();

    let reports = f.engine.remove_criterion(f.design.id).await.unwrap();
    assert_eq!(reports.len(), 1);

    // J2 only scored Design: their total disappears and no longer counts
    let totals = f.engine.jury_totals(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(totals.len(), 1);
    assert_eq!(totals[0].total, 8.0);

    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(final_score.mean, 8.0);
    assert_eq!(final_score.jury_count, 1);

    let err = f.engine.remove_criterion(f.design.id).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
}

#[tokio::test]
async fn test_removing_juror_repairs_final_scores() {
    let f = setup().await;
    f.submit_as_self(&f.j1, &f.innovation, 8.0).await.unwrap();
    f.submit_as_self(&f.j2, &f.innovation, 6.0).await.unwrap();

    f.engine.remove_user(f.j2.id).await.unwrap();
    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    assert_eq!(final_score.mean, 8.0);
    assert_eq!(final_score.jury_count, 1);

    // Last contributing juror gone: the stale final score is cleared
    f.engine.remove_user(f.j1.id).await.unwrap();
    let err = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap_err();
    assert_eq!(err.kind(), "NO_JURY_DATA");
    assert_eq!(f.count("final_scores").await, 0);
}

#[tokio::test]
async fn test_last_admin_cannot_be_removed() {
    let f = setup().await;

    let err = f.engine.remove_user(f.admin.id).await.unwrap_err();
    assert_eq!(err.kind(), "INVALID_INPUT");

    let err = f.engine.remove_user(9999).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
}

#[tokio::test]
async fn test_ranking_orders_by_mean() {
    let f = setup().await;
    let runner_up = db::candidates::create_candidate(
        &f.pool,
        &NewCandidate {
            last_name: "Durand".to_string(),
            first_name: "Paul".to_string(),
            email: "c2@example.org".to_string(),
            project: None,
            company: Some("Acme".to_string()),
        },
    )
    .await
    .unwrap();
    f.membership
        .assign_candidate(f.tech.id, runner_up.id)
        .await
        .unwrap();

    f.submit_as_self(&f.j1, &f.innovation, 6.0).await.unwrap();
    let mut submission = f.submission(&f.j1, &f.innovation, 9.0);
    submission.candidate_id = runner_up.id;
    f.engine
        .submit_criterion_score(&Identity::new(f.j1.id, Role::Juror), submission)
        .await
        .unwrap();

    let ranking = f.engine.ranking(f.tech.id).await.unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0].candidate_id, runner_up.id);
    assert_eq!(ranking[1].candidate_id, f.candidate.id);

    let err = f.engine.ranking(9999).await.unwrap_err();
    assert_eq!(err.kind(), "NOT_FOUND");
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_stay_consistent() {
    let f = Arc::new(setup().await);

    let mut handles = Vec::new();
    for round in 0..10 {
        for (juror, criterion) in [
            (f.j1.clone(), f.innovation.clone()),
            (f.j1.clone(), f.design.clone()),
            (f.j2.clone(), f.innovation.clone()),
            (f.j2.clone(), f.design.clone()),
        ] {
            let f = f.clone();
            let note = (round % 5) as f64;
            handles.push(tokio::spawn(async move {
                f.submit_as_self(&juror, &criterion, note).await.unwrap();
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(f.count("criterion_scores").await, 4);

    // Whatever order the writes landed in, the aggregates match the surviving notes
    let mut expected_totals = Vec::new();
    for juror in [&f.j1, &f.j2] {
        let scores = f
            .engine
            .criterion_scores(f.candidate.id, f.tech.id, Some(juror.id))
            .await
            .unwrap();
        let sum: f64 = scores.iter().map(|s| s.note).sum();
        expected_totals.push(sum);
    }

    let totals = f.engine.jury_totals(f.candidate.id, f.tech.id).await.unwrap();
    let mut actual_totals: Vec<f64> = totals.iter().map(|t| t.total).collect();
    actual_totals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    expected_totals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(actual_totals, expected_totals);

    let final_score = f.engine.final_score(f.candidate.id, f.tech.id).await.unwrap();
    let mean = expected_totals.iter().sum::<f64>() / expected_totals.len() as f64;
    assert!((final_score.mean - mean).abs() < 1e-9);
    assert_eq!(final_score.jury_count, 2);
}
