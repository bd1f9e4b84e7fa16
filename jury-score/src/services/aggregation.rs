//! Score aggregation engine
//!
//! Rolls criterion scores up into per-juror category totals and then into the final
//! (mean) score of a candidate in a category.
//!
//! # Invariants
//!
//! - A jury total equals the sum of that juror's current criterion scores for the
//!   category's criteria.
//! - A final score equals the mean of the pair's jury totals; `nb_jury` is their count.
//! - Both are recomputed in the same transaction as the write that changes their inputs,
//!   so a failed write leaves the prior state intact.
//!
//! # Concurrency
//!
//! Every write to a (candidate, category) pair holds that pair's lock for the whole
//! transaction. Different pairs proceed in parallel; SQLite's single writer plus
//! `busy_timeout` orders their commits.

use chrono::{DateTime, Utc};
use jury_common::api::{Identity, Role};
use jury_common::db::{Criterion, CriterionScore, FinalScore, JuryTotal, RankedFinalScore};
use jury_common::{Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::db;
use crate::db::scores::CriterionScoreWrite;
use crate::services::access::AccessPolicy;
use crate::services::key_lock::KeyedLocks;

/// (candidate_id, category_id)
type PairKey = (i64, i64);

/// A juror's note for one criterion, as submitted
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionScoreSubmission {
    pub candidate_id: i64,
    pub juror_id: i64,
    pub category_id: i64,
    pub criterion_id: i64,
    pub note: f64,
    pub comment: Option<String>,
}

/// Result of one submission: the three rows as committed together
#[derive(Debug, Clone, Serialize)]
pub struct ScoreSubmissionOutcome {
    /// `true` on first submission, `false` when an existing score was updated in place
    pub created: bool,
    #[serde(rename = "score")]
    pub criterion_score: CriterionScore,
    pub jury_total: JuryTotal,
    pub final_score: FinalScore,
}

/// Aggregates of one (candidate, category) pair after a repair
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    #[serde(rename = "candidat_id")]
    pub candidate_id: i64,
    #[serde(rename = "categorie_id")]
    pub category_id: i64,
    pub jury_totals: Vec<JuryTotal>,
    /// `None` when no jury data remains (any stale final score was cleared)
    pub final_score: Option<FinalScore>,
}

/// Deletions whose cascades invalidate aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CascadeTarget {
    User(i64),
    Criterion(i64),
}

pub struct AggregationEngine {
    db: SqlitePool,
    access: AccessPolicy,
    locks: KeyedLocks<PairKey>,
}

impl AggregationEngine {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            access: AccessPolicy::new(db.clone()),
            db,
            locks: KeyedLocks::new(),
        }
    }

    // ========================================
    // Writes
    // ========================================

    /// Upsert one criterion score and recompute the jury total and final score it feeds.
    ///
    /// `identity` is the caller: a juror may only submit as itself, an admin on behalf of
    /// any assigned juror.
    pub async fn submit_criterion_score(
        &self,
        identity: &Identity,
        submission: CriterionScoreSubmission,
    ) -> Result<ScoreSubmissionOutcome> {
        let criterion = self.validate_submission(identity, &submission).await?;

        let key = (submission.candidate_id, submission.category_id);
        let _guard = self.locks.lock(key).await;

        // Same (candidate, juror, criterion) always maps to the lock held above
        let existed = db::scores::criterion_score_exists(
            &self.db,
            submission.candidate_id,
            submission.juror_id,
            submission.criterion_id,
        )
        .await?;

        let write = CriterionScoreWrite {
            candidate_id: submission.candidate_id,
            juror_id: submission.juror_id,
            category_id: submission.category_id,
            criterion_id: criterion.id,
            note: submission.note,
            comment: submission.comment.clone(),
        };
        let now = jury_common::time::now();

        let mut tx = self.db.begin().await?;

        let criterion_score = match db::scores::upsert_criterion_score(&mut tx, &write, now).await
        {
            Ok(score) => score,
            Err(e) if db::is_foreign_key_violation(&e) => {
                // A referenced row went away after validation; report which one
                tx.rollback().await?;
                self.validate_submission(identity, &submission).await?;
                return Err(Error::NotFound(format!(
                    "Criterion {} or candidate {} was removed while scoring",
                    write.criterion_id, write.candidate_id
                )));
            }
            Err(e) => return Err(e),
        };

        // The upsert holds the write lock, so membership cannot change until commit
        if !db::membership::juror_in_category(&mut *tx, write.category_id, write.juror_id).await? {
            tx.rollback().await?;
            warn!(
                user_id = identity.user_id,
                juror_id = write.juror_id,
                category_id = write.category_id,
                "Rejected score write: juror unassigned while scoring"
            );
            return Err(Error::Unauthorized(format!(
                "Juror {} is not assigned to category {}",
                write.juror_id, write.category_id
            )));
        }
        if !db::membership::candidate_in_category(&mut *tx, write.category_id, write.candidate_id)
            .await?
        {
            tx.rollback().await?;
            return Err(Error::NotFound(format!(
                "Candidate {} is not registered in category {}",
                write.candidate_id, write.category_id
            )));
        }

        let jury_total = db::scores::recompute_jury_total(
            &mut tx,
            write.candidate_id,
            write.juror_id,
            write.category_id,
            now,
        )
        .await?
        .ok_or_else(|| Error::Internal("Jury total missing after score upsert".to_string()))?;

        let final_score =
            db::scores::recompute_final_score(&mut tx, write.candidate_id, write.category_id, now)
                .await?
                .ok_or_else(|| {
                    Error::Internal("Final score missing after jury total upsert".to_string())
                })?;

        tx.commit().await?;

        info!(
            candidate_id = write.candidate_id,
            juror_id = write.juror_id,
            category_id = write.category_id,
            criterion_id = write.criterion_id,
            note = write.note,
            jury_total = jury_total.total,
            final_score = final_score.mean,
            nb_jury = final_score.jury_count,
            created = !existed,
            "Criterion score recorded"
        );

        Ok(ScoreSubmissionOutcome {
            created: !existed,
            criterion_score,
            jury_total,
            final_score,
        })
    }

    /// Recompute one juror's total from current criterion scores.
    ///
    /// The pair's final score is refreshed in the same transaction so it never lags the
    /// jury total. Returns `None` (and removes the row) when the juror has no scores left.
    pub async fn recompute_jury_total(
        &self,
        candidate_id: i64,
        juror_id: i64,
        category_id: i64,
    ) -> Result<Option<JuryTotal>> {
        let _guard = self.locks.lock((candidate_id, category_id)).await;
        let now = jury_common::time::now();

        let mut tx = self.db.begin().await?;
        let jury_total =
            db::scores::recompute_jury_total(&mut tx, candidate_id, juror_id, category_id, now)
                .await?;
        refresh_or_clear_final_score(&mut tx, candidate_id, category_id, now).await?;
        tx.commit().await?;

        debug!(
            candidate_id,
            juror_id,
            category_id,
            total = jury_total.as_ref().map(|t| t.total),
            "Jury total recomputed"
        );
        Ok(jury_total)
    }

    /// Recompute the mean of the pair's current jury totals.
    ///
    /// With no jury totals the prior row (if any) is left untouched and `NoJuryData` is
    /// returned.
    pub async fn recompute_final_score(
        &self,
        candidate_id: i64,
        category_id: i64,
    ) -> Result<FinalScore> {
        let _guard = self.locks.lock((candidate_id, category_id)).await;
        let now = jury_common::time::now();

        let mut tx = self.db.begin().await?;
        match db::scores::recompute_final_score(&mut tx, candidate_id, category_id, now).await? {
            Some(final_score) => {
                tx.commit().await?;
                debug!(
                    candidate_id,
                    category_id,
                    mean = final_score.mean,
                    nb_jury = final_score.jury_count,
                    "Final score recomputed"
                );
                Ok(final_score)
            }
            None => {
                tx.rollback().await?;
                Err(Error::NoJuryData {
                    candidate_id,
                    category_id,
                })
            }
        }
    }

    /// Rebuild every jury total and the final score of one pair (backfill / repair)
    pub async fn repair_candidate_category(
        &self,
        candidate_id: i64,
        category_id: i64,
    ) -> Result<RepairReport> {
        db::candidates::require_candidate(&self.db, candidate_id).await?;
        db::categories::require_category(&self.db, category_id).await?;

        let _guard = self.locks.lock((candidate_id, category_id)).await;
        let now = jury_common::time::now();

        let mut tx = self.db.begin().await?;
        let report = repair_pair(&mut tx, candidate_id, category_id, now).await?;
        tx.commit().await?;

        info!(
            candidate_id,
            category_id,
            juries = report.jury_totals.len(),
            "Aggregates repaired"
        );
        Ok(report)
    }

    /// Delete a user and repair every aggregate their scores fed into
    pub async fn remove_user(&self, user_id: i64) -> Result<Vec<RepairReport>> {
        let user = db::users::require_user(&self.db, user_id).await?;
        if user.role == Role::Admin && db::users::count_by_role(&self.db, Role::Admin).await? <= 1
        {
            return Err(Error::InvalidInput(
                "Cannot delete the last administrator".to_string(),
            ));
        }

        let reports = self.cascade_delete(CascadeTarget::User(user_id)).await?;
        info!(user_id, repaired = reports.len(), "User deleted");
        Ok(reports)
    }

    /// Delete a criterion and repair every aggregate its scores fed into
    pub async fn remove_criterion(&self, criterion_id: i64) -> Result<Vec<RepairReport>> {
        if db::categories::get_criterion(&self.db, criterion_id)
            .await?
            .is_none()
        {
            return Err(Error::NotFound(format!("Criterion {} not found", criterion_id)));
        }

        let reports = self
            .cascade_delete(CascadeTarget::Criterion(criterion_id))
            .await?;
        info!(criterion_id, repaired = reports.len(), "Criterion deleted");
        Ok(reports)
    }

    // ========================================
    // Reads
    // ========================================

    pub async fn jury_totals(&self, candidate_id: i64, category_id: i64) -> Result<Vec<JuryTotal>> {
        db::scores::jury_totals_for(&self.db, candidate_id, category_id).await
    }

    /// Current final score; `NoJuryData` until at least one jury total exists
    pub async fn final_score(&self, candidate_id: i64, category_id: i64) -> Result<FinalScore> {
        db::scores::final_score_for(&self.db, candidate_id, category_id)
            .await?
            .ok_or(Error::NoJuryData {
                candidate_id,
                category_id,
            })
    }

    /// Final scores of a category, highest mean first
    pub async fn ranking(&self, category_id: i64) -> Result<Vec<RankedFinalScore>> {
        db::categories::require_category(&self.db, category_id).await?;
        db::scores::ranked_final_scores(&self.db, category_id).await
    }

    pub async fn criterion_scores(
        &self,
        candidate_id: i64,
        category_id: i64,
        juror_id: Option<i64>,
    ) -> Result<Vec<CriterionScore>> {
        db::scores::criterion_scores_for(&self.db, candidate_id, category_id, juror_id).await
    }

    // ========================================
    // Internals
    // ========================================

    /// Check preconditions in a fixed order; returns the criterion on success
    async fn validate_submission(
        &self,
        identity: &Identity,
        submission: &CriterionScoreSubmission,
    ) -> Result<Criterion> {
        let criterion = db::categories::get_criterion(&self.db, submission.criterion_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("Criterion {} not found", submission.criterion_id))
            })?;

        db::categories::require_category(&self.db, submission.category_id).await?;

        if criterion.category_id != submission.category_id {
            return Err(Error::CriterionCategoryMismatch {
                criterion_id: criterion.id,
                expected: criterion.category_id,
                actual: submission.category_id,
            });
        }

        if !criterion.accepts(submission.note) {
            return Err(Error::InvalidScore {
                note: submission.note,
                max: criterion.max_value,
            });
        }

        db::candidates::require_candidate(&self.db, submission.candidate_id).await?;
        if !db::membership::candidate_in_category(
            &self.db,
            submission.category_id,
            submission.candidate_id,
        )
        .await?
        {
            return Err(Error::NotFound(format!(
                "Candidate {} is not registered in category {}",
                submission.candidate_id, submission.category_id
            )));
        }

        if let Err(e) = self
            .access
            .authorize_score_write(identity, submission.juror_id, submission.category_id)
            .await
        {
            warn!(
                user_id = identity.user_id,
                juror_id = submission.juror_id,
                category_id = submission.category_id,
                "Rejected score write: {}",
                e
            );
            return Err(e);
        }

        Ok(criterion)
    }

    async fn affected_pairs(&self, target: CascadeTarget) -> Result<Vec<PairKey>> {
        match target {
            CascadeTarget::User(id) => db::scores::pairs_scored_by_juror(&self.db, id).await,
            CascadeTarget::Criterion(id) => {
                db::scores::pairs_scored_on_criterion(&self.db, id).await
            }
        }
    }

    /// Lock every pair the target feeds, re-reading until no new pair appeared while
    /// waiting for the locks.
    async fn lock_affected(
        &self,
        target: CascadeTarget,
    ) -> Result<(Vec<PairKey>, Vec<OwnedMutexGuard<()>>)> {
        loop {
            let pairs = self.affected_pairs(target).await?;
            let guards = self.locks.lock_many(pairs.clone()).await;

            let locked: HashSet<PairKey> = pairs.iter().copied().collect();
            let current = self.affected_pairs(target).await?;
            if current.iter().all(|pair| locked.contains(pair)) {
                let mut pairs: Vec<PairKey> = locked.into_iter().collect();
                pairs.sort();
                return Ok((pairs, guards));
            }

            drop(guards);
            debug!(?target, "Affected pairs changed while locking, retrying");
        }
    }

    async fn cascade_delete(&self, target: CascadeTarget) -> Result<Vec<RepairReport>> {
        let (pairs, _guards) = self.lock_affected(target).await?;
        let now = jury_common::time::now();

        let mut tx = self.db.begin().await?;

        match target {
            CascadeTarget::User(id) => {
                if !db::users::delete_user(&mut tx, id).await? {
                    return Err(Error::NotFound(format!("User {} not found", id)));
                }
            }
            CascadeTarget::Criterion(id) => db::categories::delete_criterion(&mut tx, id).await?,
        }

        let mut reports = Vec::with_capacity(pairs.len());
        for (candidate_id, category_id) in pairs {
            reports.push(repair_pair(&mut tx, candidate_id, category_id, now).await?);
        }

        tx.commit().await?;
        Ok(reports)
    }
}

/// Recompute all jury totals of a pair, then its final score (cleared when empty)
async fn repair_pair(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    category_id: i64,
    now: DateTime<Utc>,
) -> Result<RepairReport> {
    let jury_totals =
        db::scores::recompute_jury_totals_for_pair(conn, candidate_id, category_id, now).await?;
    let final_score = refresh_or_clear_final_score(conn, candidate_id, category_id, now).await?;

    Ok(RepairReport {
        candidate_id,
        category_id,
        jury_totals,
        final_score,
    })
}

/// After jury totals changed: recompute the final score, or drop it when no jury total
/// is left to average
async fn refresh_or_clear_final_score(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    category_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<FinalScore>> {
    match db::scores::recompute_final_score(conn, candidate_id, category_id, now).await? {
        Some(final_score) => Ok(Some(final_score)),
        None => {
            if db::scores::clear_final_score(conn, candidate_id, category_id).await? {
                debug!(candidate_id, category_id, "Cleared final score with no jury data");
            }
            Ok(None)
        }
    }
}
