//! Score persistence: criterion scores, jury totals, final scores
//!
//! Mutating functions take a `&mut SqliteConnection` so the aggregation engine can run
//! them inside one transaction. Every write-path function issues its first write before
//! any read, so a deferred SQLite transaction acquires the write lock up front (waiting
//! on `busy_timeout`) instead of failing on a stale read snapshot.

use chrono::{DateTime, Utc};
use jury_common::db::{CriterionScore, FinalScore, JuryTotal, RankedFinalScore};
use jury_common::Result;
use sqlx::{SqliteConnection, SqlitePool};

const CRITERION_SCORE_COLUMNS: &str = "id, candidate_id, juror_id, category_id, criterion_id, \
     note, comment, created_at, updated_at";
const JURY_TOTAL_COLUMNS: &str = "id, candidate_id, juror_id, category_id, total, updated_at";
const FINAL_SCORE_COLUMNS: &str = "id, candidate_id, category_id, mean, jury_count, updated_at";

/// Validated write request for one criterion score
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionScoreWrite {
    pub candidate_id: i64,
    pub juror_id: i64,
    pub category_id: i64,
    pub criterion_id: i64,
    pub note: f64,
    pub comment: Option<String>,
}

// ========================================
// Criterion Scores
// ========================================

/// Insert or update in place, keyed by (candidate, juror, criterion).
/// `created_at` survives updates; `updated_at` is refreshed.
pub async fn upsert_criterion_score(
    conn: &mut SqliteConnection,
    write: &CriterionScoreWrite,
    now: DateTime<Utc>,
) -> Result<CriterionScore> {
    let sql = format!(
        "INSERT INTO criterion_scores
            (candidate_id, juror_id, category_id, criterion_id, note, comment, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (candidate_id, juror_id, criterion_id) DO UPDATE SET
            category_id = excluded.category_id,
            note = excluded.note,
            comment = excluded.comment,
            updated_at = excluded.updated_at
         RETURNING {}",
        CRITERION_SCORE_COLUMNS
    );

    Ok(sqlx::query_as::<_, CriterionScore>(&sql)
        .bind(write.candidate_id)
        .bind(write.juror_id)
        .bind(write.category_id)
        .bind(write.criterion_id)
        .bind(write.note)
        .bind(&write.comment)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?)
}

pub async fn criterion_score_exists(
    pool: &SqlitePool,
    candidate_id: i64,
    juror_id: i64,
    criterion_id: i64,
) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM criterion_scores
         WHERE candidate_id = ? AND juror_id = ? AND criterion_id = ?",
    )
    .bind(candidate_id)
    .bind(juror_id)
    .bind(criterion_id)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Criterion scores for a candidate in a category, optionally narrowed to one juror
pub async fn criterion_scores_for(
    pool: &SqlitePool,
    candidate_id: i64,
    category_id: i64,
    juror_id: Option<i64>,
) -> Result<Vec<CriterionScore>> {
    let sql = format!(
        "SELECT {} FROM criterion_scores
         WHERE candidate_id = ? AND category_id = ? AND (? IS NULL OR juror_id = ?)
         ORDER BY juror_id, criterion_id",
        CRITERION_SCORE_COLUMNS
    );
    Ok(sqlx::query_as::<_, CriterionScore>(&sql)
        .bind(candidate_id)
        .bind(category_id)
        .bind(juror_id)
        .bind(juror_id)
        .fetch_all(pool)
        .await?)
}

// ========================================
// Jury Totals
// ========================================

/// Recompute one jury total from the juror's current criterion scores.
///
/// Only scores whose criterion belongs to `category_id` count. When none remain the jury
/// total row is removed and `None` is returned.
pub async fn recompute_jury_total(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    juror_id: i64,
    category_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<JuryTotal>> {
    sqlx::query(
        "DELETE FROM jury_scores
         WHERE candidate_id = ?1 AND juror_id = ?2 AND category_id = ?3
           AND NOT EXISTS (
               SELECT 1 FROM criterion_scores cs
               JOIN criteria c ON c.id = cs.criterion_id
               WHERE cs.candidate_id = ?1 AND cs.juror_id = ?2 AND c.category_id = ?3
           )",
    )
    .bind(candidate_id)
    .bind(juror_id)
    .bind(category_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO jury_scores (candidate_id, juror_id, category_id, total, updated_at)
         SELECT cs.candidate_id, cs.juror_id, c.category_id, SUM(cs.note), ?4
         FROM criterion_scores cs
         JOIN criteria c ON c.id = cs.criterion_id
         WHERE cs.candidate_id = ?1 AND cs.juror_id = ?2 AND c.category_id = ?3
         GROUP BY cs.candidate_id, cs.juror_id, c.category_id
         ON CONFLICT (candidate_id, juror_id, category_id) DO UPDATE SET
            total = excluded.total,
            updated_at = excluded.updated_at",
    )
    .bind(candidate_id)
    .bind(juror_id)
    .bind(category_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let sql = format!(
        "SELECT {} FROM jury_scores WHERE candidate_id = ? AND juror_id = ? AND category_id = ?",
        JURY_TOTAL_COLUMNS
    );
    Ok(sqlx::query_as::<_, JuryTotal>(&sql)
        .bind(candidate_id)
        .bind(juror_id)
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Recompute every jury total of a (candidate, category) pair at once
pub async fn recompute_jury_totals_for_pair(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    category_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<JuryTotal>> {
    sqlx::query(
        "DELETE FROM jury_scores
         WHERE candidate_id = ?1 AND category_id = ?2
           AND NOT EXISTS (
               SELECT 1 FROM criterion_scores cs
               JOIN criteria c ON c.id = cs.criterion_id
               WHERE cs.candidate_id = ?1 AND cs.juror_id = jury_scores.juror_id
                 AND c.category_id = ?2
           )",
    )
    .bind(candidate_id)
    .bind(category_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "INSERT INTO jury_scores (candidate_id, juror_id, category_id, total, updated_at)
         SELECT cs.candidate_id, cs.juror_id, c.category_id, SUM(cs.note), ?3
         FROM criterion_scores cs
         JOIN criteria c ON c.id = cs.criterion_id
         WHERE cs.candidate_id = ?1 AND c.category_id = ?2
         GROUP BY cs.candidate_id, cs.juror_id, c.category_id
         ON CONFLICT (candidate_id, juror_id, category_id) DO UPDATE SET
            total = excluded.total,
            updated_at = excluded.updated_at",
    )
    .bind(candidate_id)
    .bind(category_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let sql = format!(
        "SELECT {} FROM jury_scores WHERE candidate_id = ? AND category_id = ? ORDER BY juror_id",
        JURY_TOTAL_COLUMNS
    );
    Ok(sqlx::query_as::<_, JuryTotal>(&sql)
        .bind(candidate_id)
        .bind(category_id)
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn jury_totals_for(
    pool: &SqlitePool,
    candidate_id: i64,
    category_id: i64,
) -> Result<Vec<JuryTotal>> {
    let sql = format!(
        "SELECT {} FROM jury_scores WHERE candidate_id = ? AND category_id = ? ORDER BY juror_id",
        JURY_TOTAL_COLUMNS
    );
    Ok(sqlx::query_as::<_, JuryTotal>(&sql)
        .bind(candidate_id)
        .bind(category_id)
        .fetch_all(pool)
        .await?)
}

// ========================================
// Final Scores
// ========================================

/// Recompute the final score as the mean of the pair's jury totals.
///
/// Returns `None` without touching the table when no jury total exists, so a prior
/// final score is retained.
pub async fn recompute_final_score(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    category_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<FinalScore>> {
    let result = sqlx::query(
        "INSERT INTO final_scores (candidate_id, category_id, mean, jury_count, updated_at)
         SELECT candidate_id, category_id, AVG(total), COUNT(*), ?3
         FROM jury_scores
         WHERE candidate_id = ?1 AND category_id = ?2
         GROUP BY candidate_id, category_id
         ON CONFLICT (candidate_id, category_id) DO UPDATE SET
            mean = excluded.mean,
            jury_count = excluded.jury_count,
            updated_at = excluded.updated_at",
    )
    .bind(candidate_id)
    .bind(category_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let sql = format!(
        "SELECT {} FROM final_scores WHERE candidate_id = ? AND category_id = ?",
        FINAL_SCORE_COLUMNS
    );
    Ok(sqlx::query_as::<_, FinalScore>(&sql)
        .bind(candidate_id)
        .bind(category_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Remove a final score whose contributing jury totals are all gone
pub async fn clear_final_score(
    conn: &mut SqliteConnection,
    candidate_id: i64,
    category_id: i64,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM final_scores WHERE candidate_id = ? AND category_id = ?")
        .bind(candidate_id)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn final_score_for(
    pool: &SqlitePool,
    candidate_id: i64,
    category_id: i64,
) -> Result<Option<FinalScore>> {
    let sql = format!(
        "SELECT {} FROM final_scores WHERE candidate_id = ? AND category_id = ?",
        FINAL_SCORE_COLUMNS
    );
    Ok(sqlx::query_as::<_, FinalScore>(&sql)
        .bind(candidate_id)
        .bind(category_id)
        .fetch_optional(pool)
        .await?)
}

/// Final scores of a category joined with candidate identity, best first
pub async fn ranked_final_scores(
    pool: &SqlitePool,
    category_id: i64,
) -> Result<Vec<RankedFinalScore>> {
    Ok(sqlx::query_as::<_, RankedFinalScore>(
        "SELECT fs.candidate_id, c.last_name, c.first_name, c.email, c.project,
                fs.mean, fs.jury_count
         FROM final_scores fs
         JOIN candidates c ON c.id = fs.candidate_id
         WHERE fs.category_id = ?
         ORDER BY fs.mean DESC, c.last_name, c.first_name",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?)
}

// ========================================
// Cascade support
// ========================================

/// (candidate, category) pairs whose aggregates depend on a juror's scores
pub async fn pairs_scored_by_juror(pool: &SqlitePool, juror_id: i64) -> Result<Vec<(i64, i64)>> {
    Ok(sqlx::query_as::<_, (i64, i64)>(
        "SELECT candidate_id, category_id FROM criterion_scores WHERE juror_id = ?1
         UNION
         SELECT candidate_id, category_id FROM jury_scores WHERE juror_id = ?1",
    )
    .bind(juror_id)
    .fetch_all(pool)
    .await?)
}

/// (candidate, category) pairs whose aggregates depend on a criterion
pub async fn pairs_scored_on_criterion(
    pool: &SqlitePool,
    criterion_id: i64,
) -> Result<Vec<(i64, i64)>> {
    Ok(sqlx::query_as::<_, (i64, i64)>(
        "SELECT DISTINCT candidate_id, category_id FROM criterion_scores WHERE criterion_id = ?",
    )
    .bind(criterion_id)
    .fetch_all(pool)
    .await?)
}
