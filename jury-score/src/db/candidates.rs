//! Candidate queries

use jury_common::db::Candidate;
use jury_common::{Error, Result};
use sqlx::SqlitePool;

use super::map_unique_violation;

const CANDIDATE_COLUMNS: &str = "id, last_name, first_name, email, project, company, created_at";

/// Fields supplied when registering a candidate
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub project: Option<String>,
    pub company: Option<String>,
}

pub async fn create_candidate(pool: &SqlitePool, candidate: &NewCandidate) -> Result<Candidate> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM candidates WHERE email = ?")
        .bind(&candidate.email)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(Error::DuplicateEntity(format!(
            "Candidate email already registered: {}",
            candidate.email
        )));
    }

    let sql = format!(
        "INSERT INTO candidates (last_name, first_name, email, project, company, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {}",
        CANDIDATE_COLUMNS
    );
    sqlx::query_as::<_, Candidate>(&sql)
        .bind(&candidate.last_name)
        .bind(&candidate.first_name)
        .bind(&candidate.email)
        .bind(&candidate.project)
        .bind(&candidate.company)
        .bind(jury_common::time::now())
        .fetch_one(pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                format!("Candidate email already registered: {}", candidate.email)
            })
        })
}

pub async fn get_candidate(pool: &SqlitePool, candidate_id: i64) -> Result<Option<Candidate>> {
    let sql = format!("SELECT {} FROM candidates WHERE id = ?", CANDIDATE_COLUMNS);
    Ok(sqlx::query_as::<_, Candidate>(&sql)
        .bind(candidate_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn require_candidate(pool: &SqlitePool, candidate_id: i64) -> Result<Candidate> {
    get_candidate(pool, candidate_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Candidate {} not found", candidate_id)))
}

pub async fn list_candidates(pool: &SqlitePool) -> Result<Vec<Candidate>> {
    let sql = format!("SELECT {} FROM candidates ORDER BY id", CANDIDATE_COLUMNS);
    Ok(sqlx::query_as::<_, Candidate>(&sql).fetch_all(pool).await?)
}

/// Delete a candidate. Criterion scores, jury totals, final scores and memberships
/// cascade with it, so no aggregate is left pointing at a missing candidate.
pub async fn delete_candidate(pool: &SqlitePool, candidate_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM candidates WHERE id = ?")
        .bind(candidate_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Candidate {} not found", candidate_id)));
    }
    Ok(())
}
