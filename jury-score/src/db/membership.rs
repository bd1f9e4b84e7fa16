//! Category membership link tables (candidate↔category, juror↔category)

use jury_common::db::{Candidate, Category, User};
use jury_common::Result;
use sqlx::{SqliteExecutor, SqlitePool};

/// Insert a link; returns `false` when it already existed
pub async fn insert_candidate_link(
    pool: &SqlitePool,
    category_id: i64,
    candidate_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO category_candidates (candidate_id, category_id, assigned_at)
         VALUES (?, ?, ?)",
    )
    .bind(candidate_id)
    .bind(category_id)
    .bind(jury_common::time::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Delete a link; returns `false` when there was none
pub async fn delete_candidate_link(
    pool: &SqlitePool,
    category_id: i64,
    candidate_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "DELETE FROM category_candidates WHERE candidate_id = ? AND category_id = ?",
    )
    .bind(candidate_id)
    .bind(category_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Takes any executor so the check can run inside a scoring transaction
pub async fn candidate_in_category<'e, E>(
    executor: E,
    category_id: i64,
    candidate_id: i64,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM category_candidates WHERE candidate_id = ? AND category_id = ?",
    )
    .bind(candidate_id)
    .bind(category_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

pub async fn insert_juror_link(pool: &SqlitePool, category_id: i64, juror_id: i64) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO category_jurors (juror_id, category_id, assigned_at)
         VALUES (?, ?, ?)",
    )
    .bind(juror_id)
    .bind(category_id)
    .bind(jury_common::time::now())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_juror_link(pool: &SqlitePool, category_id: i64, juror_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM category_jurors WHERE juror_id = ? AND category_id = ?")
        .bind(juror_id)
        .bind(category_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn juror_in_category<'e, E>(executor: E, category_id: i64, juror_id: i64) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM category_jurors WHERE juror_id = ? AND category_id = ?",
    )
    .bind(juror_id)
    .bind(category_id)
    .fetch_optional(executor)
    .await?;
    Ok(found.is_some())
}

pub async fn candidates_in_category(pool: &SqlitePool, category_id: i64) -> Result<Vec<Candidate>> {
    Ok(sqlx::query_as::<_, Candidate>(
        "SELECT c.id, c.last_name, c.first_name, c.email, c.project, c.company, c.created_at
         FROM category_candidates cc
         JOIN candidates c ON c.id = cc.candidate_id
         WHERE cc.category_id = ?
         ORDER BY c.id",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?)
}

pub async fn jurors_in_category(pool: &SqlitePool, category_id: i64) -> Result<Vec<User>> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT u.id, u.name, u.email, u.password_hash, u.role, u.created_at
         FROM category_jurors cj
         JOIN users u ON u.id = cj.juror_id
         WHERE cj.category_id = ?
         ORDER BY u.id",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?)
}

pub async fn categories_for_juror(pool: &SqlitePool, juror_id: i64) -> Result<Vec<Category>> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, c.description
         FROM category_jurors cj
         JOIN categories c ON c.id = cj.category_id
         WHERE cj.juror_id = ?
         ORDER BY c.id",
    )
    .bind(juror_id)
    .fetch_all(pool)
    .await?)
}

pub async fn categories_for_candidate(
    pool: &SqlitePool,
    candidate_id: i64,
) -> Result<Vec<Category>> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT c.id, c.name, c.description
         FROM category_candidates cc
         JOIN categories c ON c.id = cc.category_id
         WHERE cc.candidate_id = ?
         ORDER BY c.id",
    )
    .bind(candidate_id)
    .fetch_all(pool)
    .await?)
}
