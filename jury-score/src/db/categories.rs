//! Category and criterion queries

use jury_common::db::{Category, Criterion};
use jury_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

use super::map_unique_violation;

pub async fn create_category(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
) -> Result<Category> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    if exists.is_some() {
        return Err(Error::DuplicateEntity(format!("Category already exists: {}", name)));
    }

    sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name, description) VALUES (?, ?)
         RETURNING id, name, description",
    )
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique_violation(e, || format!("Category already exists: {}", name)))
}

pub async fn get_category(pool: &SqlitePool, category_id: i64) -> Result<Option<Category>> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories WHERE id = ?",
    )
    .bind(category_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn require_category(pool: &SqlitePool, category_id: i64) -> Result<Category> {
    get_category(pool, category_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category {} not found", category_id)))
}

pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await?)
}

// ========================================
// Criteria
// ========================================

pub async fn create_criterion(
    pool: &SqlitePool,
    category_id: i64,
    name: &str,
    max_value: i64,
) -> Result<Criterion> {
    if max_value <= 0 {
        return Err(Error::InvalidInput(format!(
            "Criterion maximum must be positive (got {})",
            max_value
        )));
    }
    require_category(pool, category_id).await?;

    Ok(sqlx::query_as::<_, Criterion>(
        "INSERT INTO criteria (category_id, name, max_value) VALUES (?, ?, ?)
         RETURNING id, category_id, name, max_value",
    )
    .bind(category_id)
    .bind(name)
    .bind(max_value)
    .fetch_one(pool)
    .await?)
}

pub async fn get_criterion(pool: &SqlitePool, criterion_id: i64) -> Result<Option<Criterion>> {
    Ok(sqlx::query_as::<_, Criterion>(
        "SELECT id, category_id, name, max_value FROM criteria WHERE id = ?",
    )
    .bind(criterion_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn criteria_by_category(pool: &SqlitePool, category_id: i64) -> Result<Vec<Criterion>> {
    Ok(sqlx::query_as::<_, Criterion>(
        "SELECT id, category_id, name, max_value FROM criteria
         WHERE category_id = ? ORDER BY id",
    )
    .bind(category_id)
    .fetch_all(pool)
    .await?)
}

/// Remove a criterion inside an open transaction; its criterion scores cascade
pub async fn delete_criterion(conn: &mut SqliteConnection, criterion_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM criteria WHERE id = ?")
        .bind(criterion_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Criterion {} not found", criterion_id)));
    }
    Ok(())
}
