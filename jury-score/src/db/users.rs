//! User account queries

use jury_common::api::Role;
use jury_common::db::User;
use jury_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};

use super::map_unique_violation;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";

/// Insert a user whose password is already hashed
pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<User> {
    if find_by_email(pool, email).await?.is_some() {
        return Err(Error::DuplicateEntity(format!("Email already in use: {}", email)));
    }

    let sql = format!(
        "INSERT INTO users (name, email, password_hash, role, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING {}",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(jury_common::time::now())
        .fetch_one(pool)
        .await
        .map_err(|e| map_unique_violation(e, || format!("Email already in use: {}", email)))
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?)
}

/// Like [`get_user`] but a missing row is `NotFound`
pub async fn require_user(pool: &SqlitePool, user_id: i64) -> Result<User> {
    get_user(pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", user_id)))
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

pub async fn list_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
    Ok(sqlx::query_as::<_, User>(&sql).fetch_all(pool).await?)
}

pub async fn count_by_role(pool: &SqlitePool, role: Role) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role)
        .fetch_one(pool)
        .await?)
}

/// Delete a user inside an open transaction; their scores and memberships cascade
pub async fn delete_user(conn: &mut SqliteConnection, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
