//! Category membership: candidate↔category and juror↔category
//!
//! Unassigning a juror only removes the link. Their criterion scores and jury totals are
//! kept, and those jury totals keep counting toward the category's final scores; the juror
//! simply cannot submit further scores there (the access policy no longer authorizes it).

use jury_common::api::Role;
use jury_common::db::{Candidate, Category, User};
use jury_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::db;

#[derive(Clone)]
pub struct CategoryMembership {
    db: SqlitePool,
}

impl CategoryMembership {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn assign_candidate(&self, category_id: i64, candidate_id: i64) -> Result<()> {
        db::categories::require_category(&self.db, category_id).await?;
        db::candidates::require_candidate(&self.db, candidate_id).await?;

        if !db::membership::insert_candidate_link(&self.db, category_id, candidate_id).await? {
            return Err(Error::DuplicateEntity(format!(
                "Candidate {} is already registered in category {}",
                candidate_id, category_id
            )));
        }

        info!(category_id, candidate_id, "Candidate assigned to category");
        Ok(())
    }

    pub async fn unassign_candidate(&self, category_id: i64, candidate_id: i64) -> Result<()> {
        if !db::membership::delete_candidate_link(&self.db, category_id, candidate_id).await? {
            return Err(Error::NotFound(format!(
                "Candidate {} is not registered in category {}",
                candidate_id, category_id
            )));
        }

        info!(category_id, candidate_id, "Candidate removed from category");
        Ok(())
    }

    /// Only users with the juror role can be assigned
    pub async fn assign_juror(&self, category_id: i64, juror_id: i64) -> Result<()> {
        let user = db::users::require_user(&self.db, juror_id).await?;
        if user.role != Role::Juror {
            return Err(Error::InvalidInput(format!(
                "User {} is not a juror (role '{}')",
                juror_id, user.role
            )));
        }
        db::categories::require_category(&self.db, category_id).await?;

        if !db::membership::insert_juror_link(&self.db, category_id, juror_id).await? {
            return Err(Error::DuplicateEntity(format!(
                "Juror {} is already assigned to category {}",
                juror_id, category_id
            )));
        }

        info!(category_id, juror_id, "Juror assigned to category");
        Ok(())
    }

    /// Remove the assignment. Prior scores are preserved (see module docs).
    pub async fn unassign_juror(&self, category_id: i64, juror_id: i64) -> Result<()> {
        if !db::membership::delete_juror_link(&self.db, category_id, juror_id).await? {
            return Err(Error::NotFound(format!(
                "Juror {} is not assigned to category {}",
                juror_id, category_id
            )));
        }

        info!(category_id, juror_id, "Juror removed from category");
        Ok(())
    }

    pub async fn candidates_in_category(&self, category_id: i64) -> Result<Vec<Candidate>> {
        db::categories::require_category(&self.db, category_id).await?;
        db::membership::candidates_in_category(&self.db, category_id).await
    }

    pub async fn jurors_in_category(&self, category_id: i64) -> Result<Vec<User>> {
        db::categories::require_category(&self.db, category_id).await?;
        db::membership::jurors_in_category(&self.db, category_id).await
    }

    pub async fn categories_for_juror(&self, juror_id: i64) -> Result<Vec<Category>> {
        db::users::require_user(&self.db, juror_id).await?;
        db::membership::categories_for_juror(&self.db, juror_id).await
    }

    pub async fn categories_for_candidate(&self, candidate_id: i64) -> Result<Vec<Category>> {
        db::candidates::require_candidate(&self.db, candidate_id).await?;
        db::membership::categories_for_candidate(&self.db, candidate_id).await
    }
}
