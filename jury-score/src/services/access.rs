//! Access policy: who may write which score
//!
//! Stateless checks against the juror↔category membership relation and the closed
//! [`Role`] set. Consulted before any score write and by administrative endpoints.

use jury_common::api::{Identity, Role};
use jury_common::{Error, Result};
use sqlx::SqlitePool;

use crate::db;

#[derive(Clone)]
pub struct AccessPolicy {
    db: SqlitePool,
}

impl AccessPolicy {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// True iff an active juror↔category assignment exists
    pub async fn is_authorized(&self, juror_id: i64, category_id: i64) -> Result<bool> {
        db::membership::juror_in_category(&self.db, category_id, juror_id).await
    }

    /// Check that `identity` may write a score attributed to `juror_id` in `category_id`.
    ///
    /// A juror writes only as itself; an admin may write on a juror's behalf. Either way
    /// the attributed juror must be assigned to the category.
    pub async fn authorize_score_write(
        &self,
        identity: &Identity,
        juror_id: i64,
        category_id: i64,
    ) -> Result<()> {
        if identity.role == Role::Juror && identity.user_id != juror_id {
            return Err(Error::Unauthorized(format!(
                "Juror {} cannot submit scores as juror {}",
                identity.user_id, juror_id
            )));
        }

        if !self.is_authorized(juror_id, category_id).await? {
            return Err(Error::Unauthorized(format!(
                "Juror {} is not assigned to category {}",
                juror_id, category_id
            )));
        }

        Ok(())
    }

    /// Administrative endpoints
    pub fn require_admin(identity: &Identity) -> Result<()> {
        if identity.is_admin() {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "User {} ({}) is not an administrator",
                identity.user_id, identity.role
            )))
        }
    }

    /// A juror may read its own scores; admins may read anyone's
    pub fn require_self_or_admin(identity: &Identity, juror_id: i64) -> Result<()> {
        if identity.is_admin() || identity.user_id == juror_id {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!(
                "User {} cannot read scores of juror {}",
                identity.user_id, juror_id
            )))
        }
    }
}
