//! Database models
//!
//! Rust field names are English; serialized names keep the wire format the evaluation
//! frontend already speaks (`candidat_id`, `note_totale`, ...).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::identity::Role;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    #[serde(rename = "nom")]
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(rename = "date_creation")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Candidate {
    pub id: i64,
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    pub email: String,
    #[serde(rename = "projet")]
    pub project: Option<String>,
    #[serde(rename = "entreprise")]
    pub company: Option<String>,
    #[serde(rename = "date_creation")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    #[serde(rename = "nom")]
    pub name: String,
    pub description: Option<String>,
}

/// Scoring dimension of a category; notes are bounded by `[0, max_value]`
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Criterion {
    pub id: i64,
    #[serde(rename = "categorie_id")]
    pub category_id: i64,
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "valeur_max")]
    pub max_value: i64,
}

impl Criterion {
    /// True when `note` is a finite number within `[0, max_value]`
    pub fn accepts(&self, note: f64) -> bool {
        note.is_finite() && note >= 0.0 && note <= self.max_value as f64
    }
}

/// One juror's note for one criterion of one candidate.
/// Unique per (candidate, juror, criterion).
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CriterionScore {
    pub id: i64,
    #[serde(rename = "candidat_id")]
    pub candidate_id: i64,
    #[serde(rename = "jury_id")]
    pub juror_id: i64,
    #[serde(rename = "categorie_id")]
    pub category_id: i64,
    #[serde(rename = "critere_id")]
    pub criterion_id: i64,
    pub note: f64,
    #[serde(rename = "commentaire")]
    pub comment: Option<String>,
    #[serde(rename = "date_creation")]
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived: sum of a juror's criterion scores for one candidate in one category
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct JuryTotal {
    pub id: i64,
    #[serde(rename = "candidat_id")]
    pub candidate_id: i64,
    #[serde(rename = "jury_id")]
    pub juror_id: i64,
    #[serde(rename = "categorie_id")]
    pub category_id: i64,
    #[serde(rename = "note_totale")]
    pub total: f64,
    pub updated_at: DateTime<Utc>,
}

/// Derived: mean of all jury totals for one candidate in one category
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct FinalScore {
    pub id: i64,
    #[serde(rename = "candidat_id")]
    pub candidate_id: i64,
    #[serde(rename = "categorie_id")]
    pub category_id: i64,
    #[serde(rename = "note_finale")]
    pub mean: f64,
    #[serde(rename = "nb_jury")]
    pub jury_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Final score joined with the candidate it belongs to (ranking view)
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RankedFinalScore {
    #[serde(rename = "candidat_id")]
    pub candidate_id: i64,
    #[serde(rename = "nom_candidat")]
    pub last_name: String,
    #[serde(rename = "prenom_candidat")]
    pub first_name: String,
    pub email: String,
    #[serde(rename = "projet")]
    pub project: Option<String>,
    #[serde(rename = "note_finale")]
    pub mean: f64,
    #[serde(rename = "nb_jury")]
    pub jury_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(max_value: i64) -> Criterion {
        Criterion {
            id: 1,
            category_id: 1,
            name: "Innovation".to_string(),
            max_value,
        }
    }

    #[test]
    fn test_criterion_bounds_are_inclusive() {
        let c = criterion(10);
        assert!(c.accepts(0.0));
        assert!(c.accepts(10.0));
        assert!(c.accepts(7.5));
        assert!(!c.accepts(10.01));
        assert!(!c.accepts(-0.5));
    }

    #[test]
    fn test_criterion_rejects_non_finite_notes() {
        let c = criterion(10);
        assert!(!c.accepts(f64::NAN));
        assert!(!c.accepts(f64::INFINITY));
    }

    #[test]
    fn test_wire_names_match_frontend() {
        let total = JuryTotal {
            id: 3,
            candidate_id: 1,
            juror_id: 2,
            category_id: 4,
            total: 8.0,
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&total).unwrap();
        assert_eq!(json["candidat_id"], 1);
        assert_eq!(json["jury_id"], 2);
        assert_eq!(json["categorie_id"], 4);
        assert_eq!(json["note_totale"], 8.0);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Juror,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "jury");
    }
}
