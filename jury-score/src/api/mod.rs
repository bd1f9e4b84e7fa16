//! HTTP API handlers for jury-score

pub mod auth;
pub mod candidates;
pub mod categories;
pub mod criteria;
pub mod extract;
pub mod health;
pub mod scores;
pub mod users;

pub use auth::AuthUser;
pub use extract::{JsonBody, PathParams, QueryParams};
pub use health::{get_build_info, health_check};
