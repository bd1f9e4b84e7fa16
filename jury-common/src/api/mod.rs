//! Identity primitives shared by the jury services
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Signing secret bootstrap (via sqlx)
//! - Shared types
//!
//! The service wraps these with axum extractors.

pub mod identity;
pub mod password;
pub mod token;

pub use identity::{Identity, Role};
pub use password::{hash_password, verify_password};
pub use token::{load_signing_secret, parse_bearer, AccessToken, Claims, TokenService};
