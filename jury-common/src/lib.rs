//! # Jury Common Library
//!
//! Shared code for the jury scoring services including:
//! - Error taxonomy surfaced at the request boundary
//! - Configuration resolution (CLI → ENV → TOML → defaults)
//! - Database initialization, schema and row models
//! - Identity primitives (roles, password hashing, bearer tokens)
//! - Time helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
