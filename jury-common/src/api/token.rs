//! Bearer token issuance and validation
//!
//! Tokens are HS256 JWTs carrying the user id and role. The signing secret lives in the
//! settings table under `token_signing_secret` and is generated on first use.
//!
//! # Pure Functions
//!
//! Apart from secret bootstrap this module has no database or HTTP dependencies; the
//! service wraps it in an axum extractor.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::api::identity::{Identity, Role};
use crate::db::models::User;
use crate::{Error, Result};

/// Settings key holding the signing secret
pub const SIGNING_SECRET_KEY: &str = "token_signing_secret";

/// JWT claims. Shape follows the original login payload (`user_id`, `role`, `nom`, `email`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per RFC 7519
    pub sub: String,
    pub role: Role,
    pub nom: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Login response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
}

/// Issues and validates bearer tokens with one signing secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_minutes,
        }
    }

    /// Issue a token for an authenticated user
    pub fn issue(&self, user: &User) -> Result<AccessToken> {
        let iat = crate::time::unix_seconds();
        let exp = self
            .ttl_minutes
            .checked_mul(60)
            .and_then(|ttl_seconds| iat.checked_add(ttl_seconds))
            .ok_or_else(|| {
                Error::Config(format!(
                    "Token lifetime of {} minutes is out of range",
                    self.ttl_minutes
                ))
            })?;
        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            nom: user.name.clone(),
            email: user.email.clone(),
            iat,
            exp,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Token encoding failed: {}", e)))?;

        Ok(AccessToken {
            access_token: token,
            token_type: "bearer".to_string(),
        })
    }

    /// Validate signature and expiry, returning the caller identity
    pub fn verify(&self, token: &str) -> Result<Identity> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| Error::Unauthenticated(format!("Token validation failed: {}", e)))?;

        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .map_err(|_| Error::Unauthenticated("Token subject is not a user id".to_string()))?;

        Ok(Identity::new(user_id, data.claims.role))
    }
}

// ========================================
// Signing Secret Management
// ========================================

/// Load the signing secret from the settings table, generating it if absent
pub async fn load_signing_secret(db: &SqlitePool) -> Result<String> {
    let existing: Option<(Option<String>,)> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(SIGNING_SECRET_KEY)
            .fetch_optional(db)
            .await?;

    match existing {
        Some((Some(value),)) if !value.is_empty() => Ok(value),
        _ => initialize_signing_secret(db).await,
    }
}

/// Generate and store a random 256-bit signing secret (hex encoded)
pub async fn initialize_signing_secret(db: &SqlitePool) -> Result<String> {
    use rand::Rng;

    let bytes: [u8; 32] = rand::thread_rng().gen();
    let secret: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();

    // INSERT OR IGNORE keeps the first secret if two services race on bootstrap
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(SIGNING_SECRET_KEY)
        .bind(&secret)
        .execute(db)
        .await?;

    let stored: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(SIGNING_SECRET_KEY)
        .fetch_one(db)
        .await?;

    info!("Generated token signing secret");
    Ok(stored)
}

/// Extract the token from an `Authorization` header value
pub fn parse_bearer(header_value: &str) -> Result<&str> {
    header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::Unauthenticated("Invalid Authorization header format".to_string()))
}
