//! # Authentication
//!
//! Password hashing (Argon2id) and HS256 session tokens.
//!
//! ## Token Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  login(email, password)                                                 │
//! │       │                                                                 │
//! │       ├── unknown email / wrong password ──► AuthError::InvalidCredentials│
//! │       │                                                                 │
//! │       ├── mfa_enabled ──► pending token   { userId, mfa_step, iat, exp }│
//! │       │                   (5 minutes, no session)                       │
//! │       │                                                                 │
//! │       └── otherwise   ──► session token   { userId, name, nationalId,   │
//! │                           (24 hours)        iat, exp }                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use botica_core::Seller;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_LIFETIME_HOURS: i64 = 24;
pub const MFA_PENDING_LIFETIME_MINUTES: i64 = 5;
pub const MFA_STEP_PENDING: &str = "pending";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Same message for an unknown email and a wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Current password is incorrect")]
    WrongCurrentPassword,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token signing failed: {0}")]
    Signing(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

// =============================================================================
// Passwords
// =============================================================================

pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Constant-time check. A stored hash that does not parse never verifies.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    pub name: String,
    pub national_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issued instead of a session while the second factor is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaPendingClaims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub mfa_step: String,
    pub iat: i64,
    pub exp: i64,
}

/// What a successful password check yields.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LoginOutcome {
    #[serde(rename_all = "camelCase")]
    Authenticated { token: String, seller: botica_core::SellerSummary },
    #[serde(rename_all = "camelCase")]
    MfaRequired { pending_token: String },
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenService { .. }")
    }
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_session(&self, seller: &Seller) -> AuthResult<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: seller.id,
            name: seller.full_name(),
            national_id: seller.national_id.clone(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| AuthError::Signing(e.to_string()))
    }

    pub fn issue_mfa_pending(&self, seller: &Seller) -> AuthResult<String> {
        let now = Utc::now();
        let claims = MfaPendingClaims {
            user_id: seller.id,
            mfa_step: MFA_STEP_PENDING.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(MFA_PENDING_LIFETIME_MINUTES)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Decodes a session token and checks its expiry. Pending MFA tokens
    /// are rejected.
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn validate_mfa_pending(&self, token: &str) -> AuthResult<MfaPendingClaims> {
        let claims = decode::<MfaPendingClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if claims.mfa_step != MFA_STEP_PENDING {
            return Err(AuthError::InvalidToken("not a pending MFA token".to_string()));
        }
        Ok(claims)
    }
}
