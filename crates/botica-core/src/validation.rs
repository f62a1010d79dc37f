//! # Validation Module
//!
//! Field validators shared by the facade payloads and the CSV mappers.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Layer 1: this module                                                  │
//! │  ├── required fields, signs, email shape                               │
//! │  └── runs before any transaction opens                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: store (SQLite / remote)                                      │
//! │  ├── UNIQUE (code, national_id, email, id_number, name)                │
//! │  └── FOREIGN KEY (seller, client, product, supplier)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Rejects empty or whitespace-only text.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Minimal email shape check: one `@`, non-empty local part, a dot in the
/// domain, no whitespace.
///
/// ## Example
/// ```rust
/// use botica_core::validation::validate_email;
///
/// assert!(validate_email("ana@botica.co").is_ok());
/// assert!(validate_email("ana@botica").is_err());
/// assert!(validate_email("").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_required("email", email)?;

    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    let (local, domain) = email.split_once('@').ok_or_else(|| invalid("missing @"))?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid("malformed address"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("malformed domain"));
    }
    Ok(())
}

/// Parses a whole-number stock cell. Must be >= 0.
pub fn parse_stock(field: &str, raw: &str) -> ValidationResult<i64> {
    let text = raw.trim();
    validate_required(field, text)?;
    let value: i64 = text.parse().map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "not a whole number".to_string(),
    })?;
    validate_non_negative(field, value)?;
    Ok(value)
}

/// Trims and lowercases an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
