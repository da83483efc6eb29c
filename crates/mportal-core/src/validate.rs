//! Input normalization shared by the API, the CLI and the sync engine.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::CoreError;

pub const MAX_SKU_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Canonical SKU form: trimmed, internal whitespace runs collapsed to `-`,
/// uppercased. Every SKU comparison goes through this function.
///
/// # Errors
///
/// Returns [`CoreError::InvalidSku`] for empty or over-long values.
pub fn normalize_sku(raw: &str) -> Result<String, CoreError> {
    let normalized = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_uppercase();

    if normalized.is_empty() {
        return Err(CoreError::InvalidSku {
            value: raw.to_owned(),
            reason: "sku is empty",
        });
    }
    if normalized.chars().count() > MAX_SKU_LEN {
        return Err(CoreError::InvalidSku {
            value: raw.to_owned(),
            reason: "sku exceeds 64 characters",
        });
    }
    Ok(normalized)
}

/// # Errors
///
/// Returns [`CoreError::InvalidEmail`] unless the value has exactly one `@`
/// with non-empty parts on both sides.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    let mut parts = email.split('@');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        _ => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(CoreError::InvalidEmail(raw.to_owned()))
    }
}

/// # Errors
///
/// Returns [`CoreError::WeakPassword`] for passwords shorter than 8 characters.
pub fn validate_password(raw: &str) -> Result<(), CoreError> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Parse a channel price string such as `"12.99"`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidAmount`] for unparseable or negative values.
pub fn parse_money(raw: &str) -> Result<Decimal, CoreError> {
    let value = Decimal::from_str(raw.trim()).map_err(|e| CoreError::InvalidAmount {
        value: raw.to_owned(),
        reason: e.to_string(),
    })?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(CoreError::InvalidAmount {
            value: raw.to_owned(),
            reason: "amount is negative".to_string(),
        });
    }
    Ok(value)
}
