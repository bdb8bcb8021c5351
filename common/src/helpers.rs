use fancy_regex::Regex;
use once_cell::sync::Lazy;

use crate::errors::{ServiceError, ServiceResult};

const CPF_DIGITS: usize = 11;

static TX_ID: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{26,35}$").ok());

/// Strips every non-digit character and checks that exactly 11 digits remain.
pub fn normalize_cpf(cpf: &str) -> ServiceResult<String> {
    let digits: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != CPF_DIGITS {
        return Err(ServiceError::validation("Invalid CPF: expected 11 digits"));
    }
    Ok(digits)
}

/// Returns the trimmed value, or a validation error naming the missing field.
pub fn require_text<'a>(value: Option<&'a str>, field: &str) -> ServiceResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::validation(format!("`{field}` is required"))),
    }
}

/// Accepts a gateway transaction id: 26 to 35 ASCII letters or digits.
pub fn validate_tx_id(tx_id: &str) -> ServiceResult<&str> {
    let valid = match &*TX_ID {
        Some(re) => re.is_match(tx_id).unwrap_or(false),
        None => {
            log::error!("txid regex failed to compile. Rejecting all txids.");
            false
        }
    };
    if !valid {
        return Err(ServiceError::validation("Invalid txid: expected 26 to 35 letters or digits"));
    }
    Ok(tx_id)
}
