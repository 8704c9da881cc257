use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::utils::error::{AppError, Result};

fn account_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // MT4/MT5 logins
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4,20}$").expect("account pattern is valid"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

pub fn normalize_account_number(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if !account_pattern().is_match(trimmed) {
        return Err(AppError::validation(
            "account_number",
            "must be 4 to 20 digits",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if !email_pattern().is_match(&email) {
        return Err(AppError::validation("email", "is not a valid address"));
    }
    Ok(email)
}

pub fn referral_code_for(id: Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

pub fn normalize_referral_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
