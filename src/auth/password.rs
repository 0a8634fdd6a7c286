use crate::error::{AppResult, FormErrors};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plaintext: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Constant-time check via bcrypt. A malformed stored hash never matches.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Strength rules for a new password, keyed under `field`.
pub fn check_strength(password: &str, field: &str, errors: &mut FormErrors) {
    let mut push = |msg: &str| {
        errors
            .entry(field.to_string())
            .or_default()
            .push(msg.to_string());
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        push("This password is too short. It must contain at least 8 characters.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        push("This password is entirely numeric.");
    }
}

/// Validate a new password and its confirmation.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
    field: &str,
    confirm_field: &str,
) -> FormErrors {
    let mut errors = FormErrors::new();
    if password != confirmation {
        errors
            .entry(confirm_field.to_string())
            .or_default()
            .push("The two password fields didn't match.".to_string());
    }
    check_strength(password, field, &mut errors);
    errors
}
