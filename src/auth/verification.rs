use std::sync::LazyLock;
use std::time::Duration;

use rand::Rng;
use regex::Regex;

use crate::auth::cache::CacheStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationError {
    /// No live code for this email.
    Expired,
    /// A code exists but the submitted value differs.
    Mismatch,
}

impl VerificationError {
    pub fn message(&self) -> &'static str {
        match self {
            VerificationError::Expired => "verification code expired, request a new one",
            VerificationError::Mismatch => "verification code is incorrect",
        }
    }
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("Invalid email regex")
});

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_REGEX.is_match(email)
}

fn code_key(email: &str) -> String {
    format!("email_verification_{}", email.to_lowercase())
}

fn verified_key(email: &str) -> String {
    format!("email_verified_{}", email.to_lowercase())
}

/// Six random decimal digits, zero padded.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Store a fresh code for `email`, replacing any previous one.
pub fn issue_code(cache: &dyn CacheStore, email: &str, ttl: Duration) -> String {
    let code = generate_code();
    cache.put(&code_key(email), code.clone(), ttl);
    code
}

/// Compare `code` against the stored one. On success the code is consumed
/// and a verified marker for the email is stored with the same TTL.
pub fn check_code(
    cache: &dyn CacheStore,
    email: &str,
    code: &str,
    ttl: Duration,
) -> Result<(), VerificationError> {
    let key = code_key(email);
    let stored = cache.get(&key).ok_or(VerificationError::Expired)?;
    if stored != code.trim() {
        return Err(VerificationError::Mismatch);
    }
    cache.delete(&key);
    cache.put(&verified_key(email), "1".to_string(), ttl);
    Ok(())
}

/// Take the verified marker left by [`check_code`]. Returns false if absent.
pub fn consume_verified(cache: &dyn CacheStore, email: &str) -> bool {
    cache.delete(&verified_key(email))
}
