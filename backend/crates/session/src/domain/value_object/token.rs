//! Token values

use platform::crypto::{TokenError, generate_token};

/// Freshly generated access/refresh pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn generate() -> Result<Self, TokenError> {
        Ok(Self {
            access: generate_token()?,
            refresh: generate_token()?,
        })
    }
}

/// Reject empty or whitespace-only tokens before they reach any lookup
pub fn normalize(token: &str) -> Option<&str> {
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
