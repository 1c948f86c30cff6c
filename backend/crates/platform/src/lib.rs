//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (secure random tokens, SHA-256, constant-time compare)
//! - An injectable clock so expiry logic can be driven deterministically
//! - Rate limiting infrastructure (keyed token buckets)

pub mod clock;
pub mod crypto;
pub mod rate_limit;
