//! Value Object Module

pub mod expiry_policy;
pub mod token;
