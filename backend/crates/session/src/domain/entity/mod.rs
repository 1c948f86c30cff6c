//! Entity Module

pub mod admin_session;
pub mod session;
