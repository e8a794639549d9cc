//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Verify request signatures
//! - Short-circuit requests (reject unsigned reports)

/// HMAC signature verification for violation reports
pub mod signature;
