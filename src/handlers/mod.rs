//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, query string)
//! 2. Calls into the services layer
//! 3. Returns HTTP response (JSON, status code)

/// Dashboard statistics and offender listing
pub mod dashboard;
/// Service health check
pub mod health;
/// Violation reporting and lookup
pub mod violations;
