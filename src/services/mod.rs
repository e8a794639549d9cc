//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions and fine computation.

pub mod profiler;
pub mod violation_service;
