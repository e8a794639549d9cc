//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies built from them.

/// Dashboard statistics and offender pages
pub mod dashboard;
/// Per-plate driver profile
pub mod driver_profile;
/// Red-light violation records
pub mod violation;
