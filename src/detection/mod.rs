//! Red-light violation detection.
//!
//! - `geometry`: stop line and bounding boxes
//! - `tracker`: per-frame tracked vehicles from the external detector
//! - `detector`: motion history and stop-line crossing checks

pub mod detector;
pub mod geometry;
pub mod tracker;
