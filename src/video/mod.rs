//! Frame input, annotation drawing and violation evidence.

pub mod annotate;
pub mod container;
pub mod evidence;
pub mod frames;
pub mod merge;
