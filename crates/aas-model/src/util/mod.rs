//! Utility modules.

pub mod duration;

pub use duration::{DurationParseError, XsdDuration};
