//! Incremental loading
//!
//! An incremental endpoint sends its starting watermark as a query
//! parameter and tracks the highest cursor value among the records it
//! loads. The tracker never touches persisted state; the engine commits
//! [`WatermarkTracker::finish`] only after the endpoint completed.

mod cursor;
mod tracker;

pub use cursor::CursorValue;
pub use tracker::{Admission, IncrementalRule, TrackerStats, WatermarkTracker};

#[cfg(test)]
mod tests;
