//! Shared utilities: monotonic clock access and human-readable formatting.

pub mod fast_time;
pub mod time;
