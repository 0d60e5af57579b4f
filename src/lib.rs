//! ReqPulse - Request pacing and termination engine
//!
//! ReqPulse drives a request executor at a controlled rate, tracks in-flight
//! work, and stops on configurable success or failure conditions.
//!
//! # Architecture
//!
//! - **Rate limiters**: linear, bursting and distribution-jittered pacing
//! - **Samplers**: uniform, exponential and gaussian discrete distributions
//! - **Termination predicates**: duration, counter thresholds, failure ratio
//! - **Sequencer**: the paced loop, open or closed, with drain and cancel
//! - **Workers and coordinator**: one sequencer per thread, merged statistics
//! - **Platform seams**: injectable clock and scheduler for deterministic tests

pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod output;
pub mod platform;
pub mod rate_limiter;
pub mod sampler;
pub mod sequencer;
pub mod stats;
pub mod termination;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::RunConfig;
pub use coordinator::{Coordinator, RunReport};
pub use error::SequencerError;
pub use executor::{CompletionRecord, RequestExecutor};
pub use rate_limiter::RateLimiter;
pub use sequencer::{Sequencer, SequencerOptions, TerminationReason};
pub use worker::Worker;

/// Result type used throughout ReqPulse
pub type Result<T> = anyhow::Result<T>;
