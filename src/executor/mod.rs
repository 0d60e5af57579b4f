//! Request execution boundary
//!
//! The sequencer decides *when* to attempt a request; a [`RequestExecutor`]
//! does the attempt. Transport details (connections, TLS, protocol framing)
//! live entirely behind this trait.
//!
//! # Contract
//!
//! - [`RequestExecutor::try_start_request`] returns `false` immediately when
//!   the executor is at its outstanding-request ceiling or has no way to run
//!   a request. The callback is then dropped without being invoked.
//! - When it returns `true`, the callback is invoked exactly once, from any
//!   thread, with the [`CompletionRecord`] of that request. The callback is
//!   an `FnOnce`, so double invocation is ruled out by the type system.
//! - [`RequestExecutor::terminate`] asks the executor to finish and release
//!   its resources. The sequencer calls it once, after drain.
//!
//! # Implementations
//!
//! - [`mock::MockExecutor`]: scripted, in-process test double
//! - [`simulated::SimulatedExecutor`]: background-thread target with sampled latency

pub mod mock;
pub mod simulated;

pub use mock::MockExecutor;
pub use simulated::SimulatedExecutor;

use std::time::Duration;

/// Outcome of one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRecord {
    /// Whether the request succeeded
    pub success: bool,
    /// Latency measured by the executor, when latency measurement is on
    pub latency: Option<Duration>,
}

impl CompletionRecord {
    pub fn new(success: bool, latency: Option<Duration>) -> Self {
        Self { success, latency }
    }

    pub fn success(latency: Option<Duration>) -> Self {
        Self::new(true, latency)
    }

    pub fn failure(latency: Option<Duration>) -> Self {
        Self::new(false, latency)
    }
}

/// Single-use completion callback handed to the executor
pub type CompletionCallback = Box<dyn FnOnce(CompletionRecord) + Send + 'static>;

/// Capability to start requests against a target
pub trait RequestExecutor: Send {
    /// Start one request, or return `false` without side effects
    fn try_start_request(&mut self, on_complete: CompletionCallback) -> bool;

    /// Drain and release resources
    fn terminate(&mut self);

    /// Toggle per-request latency sampling
    fn set_measure_latencies(&mut self, measure: bool);

    /// Whether latencies are currently sampled
    fn measure_latencies(&self) -> bool;
}

impl<T: RequestExecutor + ?Sized> RequestExecutor for Box<T> {
    fn try_start_request(&mut self, on_complete: CompletionCallback) -> bool {
        (**self).try_start_request(on_complete)
    }

    fn terminate(&mut self) {
        (**self).terminate()
    }

    fn set_measure_latencies(&mut self, measure: bool) {
        (**self).set_measure_latencies(measure)
    }

    fn measure_latencies(&self) -> bool {
        (**self).measure_latencies()
    }
}
