//! Mock request executor for testing
//!
//! Runs no I/O at all. Tests script which starts are accepted and what each
//! completion reports, then inspect what the sequencer did.
//!
//! # Features
//!
//! - Accept everything, reject everything, or reject above an outstanding ceiling
//! - Immediate completion (callback runs inside `try_start_request`) or
//!   deferred completion driven by the test
//! - Scripted success/failure sequence with a default for the rest
//! - Counters for attempts, accepted starts and `terminate` calls
//!
//! The mock is `Clone`; clones share state, so a test can keep a handle
//! after moving the executor into a sequencer.
//!
//! # Example
//!
//! ```
//! use reqpulse::executor::{MockExecutor, RequestExecutor};
//!
//! let mock = MockExecutor::new();
//! mock.push_outcomes([true, false]);
//!
//! let mut executor = mock.clone();
//! assert!(executor.try_start_request(Box::new(|record| assert!(record.success))));
//! assert!(executor.try_start_request(Box::new(|record| assert!(!record.success))));
//! assert_eq!(mock.accepted(), 2);
//! ```

use super::{CompletionCallback, CompletionRecord, RequestExecutor};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Scriptable in-process executor
#[derive(Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    accepting: bool,
    capacity: Option<usize>,
    deferred: bool,
    outcomes: VecDeque<bool>,
    default_success: bool,
    latency: Option<Duration>,
    measure_latencies: bool,
    pending: VecDeque<CompletionCallback>,
    attempts: u64,
    accepted: u64,
    terminate_calls: u64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            accepting: true,
            capacity: None,
            deferred: false,
            outcomes: VecDeque::new(),
            default_success: true,
            latency: None,
            measure_latencies: false,
            pending: VecDeque::new(),
            attempts: 0,
            accepted: 0,
            terminate_calls: 0,
        }
    }
}

impl MockState {
    fn next_record(&mut self) -> CompletionRecord {
        let success = self.outcomes.pop_front().unwrap_or(self.default_success);
        let latency = if self.measure_latencies { self.latency } else { None };
        CompletionRecord::new(success, latency)
    }
}

impl MockExecutor {
    /// Accept every start and complete it immediately with success
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Executor that refuses every start, as if permanently at capacity
    pub fn always_at_capacity() -> Self {
        let mock = Self::new();
        mock.set_accepting(false);
        mock
    }

    /// Accept or refuse all further starts
    pub fn set_accepting(&self, accepting: bool) {
        self.lock().accepting = accepting;
    }

    /// Refuse starts while this many deferred completions are pending
    pub fn set_capacity(&self, capacity: Option<usize>) {
        self.lock().capacity = capacity;
    }

    /// Hold callbacks until the test completes them
    pub fn set_deferred(&self, deferred: bool) {
        self.lock().deferred = deferred;
    }

    /// Queue outcomes for the next completions, in order
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.lock().outcomes.extend(outcomes);
    }

    /// Outcome used once scripted outcomes run out
    pub fn set_default_success(&self, success: bool) {
        self.lock().default_success = success;
    }

    /// Latency reported when latency measurement is enabled
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Complete the oldest deferred request; returns false if none is pending
    pub fn complete_next(&self) -> bool {
        let next = {
            let mut state = self.lock();
            state.pending.pop_front().map(|callback| (callback, state.next_record()))
        };

        match next {
            Some((callback, record)) => {
                callback(record);
                true
            }
            None => false,
        }
    }

    /// Complete every deferred request; returns how many were completed
    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    /// Deferred completions not yet delivered
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Calls to `try_start_request`, accepted or not
    pub fn attempts(&self) -> u64 {
        self.lock().attempts
    }

    /// Starts that were accepted
    pub fn accepted(&self) -> u64 {
        self.lock().accepted
    }

    /// Calls to `terminate`
    pub fn terminate_calls(&self) -> u64 {
        self.lock().terminate_calls
    }
}

impl RequestExecutor for MockExecutor {
    fn try_start_request(&mut self, on_complete: CompletionCallback) -> bool {
        let immediate = {
            let mut state = self.lock();
            state.attempts += 1;

            let at_capacity = state.capacity.is_some_and(|cap| state.pending.len() >= cap);
            if !state.accepting || at_capacity {
                return false;
            }
            state.accepted += 1;

            if state.deferred {
                state.pending.push_back(on_complete);
                None
            } else {
                Some((on_complete, state.next_record()))
            }
        };

        // Invoke outside the lock so the callback may call back into the mock
        if let Some((callback, record)) = immediate {
            callback(record);
        }
        true
    }

    fn terminate(&mut self) {
        let abandoned: Vec<CompletionCallback> = {
            let mut state = self.lock();
            state.terminate_calls += 1;
            state.pending.drain(..).collect()
        };

        // Every accepted request still gets exactly one completion
        for callback in abandoned {
            callback(CompletionRecord::failure(None));
        }
    }

    fn set_measure_latencies(&mut self, measure: bool) {
        self.lock().measure_latencies = measure;
    }

    fn measure_latencies(&self) -> bool {
        self.lock().measure_latencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_callback(successes: &Arc<AtomicU64>, failures: &Arc<AtomicU64>) -> CompletionCallback {
        let successes = successes.clone();
        let failures = failures.clone();
        Box::new(move |record| {
            if record.success {
                successes.fetch_add(1, Ordering::SeqCst);
            } else {
                failures.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    #[test]
    fn test_immediate_success_by_default() {
        let successes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let mut mock = MockExecutor::new();

        for _ in 0..3 {
            assert!(mock.try_start_request(counting_callback(&successes, &failures)));
        }

        assert_eq!(successes.load(Ordering::SeqCst), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        assert_eq!(mock.attempts(), 3);
        assert_eq!(mock.accepted(), 3);
    }

    #[test]
    fn test_always_at_capacity_never_invokes_callback() {
        let successes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let mut mock = MockExecutor::always_at_capacity();

        assert!(!mock.try_start_request(counting_callback(&successes, &failures)));
        assert_eq!(successes.load(Ordering::SeqCst) + failures.load(Ordering::SeqCst), 0);
        assert_eq!(mock.attempts(), 1);
        assert_eq!(mock.accepted(), 0);
    }

    #[test]
    fn test_scripted_outcomes_then_default() {
        let successes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let mut mock = MockExecutor::new();
        mock.push_outcomes([false, false]);

        for _ in 0..5 {
            mock.try_start_request(counting_callback(&successes, &failures));
        }

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(successes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_deferred_with_capacity() {
        let successes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let mut mock = MockExecutor::new();
        mock.set_deferred(true);
        mock.set_capacity(Some(2));

        assert!(mock.try_start_request(counting_callback(&successes, &failures)));
        assert!(mock.try_start_request(counting_callback(&successes, &failures)));
        assert!(!mock.try_start_request(counting_callback(&successes, &failures)));
        assert_eq!(mock.pending_count(), 2);

        assert!(mock.complete_next());
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert!(mock.try_start_request(counting_callback(&successes, &failures)));

        assert_eq!(mock.complete_all(), 2);
        assert!(!mock.complete_next());
        assert_eq!(successes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_terminate_fails_pending_requests() {
        let successes = Arc::new(AtomicU64::new(0));
        let failures = Arc::new(AtomicU64::new(0));
        let mut mock = MockExecutor::new();
        mock.set_deferred(true);

        mock.try_start_request(counting_callback(&successes, &failures));
        mock.try_start_request(counting_callback(&successes, &failures));
        mock.terminate();

        assert_eq!(failures.load(Ordering::SeqCst), 2);
        assert_eq!(mock.pending_count(), 0);
        assert_eq!(mock.terminate_calls(), 1);
    }

    #[test]
    fn test_latency_only_reported_when_measuring() {
        let mut mock = MockExecutor::new();
        mock.set_latency(Some(Duration::from_micros(250)));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        mock.try_start_request(Box::new(move |r| sink.lock().unwrap().push(r.latency)));

        mock.set_measure_latencies(true);
        assert!(mock.measure_latencies());
        let sink = seen.clone();
        mock.try_start_request(Box::new(move |r| sink.lock().unwrap().push(r.latency)));

        assert_eq!(*seen.lock().unwrap(), vec![None, Some(Duration::from_micros(250))]);
    }
}
