//! Stop conditions
//!
//! A run ends when a termination chain reports [`TerminationStatus::Terminate`].
//! The sequencer owns two independent chains:
//!
//! - the **completion chain** (duration, request counts): expected, successful end
//! - the **failure chain** (error ratios, failure counts): the run went bad
//!
//! Both are evaluated on every tick. Which one fired decides whether the run
//! reports [`crate::sequencer::TerminationReason::Completed`] or
//! [`crate::sequencer::TerminationReason::Failed`].
//!
//! # Chain semantics
//!
//! Predicates are evaluated in the order they were linked and evaluation
//! stops at the first one reporting `Terminate`; later predicates are not
//! evaluated on that tick. A chain returns `Proceed` only if every predicate
//! does. An empty chain always proceeds.
//!
//! # Example
//!
//! ```
//! use reqpulse::termination::{TerminationChain, TerminationStatus, RunProgress};
//! use reqpulse::termination::predicates::{CounterThresholdPredicate, ProgressCounter};
//!
//! let mut chain = TerminationChain::new();
//! chain
//!     .link(Box::new(CounterThresholdPredicate::new(ProgressCounter::Completed, 100)))
//!     .link(Box::new(CounterThresholdPredicate::new(ProgressCounter::Failed, 5)));
//!
//! let progress = RunProgress { completed: 100, ..Default::default() };
//! assert_eq!(chain.evaluate_chain(&progress), TerminationStatus::Terminate);
//! ```

pub mod predicates;

use crate::executor::CompletionRecord;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Outcome of evaluating a predicate or a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Proceed,
    Terminate,
}

/// Point-in-time view of a run handed to predicates
///
/// Counters are cumulative since the run started. `elapsed` is measured on
/// the sequencer's time source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunProgress {
    /// Time since the run started
    pub elapsed: Duration,
    /// Requests the executor accepted
    pub started: u64,
    /// Completion records received (successes plus failures)
    pub completed: u64,
    /// Completion records reporting success
    pub succeeded: u64,
    /// Completion records reporting failure
    pub failed: u64,
    /// Start attempts the executor refused
    pub rejected: u64,
}

impl RunProgress {
    /// Requests started but not yet completed
    pub fn in_flight(&self) -> u64 {
        self.started.saturating_sub(self.completed)
    }
}

/// One stop condition
///
/// Predicates may be stateful (for example a sliding failure window). They
/// are built fresh for every run and never shared between runs or workers.
pub trait TerminationPredicate: Send {
    /// Evaluate only this predicate's own condition
    fn evaluate(&mut self, progress: &RunProgress) -> TerminationStatus;

    /// Observe one completion record
    ///
    /// Called on the sequencer's thread, in delivery order, before the next
    /// evaluation. Stateless predicates ignore it.
    fn observe(&mut self, _record: &CompletionRecord) {}

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Ordered chain of predicates
///
/// Evaluation order is fixed by the order of [`TerminationChain::link`] calls.
#[derive(Default)]
pub struct TerminationChain {
    links: Vec<Box<dyn TerminationPredicate>>,
}

impl TerminationChain {
    /// Empty chain (always proceeds)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `next` to the tail of the chain
    ///
    /// Returns the chain itself so links can be added fluently.
    pub fn link(&mut self, next: Box<dyn TerminationPredicate>) -> &mut Self {
        self.links.push(next);
        self
    }

    /// Evaluate predicates in order, stopping at the first `Terminate`
    pub fn evaluate_chain(&mut self, progress: &RunProgress) -> TerminationStatus {
        self.evaluate_with_trigger(progress).0
    }

    /// Like [`Self::evaluate_chain`], also returning the name of the predicate that fired
    pub fn evaluate_with_trigger(&mut self, progress: &RunProgress) -> (TerminationStatus, Option<&str>) {
        let fired = self
            .links
            .iter_mut()
            .position(|link| link.evaluate(progress) == TerminationStatus::Terminate);

        match fired {
            Some(index) => (TerminationStatus::Terminate, Some(self.links[index].name())),
            None => (TerminationStatus::Proceed, None),
        }
    }

    /// Forward a completion record to every predicate
    pub fn observe(&mut self, record: &CompletionRecord) {
        for link in self.links.iter_mut() {
            link.observe(record);
        }
    }

    /// Number of linked predicates
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl fmt::Debug for TerminationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|link| link.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a fixed status and counts its evaluations
    struct CountingPredicate {
        status: TerminationStatus,
        calls: Arc<AtomicUsize>,
        observed: Arc<AtomicUsize>,
    }

    impl CountingPredicate {
        fn boxed(status: TerminationStatus) -> (Box<dyn TerminationPredicate>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let observed = Arc::new(AtomicUsize::new(0));
            let predicate = Box::new(Self {
                status,
                calls: calls.clone(),
                observed: observed.clone(),
            });
            (predicate, calls, observed)
        }
    }

    impl TerminationPredicate for CountingPredicate {
        fn evaluate(&mut self, _progress: &RunProgress) -> TerminationStatus {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status
        }

        fn observe(&mut self, _record: &CompletionRecord) {
            self.observed.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            match self.status {
                TerminationStatus::Proceed => "proceed",
                TerminationStatus::Terminate => "terminate",
            }
        }
    }

    #[test]
    fn test_empty_chain_proceeds() {
        let mut chain = TerminationChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.evaluate_chain(&RunProgress::default()), TerminationStatus::Proceed);
    }

    #[test]
    fn test_all_proceed_visits_every_link() {
        let (a, a_calls, _) = CountingPredicate::boxed(TerminationStatus::Proceed);
        let (b, b_calls, _) = CountingPredicate::boxed(TerminationStatus::Proceed);
        let (c, c_calls, _) = CountingPredicate::boxed(TerminationStatus::Proceed);

        let mut chain = TerminationChain::new();
        chain.link(a).link(b).link(c);

        assert_eq!(chain.evaluate_chain(&RunProgress::default()), TerminationStatus::Proceed);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_first_terminate_short_circuits() {
        let (a, a_calls, _) = CountingPredicate::boxed(TerminationStatus::Proceed);
        let (b, b_calls, _) = CountingPredicate::boxed(TerminationStatus::Terminate);
        let (c, c_calls, _) = CountingPredicate::boxed(TerminationStatus::Terminate);

        let mut chain = TerminationChain::new();
        chain.link(a).link(b).link(c);

        let (status, trigger) = chain.evaluate_with_trigger(&RunProgress::default());
        assert_eq!(status, TerminationStatus::Terminate);
        assert_eq!(trigger, Some("terminate"));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_terminate_iff_any_link_terminates() {
        // Every combination of statuses over a chain of 4
        for mask in 0u32..16 {
            let mut chain = TerminationChain::new();
            let mut counters = Vec::new();
            for bit in 0..4 {
                let status = if mask & (1 << bit) != 0 {
                    TerminationStatus::Terminate
                } else {
                    TerminationStatus::Proceed
                };
                let (p, calls, _) = CountingPredicate::boxed(status);
                chain.link(p);
                counters.push(calls);
            }

            let expected = if mask == 0 { TerminationStatus::Proceed } else { TerminationStatus::Terminate };
            assert_eq!(chain.evaluate_chain(&RunProgress::default()), expected, "mask {:04b}", mask);

            let first = (0..4).find(|bit| mask & (1 << bit) != 0).unwrap_or(3);
            for (i, calls) in counters.iter().enumerate() {
                let expected_calls = if i <= first { 1 } else { 0 };
                assert_eq!(calls.load(Ordering::SeqCst), expected_calls, "mask {:04b} link {}", mask, i);
            }
        }
    }

    #[test]
    fn test_observe_reaches_every_link() {
        let (a, _, a_seen) = CountingPredicate::boxed(TerminationStatus::Terminate);
        let (b, _, b_seen) = CountingPredicate::boxed(TerminationStatus::Proceed);

        let mut chain = TerminationChain::new();
        chain.link(a).link(b);
        chain.observe(&CompletionRecord::success(None));

        assert_eq!(a_seen.load(Ordering::SeqCst), 1);
        assert_eq!(b_seen.load(Ordering::SeqCst), 1);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_debug_lists_names() {
        let (a, _, _) = CountingPredicate::boxed(TerminationStatus::Proceed);
        let mut chain = TerminationChain::new();
        chain.link(a);
        assert_eq!(format!("{:?}", chain), "[\"proceed\"]");
    }

    #[test]
    fn test_in_flight() {
        let progress = RunProgress {
            started: 10,
            completed: 7,
            ..Default::default()
        };
        assert_eq!(progress.in_flight(), 3);
    }
}
