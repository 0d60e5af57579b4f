//! Simulated request target
//!
//! Stands in for a real transport: each accepted request "takes" a latency
//! drawn from a sampler and then completes, successfully or not, on a
//! background timer thread. Useful for exercising pacing end to end without
//! a network, and as the target of the `reqpulse` binary.
//!
//! # Threading
//!
//! Completions are delivered from the timer thread, never from the thread
//! calling `try_start_request`. This mirrors a network executor whose
//! completions arrive on an I/O thread.
//!
//! # Terminate
//!
//! `terminate` does not wait out scheduled latencies: requests still
//! scheduled are failed at once with no latency, one callback each.

use super::{CompletionCallback, CompletionRecord, RequestExecutor};
use crate::sampler::DiscreteNumericDistributionSampler;
use crate::util::fast_time::FastInstant;
use crate::Result;
use anyhow::Context;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Request scheduled to complete at `due`
struct Scheduled {
    due: FastInstant,
    seq: u64,
    record: CompletionRecord,
    callback: CompletionCallback,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so BinaryHeap pops the earliest deadline first
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Executor completing requests after a sampled latency
pub struct SimulatedExecutor {
    latency: Box<dyn DiscreteNumericDistributionSampler>,
    failure_probability: f64,
    rng: Xoshiro256PlusPlus,
    max_outstanding: u64,
    outstanding: Arc<AtomicU64>,
    measure_latencies: bool,
    seq: u64,
    tx: Option<Sender<Scheduled>>,
    timer: Option<JoinHandle<()>>,
}

impl SimulatedExecutor {
    /// Create a simulated target and start its timer thread
    ///
    /// # Arguments
    ///
    /// * `latency` - Per-request latency sampler, in nanoseconds
    /// * `failure_probability` - Chance in `[0, 1]` that a request fails
    /// * `max_outstanding` - Starts are refused while this many requests are in flight
    /// * `seed` - Seed for the failure draw; `None` seeds from entropy
    pub fn new(
        latency: Box<dyn DiscreteNumericDistributionSampler>,
        failure_probability: f64,
        max_outstanding: u64,
        seed: Option<u64>,
    ) -> Result<Self> {
        let (tx, rx) = channel::unbounded();
        let outstanding = Arc::new(AtomicU64::new(0));

        let timer_outstanding = outstanding.clone();
        let timer = std::thread::Builder::new()
            .name("simulated-target".to_string())
            .spawn(move || run_timer(rx, timer_outstanding))
            .context("Failed to spawn simulated target timer thread")?;

        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        Ok(Self {
            latency,
            failure_probability: failure_probability.clamp(0.0, 1.0),
            rng,
            max_outstanding,
            outstanding,
            measure_latencies: false,
            seq: 0,
            tx: Some(tx),
            timer: Some(timer),
        })
    }

    /// Requests accepted and not yet completed
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl RequestExecutor for SimulatedExecutor {
    fn try_start_request(&mut self, on_complete: CompletionCallback) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        if self.outstanding.load(Ordering::Acquire) >= self.max_outstanding {
            return false;
        }

        let latency = Duration::from_nanos(self.latency.get_value());
        let success = !self.rng.gen_bool(self.failure_probability);
        let record = CompletionRecord::new(success, self.measure_latencies.then_some(latency));

        self.seq += 1;
        let scheduled = Scheduled {
            due: FastInstant::now().saturating_add(latency),
            seq: self.seq,
            record,
            callback: on_complete,
        };

        self.outstanding.fetch_add(1, Ordering::AcqRel);
        if tx.send(scheduled).is_err() {
            // Timer thread is gone; the callback was dropped with the message
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    fn terminate(&mut self) {
        // Closing the channel makes the timer thread fail what is still scheduled and exit
        self.tx.take();
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                tracing::warn!("simulated target timer thread panicked");
            }
        }
    }

    fn set_measure_latencies(&mut self, measure: bool) {
        self.measure_latencies = measure;
    }

    fn measure_latencies(&self) -> bool {
        self.measure_latencies
    }
}

impl Drop for SimulatedExecutor {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run_timer(rx: Receiver<Scheduled>, outstanding: Arc<AtomicU64>) {
    let mut heap: BinaryHeap<Scheduled> = BinaryHeap::new();

    loop {
        complete_due(&mut heap, &outstanding);

        let wait = heap
            .peek()
            .map(|next| next.due.duration_since(FastInstant::now()));
        let received = match wait {
            Some(wait) => rx.recv_timeout(wait),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(scheduled) => heap.push(scheduled),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    complete_due(&mut heap, &outstanding);
    for abandoned in heap.drain() {
        outstanding.fetch_sub(1, Ordering::AcqRel);
        (abandoned.callback)(CompletionRecord::failure(None));
    }
}

/// Deliver every scheduled completion whose latency has elapsed
fn complete_due(heap: &mut BinaryHeap<Scheduled>, outstanding: &AtomicU64) {
    let now = FastInstant::now();
    while heap.peek().is_some_and(|next| next.due <= now) {
        if let Some(done) = heap.pop() {
            outstanding.fetch_sub(1, Ordering::AcqRel);
            (done.callback)(done.record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::uniform::UniformSampler;
    use std::sync::Mutex;

    fn fixed_latency(nanos: u64) -> Box<dyn DiscreteNumericDistributionSampler> {
        Box::new(UniformSampler::with_seed(nanos, nanos, 1))
    }

    #[test]
    fn test_completes_on_timer_thread() {
        let mut executor = SimulatedExecutor::new(fixed_latency(1_000_000), 0.0, 16, Some(1)).unwrap();
        let (tx, rx) = channel::unbounded();

        assert!(executor.try_start_request(Box::new(move |record| {
            tx.send((record, std::thread::current().name().map(str::to_string))).unwrap();
        })));

        let (record, thread_name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(record.success);
        assert_eq!(record.latency, None);
        assert_eq!(thread_name.as_deref(), Some("simulated-target"));
    }

    #[test]
    fn test_refuses_above_outstanding_ceiling() {
        let mut executor = SimulatedExecutor::new(fixed_latency(200_000_000), 0.0, 2, Some(1)).unwrap();

        assert!(executor.try_start_request(Box::new(|_| {})));
        assert!(executor.try_start_request(Box::new(|_| {})));
        assert!(!executor.try_start_request(Box::new(|_| {})));
        assert_eq!(executor.outstanding(), 2);

        executor.terminate();
        assert_eq!(executor.outstanding(), 0);
    }

    #[test]
    fn test_terminate_delivers_every_completion_once() {
        let mut executor = SimulatedExecutor::new(fixed_latency(2_000_000), 0.0, 100, Some(1)).unwrap();
        let delivered = Arc::new(AtomicU64::new(0));

        for _ in 0..50 {
            let delivered = delivered.clone();
            assert!(executor.try_start_request(Box::new(move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            })));
        }
        executor.terminate();

        assert_eq!(delivered.load(Ordering::SeqCst), 50);
        assert!(!executor.try_start_request(Box::new(|_| {})));
    }

    #[test]
    fn test_failure_probability_one_always_fails() {
        let mut executor = SimulatedExecutor::new(fixed_latency(0), 1.0, 100, Some(1)).unwrap();
        executor.set_measure_latencies(true);
        let records = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..10 {
            let records = records.clone();
            executor.try_start_request(Box::new(move |r| records.lock().unwrap().push(r)));
        }
        executor.terminate();

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| !r.success && r.latency == Some(Duration::ZERO)));
    }

    #[test]
    fn test_terminate_fails_scheduled_requests_without_waiting() {
        let mut executor = SimulatedExecutor::new(fixed_latency(10_000_000_000), 0.0, 100, Some(1)).unwrap();
        let records = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let records = records.clone();
            assert!(executor.try_start_request(Box::new(move |r| records.lock().unwrap().push(r))));
        }

        let started = std::time::Instant::now();
        executor.terminate();
        assert!(started.elapsed() < Duration::from_secs(5));

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.success && r.latency.is_none()));
        assert_eq!(executor.outstanding(), 0);
    }
}
