//! Conjunction of limiters
//!
//! A chained limiter grants only when every member grants. Members are asked
//! in order; if one denies, units already taken from earlier members are
//! released again so no member leaks budget.

use super::RateLimiter;

/// Grants when all member limiters grant
#[derive(Default)]
pub struct ChainedRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
    outstanding: u64,
}

impl ChainedRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a member limiter
    pub fn with(mut self, limiter: Box<dyn RateLimiter>) -> Self {
        self.limiters.push(limiter);
        self
    }

    /// Number of member limiters
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Units granted by the whole chain and not released
    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }
}

impl RateLimiter for ChainedRateLimiter {
    fn try_acquire_one(&mut self) -> bool {
        for i in 0..self.limiters.len() {
            if !self.limiters[i].try_acquire_one() {
                for acquired in self.limiters[..i].iter_mut().rev() {
                    acquired.release_one();
                }
                return false;
            }
        }
        self.outstanding += 1;
        true
    }

    fn release_one(&mut self) {
        if self.outstanding == 0 {
            tracing::warn!("release_one called on chained rate limiter with no outstanding units");
            return;
        }
        self.outstanding -= 1;
        for limiter in self.limiters.iter_mut() {
            limiter.release_one();
        }
    }

    fn reset(&mut self) {
        self.outstanding = 0;
        for limiter in self.limiters.iter_mut() {
            limiter.reset();
        }
    }
}
