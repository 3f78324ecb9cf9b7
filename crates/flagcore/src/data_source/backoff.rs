// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Jittered exponential backoff for streaming reconnection
//! (specification §4.2), grounded on the reconnect-delay contract
//! described by `original_source/libs/common/include/launchdarkly/config/shared/builders/data_source_builder.hpp`:
//! the delay for the first reconnect starts near `initial_delay` and
//! doubles on every subsequent failure, capped at `max_delay`. Full
//! jitter (a uniform draw from `[0, delay]`) avoids reconnect storms
//! when many clients drop at once.

use std::time::Duration;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
/// A run of uninterrupted connection time longer than this resets the
/// attempt counter back to zero.
const DEFAULT_RESET_THRESHOLD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub reset_threshold: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            reset_threshold: DEFAULT_RESET_THRESHOLD,
        }
    }
}

/// Tracks the reconnect attempt count and hands out jittered delays.
/// Not `Sync` by itself -- owned by the single task driving the
/// streaming connection.
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay for the next reconnect attempt, advancing the internal
    /// attempt counter. Capped so `2^attempt` can't overflow.
    pub fn next_delay(&mut self) -> Duration {
        let capped_attempt = self.attempt.min(30);
        let exponential = self.policy.initial_delay.saturating_mul(1u32 << capped_attempt);
        let bound = exponential.min(self.policy.max_delay);
        self.attempt += 1;
        jitter(bound)
    }

    /// A connection that stayed up at least `reset_threshold` counts
    /// as healthy; the next failure should back off from the start
    /// again rather than from wherever the counter last was.
    pub fn note_connected_duration(&mut self, uptime: Duration) {
        if uptime >= self.policy.reset_threshold {
            self.attempt = 0;
        }
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

fn jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return bound;
    }
    let millis = bound.as_millis().min(u128::from(u64::MAX)) as u64;
    Duration::from_millis(fastrand::u64(0..=millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_never_exceeds_max() {
        let mut backoff = Backoff::new(BackoffPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            reset_threshold: Duration::from_secs(60),
        });
        for _ in 0..20 {
            assert!(backoff.next_delay() <= Duration::from_secs(1));
        }
    }

    #[test]
    fn attempt_counter_advances() {
        let mut backoff = Backoff::new(BackoffPolicy::default());
        assert_eq!(backoff.attempt(), 0);
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 1);
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
    }

    #[test]
    fn long_uptime_resets_attempt_counter() {
        let mut backoff = Backoff::new(BackoffPolicy::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);
        backoff.note_connected_duration(Duration::from_secs(120));
        assert_eq!(backoff.attempt(), 0);
    }

    #[test]
    fn short_uptime_does_not_reset() {
        let mut backoff = Backoff::new(BackoffPolicy::default());
        backoff.next_delay();
        backoff.note_connected_duration(Duration::from_secs(1));
        assert_eq!(backoff.attempt(), 1);
    }
}
