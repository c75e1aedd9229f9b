//! Circuit breaker around a `TextGenerator`.
//!
//! Closed → Open after `failure_threshold` consecutive failures. While open, calls are
//! rejected with `LlmError::CircuitOpen` without reaching the inner generator. Once the
//! cooldown elapses a single trial call is admitted (half-open): success closes the
//! breaker, failure re-opens it for another cooldown. A trial whose future is dropped
//! before it finishes counts as a failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::llm_client::{LlmError, TextGenerator};

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BreakerState {
    Closed { failures: u32 },
    Open { until: Instant },
    /// The single trial call is in flight.
    HalfOpen,
}

/// Point-in-time view of the breaker, served by the health endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BreakerSnapshot {
    pub state: &'static str,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config: BreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                ..config
            },
            state: Mutex::new(BreakerState::Closed { failures: 0 }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        // A poisoned lock only means another caller panicked mid-update; the state is Copy.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admits or rejects a call.
    pub fn try_acquire(&self) -> Result<(), LlmError> {
        let mut state = self.lock();
        match *state {
            BreakerState::Closed { .. } => Ok(()),
            BreakerState::Open { until } => {
                let now = Instant::now();
                if now >= until {
                    info!("Circuit half-open, admitting trial call");
                    *state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    let remaining = until - now;
                    Err(LlmError::CircuitOpen {
                        retry_in_secs: remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0),
                    })
                }
            }
            BreakerState::HalfOpen => Err(LlmError::CircuitOpen { retry_in_secs: 0 }),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if !matches!(*state, BreakerState::Closed { failures: 0 }) {
            info!("Circuit closed");
        }
        *state = BreakerState::Closed { failures: 0 };
    }

    pub fn record_failure(&self) {
        let mut state = self.lock();
        let open_until = Instant::now() + self.config.cooldown;
        *state = match *state {
            BreakerState::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit opened after {failures} consecutive failures (cooldown {}s)",
                        self.config.cooldown.as_secs()
                    );
                    BreakerState::Open { until: open_until }
                } else {
                    BreakerState::Closed { failures }
                }
            }
            BreakerState::HalfOpen => {
                warn!("Trial call failed, circuit re-opened");
                BreakerState::Open { until: open_until }
            }
            open @ BreakerState::Open { .. } => open,
        };
    }

    /// A call admitted by `try_acquire` was dropped before reporting back. Only a
    /// half-open trial needs settling; it re-opens the circuit.
    fn abandon(&self) {
        let mut state = self.lock();
        if matches!(*state, BreakerState::HalfOpen) {
            warn!("Trial call abandoned, circuit re-opened");
            *state = BreakerState::Open {
                until: Instant::now() + self.config.cooldown,
            };
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        match *self.lock() {
            BreakerState::Closed { failures } => BreakerSnapshot {
                state: "closed",
                consecutive_failures: failures,
            },
            BreakerState::Open { .. } => BreakerSnapshot {
                state: "open",
                consecutive_failures: self.config.failure_threshold,
            },
            BreakerState::HalfOpen => BreakerSnapshot {
                state: "half_open",
                consecutive_failures: self.config.failure_threshold,
            },
        }
    }
}

/// Settles an admitted call with the breaker if its future is dropped mid-flight.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.abandon();
        }
    }
}

/// A `TextGenerator` that consults a `CircuitBreaker` before every call.
pub struct GuardedGenerator<G> {
    inner: G,
    breaker: Arc<CircuitBreaker>,
}

impl<G: TextGenerator> GuardedGenerator<G> {
    pub fn new(inner: G, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for GuardedGenerator<G> {
    async fn complete(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.breaker.try_acquire()?;
        let mut guard = CallGuard {
            breaker: &self.breaker,
            settled: false,
        };
        let result = self.inner.complete(prompt, system).await;
        guard.settled = true;

        match result {
            Ok(text) => {
                self.breaker.record_success();
                Ok(text)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedGenerator;

    fn breaker(threshold: u32, cooldown_secs: u64) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_secs(cooldown_secs),
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_stops_calling_inner() {
        let b = breaker(2, 30);
        let guarded = GuardedGenerator::new(ScriptedGenerator::failing(), b.clone());

        assert!(guarded.complete("a", "s").await.is_err());
        assert_eq!(b.snapshot().state, "closed");
        assert!(guarded.complete("b", "s").await.is_err());
        assert_eq!(b.snapshot().state, "open");

        let rejected = guarded.complete("c", "s").await;
        assert!(matches!(rejected, Err(LlmError::CircuitOpen { .. })));
        assert_eq!(guarded.inner.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let b = breaker(1, 10);
        let guarded = GuardedGenerator::new(
            ScriptedGenerator::new(vec![Err("boom"), Ok("{\"ok\": true}")]),
            b.clone(),
        );

        assert!(guarded.complete("a", "s").await.is_err());
        assert_eq!(b.snapshot().state, "open");

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(guarded.complete("b", "s").await.unwrap(), "{\"ok\": true}");
        assert_eq!(
            b.snapshot(),
            BreakerSnapshot {
                state: "closed",
                consecutive_failures: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let b = breaker(1, 10);
        let guarded = GuardedGenerator::new(ScriptedGenerator::failing(), b.clone());

        assert!(guarded.complete("a", "s").await.is_err());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(matches!(
            guarded.complete("b", "s").await,
            Err(LlmError::EmptyContent)
        ));
        assert_eq!(b.snapshot().state, "open");
        assert!(matches!(
            guarded.complete("c", "s").await,
            Err(LlmError::CircuitOpen { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_trial_call_while_half_open() {
        let b = breaker(1, 5);
        b.record_failure();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(b.try_acquire().is_ok());
        assert!(matches!(
            b.try_acquire(),
            Err(LlmError::CircuitOpen { retry_in_secs: 0 })
        ));
    }

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            std::future::pending::<Result<String, LlmError>>().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_trial_reopens_then_recovers() {
        let b = breaker(1, 10);
        let guarded = GuardedGenerator::new(Stalled, b.clone());
        b.record_failure();
        tokio::time::advance(Duration::from_secs(10)).await;

        let cancelled = tokio::time::timeout(Duration::from_secs(1), guarded.complete("a", "s")).await;
        assert!(cancelled.is_err());
        assert_eq!(b.snapshot().state, "open");
        assert!(matches!(
            b.try_acquire(),
            Err(LlmError::CircuitOpen { retry_in_secs }) if retry_in_secs > 0
        ));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(b.try_acquire().is_ok());
        b.record_success();
        assert_eq!(b.snapshot().state, "closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_while_closed_is_not_a_failure() {
        let b = breaker(1, 10);
        let guarded = GuardedGenerator::new(Stalled, b.clone());
        let cancelled = tokio::time::timeout(Duration::from_secs(1), guarded.complete("a", "s")).await;
        assert!(cancelled.is_err());
        assert_eq!(
            b.snapshot(),
            BreakerSnapshot {
                state: "closed",
                consecutive_failures: 0
            }
        );
    }

    #[test]
    fn test_success_resets_failure_count() {
        let b = breaker(3, 5);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        assert_eq!(b.snapshot().consecutive_failures, 1);
        assert_eq!(b.snapshot().state, "closed");
    }
}
