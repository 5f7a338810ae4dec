//! Bounded waiting.
//!
//! Every suspension point in a run goes through one of two primitives:
//!
//! - [`wait_for`] polls an async predicate until it holds or a deadline
//!   passes. Errors from the predicate count as "not yet" and are kept for the
//!   timeout message.
//! - [`race_event_with_action`] arms an event future, fires an action, and
//!   resolves once both finish or the timeout elapses.
//!
//! Time is read and slept through a [`Clock`] so that retry loops can be
//! driven deterministically in tests with [`ManualClock`].

use std::fmt::Display;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::config;

/// Source of "now" and of sleeping.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed clock. Honours `tokio::time::pause`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: sleeping advances time instantly and is recorded.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, by: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += by;
        }
    }

    /// Every duration passed to `sleep`, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Total virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or_default()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// Timeout and poll interval for a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Maximum time to wait for the condition
    pub timeout: Duration,
    /// How often the condition is re-checked
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Custom timeout with the configured default poll interval
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(timeout, Duration::from_millis(config::DEFAULT_POLL_INTERVAL_MS))
    }
}

/// A wait did not resolve within its budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "timed out after {timeout:?} waiting for {condition}{}",
    .last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default()
)]
pub struct WaitTimeout {
    /// What was being waited for
    pub condition: String,
    /// The budget that ran out
    pub timeout: Duration,
    /// Most recent error reported by the predicate, if any
    pub last_error: Option<String>,
}

/// Poll `condition` until it returns `Ok(true)` or `config.timeout` passes.
///
/// The predicate is always checked at least once, even with a zero timeout.
/// A single check that hangs is cut off at the remaining budget.
pub async fn wait_for<F, Fut, E>(
    clock: &dyn Clock,
    config: WaitConfig,
    description: &str,
    mut condition: F,
) -> Result<(), WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    let start = clock.now();
    let mut last_error = None;

    loop {
        let remaining = config
            .timeout
            .saturating_sub(clock.now().saturating_duration_since(start));

        match tokio::time::timeout(remaining, condition()).await {
            Ok(Ok(true)) => return Ok(()),
            Ok(Ok(false)) => {}
            Ok(Err(err)) => last_error = Some(err.to_string()),
            Err(_) => last_error = Some("check did not complete".to_string()),
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= config.timeout {
            return Err(WaitTimeout {
                condition: description.to_string(),
                timeout: config.timeout,
                last_error,
            });
        }

        let pause = config.poll_interval.min(config.timeout - elapsed);
        clock.sleep(pause.max(Duration::from_millis(1))).await;
    }
}

/// Outcome of [`race_event_with_action`] when it does not produce the event.
#[derive(Debug, Error)]
pub enum RaceError<E> {
    #[error(transparent)]
    Timeout(WaitTimeout),

    #[error("action failed: {0}")]
    Action(E),

    #[error("event failed: {0}")]
    Event(E),
}

/// Wait for `event` while performing `action`.
///
/// `event` must already be armed (subscribed) when passed in; it is polled
/// before `action` so nothing the action triggers can slip past it.
pub async fn race_event_with_action<T, A, EvFut, ActFut, E>(
    timeout: Duration,
    description: &str,
    event: EvFut,
    action: ActFut,
) -> Result<T, RaceError<E>>
where
    EvFut: Future<Output = Result<T, E>>,
    ActFut: Future<Output = Result<A, E>>,
{
    let both = async {
        let (event, action) = tokio::join!(event, action);
        action.map_err(RaceError::Action)?;
        event.map_err(RaceError::Event)
    };

    match tokio::time::timeout(timeout, both).await {
        Ok(result) => result,
        Err(_) => Err(RaceError::Timeout(WaitTimeout {
            condition: description.to_string(),
            timeout,
            last_error: None,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_for_resolves_once_condition_holds() {
        let clock = ManualClock::new();
        let polls = AtomicUsize::new(0);

        let result = wait_for(
            &clock,
            WaitConfig::new(Duration::from_secs(1), Duration::from_millis(100)),
            "third poll",
            || {
                let n = polls.fetch_add(1, Ordering::SeqCst);
                async move { Ok::<_, String>(n >= 2) }
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100); 2]);
    }

    #[tokio::test]
    async fn test_wait_for_times_out_with_last_error() {
        let clock = ManualClock::new();

        let err = wait_for(
            &clock,
            WaitConfig::new(Duration::from_millis(250), Duration::from_millis(100)),
            "#chart to be visible",
            || async { Err::<bool, _>("no node") },
        )
        .await
        .unwrap_err();

        assert_eq!(err.condition, "#chart to be visible");
        assert_eq!(err.last_error.as_deref(), Some("no node"));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
        assert_eq!(
            err.to_string(),
            "timed out after 250ms waiting for #chart to be visible (last error: no node)"
        );
    }

    #[tokio::test]
    async fn test_wait_for_zero_timeout_checks_once() {
        let clock = ManualClock::new();
        let result = wait_for(
            &clock,
            WaitConfig::new(Duration::ZERO, Duration::from_millis(100)),
            "ready",
            || async { Ok::<_, String>(true) },
        )
        .await;
        assert!(result.is_ok());
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_returns_event_after_action() {
        let (tx, rx) = tokio::sync::oneshot::channel::<u32>();
        let event = async { rx.await.map_err(|e| e.to_string()) };
        let action = async move {
            tx.send(7).map_err(|_| "receiver gone".to_string())?;
            Ok::<_, String>(())
        };

        let value = race_event_with_action(Duration::from_secs(10), "download", event, action)
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_times_out_without_event() {
        let event = std::future::pending::<Result<u32, String>>();
        let action = async { Ok::<_, String>(()) };

        let err = race_event_with_action(Duration::from_secs(10), "download", event, action)
            .await
            .unwrap_err();
        match err {
            RaceError::Timeout(t) => assert_eq!(t.timeout, Duration::from_secs(10)),
            other => panic!("expected timeout, got {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_race_reports_action_failure() {
        let event = async { Ok::<u32, String>(1) };
        let action = async { Err::<(), _>("click intercepted".to_string()) };

        let err = race_event_with_action(Duration::from_secs(10), "download", event, action)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "action failed: click intercepted");
    }
}
