//! Polling helper for asynchronous provider state transitions.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

/// Outcome of a single readiness probe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Readiness<T> {
    /// The resource reached the desired state.
    Ready(T),
    /// The resource is still transitioning.
    Pending,
    /// The resource reached a terminal failure state.
    Failed(String),
}

/// Interval and deadline applied to a polling wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitSettings {
    /// Delay between consecutive probes.
    pub interval: Duration,
    /// Maximum time spent waiting before giving up.
    pub timeout: Duration,
}

impl WaitSettings {
    /// Creates settings from an interval and a timeout.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Errors raised by [`wait_until`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WaitError<E> {
    /// The probe itself failed (for example a remote call error).
    #[error("probe failed: {0}")]
    Probe(#[source] E),
    /// The resource reached a failure state.
    #[error("{resource} entered a failure state: {reason}")]
    Failed {
        /// Resource being waited on.
        resource: String,
        /// Provider supplied reason or state.
        reason: String,
    },
    /// The resource did not become ready before the deadline.
    #[error("timed out after {waited:?} waiting for {resource}")]
    Timeout {
        /// Resource being waited on.
        resource: String,
        /// Configured timeout.
        waited: Duration,
    },
}

/// Repeatedly runs `probe` until it reports [`Readiness::Ready`].
///
/// The first probe runs immediately; later probes run `settings.interval`
/// apart. A [`Readiness::Failed`] outcome stops the wait at once, as does a
/// probe error.
///
/// # Errors
///
/// Returns [`WaitError::Failed`] on a failure state, [`WaitError::Probe`]
/// when the probe errors, and [`WaitError::Timeout`] when the deadline
/// passes first. A timeout too large to represent never expires.
pub async fn wait_until<T, E, F, Fut>(
    resource: &str,
    settings: WaitSettings,
    mut probe: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Readiness<T>, E>>,
{
    // A timeout beyond the clock's range means no deadline.
    let deadline = Instant::now().checked_add(settings.timeout);
    loop {
        match probe().await.map_err(WaitError::Probe)? {
            Readiness::Ready(value) => return Ok(value),
            Readiness::Failed(reason) => {
                return Err(WaitError::Failed {
                    resource: resource.to_owned(),
                    reason,
                });
            }
            Readiness::Pending => {}
        }

        let next_probe = Instant::now().checked_add(settings.interval);
        if deadline.is_some_and(|limit| next_probe.is_none_or(|next| next > limit)) {
            return Err(WaitError::Timeout {
                resource: resource.to_owned(),
                waited: settings.timeout,
            });
        }
        tracing::debug!(resource, interval = ?settings.interval, "resource not ready; polling again");
        sleep(settings.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::convert::Infallible;

    fn fast() -> WaitSettings {
        WaitSettings::new(Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn returns_value_once_ready() {
        let mut outcomes = VecDeque::from(vec![
            Readiness::Pending,
            Readiness::Pending,
            Readiness::Ready("done"),
        ]);
        let calls = Cell::new(0_u32);

        let result = wait_until("snapshot snap-1", fast(), || {
            calls.set(calls.get() + 1);
            let next = outcomes.pop_front().unwrap_or(Readiness::Pending);
            async move { Ok::<_, Infallible>(next) }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn failure_state_aborts_on_first_probe() {
        let calls = Cell::new(0_u32);

        let result: Result<(), _> = wait_until("snapshot snap-1", fast(), || {
            calls.set(calls.get() + 1);
            async { Ok::<_, Infallible>(Readiness::Failed(String::from("error"))) }
        })
        .await;

        assert_eq!(
            result,
            Err(WaitError::Failed {
                resource: String::from("snapshot snap-1"),
                reason: String::from("error"),
            })
        );
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn probe_errors_propagate() {
        let result: Result<(), _> = wait_until("volume vol-1", fast(), || async {
            Err::<Readiness<()>, _>("remote call failed")
        })
        .await;

        assert_eq!(result, Err(WaitError::Probe("remote call failed")));
    }

    #[tokio::test(start_paused = true)]
    async fn maximal_timeout_keeps_polling() {
        let settings = WaitSettings::new(Duration::from_secs(3600), Duration::MAX);
        let mut outcomes = VecDeque::from(vec![
            Readiness::Pending,
            Readiness::Pending,
            Readiness::Ready(7_u8),
        ]);

        let result = wait_until("volume vol-1", settings, || {
            let next = outcomes.pop_front().unwrap_or(Readiness::Pending);
            async move { Ok::<_, Infallible>(next) }
        })
        .await;

        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_resource_times_out() {
        let settings = WaitSettings::new(Duration::from_secs(15), Duration::from_secs(60));

        let result: Result<(), _> = wait_until("snapshot snap-1", settings, || async {
            Ok::<_, Infallible>(Readiness::Pending)
        })
        .await;

        assert!(
            matches!(result, Err(WaitError::Timeout { ref resource, .. }) if resource == "snapshot snap-1"),
            "unexpected outcome: {result:?}"
        );
    }
}
