//! Status polling
//!
//! Drives a blocking wait for a remote entity to reach one of a set of
//! acceptable states, or to disappear entirely. The loop is a plain
//! fetch/evaluate/sleep cycle on the caller's task: progress happens only
//! through the interval timer or the deadline, never by busy-spinning, and
//! the fetched entity is handed back to the caller on exit.

use super::{execute, Deadline, RetryConfig};
use crate::api::error::ApiError;
use crate::api::ApiClient;
use crate::diag::Diagnostics;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How a poll treats a fetch that reports the entity as absent (404)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsencePolicy {
    /// Absence is expected for a while (creation-phase polling: the
    /// resource may not have propagated yet) - keep polling
    RetryUntilVisible,
    /// Absence is a failure - stop polling
    Fail,
}

/// Immutable description of one status poll
#[derive(Debug, Clone)]
pub struct PollSpec<S> {
    /// Resource kind for logs and diagnostics, e.g. "cluster"
    pub kind: &'static str,
    /// Identity of the entity being awaited
    pub id: String,
    /// Fixed wall-clock interval between fetches. No backoff: the awaited
    /// operations are long-running provisioning jobs, and backing off would
    /// only delay completion detection.
    pub interval: Duration,
    /// Status values that end the poll successfully. Callers may include
    /// failure states here and classify the final status themselves; the
    /// poller only matches against the set.
    pub targets: Vec<S>,
    /// Treatment of a not-found fetch result
    pub absence: AbsencePolicy,
}

impl<S> PollSpec<S> {
    pub fn new(
        kind: &'static str,
        id: impl Into<String>,
        interval: Duration,
        targets: Vec<S>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            interval,
            targets,
            absence: AbsencePolicy::RetryUntilVisible,
        }
    }

    pub fn with_absence(mut self, absence: AbsencePolicy) -> Self {
        self.absence = absence;
        self
    }
}

/// Poll `fetch` until the extracted status is in the target set.
///
/// Each fetch runs through [`execute`], so transient transport errors and
/// token expiry are absorbed per cycle; an error that survives the executor
/// is terminal for the poll, except not-found under
/// [`AbsencePolicy::RetryUntilVisible`].
///
/// Returns `(Some(entity), true)` once a fetched entity's status matches.
/// On a terminal failure - deadline expiry, a fatal fetch error, or absence
/// under [`AbsencePolicy::Fail`] - returns the last fetched entity (if any)
/// and `false`, after appending a diagnostic naming the resource, the
/// elapsed time, and the awaited states.
pub async fn poll_until<T, S, F, Fut, X>(
    client: &ApiClient,
    retry: &RetryConfig,
    spec: &PollSpec<S>,
    deadline: Deadline,
    diags: &mut Diagnostics,
    fetch: F,
    status_of: X,
) -> (Option<T>, bool)
where
    S: PartialEq + std::fmt::Debug,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
    X: Fn(&T) -> S,
{
    let started = Instant::now();
    let action = format!("fetch {} {}", spec.kind, spec.id);
    let mut last: Option<T> = None;
    let mut last_status: Option<S> = None;

    loop {
        match execute(client, retry, deadline, diags, &action, &fetch).await {
            Ok(entity) => {
                let status = status_of(&entity);
                let matched = spec.targets.contains(&status);
                tracing::debug!(
                    "{} {}: status {:?} (awaiting {:?})",
                    spec.kind,
                    spec.id,
                    status,
                    spec.targets
                );
                last = Some(entity);
                last_status = Some(status);
                if matched {
                    return (last, true);
                }
            }
            Err(err) if err.is_not_found() && spec.absence == AbsencePolicy::RetryUntilVisible => {
                tracing::debug!("{} {}: not visible yet", spec.kind, spec.id);
            }
            Err(err) => {
                diags.error(
                    format!("Failed waiting for {} {}", spec.kind, spec.id),
                    format!(
                        "Gave up after {:.0?} awaiting states {:?}: {}",
                        started.elapsed(),
                        spec.targets,
                        err
                    ),
                );
                return (last, false);
            }
        }

        if !deadline.sleep(spec.interval).await {
            diags.error(
                format!("Timed out waiting for {} {}", spec.kind, spec.id),
                format!(
                    "Gave up after {:.0?} awaiting states {:?}; last observed status: {:?}",
                    started.elapsed(),
                    spec.targets,
                    last_status
                ),
            );
            return (last, false);
        }
    }
}

/// Poll `check` until the remote entity is confirmed absent.
///
/// `check` reports whether the entity is gone; a not-found error counts as
/// gone. Any other error is treated as transient and retried until the
/// deadline - teardown is expected to produce intermittent errors while the
/// underlying resource is mid-removal - so `check` calls the API directly
/// rather than going through the bounded-retry executor.
///
/// Deadline expiry appends a *warning* and returns `false`: a deletion
/// timeout is reported but does not block state removal.
pub async fn poll_until_deletion<F, Fut>(
    kind: &'static str,
    id: &str,
    interval: Duration,
    deadline: Deadline,
    diags: &mut Diagnostics,
    check: F,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool, ApiError>>,
{
    let started = Instant::now();

    loop {
        match check().await {
            Ok(true) => {
                tracing::debug!("{} {}: confirmed deleted", kind, id);
                return true;
            }
            Ok(false) => {
                tracing::debug!("{} {}: still present", kind, id);
            }
            Err(err) if err.is_not_found() => {
                tracing::debug!("{} {}: confirmed deleted (not found)", kind, id);
                return true;
            }
            Err(err) => {
                tracing::warn!(
                    "{} {}: error while awaiting deletion (retrying): {}",
                    kind,
                    id,
                    err
                );
            }
        }

        if !deadline.sleep(interval).await {
            diags.warning(
                format!("Timed out waiting for {} {} to be deleted", kind, id),
                format!(
                    "The resource was still present after {:.0?}. It will be removed from \
                     state; deletion continues on the Stratus side.",
                    started.elapsed()
                ),
            );
            return false;
        }
    }
}
