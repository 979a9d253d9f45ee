// Bounded waiting for a service to report itself active after a (re)start.
//
// The only automatic retry in the whole provisioner lives here: poll a readiness
// predicate with exponential backoff until it holds or the deadline passes.

use std::thread;
use std::time::{Duration, Instant};

use crate::libs::errors::{ProvisionError, Result};
use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Backoff {
    /// 250 ms doubling up to 4 s between polls, giving up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Backoff {
            initial: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            timeout,
        }
    }
}

/// Polls `probe` until it returns `Ok(true)`.
///
/// Errors from `probe` abort the wait immediately; only a `false` answer is retried.
/// The last sleep is clipped so the total wait never overshoots `timeout` by more
/// than one probe.
pub fn wait_until<F>(step: &str, what: &str, backoff: Backoff, mut probe: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let started = Instant::now();
    let mut delay = backoff.initial;
    let mut attempt = 1;

    loop {
        if probe()? {
            log_debug!("{} {} ready after {} attempt(s)", step, what, attempt);
            return Ok(());
        }
        let elapsed = started.elapsed();
        if elapsed >= backoff.timeout {
            return Err(ProvisionError::Timeout {
                step: step.to_string(),
                what: format!("{what} to become active"),
                after: backoff.timeout,
            });
        }
        let sleep_for = delay.min(backoff.timeout - elapsed);
        log_debug!(
            "{} {} not ready (attempt {}), retrying in {:?}",
            step,
            what,
            attempt,
            sleep_for
        );
        thread::sleep(sleep_for);
        delay = (delay * 2).min(backoff.max_delay);
        attempt += 1;
    }
}
