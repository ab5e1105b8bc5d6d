//! Fixed-interval polling with a deadline

use anyhow::Result;
use std::time::{Duration, Instant};

/// Poll `check` every `interval` until it returns `true` or `timeout` elapses.
///
/// The check always runs at least once. Errors from the check are treated as
/// "not ready yet" because the resources being polled are usually still being
/// created. Returns `Ok(false)` when the deadline passes.
pub fn wait_until<F>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match check() {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => tracing::debug!(error = %e, "readiness check errored, retrying"),
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        std::thread::sleep(interval.min(deadline - now));
    }
}
