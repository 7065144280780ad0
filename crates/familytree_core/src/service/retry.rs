//! Retrying execution wrapper.
//!
//! # Invariants
//! - Only errors whose kind is `ErrorKind::Transient` are retried.
//! - At most `RetryPolicy::attempts()` attempts run.
//! - The last error is returned unchanged once the budget is spent.

use crate::config::RetryPolicy;
use crate::service::error::{ErrorKind, GraphError};
use log::warn;
use std::thread;

/// Runs `attempt` until it succeeds, fails permanently, or the budget runs
/// out. `attempt` receives the 1-based attempt number.
pub fn execute_with_retry<T>(
    policy: &RetryPolicy,
    event: &'static str,
    mut attempt: impl FnMut(u32) -> Result<T, GraphError>,
) -> Result<T, GraphError> {
    let budget = policy.attempts();
    let mut current = 1;
    loop {
        match attempt(current) {
            Ok(value) => return Ok(value),
            Err(err) if err.kind() == ErrorKind::Transient && current < budget => {
                let delay = policy.delay_after(current);
                warn!(
                    "event={} module=graph status=retry attempt={} max_attempts={} delay_ms={} error_code={}",
                    event,
                    current,
                    budget,
                    delay.as_millis(),
                    err.error_code()
                );
                thread::sleep(delay);
                current += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
