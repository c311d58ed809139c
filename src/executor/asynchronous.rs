//! Tokio adapters
//!
//! The wait loop blocks its thread, so from async code it runs on the blocking
//! pool. Results move into the blocking task and come back out of it.

use std::time::Duration;

use crate::error::{ExecError, ExecOutcome};

use super::result::ExecResult;
use super::waiting::Waiter;

fn join_failed(e: tokio::task::JoinError) -> ExecError {
    ExecError::Io(std::io::Error::other(format!("wait task failed: {}", e)))
}

/// Wait for one result without blocking the runtime.
///
/// On timeout the still-running result is attached to the error.
pub async fn wait_async(result: ExecResult, timeout: Option<Duration>) -> ExecOutcome<ExecResult> {
    wait_async_with(Waiter::default(), result, timeout).await
}

/// [`wait_async`] driven by a specific [`Waiter`]
pub async fn wait_async_with(
    waiter: Waiter,
    result: ExecResult,
    timeout: Option<Duration>,
) -> ExecOutcome<ExecResult> {
    tokio::task::spawn_blocking(move || result.wait_owned_with(&waiter, timeout))
        .await
        .map_err(join_failed)?
}

/// Wait for many results without blocking the runtime.
///
/// Hands the results back in input order together with whether each one
/// finished.
pub async fn wait_for_many_async(
    results: Vec<ExecResult>,
    timeout: Option<Duration>,
) -> ExecOutcome<(Vec<ExecResult>, Vec<bool>)> {
    wait_for_many_async_with(Waiter::default(), results, timeout).await
}

/// [`wait_for_many_async`] driven by a specific [`Waiter`]
pub async fn wait_for_many_async_with(
    waiter: Waiter,
    mut results: Vec<ExecResult>,
    timeout: Option<Duration>,
) -> ExecOutcome<(Vec<ExecResult>, Vec<bool>)> {
    tokio::task::spawn_blocking(move || {
        let finished = waiter
            .wait_for_many(results.iter_mut(), timeout)?
            .iter()
            .map(Option::is_some)
            .collect::<Vec<_>>();
        Ok((results, finished))
    })
    .await
    .map_err(join_failed)?
}
