//! Waiting on many results at once
//!
//! A single [`IoLoop`] services the pipes of every result while the waiting
//! thread checks, between iterations, which processes have exited. The wait
//! stops once every result is finished or the earliest deadline has passed.

use std::time::{Duration, Instant};

use crate::error::ExecOutcome;

use super::ioloop::IoLoop;
use super::result::{ExecResult, StreamHandler};

/// How long one loop iteration may block when no deadline is closer
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

/// Shortest sample interval; anything below is raised to it so the wait loop
/// never spins.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(1);

/// Drives the wait loop with a fixed sample interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waiter {
    sample_interval: Duration,
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL)
    }
}

impl Waiter {
    /// Waiter blocking at most `sample_interval` per loop iteration, raised to
    /// [`MIN_SAMPLE_INTERVAL`] if shorter.
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            sample_interval: sample_interval.max(MIN_SAMPLE_INTERVAL),
        }
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    /// Block on the loop for no longer than the sample interval, nor past the
    /// deadline.
    fn wait_interval(&self, deadline: Option<Instant>) -> Duration {
        match deadline {
            Some(deadline) => deadline
                .saturating_duration_since(Instant::now())
                .min(self.sample_interval),
            None => self.sample_interval,
        }
    }

    /// Wait until every result is finished or a deadline passes.
    ///
    /// The effective deadline is the earliest of `timeout` (from now) and the
    /// results' own deadlines; with none of them the wait only ends once all
    /// results are finished.
    ///
    /// Returns one entry per input, in input order: the result if it
    /// finished, `None` if it did not. Unfinished processes are left running.
    ///
    /// # Errors
    /// * `ExecError::Execution` - If a result under the assert-success policy
    ///   exits non-zero
    /// * `ExecError::Io` - If servicing a pipe or querying a process fails
    pub fn wait_for_many<'a, I>(
        &self,
        results: I,
        timeout: Option<Duration>,
    ) -> ExecOutcome<Vec<Option<&'a mut ExecResult>>>
    where
        I: IntoIterator<Item = &'a mut ExecResult>,
    {
        let mut results = results.into_iter().collect::<Vec<_>>();
        let mut finished = results.iter().map(|r| r.has_exited()).collect::<Vec<_>>();

        let mut ioloop = IoLoop::new();
        for (slot, result) in results.iter().enumerate() {
            result.register_to(&mut ioloop, slot)?;
        }

        let deadline = timeout
            .map(|timeout| Instant::now() + timeout)
            .into_iter()
            .chain(results.iter().filter_map(|r| r.deadline()))
            .min();

        tracing::trace!(count = results.len(), ?deadline, "waiting");

        while !finished.iter().all(|done| *done) {
            ioloop.do_iteration(Some(self.wait_interval(deadline)), |ioloop, handler, readiness| {
                match results.get_mut(handler.slot) {
                    Some(result) => result.handle(ioloop, handler, readiness),
                    None => Ok(()),
                }
            })?;

            sweep(&mut ioloop, &mut results, &mut finished)?;

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                break;
            }
        }

        // Processes may have exited between the last iteration and the
        // deadline check.
        sweep(&mut ioloop, &mut results, &mut finished)?;

        Ok(results
            .into_iter()
            .zip(finished)
            .map(|(result, done)| done.then_some(result))
            .collect())
    }
}

/// Poll every unfinished result. Its handlers are taken out of the loop first
/// because polling may flush and close its pipes.
fn sweep(
    ioloop: &mut IoLoop<StreamHandler>,
    results: &mut [&mut ExecResult],
    finished: &mut [bool],
) -> ExecOutcome<()> {
    for (slot, (result, done)) in results.iter_mut().zip(finished.iter_mut()).enumerate() {
        if *done {
            continue;
        }
        result.unregister_from(ioloop)?;
        if result.poll()?.is_some() {
            *done = true;
        } else {
            result.register_to(ioloop, slot)?;
        }
    }
    Ok(())
}

/// [`Waiter::wait_for_many`] with the default sample interval
pub fn wait_for_many_results<'a, I>(
    results: I,
    timeout: Option<Duration>,
) -> ExecOutcome<Vec<Option<&'a mut ExecResult>>>
where
    I: IntoIterator<Item = &'a mut ExecResult>,
{
    Waiter::default().wait_for_many(results, timeout)
}
