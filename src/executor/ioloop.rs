//! Readiness multiplexer
//!
//! Holds two registration tables (read and write) mapping a pipe to a handler
//! value. One iteration polls every registered pipe, and for each ready one
//! **pops** its handler before invoking it, so a handler that wants to run
//! again has to register itself again. That keeps "read one chunk, then decide
//! whether to continue" free of re-entrant double registrations.
//!
//! Handlers are plain values of type `H`; the caller supplies the function that
//! dispatches them, which lets the dispatcher borrow whatever state the
//! handlers act on (see [`crate::executor::waiting`]).

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{ExecOutcome, RegistrationError};
use crate::sys::{self, Interest, RawPipe};

/// How much data a ready pipe is known to hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The platform reported this many bytes waiting
    Available(usize),
    /// Ready, but the amount is not known cheaply
    Unknown,
}

impl Readiness {
    /// Number of bytes a reader should ask for, using `fallback` when the
    /// amount is unknown
    pub fn limit(self, fallback: usize) -> usize {
        match self {
            Readiness::Available(n) => n,
            Readiness::Unknown => fallback,
        }
    }
}

impl From<Option<usize>> for Readiness {
    fn from(available: Option<usize>) -> Self {
        available.map_or(Readiness::Unknown, Readiness::Available)
    }
}

/// Registration tables plus the poll/dispatch loop
#[derive(Debug)]
pub struct IoLoop<H> {
    reads: HashMap<RawPipe, H>,
    writes: HashMap<RawPipe, H>,
}

impl<H> Default for IoLoop<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> IoLoop<H> {
    pub fn new() -> Self {
        Self {
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Drop every registration
    pub fn reset(&mut self) {
        self.reads.clear();
        self.writes.clear();
    }

    fn table(&mut self, interest: Interest) -> &mut HashMap<RawPipe, H> {
        match interest {
            Interest::Read => &mut self.reads,
            Interest::Write => &mut self.writes,
        }
    }

    fn register(&mut self, interest: Interest, pipe: RawPipe, handler: H) -> ExecOutcome<()> {
        let table = self.table(interest);
        if table.contains_key(&pipe) {
            return Err(RegistrationError::AlreadyRegistered { interest, pipe }.into());
        }
        table.insert(pipe, handler);
        tracing::trace!(?pipe, %interest, "registered");
        Ok(())
    }

    fn unregister(&mut self, interest: Interest, pipe: RawPipe) -> ExecOutcome<H> {
        self.table(interest)
            .remove(&pipe)
            .ok_or_else(|| RegistrationError::NotRegistered { interest, pipe }.into())
    }

    /// Register `handler` to run when `pipe` becomes readable.
    ///
    /// # Errors
    /// * `RegistrationError::AlreadyRegistered` if the pipe already has a read handler
    pub fn register_read(&mut self, pipe: RawPipe, handler: H) -> ExecOutcome<()> {
        self.register(Interest::Read, pipe, handler)
    }

    /// Register `handler` to run when `pipe` becomes writable.
    ///
    /// # Errors
    /// * `RegistrationError::AlreadyRegistered` if the pipe already has a write handler
    pub fn register_write(&mut self, pipe: RawPipe, handler: H) -> ExecOutcome<()> {
        self.register(Interest::Write, pipe, handler)
    }

    /// Remove and return the read handler of `pipe`.
    ///
    /// # Errors
    /// * `RegistrationError::NotRegistered` if there is none
    pub fn unregister_read(&mut self, pipe: RawPipe) -> ExecOutcome<H> {
        self.unregister(Interest::Read, pipe)
    }

    /// Remove and return the write handler of `pipe`.
    ///
    /// # Errors
    /// * `RegistrationError::NotRegistered` if there is none
    pub fn unregister_write(&mut self, pipe: RawPipe) -> ExecOutcome<H> {
        self.unregister(Interest::Write, pipe)
    }

    pub fn is_registered_read(&self, pipe: RawPipe) -> bool {
        self.reads.contains_key(&pipe)
    }

    pub fn is_registered_write(&self, pipe: RawPipe) -> bool {
        self.writes.contains_key(&pipe)
    }

    /// True if nothing is registered in either direction
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty() && self.writes.is_empty()
    }

    /// Poll once, for at most `timeout`, and run the handlers of ready pipes.
    ///
    /// `None` blocks until something is ready, `Some(Duration::ZERO)` only
    /// probes. With nothing registered the call just sleeps out the timeout
    /// (or returns at once when there is none).
    ///
    /// Returns whether anything was ready.
    pub fn do_iteration<F>(&mut self, timeout: Option<Duration>, mut invoke: F) -> ExecOutcome<bool>
    where
        F: FnMut(&mut Self, H, Readiness) -> ExecOutcome<()>,
    {
        if self.is_empty() {
            if let Some(timeout) = timeout {
                std::thread::sleep(timeout);
            }
            return Ok(false);
        }

        let reads = self.reads.keys().copied().collect::<Vec<_>>();
        let writes = self.writes.keys().copied().collect::<Vec<_>>();
        let ready = sys::poll_ready(&reads, &writes, timeout)?;

        for event in &ready {
            let handler = match event.interest {
                Interest::Read => self.reads.remove(&event.pipe),
                Interest::Write => self.writes.remove(&event.pipe),
            };
            // An earlier handler in this pass may have unregistered it.
            if let Some(handler) = handler {
                invoke(self, handler, Readiness::from(event.available))?;
            }
        }

        Ok(!ready.is_empty())
    }

    /// Run every read handler, ignoring readiness, until none is registered.
    ///
    /// Only meaningful once the writers are known to be gone (the process has
    /// exited): reads can no longer block and must be drained for the final
    /// output.
    pub fn flush<F>(&mut self, mut invoke: F) -> ExecOutcome<()>
    where
        F: FnMut(&mut Self, H, Readiness) -> ExecOutcome<()>,
    {
        while !self.reads.is_empty() {
            let pipes = self.reads.keys().copied().collect::<Vec<_>>();
            for pipe in pipes {
                if let Some(handler) = self.reads.remove(&pipe) {
                    invoke(self, handler, Readiness::Unknown)?;
                }
            }
        }
        Ok(())
    }
}
