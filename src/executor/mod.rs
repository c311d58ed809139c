//! Process execution core
//!
//! Provides:
//! - Non-blocking pipe I/O with bounded would-block retries
//! - A readiness multiplexer over process pipes
//! - The per-process result state machine
//! - Waiting on many results with deadlines, from sync or async code

pub mod asynchronous;
pub mod io;
pub mod ioloop;
pub mod result;
pub mod waiting;

pub use asynchronous::{
    wait_async, wait_async_with, wait_for_many_async, wait_for_many_async_with,
};
pub use io::{read_chunk, set_non_blocking, write_chunk};
pub use ioloop::{IoLoop, Readiness};
pub use result::{ExecResult, Stream, StreamHandler};
pub use waiting::{wait_for_many_results, Waiter, DEFAULT_SAMPLE_INTERVAL, MIN_SAMPLE_INTERVAL};
