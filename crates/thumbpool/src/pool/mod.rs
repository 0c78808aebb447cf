//! The worker pool.
//!
//! - `config` - pool shape and validation.
//! - `dispatcher` - round-robin routing, generation broadcast, shutdown.
//! - `worker` - the per-thread request loop.

mod config;
mod dispatcher;
mod worker;

pub use config::*;
pub use dispatcher::*;

#[cfg(test)]
mod tests;
