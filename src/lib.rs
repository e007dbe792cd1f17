//! PHOLD: a partitioned-conservative discrete-event simulation benchmark.
//!
//! The classical Fujimoto synthetic workload — N logical processes
//! exchanging time-stamped events over a fully-connected graph with a
//! positive lookahead — implemented as a library with a thin CLI shell
//! around it (`src/bin/phold.rs`).

pub mod collective;
pub mod config;
pub mod error;
pub mod event;
pub mod link;
pub mod logging;
pub mod lp;
pub mod rng;
pub mod scheduler;
pub mod stats;
pub mod tree;

pub use config::Config;
pub use config::ConfigBuilder;
pub use config::PartitionStrategy;
pub use error::PholdError;
pub use error::PholdResult;
pub use stats::Report;

/// Runs one complete simulation from a validated [`Config`] to a [`Report`].
pub fn run(cfg: &Config) -> PholdResult<Report> {
    scheduler::run(cfg)
}
