use thiserror::Error;

/// Closed taxonomy of the fatal, run-aborting conditions this crate can
/// raise.
///
/// A receiver-mismatch at end of run is deliberately not a variant here: it
/// is a non-fatal discrepancy, so it is surfaced as a plain field on
/// [`crate::stats::Report`] instead of propagated through `Result`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PholdError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("causality violation: event arrival {arrival} < local virtual time {lvt} on partition {partition}")]
    CausalityViolation {
        partition: usize,
        arrival: u64,
        lvt: u64,
    },

    #[error("collective protocol violation at lp {lp} phase {phase}: {reason}")]
    CollectiveProtocolViolation {
        lp: usize,
        phase: usize,
        reason: String,
    },

    #[error("lp {lp} could not schedule a live event before stop after {attempts} attempts")]
    StopReachedWithoutLiveEvent { lp: usize, attempts: usize },
}

impl PholdError {
    /// Process exit code an enclosing CLI should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PholdError::ConfigInvalid(_) => 1,
            PholdError::CausalityViolation { .. } => 2,
            PholdError::CollectiveProtocolViolation { .. } => 3,
            PholdError::StopReachedWithoutLiveEvent { .. } => 3,
        }
    }
}

pub type PholdResult<T> = Result<T, PholdError>;
