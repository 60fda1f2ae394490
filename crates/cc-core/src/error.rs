use thiserror::Error;

/// Error taxonomy for the contention harness.
#[derive(Debug, Error)]
pub enum CcError {
    /// Mismatched jagged-array shapes, out-of-range fence level, `-A` length
    /// mismatch, or an impossible stride/repetition combination.
    #[error("config error: {0}")]
    Config(String),

    /// Buffer or tracker allocation failure. NUMA fallback is not an error.
    #[error("allocation error: {0}")]
    Alloc(String),

    /// OS/thread primitive failure: pin, create, join, barrier.
    #[error("system error: {0}")]
    System(String),

    /// Unknown `test_id` observed by a worker. Non-fatal: the worker logs
    /// this once and emits a no-op sample so PFD sample counts stay aligned.
    #[error("kernel internal error: {0}")]
    KernelInternal(String),
}

impl CcError {
    pub fn config(msg: impl Into<String>) -> Self {
        CcError::Config(msg.into())
    }

    pub fn alloc(msg: impl Into<String>) -> Self {
        CcError::Alloc(msg.into())
    }

    pub fn system(msg: impl Into<String>) -> Self {
        CcError::System(msg.into())
    }

    pub fn kernel_internal(msg: impl Into<String>) -> Self {
        CcError::KernelInternal(msg.into())
    }
}

pub type CcResult<T> = Result<T, CcError>;
