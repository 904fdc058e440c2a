use thiserror::Error;

/// Failure kinds for store operations.
///
/// Everything is caught at the boundary of the operation that produced it
/// and surfaced as a store-visible error string; commands convert to
/// `String` for the IPC layer.
#[derive(Debug, Error)]
pub enum Error {
    /// External command could not be spawned or exited non-zero.
    #[error("command failed: {0}")]
    Command(String),

    /// Command output did not match the expected shape.
    #[error("unexpected output: {0}")]
    Parse(String),

    /// Settings persistence read/write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Termination refused by the protected-process guard.
    #[error("process '{0}' is protected and will not be terminated")]
    ProtectedTarget(String),
}
