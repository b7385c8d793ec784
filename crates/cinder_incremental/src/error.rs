//! Error types for incremental compilation.

use std::path::PathBuf;

use cinder_state::StateError;

/// Errors that abort one incremental compile step.
///
/// Problems with individual headers, unparsable content, and unusable
/// previous snapshots are recovered from by recompiling more, so they never
/// appear here.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// A root source file could not be read. No recompile set is produced.
    #[error("cannot read source file {path}: {source}")]
    SourceUnreadable {
        /// The unreadable source.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The new compilation state could not be persisted. The previous
    /// snapshot is left in place.
    #[error("failed to persist compilation state for {task}: {source}")]
    SnapshotWriteFailed {
        /// Task identity whose snapshot was being written.
        task: String,
        /// The underlying store error.
        source: StateError,
    },

    /// The delegate compiler reported a failure.
    #[error("compilation failed: {0}")]
    Compiler(#[source] Box<dyn std::error::Error + Send + Sync>),
}
