//! Error types for compilation state persistence.

use std::path::PathBuf;

/// Errors from reading or writing compilation state snapshots.
///
/// [`CompilationStateStore::load`](crate::CompilationStateStore::load) turns
/// every variant into "no previous state", so only write errors reach callers.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A snapshot file or the state directory could not be accessed.
    #[error("cannot access snapshot {path}: {source}")]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot is truncated, lacks the `CNDR` magic, or belongs to
    /// another task.
    #[error("snapshot {path} is not usable: {reason}")]
    InvalidHeader {
        /// The snapshot file.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// The payload does not hash to the checksum recorded in the header.
    #[error("snapshot {path} is corrupt: payload hash {actual} does not match recorded {expected}")]
    ChecksumMismatch {
        /// The snapshot file.
        path: PathBuf,
        /// Hash recorded in the header.
        expected: String,
        /// Hash of the payload as read.
        actual: String,
    },

    /// The snapshot was written with another format or producer version.
    #[error("snapshot {path} was written by version {actual}, expected {expected}")]
    VersionMismatch {
        /// The snapshot file.
        path: PathBuf,
        /// Version this store reads.
        expected: String,
        /// Version recorded in the snapshot.
        actual: String,
    },

    /// Another thread panicked while holding the in-memory store's lock.
    #[error("state store lock poisoned: {reason}")]
    LockPoisoned {
        /// Lock error message.
        reason: String,
    },

    /// Compilation state could not be encoded or decoded.
    #[error("cannot encode compilation state: {reason}")]
    Serialization {
        /// Encoder or decoder message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_names_the_path() {
        let err = StateError::Io {
            path: PathBuf::from("/work/.cinder-cache/abc.state"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "cannot access snapshot /work/.cinder-cache/abc.state: denied"
        );
    }

    #[test]
    fn checksum_mismatch_shows_both_hashes() {
        let err = StateError::ChecksumMismatch {
            path: PathBuf::from("abc.state"),
            expected: "aabb".to_string(),
            actual: "ccdd".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("corrupt"));
        assert!(msg.contains("payload hash ccdd"));
        assert!(msg.contains("recorded aabb"));
    }

    #[test]
    fn lock_poisoned_message() {
        let err = StateError::LockPoisoned {
            reason: "poisoned lock: another task failed inside".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "state store lock poisoned: poisoned lock: another task failed inside"
        );
    }

    #[test]
    fn version_mismatch_shows_versions() {
        let err = StateError::VersionMismatch {
            path: PathBuf::from("abc.state"),
            expected: "0.2.0".to_string(),
            actual: "0.1.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "snapshot abc.state was written by version 0.1.0, expected 0.2.0"
        );
    }
}
