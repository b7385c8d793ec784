//! Persistent compilation state storage keyed by task identity.
//!
//! Each task's snapshot is one binary file named by the hash of the task
//! identity. The file starts with a length-prefixed header (magic bytes,
//! format version, producer version, payload checksum) followed by the
//! bincode-encoded [`CompilationState`]. Any validation failure is a miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cinder_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::state::CompilationState;

/// Magic bytes identifying a Cinder state snapshot.
const SNAPSHOT_MAGIC: [u8; 4] = *b"CNDR";

/// Current snapshot format version. Increment on breaking changes to
/// the header or payload format.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Upper bound on the encoded header. Decoding never claims more than this,
/// so a corrupt string length in the header cannot trigger a huge allocation.
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Upper bound on the encoded compilation state.
const MAX_PAYLOAD_BYTES: usize = 1 << 30;

/// File extension for snapshot files.
const SNAPSHOT_EXT: &str = "state";

/// Key-value storage of compilation state snapshots.
///
/// Implementations need not serialize concurrent builds of the same task:
/// callers must not run two read-modify-write cycles for one task identity
/// at the same time.
pub trait CompilationStateStore {
    /// Returns the last stored snapshot for `task`, or `None` if there is none
    /// or it cannot be read. Never fails: an unusable snapshot means a full rebuild.
    fn load(&self, task: &str) -> Option<CompilationState>;

    /// Replaces the snapshot for `task`. On error the previous snapshot remains.
    fn store(&self, task: &str, state: &CompilationState) -> Result<(), StateError>;
}

/// Header prepended to every snapshot for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    /// Magic bytes: must be `b"CNDR"`.
    magic: [u8; 4],

    /// Snapshot format version.
    format_version: u32,

    /// Producer version; snapshots from another producer version are discarded.
    producer_version: String,

    /// Task identity the snapshot belongs to, guarding against hash collisions.
    task: String,

    /// Content hash of the payload data.
    checksum: ContentHash,
}

/// Directory-backed snapshot store.
///
/// Snapshots live at `<state_dir>/<hash(task)>.state`. Writes go to a
/// temporary sibling file that is then renamed over the old snapshot.
#[derive(Debug)]
pub struct FileStateStore {
    /// Directory holding snapshot files.
    state_dir: PathBuf,

    /// Version string of the producing tool.
    producer_version: String,
}

impl FileStateStore {
    /// Creates a store rooted at `state_dir`. The directory is created on first write.
    pub fn new(state_dir: &Path, producer_version: &str) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            producer_version: producer_version.to_string(),
        }
    }

    /// Returns the snapshot file path for a task identity.
    pub fn snapshot_path(&self, task: &str) -> PathBuf {
        self.state_dir
            .join(format!("{}.{SNAPSHOT_EXT}", snapshot_key(task)))
    }

    /// Reads and validates the snapshot for `task`.
    pub fn read_snapshot(&self, task: &str) -> Result<CompilationState, StateError> {
        let path = self.snapshot_path(task);
        let raw = std::fs::read(&path).map_err(|e| StateError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.decode(&path, task, &raw)
    }

    /// Deletes the snapshot for `task`. Returns `true` if one existed.
    pub fn remove(&self, task: &str) -> Result<bool, StateError> {
        let path = self.snapshot_path(task);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StateError::Io { path, source: e }),
        }
    }

    /// Removes snapshots of every task not in `live_tasks`.
    ///
    /// Returns the number of files removed.
    pub fn gc(&self, live_tasks: &[&str]) -> Result<usize, StateError> {
        if !self.state_dir.exists() {
            return Ok(0);
        }
        let live_keys: Vec<String> = live_tasks.iter().map(|t| snapshot_key(t)).collect();

        let mut removed = 0;
        let entries = std::fs::read_dir(&self.state_dir).map_err(|e| StateError::Io {
            path: self.state_dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| StateError::Io {
                path: self.state_dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !live_keys.iter().any(|k| k == stem) {
                        std::fs::remove_file(&path).map_err(|e| StateError::Io {
                            path: path.clone(),
                            source: e,
                        })?;
                        removed += 1;
                    }
                }
            }
        }

        tracing::debug!(removed, "collected stale snapshots");
        Ok(removed)
    }

    fn encode(&self, task: &str, state: &CompilationState) -> Result<Vec<u8>, StateError> {
        let payload = bincode::serde::encode_to_vec(state, bincode::config::standard())
            .map_err(|e| StateError::Serialization {
                reason: e.to_string(),
            })?;

        let header = SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            producer_version: self.producer_version.clone(),
            task: task.to_string(),
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| StateError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        if header_bytes.len() > MAX_HEADER_BYTES {
            return Err(StateError::Serialization {
                reason: format!("snapshot header exceeds {MAX_HEADER_BYTES} bytes"),
            });
        }
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(StateError::Serialization {
                reason: format!("compilation state exceeds {MAX_PAYLOAD_BYTES} bytes"),
            });
        }
        let header_len = u32::try_from(header_bytes.len()).map_err(|_| StateError::Serialization {
            reason: "snapshot header too large".to_string(),
        })?;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);
        Ok(output)
    }

    fn decode(&self, path: &Path, task: &str, raw: &[u8]) -> Result<CompilationState, StateError> {
        let invalid = |reason: &str| StateError::InvalidHeader {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let len_bytes: [u8; 4] = raw
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("truncated header length"))?;
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if header_len > MAX_HEADER_BYTES {
            return Err(invalid("header length out of range"));
        }
        let header_bytes = raw
            .get(4..4 + header_len)
            .ok_or_else(|| invalid("truncated header"))?;

        let header_config = bincode::config::standard().with_limit::<MAX_HEADER_BYTES>();
        let (header, _): (SnapshotHeader, usize) =
            bincode::serde::decode_from_slice(header_bytes, header_config)
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != SNAPSHOT_MAGIC {
            return Err(invalid("missing magic bytes"));
        }
        if header.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StateError::VersionMismatch {
                path: path.to_path_buf(),
                expected: SNAPSHOT_FORMAT_VERSION.to_string(),
                actual: header.format_version.to_string(),
            });
        }
        if header.producer_version != self.producer_version {
            return Err(StateError::VersionMismatch {
                path: path.to_path_buf(),
                expected: self.producer_version.clone(),
                actual: header.producer_version,
            });
        }
        if header.task != task {
            return Err(invalid("snapshot belongs to another task"));
        }

        let payload = &raw[4 + header_len..];
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(invalid("payload length out of range"));
        }
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(StateError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        let payload_config = bincode::config::standard().with_limit::<MAX_PAYLOAD_BYTES>();
        let (state, _): (CompilationState, usize) =
            bincode::serde::decode_from_slice(payload, payload_config).map_err(|e| {
                StateError::Serialization {
                    reason: e.to_string(),
                }
            })?;
        Ok(state)
    }
}

impl CompilationStateStore for FileStateStore {
    fn load(&self, task: &str) -> Option<CompilationState> {
        match self.read_snapshot(task) {
            Ok(state) => Some(state),
            Err(StateError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(task, "no previous compilation state");
                None
            }
            Err(err) => {
                tracing::warn!(task, %err, "discarding unusable compilation state");
                None
            }
        }
    }

    fn store(&self, task: &str, state: &CompilationState) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.state_dir).map_err(|e| StateError::Io {
            path: self.state_dir.clone(),
            source: e,
        })?;
        let bytes = self.encode(task, state)?;

        let path = self.snapshot_path(task);
        let tmp = path.with_extension(format!("{SNAPSHOT_EXT}.tmp"));
        std::fs::write(&tmp, &bytes).map_err(|e| StateError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            StateError::Io {
                path: path.clone(),
                source: e,
            }
        })?;

        tracing::debug!(task, files = state.len(), "stored compilation state");
        Ok(())
    }
}

/// In-memory snapshot store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    snapshots: Mutex<HashMap<String, CompilationState>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the snapshot for `task`, as if its storage had been lost.
    pub fn forget(&self, task: &str) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.remove(task);
        }
    }
}

impl CompilationStateStore for MemoryStateStore {
    fn load(&self, task: &str) -> Option<CompilationState> {
        self.snapshots.lock().ok()?.get(task).cloned()
    }

    fn store(&self, task: &str, state: &CompilationState) -> Result<(), StateError> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|e| StateError::LockPoisoned {
                reason: e.to_string(),
            })?;
        snapshots.insert(task.to_string(), state.clone());
        Ok(())
    }
}

/// File stem for a task identity: the hex content hash of the identity string.
fn snapshot_key(task: &str) -> String {
    ContentHash::from_bytes(task.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CompilationStateBuilder, SourceFileState};
    use cinder_includes::{IncludeDirective, IncludeDirectives, ResolvedInclude};

    const TASK: &str = ":app:compileCpp";

    fn make_store() -> (tempfile::TempDir, FileStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(&dir.path().join("state"), "0.1.0");
        (dir, store)
    }

    fn sample_state() -> CompilationState {
        let header = ContentHash::from_bytes(b"util");
        let mut builder = CompilationStateBuilder::new();
        builder.add_source_file(PathBuf::from("/p/main.c"));
        builder.add_file_state(SourceFileState {
            path: PathBuf::from("/p/main.c"),
            content_hash: ContentHash::from_bytes(b"main"),
            include_directives: IncludeDirectives::new(vec![IncludeDirective::quoted("util.h")]),
            resolved_includes: vec![ResolvedInclude::resolved(
                IncludeDirective::quoted("util.h"),
                PathBuf::from("/p/util.h"),
                header,
            )],
        });
        builder.add_file_state(SourceFileState {
            path: PathBuf::from("/p/util.h"),
            content_hash: header,
            include_directives: IncludeDirectives::default(),
            resolved_includes: vec![],
        });
        builder.build()
    }

    /// Writes a snapshot file by hand with the given header fields.
    fn write_raw(store: &FileStateStore, header: &SnapshotHeader, payload: &[u8]) {
        let header_bytes =
            bincode::serde::encode_to_vec(header, bincode::config::standard()).unwrap();
        let mut output = Vec::new();
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);
        std::fs::create_dir_all(&store.state_dir).unwrap();
        std::fs::write(store.snapshot_path(TASK), output).unwrap();
    }

    fn valid_header(payload: &[u8]) -> SnapshotHeader {
        SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            format_version: SNAPSHOT_FORMAT_VERSION,
            producer_version: "0.1.0".to_string(),
            task: TASK.to_string(),
            checksum: ContentHash::from_bytes(payload),
        }
    }

    fn encoded_payload() -> Vec<u8> {
        bincode::serde::encode_to_vec(sample_state(), bincode::config::standard()).unwrap()
    }

    #[test]
    fn store_and_load_roundtrip() {
        let (_dir, store) = make_store();
        let state = sample_state();
        store.store(TASK, &state).unwrap();
        assert_eq!(store.load(TASK), Some(state));
    }

    #[test]
    fn load_missing_returns_none() {
        let (_dir, store) = make_store();
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn tasks_are_isolated() {
        let (_dir, store) = make_store();
        store.store(TASK, &sample_state()).unwrap();
        assert!(store.load(":lib:compileC").is_none());
        assert_ne!(store.snapshot_path(TASK), store.snapshot_path(":lib:compileC"));
    }

    #[test]
    fn store_replaces_previous_snapshot() {
        let (_dir, store) = make_store();
        store.store(TASK, &sample_state()).unwrap();
        store.store(TASK, &CompilationState::empty()).unwrap();
        assert_eq!(store.load(TASK), Some(CompilationState::empty()));
        assert!(!store.snapshot_path(TASK).with_extension("state.tmp").exists());
    }

    #[test]
    fn load_garbage_returns_none() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(&store.state_dir).unwrap();
        std::fs::write(store.snapshot_path(TASK), b"garbage data").unwrap();
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn load_huge_string_length_in_header_returns_none() {
        let (_dir, store) = make_store();
        // magic, format version 1, then a producer_version whose varint
        // length claims 2^50 bytes.
        let mut header = b"CNDR".to_vec();
        header.push(1);
        header.push(253);
        header.extend_from_slice(&(1u64 << 50).to_le_bytes());
        let mut raw = (header.len() as u32).to_le_bytes().to_vec();
        raw.extend_from_slice(&header);
        std::fs::create_dir_all(&store.state_dir).unwrap();
        std::fs::write(store.snapshot_path(TASK), &raw).unwrap();

        assert!(matches!(
            store.read_snapshot(TASK),
            Err(StateError::InvalidHeader { .. })
        ));
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn load_oversized_header_length_returns_none() {
        let (_dir, store) = make_store();
        let mut raw = u32::MAX.to_le_bytes().to_vec();
        raw.extend_from_slice(b"CNDR");
        std::fs::create_dir_all(&store.state_dir).unwrap();
        std::fs::write(store.snapshot_path(TASK), &raw).unwrap();
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn memory_store_reports_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStateStore::new());
        let poisoner = std::sync::Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.snapshots.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        let err = store.store(TASK, &CompilationState::empty()).unwrap_err();
        assert!(matches!(err, StateError::LockPoisoned { .. }));
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn load_truncated_returns_none() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(&store.state_dir).unwrap();
        std::fs::write(store.snapshot_path(TASK), b"AB").unwrap();
        assert!(matches!(
            store.read_snapshot(TASK),
            Err(StateError::InvalidHeader { .. })
        ));
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn wrong_magic_rejected() {
        let (_dir, store) = make_store();
        let payload = encoded_payload();
        let mut header = valid_header(&payload);
        header.magic = *b"BAAD";
        write_raw(&store, &header, &payload);
        assert!(matches!(
            store.read_snapshot(TASK),
            Err(StateError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn wrong_format_version_rejected() {
        let (_dir, store) = make_store();
        let payload = encoded_payload();
        let mut header = valid_header(&payload);
        header.format_version = 999;
        write_raw(&store, &header, &payload);
        assert!(matches!(
            store.read_snapshot(TASK),
            Err(StateError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn other_producer_version_rejected() {
        let (dir, store) = make_store();
        store.store(TASK, &sample_state()).unwrap();
        let newer = FileStateStore::new(&dir.path().join("state"), "0.2.0");
        assert!(newer.load(TASK).is_none());
    }

    #[test]
    fn checksum_mismatch_rejected() {
        let (_dir, store) = make_store();
        let payload = encoded_payload();
        let header = valid_header(b"something else");
        write_raw(&store, &header, &payload);
        assert!(matches!(
            store.read_snapshot(TASK),
            Err(StateError::ChecksumMismatch { .. })
        ));
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn store_into_unwritable_location_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"a file, not a directory").unwrap();
        let store = FileStateStore::new(&blocker.join("state"), "0.1.0");
        let err = store.store(TASK, &sample_state()).unwrap_err();
        assert!(matches!(err, StateError::Io { .. }));
    }

    #[test]
    fn remove_snapshot() {
        let (_dir, store) = make_store();
        store.store(TASK, &sample_state()).unwrap();
        assert!(store.remove(TASK).unwrap());
        assert!(!store.remove(TASK).unwrap());
        assert!(store.load(TASK).is_none());
    }

    #[test]
    fn gc_removes_stale_tasks() {
        let (_dir, store) = make_store();
        store.store(TASK, &sample_state()).unwrap();
        store.store(":old:compileC", &sample_state()).unwrap();

        let removed = store.gc(&[TASK]).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load(TASK).is_some());
        assert!(store.load(":old:compileC").is_none());
    }

    #[test]
    fn gc_nonexistent_dir_returns_zero() {
        let (_dir, store) = make_store();
        assert_eq!(store.gc(&[]).unwrap(), 0);
    }

    #[test]
    fn memory_store_roundtrip_and_forget() {
        let store = MemoryStateStore::new();
        assert!(store.load(TASK).is_none());
        store.store(TASK, &sample_state()).unwrap();
        assert_eq!(store.load(TASK), Some(sample_state()));
        store.forget(TASK);
        assert!(store.load(TASK).is_none());
    }
}
