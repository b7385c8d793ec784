//! Per-file compilation state and the immutable build snapshot.
//!
//! A [`CompilationState`] records, for one build of one task, the root sources
//! and a [`SourceFileState`] for every root source and every header reachable
//! from them. Snapshots are never edited: each build assembles a fresh one with
//! a [`CompilationStateBuilder`] while reading the previous one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use cinder_common::ContentHash;
use cinder_includes::{IncludeDirectives, ResolvedInclude};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Tracked state of one source or header file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileState {
    /// Normalized path of the file.
    pub path: PathBuf,

    /// Content hash when the file was last examined.
    pub content_hash: ContentHash,

    /// Directives parsed from the file, in source order.
    pub include_directives: IncludeDirectives,

    /// Resolution outcome of each directive, in the same order.
    pub resolved_includes: Vec<ResolvedInclude>,
}

impl SourceFileState {
    /// Returns `true` if the file's dependencies cannot be fully determined:
    /// either its content could not be parsed or some include is unknown.
    pub fn has_unknown_includes(&self) -> bool {
        self.include_directives.parse_failed()
            || self.resolved_includes.iter().any(ResolvedInclude::is_unknown)
    }

    /// Iterates the headers this file directly includes.
    pub fn resolved_paths(&self) -> impl Iterator<Item = &Path> {
        self.resolved_includes.iter().filter_map(ResolvedInclude::path)
    }
}

/// Immutable snapshot of every tracked file as of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationState {
    /// Root sources of the build.
    sources: BTreeSet<PathBuf>,

    /// State of every root source and every reachable header.
    files: BTreeMap<PathBuf, SourceFileState>,
}

impl CompilationState {
    /// Returns the state of a build that has never run.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the root sources.
    pub fn source_files(&self) -> &BTreeSet<PathBuf> {
        &self.sources
    }

    /// Returns `true` if `path` was a root source of this build.
    pub fn is_source_file(&self, path: &Path) -> bool {
        self.sources.contains(path)
    }

    /// Returns the tracked state of a file, source or header.
    pub fn get_state(&self, path: &Path) -> Option<&SourceFileState> {
        self.files.get(path)
    }

    /// Iterates every tracked file in path order.
    pub fn file_states(&self) -> impl Iterator<Item = &SourceFileState> {
        self.files.values()
    }

    /// Returns the number of tracked files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no file is tracked.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Returns `true` if any tracked file has an include that cannot be resolved.
    pub fn has_unknown_includes(&self) -> bool {
        self.files.values().any(SourceFileState::has_unknown_includes)
    }

    /// Renders the snapshot as pretty-printed JSON for inspection.
    pub fn to_json_pretty(&self) -> Result<String, StateError> {
        serde_json::to_string_pretty(self).map_err(|e| StateError::Serialization {
            reason: e.to_string(),
        })
    }
}

/// Assembles a new [`CompilationState`].
#[derive(Debug, Default)]
pub struct CompilationStateBuilder {
    sources: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, SourceFileState>,
}

impl CompilationStateBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as a root source. Its state must also be added.
    pub fn add_source_file(&mut self, path: PathBuf) {
        self.sources.insert(path);
    }

    /// Records the state of a file. A later state for the same path replaces
    /// the earlier one.
    pub fn add_file_state(&mut self, state: SourceFileState) {
        self.files.insert(state.path.clone(), state);
    }

    /// Finishes the snapshot.
    pub fn build(self) -> CompilationState {
        debug_assert!(
            self.sources.iter().all(|s| self.files.contains_key(s)),
            "every root source must have a recorded state"
        );
        CompilationState {
            sources: self.sources,
            files: self.files,
        }
    }
}
