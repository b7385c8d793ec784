//! Diffing a build against the previous snapshot.
//!
//! The processor scans the current root sources into a fresh
//! [`CompilationState`], then decides which sources to recompile:
//!
//! - sources absent from the previous build are recompiled;
//! - sources gone since the previous build are reported as removed;
//! - a file (source or header) whose content hash or include resolution
//!   differs from the previous snapshot is a change seed;
//! - a file with an include that cannot be resolved statically is a seed on
//!   every build;
//! - every source that reaches a seed through the reverse include graph is
//!   recompiled.
//!
//! The previous snapshot is only read, never modified.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use cinder_common::normalize_path;
use cinder_includes::{IncludeResolver, SourceIncludesParser};
use cinder_state::{CompilationState, CompilationStateBuilder, SourceFileState};

use crate::collector::HeaderDependencyCollector;
use crate::compilation::IncrementalCompilation;
use crate::error::CompileError;
use crate::files::IncrementalCompileFiles;

/// Computes the [`IncrementalCompilation`] for one build.
pub struct IncrementalCompileProcessor {
    previous: CompilationState,
    files: IncrementalCompileFiles,
}

impl IncrementalCompileProcessor {
    /// Creates a processor diffing against `previous`, which is empty for a
    /// first build or after the stored snapshot was lost.
    pub fn new(
        previous: CompilationState,
        parser: SourceIncludesParser,
        resolver: IncludeResolver,
    ) -> Self {
        Self {
            previous,
            files: IncrementalCompileFiles::new(parser, resolver),
        }
    }

    /// Scans `source_files` and computes what must be recompiled.
    ///
    /// Paths are normalized lexically and duplicates are ignored. Fails only
    /// if a source cannot be read.
    #[tracing::instrument(level = "debug", skip_all, fields(sources = source_files.len()))]
    pub fn process_source_files(
        mut self,
        source_files: &[PathBuf],
    ) -> Result<IncrementalCompilation, CompileError> {
        let sources: BTreeSet<PathBuf> = source_files.iter().map(|p| normalize_path(p)).collect();
        let source_list: Vec<PathBuf> = sources.iter().cloned().collect();

        let mut builder = CompilationStateBuilder::new();
        self.files.scan(&source_list, &mut builder)?;
        let final_state = builder.build();

        let previous_sources = self.previous.source_files();
        let added: BTreeSet<PathBuf> = sources.difference(previous_sources).cloned().collect();
        let removed: BTreeSet<PathBuf> = previous_sources.difference(&sources).cloned().collect();

        let seeds: Vec<&Path> = final_state
            .file_states()
            .filter(|state| state.has_unknown_includes() || self.has_changed(state))
            .map(|state| state.path.as_path())
            .collect();
        let dirty = propagate_to_includers(&final_state, &seeds);

        let recompile: BTreeSet<PathBuf> = sources
            .iter()
            .filter(|s| added.contains(*s) || dirty.contains(s.as_path()))
            .cloned()
            .collect();

        let discovered_headers =
            HeaderDependencyCollector::collect_header_dependencies(&final_state);
        let unresolved_headers = final_state.has_unknown_includes();

        tracing::debug!(
            added = added.len(),
            removed = removed.len(),
            seeds = seeds.len(),
            recompile = recompile.len(),
            headers = discovered_headers.len(),
            "incremental compilation computed"
        );

        Ok(IncrementalCompilation {
            recompile,
            removed,
            discovered_headers,
            unresolved_headers,
            final_state,
        })
    }

    /// Returns `true` if the file is new to the snapshot, its content changed,
    /// or any of its directives now resolves differently.
    fn has_changed(&self, current: &SourceFileState) -> bool {
        match self.previous.get_state(&current.path) {
            None => true,
            Some(previous) => {
                previous.content_hash != current.content_hash
                    || previous.resolved_includes != current.resolved_includes
            }
        }
    }
}

/// Returns every file that is a seed or includes one, directly or through
/// any chain of headers.
fn propagate_to_includers<'a>(
    state: &'a CompilationState,
    seeds: &[&'a Path],
) -> HashSet<&'a Path> {
    let mut includers: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for file in state.file_states() {
        for header in file.resolved_paths() {
            includers.entry(header).or_default().push(file.path.as_path());
        }
    }

    let mut dirty: HashSet<&Path> = seeds.iter().copied().collect();
    let mut queue: VecDeque<&Path> = seeds.iter().copied().collect();
    while let Some(path) = queue.pop_front() {
        for &includer in includers.get(path).into_iter().flatten() {
            if dirty.insert(includer) {
                queue.push_back(includer);
            }
        }
    }
    dirty
}
