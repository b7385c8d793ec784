//! Collection of the headers a build depends on.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use cinder_state::CompilationState;

use crate::compilation::IncrementalCompilation;

/// Computes header closures over a [`CompilationState`].
pub struct HeaderDependencyCollector;

impl HeaderDependencyCollector {
    /// Returns every header reachable through resolved includes from any
    /// root source of `state`. Root sources themselves are not included.
    pub fn collect_header_dependencies(state: &CompilationState) -> BTreeSet<PathBuf> {
        let mut visited: HashSet<&Path> = HashSet::new();
        let mut stack: Vec<&Path> = state.source_files().iter().map(PathBuf::as_path).collect();
        let mut headers = BTreeSet::new();

        while let Some(path) = stack.pop() {
            if !visited.insert(path) {
                continue;
            }
            if !state.is_source_file(path) {
                headers.insert(path.to_path_buf());
            }
            if let Some(file) = state.get_state(path) {
                stack.extend(file.resolved_paths().filter(|p| !visited.contains(p)));
            }
        }
        headers
    }

    /// Returns the inputs the surrounding build should track for `compilation`.
    ///
    /// These are the discovered headers. When some include could not be
    /// resolved statically, any file under the include roots might be the one
    /// it names, so the include root directories are added as well.
    pub fn collect_discovered_inputs(
        compilation: &IncrementalCompilation,
        include_roots: &[PathBuf],
    ) -> BTreeSet<PathBuf> {
        let mut inputs = compilation.discovered_headers.clone();
        if compilation.unresolved_headers {
            tracing::info!(
                roots = include_roots.len(),
                "cannot determine changed state of included files; treating include roots as inputs"
            );
            inputs.extend(include_roots.iter().cloned());
        }
        inputs
    }
}
