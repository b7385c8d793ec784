//! Result of diffing one build against the previous snapshot.

use std::collections::BTreeSet;
use std::path::PathBuf;

use cinder_state::CompilationState;

/// What the next compile step must do, and the state to persist afterwards.
#[derive(Debug, Clone)]
pub struct IncrementalCompilation {
    /// Root sources that must be compiled.
    pub recompile: BTreeSet<PathBuf>,

    /// Root sources of the previous build that are gone; their outputs
    /// should be cleaned.
    pub removed: BTreeSet<PathBuf>,

    /// Every header reachable from the current root sources.
    pub discovered_headers: BTreeSet<PathBuf>,

    /// `true` if some tracked file has an include that cannot be resolved
    /// statically.
    pub unresolved_headers: bool,

    /// Snapshot to persist once the compile step succeeds.
    pub final_state: CompilationState,
}

impl IncrementalCompilation {
    /// Returns `true` if nothing needs compiling or cleaning.
    pub fn is_up_to_date(&self) -> bool {
        self.recompile.is_empty() && self.removed.is_empty()
    }
}
