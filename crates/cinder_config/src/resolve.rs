//! Settings resolution: anchoring configured paths and applying toolchain policy.

use crate::types::{CinderConfig, ToolChainKind};
use cinder_common::normalize_path;
use std::path::{Path, PathBuf};

/// Fully resolved settings for one compile task.
///
/// All paths are anchored at the project directory and normalized. The
/// `#import` policy is decided: an explicit override wins, otherwise the
/// toolchain family decides.
#[derive(Debug, Clone)]
pub struct CompileSettings {
    /// Opaque task identity keying the persisted compilation state.
    pub task_path: String,
    /// Whether only changed sources are compiled.
    pub incremental: bool,
    /// The toolchain family.
    pub toolchain: ToolChainKind,
    /// Whether `#import` directives are tracked as includes.
    pub imports_are_includes: bool,
    /// Include roots in search order.
    pub include_roots: Vec<PathBuf>,
    /// Root source files.
    pub source_files: Vec<PathBuf>,
    /// Snapshot directory.
    pub cache_dir: PathBuf,
}

/// Resolves a parsed configuration against the project directory it came from.
///
/// Relative paths are joined onto `project_dir`; absolute paths are kept.
/// Include root order is preserved exactly as declared.
pub fn resolve_settings(config: &CinderConfig, project_dir: &Path) -> CompileSettings {
    let anchor = |p: &str| normalize_path(&project_dir.join(p));
    let toolchain = config.toolchain.kind;
    CompileSettings {
        task_path: config.task.path.clone(),
        incremental: config.task.incremental,
        toolchain,
        imports_are_includes: config
            .toolchain
            .imports_are_includes
            .unwrap_or_else(|| toolchain.imports_are_includes()),
        include_roots: config.includes.roots.iter().map(|r| anchor(r)).collect(),
        source_files: config.sources.files.iter().map(|f| anchor(f)).collect(),
        cache_dir: anchor(&config.cache.dir),
    }
}
