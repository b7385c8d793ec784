//! Conformance test helpers for the Cinder compilation engine.
//!
//! Provides on-disk project fixtures and a build harness that runs the
//! incremental driver with a recording compiler, returning structured results
//! for assertion in integration tests.

#![warn(missing_docs)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use cinder_config::{load_config, resolve_settings, CompileSettings};
use cinder_includes::{IncludeResolver, SourceIncludesParser};
use cinder_incremental::{
    CompileError, CompileRequest, CompileSpec, IncrementalCompilation, IncrementalCompileProcessor,
    IncrementalNativeCompiler, NativeCompiler, WorkResult,
};
use cinder_state::{CompilationState, CompilationStateStore};
use tempfile::TempDir;

static TRACING_INIT: Once = Once::new();

/// Installs a test subscriber when `RUST_LOG` is set. Safe to call repeatedly.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_test_writer().with_target(true))
                .with(EnvFilter::from_default_env())
                .try_init();
        }
    });
}

/// A C project in a temporary directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    /// Creates an empty project.
    pub fn new() -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().expect("create project directory"),
        }
    }

    /// The project directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a project-relative file.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Writes `content` to a project-relative file, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(&path, content).expect("write project file");
        path
    }

    /// Deletes a project-relative file.
    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("remove project file");
    }

    /// Writes `cinder.toml` and returns the settings it resolves to.
    pub fn configure(&self, toml: &str) -> CompileSettings {
        self.write(cinder_config::loader::CONFIG_FILE, toml);
        let config = load_config(self.root()).expect("load cinder.toml");
        resolve_settings(&config, self.root())
    }
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

/// A [`NativeCompiler`] that records every request and never fails.
#[derive(Debug, Default)]
pub struct RecordingCompiler {
    requests: Mutex<Vec<CompileRequest>>,
}

impl RecordingCompiler {
    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl NativeCompiler for RecordingCompiler {
    fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<WorkResult, Box<dyn std::error::Error + Send + Sync>> {
        self.requests
            .lock()
            .map_err(|e| e.to_string())?
            .push(request.clone());
        Ok(WorkResult {
            did_work: !request.source_files.is_empty() || !request.removed_source_files.is_empty(),
        })
    }
}

/// Result of one build through [`Harness::build`].
#[derive(Debug)]
pub struct BuildResult {
    /// Sources the processor decided to recompile.
    pub recompile: BTreeSet<PathBuf>,
    /// Sources removed since the previous build.
    pub removed: BTreeSet<PathBuf>,
    /// Headers reachable from the sources.
    pub discovered_headers: BTreeSet<PathBuf>,
    /// Inputs reported to the surrounding build.
    pub discovered_inputs: BTreeSet<PathBuf>,
    /// What the compiler was asked to do.
    pub request: CompileRequest,
    /// The snapshot stored by this build.
    pub final_state: CompilationState,
}

/// Runs builds of one task against a state store.
pub struct Harness<S> {
    compiler: IncrementalNativeCompiler<S, RecordingCompiler>,
}

impl<S: CompilationStateStore> Harness<S> {
    /// Creates a harness persisting state in `store`.
    pub fn new(store: S) -> Self {
        Self {
            compiler: IncrementalNativeCompiler::new(store, RecordingCompiler::default()),
        }
    }

    /// The state store.
    pub fn store(&self) -> &S {
        self.compiler.store()
    }

    /// Runs one build of `spec`.
    pub fn build(&self, spec: &CompileSpec) -> Result<BuildResult, CompileError> {
        let mut discovered_inputs: BTreeSet<PathBuf> = BTreeSet::new();
        let outcome = self.compiler.execute(spec, &mut discovered_inputs)?;
        let request = self
            .compiler
            .delegate()
            .requests()
            .pop()
            .unwrap_or_else(|| CompileRequest {
                source_files: BTreeSet::new(),
                removed_source_files: BTreeSet::new(),
                clean_outputs: false,
                include_directives: Default::default(),
            });
        let compilation = outcome.compilation;
        Ok(BuildResult {
            recompile: compilation.recompile,
            removed: compilation.removed,
            discovered_headers: compilation.discovered_headers,
            discovered_inputs,
            request,
            final_state: compilation.final_state,
        })
    }
}

/// Builds a compile spec for `task` tracking `#import` as `#include`.
pub fn spec(task: &str, sources: &[PathBuf], include_roots: &[PathBuf]) -> CompileSpec {
    CompileSpec {
        task_path: task.to_string(),
        source_files: sources.to_vec(),
        include_roots: include_roots.to_vec(),
        incremental: true,
        imports_are_includes: true,
    }
}

/// Runs the processor directly against `previous`.
pub fn process(
    previous: &CompilationState,
    sources: &[PathBuf],
    include_roots: &[PathBuf],
) -> Result<IncrementalCompilation, CompileError> {
    IncrementalCompileProcessor::new(
        previous.clone(),
        SourceIncludesParser::new(true),
        IncludeResolver::new(include_roots.to_vec()),
    )
    .process_source_files(sources)
}

/// Collects paths into a sorted set.
pub fn paths<'a>(items: impl IntoIterator<Item = &'a PathBuf>) -> BTreeSet<PathBuf> {
    items.into_iter().cloned().collect()
}
