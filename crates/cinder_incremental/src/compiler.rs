//! The incremental compile driver.
//!
//! [`IncrementalNativeCompiler`] wraps a delegate [`NativeCompiler`]: it loads
//! the previous snapshot, computes the [`IncrementalCompilation`], reports the
//! discovered inputs, hands the delegate only the sources that need work, and
//! persists the new snapshot once the delegate succeeds.

use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::path::{Path, PathBuf};

use cinder_config::CompileSettings;
use cinder_includes::{IncludeDirectives, IncludeResolver, SourceIncludesParser};
use cinder_state::{CompilationState, CompilationStateStore, FileStateStore};

use crate::collector::HeaderDependencyCollector;
use crate::compilation::IncrementalCompilation;
use crate::error::CompileError;
use crate::processor::IncrementalCompileProcessor;

/// Inputs of one compile task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSpec {
    /// Task identity keying the persisted state.
    pub task_path: String,
    /// Root source files.
    pub source_files: Vec<PathBuf>,
    /// Include roots in search order.
    pub include_roots: Vec<PathBuf>,
    /// `false` forces a clean compile of every source.
    pub incremental: bool,
    /// Whether `#import` directives are tracked as includes.
    pub imports_are_includes: bool,
}

impl CompileSpec {
    /// Builds a compile spec from resolved configuration.
    pub fn from_settings(settings: &CompileSettings) -> Self {
        Self {
            task_path: settings.task_path.clone(),
            source_files: settings.source_files.clone(),
            include_roots: settings.include_roots.clone(),
            incremental: settings.incremental,
            imports_are_includes: settings.imports_are_includes,
        }
    }
}

/// The work handed to a [`NativeCompiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Sources to compile.
    pub source_files: BTreeSet<PathBuf>,
    /// Sources whose outputs should be deleted.
    pub removed_source_files: BTreeSet<PathBuf>,
    /// `true` if all previous outputs should be deleted before compiling.
    pub clean_outputs: bool,
    /// Include directives of every source in `source_files`.
    pub include_directives: BTreeMap<PathBuf, IncludeDirectives>,
}

/// What a [`NativeCompiler`] reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkResult {
    /// `true` if any output was produced or deleted.
    pub did_work: bool,
}

/// A compiler that turns sources into outputs.
pub trait NativeCompiler {
    /// Compiles `request`. An error leaves the stored state untouched.
    fn compile(&self, request: &CompileRequest) -> Result<WorkResult, Box<dyn Error + Send + Sync>>;
}

/// Receives files the surrounding build must watch for the next build.
pub trait DiscoveredInputRecorder {
    /// Records `inputs`: discovered headers, and include roots when some
    /// include could not be resolved statically.
    fn new_inputs(&mut self, inputs: &BTreeSet<PathBuf>);
}

impl DiscoveredInputRecorder for BTreeSet<PathBuf> {
    fn new_inputs(&mut self, inputs: &BTreeSet<PathBuf>) {
        self.extend(inputs.iter().cloned());
    }
}

/// Result of one [`IncrementalNativeCompiler::execute`].
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// What the delegate reported.
    pub work: WorkResult,
    /// The computed compilation, whose final state has been stored.
    pub compilation: IncrementalCompilation,
}

/// Runs a delegate compiler on only the sources that need it.
pub struct IncrementalNativeCompiler<S, C> {
    store: S,
    delegate: C,
}

impl<S: CompilationStateStore, C: NativeCompiler> IncrementalNativeCompiler<S, C> {
    /// Creates a driver persisting state in `store` and compiling with `delegate`.
    pub fn new(store: S, delegate: C) -> Self {
        Self { store, delegate }
    }

    /// The state store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The delegate compiler.
    pub fn delegate(&self) -> &C {
        &self.delegate
    }

    /// Executes one compile task.
    ///
    /// The new snapshot is written only after the delegate succeeds. If the
    /// delegate fails, the previous snapshot stays in place and the next build
    /// recomputes the same work.
    #[tracing::instrument(level = "debug", skip_all, fields(task = %spec.task_path))]
    pub fn execute(
        &self,
        spec: &CompileSpec,
        recorder: &mut dyn DiscoveredInputRecorder,
    ) -> Result<CompileOutcome, CompileError> {
        let previous = self
            .store
            .load(&spec.task_path)
            .unwrap_or_else(CompilationState::empty);

        let processor = IncrementalCompileProcessor::new(
            previous,
            SourceIncludesParser::new(spec.imports_are_includes),
            IncludeResolver::new(spec.include_roots.clone()),
        );
        let compilation = processor.process_source_files(&spec.source_files)?;

        recorder.new_inputs(&HeaderDependencyCollector::collect_discovered_inputs(
            &compilation,
            &spec.include_roots,
        ));

        let request = if spec.incremental {
            build_request(&compilation, compilation.recompile.clone(), false)
        } else {
            tracing::info!("performing a clean compile of all sources");
            let all = compilation.final_state.source_files().clone();
            build_request(&compilation, all, true)
        };

        let work = self
            .delegate
            .compile(&request)
            .map_err(CompileError::Compiler)?;

        self.store
            .store(&spec.task_path, &compilation.final_state)
            .map_err(|source| CompileError::SnapshotWriteFailed {
                task: spec.task_path.clone(),
                source,
            })?;

        tracing::debug!(
            compiled = request.source_files.len(),
            removed = request.removed_source_files.len(),
            did_work = work.did_work,
            "compile task finished"
        );
        Ok(CompileOutcome { work, compilation })
    }
}

fn build_request(
    compilation: &IncrementalCompilation,
    source_files: BTreeSet<PathBuf>,
    clean_outputs: bool,
) -> CompileRequest {
    let include_directives = source_files
        .iter()
        .filter_map(|path| {
            let state = compilation.final_state.get_state(path)?;
            Some((path.clone(), state.include_directives.clone()))
        })
        .collect();
    CompileRequest {
        source_files,
        removed_source_files: compilation.removed.clone(),
        clean_outputs,
        include_directives,
    }
}

/// Opens the on-disk state store under `cache_dir`, tagged with this crate's version.
pub fn file_state_store(cache_dir: &Path) -> FileStateStore {
    FileStateStore::new(cache_dir, env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_state::{MemoryStateStore, StateError};
    use std::fs;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCompiler {
        requests: Mutex<Vec<CompileRequest>>,
        fail: bool,
    }

    impl RecordingCompiler {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn last(&self) -> CompileRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl NativeCompiler for RecordingCompiler {
        fn compile(
            &self,
            request: &CompileRequest,
        ) -> Result<WorkResult, Box<dyn Error + Send + Sync>> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err("cc exited with status 1".into());
            }
            Ok(WorkResult {
                did_work: !request.source_files.is_empty()
                    || !request.removed_source_files.is_empty(),
            })
        }
    }

    struct ReadOnlyStore;

    impl CompilationStateStore for ReadOnlyStore {
        fn load(&self, _task: &str) -> Option<CompilationState> {
            None
        }

        fn store(&self, _task: &str, _state: &CompilationState) -> Result<(), StateError> {
            Err(StateError::Serialization {
                reason: "read-only".to_string(),
            })
        }
    }

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn spec(sources: Vec<PathBuf>, incremental: bool) -> CompileSpec {
        CompileSpec {
            task_path: ":app:compileC".to_string(),
            source_files: sources,
            include_roots: vec![],
            incremental,
            imports_are_includes: true,
        }
    }

    fn in_memory() -> IncrementalNativeCompiler<MemoryStateStore, RecordingCompiler> {
        IncrementalNativeCompiler::new(MemoryStateStore::new(), RecordingCompiler::default())
    }

    /// Runs one build, discarding the discovered inputs.
    fn build<S: CompilationStateStore>(
        compiler: &IncrementalNativeCompiler<S, RecordingCompiler>,
        spec: &CompileSpec,
    ) -> Result<CompileOutcome, CompileError> {
        compiler.execute(spec, &mut BTreeSet::<PathBuf>::new())
    }

    fn set(paths: &[&PathBuf]) -> BTreeSet<PathBuf> {
        paths.iter().map(|p| (*p).clone()).collect()
    }

    #[test]
    fn second_build_compiles_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "#include \"util.h\"\n");
        write(dir.path(), "util.h", "int util;\n");
        let compiler = in_memory();
        let spec = spec(vec![main.clone()], true);

        let first = build(&compiler, &spec).unwrap();
        assert!(first.work.did_work);
        assert_eq!(compiler.delegate().last().source_files, set(&[&main]));

        let second = build(&compiler, &spec).unwrap();
        assert!(!second.work.did_work);
        assert!(compiler.delegate().last().source_files.is_empty());
    }

    #[test]
    fn request_carries_include_directives() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "#include \"util.h\"\n#include <stdio.h>\n");
        write(dir.path(), "util.h", "");
        let compiler = in_memory();

        build(&compiler, &spec(vec![main.clone()], true)).unwrap();
        let request = compiler.delegate().last();
        assert_eq!(request.include_directives[&main].len(), 2);
    }

    #[test]
    fn records_discovered_headers() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "#include \"util.h\"\n");
        let util = write(dir.path(), "util.h", "");
        let compiler = in_memory();

        let mut inputs: BTreeSet<PathBuf> = BTreeSet::new();
        compiler.execute(&spec(vec![main], true), &mut inputs).unwrap();
        assert_eq!(inputs, set(&[&util]));
    }

    #[test]
    fn records_include_roots_for_macro_includes() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "#include CONFIG_H\n");
        let include = dir.path().join("include");
        let compiler = in_memory();
        let mut spec = spec(vec![main], true);
        spec.include_roots = vec![include.clone()];

        let mut inputs: BTreeSet<PathBuf> = BTreeSet::new();
        compiler.execute(&spec, &mut inputs).unwrap();
        assert!(inputs.contains(&include));
    }

    #[test]
    fn clean_compile_sends_all_sources() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.c", "");
        let b = write(dir.path(), "b.c", "");
        let compiler = in_memory();

        build(&compiler, &spec(vec![a.clone(), b.clone()], true)).unwrap();
        build(&compiler, &spec(vec![a.clone(), b.clone()], false)).unwrap();

        let request = compiler.delegate().last();
        assert!(request.clean_outputs);
        assert_eq!(request.source_files, set(&[&a, &b]));
    }

    #[test]
    fn removed_sources_passed_to_delegate() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.c", "");
        let old = write(dir.path(), "old.c", "");
        let compiler = in_memory();

        build(&compiler, &spec(vec![a.clone(), old.clone()], true)).unwrap();
        let outcome = build(&compiler, &spec(vec![a], true)).unwrap();

        let request = compiler.delegate().last();
        assert_eq!(request.removed_source_files, set(&[&old]));
        assert!(request.source_files.is_empty());
        assert!(outcome.work.did_work);
    }

    #[test]
    fn delegate_failure_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "int v = 1;\n");
        let store = MemoryStateStore::new();
        let spec = spec(vec![main.clone()], true);

        let ok = IncrementalNativeCompiler::new(store, RecordingCompiler::default());
        build(&ok, &spec).unwrap();
        let stored = ok.store().load(&spec.task_path).unwrap();

        fs::write(&main, "int v = 2;\n").unwrap();
        let failing = IncrementalNativeCompiler::new(ok.store, RecordingCompiler::failing());
        let err = build(&failing, &spec).unwrap_err();
        assert!(matches!(err, CompileError::Compiler(_)));
        assert_eq!(failing.store().load(&spec.task_path).unwrap(), stored);

        // The change is still pending on the next successful build.
        let retry = IncrementalNativeCompiler::new(failing.store, RecordingCompiler::default());
        let outcome = build(&retry, &spec).unwrap();
        assert_eq!(outcome.compilation.recompile, set(&[&main]));
    }

    #[test]
    fn store_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "main.c", "");
        let compiler = IncrementalNativeCompiler::new(ReadOnlyStore, RecordingCompiler::default());

        let err = build(&compiler, &spec(vec![main], true)).unwrap_err();
        match err {
            CompileError::SnapshotWriteFailed { task, .. } => assert_eq!(task, ":app:compileC"),
            other => panic!("expected SnapshotWriteFailed, got {other:?}"),
        }
        assert_eq!(compiler.delegate().calls(), 1);
    }

    #[test]
    fn unreadable_source_skips_delegate() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = in_memory();

        let missing = dir.path().join("missing.c");
        let err = build(&compiler, &spec(vec![missing], true)).unwrap_err();
        assert!(matches!(err, CompileError::SourceUnreadable { .. }));
        assert_eq!(compiler.delegate().calls(), 0);
        assert!(compiler.store().load(":app:compileC").is_none());
    }

    #[test]
    fn file_store_round_trips_through_driver() {
        let dir = tempfile::tempdir().unwrap();
        let main = write(dir.path(), "src/main.c", "");
        let compiler = IncrementalNativeCompiler::new(
            file_state_store(&dir.path().join(".cinder-cache")),
            RecordingCompiler::default(),
        );
        let spec = spec(vec![main], true);

        build(&compiler, &spec).unwrap();
        assert!(compiler.store().snapshot_path(&spec.task_path).is_file());
        let second = build(&compiler, &spec).unwrap();
        assert!(second.compilation.is_up_to_date());
    }

    #[test]
    fn spec_from_settings() {
        let settings = CompileSettings {
            task_path: ":lib:compileObjc".to_string(),
            incremental: false,
            toolchain: cinder_config::ToolChainKind::Clang,
            imports_are_includes: true,
            include_roots: vec![PathBuf::from("/p/include")],
            source_files: vec![PathBuf::from("/p/src/a.m")],
            cache_dir: PathBuf::from("/p/.cinder-cache"),
        };
        let spec = CompileSpec::from_settings(&settings);
        assert_eq!(spec.task_path, ":lib:compileObjc");
        assert!(!spec.incremental);
        assert!(spec.imports_are_includes);
        assert_eq!(spec.include_roots, settings.include_roots);
        assert_eq!(spec.source_files, settings.source_files);
    }
}
