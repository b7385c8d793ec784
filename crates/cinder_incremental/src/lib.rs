//! Incremental compilation of C-family sources.
//!
//! [`IncrementalCompileProcessor`] diffs the current root sources and the
//! headers they reach against the previous [`CompilationState`] snapshot and
//! returns the sources that must be recompiled. [`IncrementalNativeCompiler`]
//! drives one compile task around it: load the snapshot, compute the work,
//! run the delegate [`NativeCompiler`], then persist the new snapshot.
//!
//! [`CompilationState`]: cinder_state::CompilationState

#![warn(missing_docs)]

pub mod collector;
pub mod compilation;
pub mod compiler;
pub mod error;
pub mod files;
pub mod processor;

pub use collector::HeaderDependencyCollector;
pub use compilation::IncrementalCompilation;
pub use compiler::{
    file_state_store, CompileOutcome, CompileRequest, CompileSpec, DiscoveredInputRecorder,
    IncrementalNativeCompiler, NativeCompiler, WorkResult,
};
pub use error::CompileError;
pub use files::IncrementalCompileFiles;
pub use processor::IncrementalCompileProcessor;
