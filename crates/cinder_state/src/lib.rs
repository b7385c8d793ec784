//! Compilation state snapshots and their persistence.
//!
//! This crate defines the per-file state recorded for every tracked source and
//! header, the immutable [`CompilationState`] snapshot of one build, and the
//! [`CompilationStateStore`] abstraction that persists snapshots by task identity.

#![warn(missing_docs)]

pub mod error;
pub mod state;
pub mod store;

pub use error::StateError;
pub use state::{CompilationState, CompilationStateBuilder, SourceFileState};
pub use store::{CompilationStateStore, FileStateStore, MemoryStateStore};
