//! Shared foundational types used across the Cinder incremental compiler.
//!
//! This crate provides content hashing for change detection and lexical path
//! normalization used to give every header a single identity in the include graph.

#![warn(missing_docs)]

pub mod hash;
pub mod paths;

pub use hash::ContentHash;
pub use paths::normalize_path;
