//! Configuration types deserialized from `cinder.toml`.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Default cache directory, relative to the project directory.
pub const DEFAULT_CACHE_DIR: &str = ".cinder-cache";

/// The top-level configuration parsed from `cinder.toml`.
///
/// Describes one compile task: its identity, the toolchain family, the
/// ordered include roots, the root source files, and where snapshots live.
#[derive(Debug, Deserialize)]
pub struct CinderConfig {
    /// Compile task identity and mode.
    pub task: TaskConfig,
    /// Toolchain family and its include semantics.
    #[serde(default)]
    pub toolchain: ToolChainConfig,
    /// Ordered include search roots.
    #[serde(default)]
    pub includes: IncludesConfig,
    /// Root source files of the task.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Snapshot storage settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Identity and mode of the compile task.
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    /// Opaque task identity keying the persisted compilation state
    /// (e.g., `":app:compileDebugCpp"`).
    pub path: String,
    /// Whether to compile only the changed sources. When false every build
    /// cleans previous outputs and compiles all sources.
    #[serde(default = "default_true")]
    pub incremental: bool,
}

/// The toolchain family used to compile the task.
#[derive(Debug, Default, Deserialize)]
pub struct ToolChainConfig {
    /// Which toolchain family compiles the sources.
    #[serde(default)]
    pub kind: ToolChainKind,
    /// Overrides whether `#import` is treated as `#include`. When absent the
    /// toolchain family decides.
    #[serde(default)]
    pub imports_are_includes: Option<bool>,
}

/// Closed set of supported toolchain families.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolChainKind {
    /// GNU Compiler Collection (default).
    #[default]
    Gcc,
    /// LLVM Clang.
    Clang,
    /// Microsoft Visual C++.
    VisualCpp,
    /// Apple Swift compiler.
    Swift,
}

impl ToolChainKind {
    /// Returns whether this toolchain treats `#import` as an include of the
    /// named header.
    ///
    /// GCC and Clang read `#import` as an include-once. MSVC uses `#import`
    /// for type libraries, and Swift sources carry no preprocessor directives.
    pub fn imports_are_includes(self) -> bool {
        matches!(self, Self::Gcc | Self::Clang)
    }
}

/// Include search roots, searched in declared order.
#[derive(Debug, Default, Deserialize)]
pub struct IncludesConfig {
    /// Include root directories. Accepts a single string or a list.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub roots: Vec<String>,
}

/// Root source files of the task.
#[derive(Debug, Default, Deserialize)]
pub struct SourcesConfig {
    /// Source file paths. Accepts a single string or a list.
    #[serde(default, deserialize_with = "deserialize_string_or_vec")]
    pub files: Vec<String>,
}

/// Snapshot storage settings.
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    /// Directory holding persisted compilation state snapshots.
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

/// Deserializes a field that can be either a single string or a list of strings.
///
/// Allows `roots = "include"` as shorthand for `roots = ["include"]`.
fn deserialize_string_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrVec;

    impl<'de> Visitor<'de> for StringOrVec {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            Ok(vec![v.to_string()])
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut vec = Vec::new();
            while let Some(val) = seq.next_element::<String>()? {
                vec.push(val);
            }
            Ok(vec)
        }
    }

    deserializer.deserialize_any(StringOrVec)
}
