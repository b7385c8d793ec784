//! Include directive data model.
//!
//! An [`IncludeDirective`] is the raw form of one `#include` or `#import` line.
//! After resolution it becomes a [`ResolvedInclude`], which records the concrete
//! header it matched (with that header's content hash), or why it did not.

use std::fmt;
use std::path::{Path, PathBuf};

use cinder_common::ContentHash;
use serde::{Deserialize, Serialize};

/// The syntactic form of a directive's argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncludeKind {
    /// `#include "x.h"`: searched next to the including file, then in the include roots.
    Quoted,
    /// `#include <x.h>`: searched in the include roots only.
    System,
    /// Any argument that is not a literal header name, e.g. `#include CONFIG_HEADER`.
    MacroExpression,
}

/// Whether a directive was spelled `#include` or `#import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncludeType {
    /// `#include`.
    Include,
    /// `#import`.
    Import,
}

/// One include directive as written in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncludeDirective {
    /// The argument text: the header name for quoted and system forms, the
    /// trimmed raw expression otherwise.
    pub value: String,
    /// The syntactic form of the argument.
    pub kind: IncludeKind,
    /// `#include` or `#import`.
    pub include_type: IncludeType,
}

impl IncludeDirective {
    /// Creates a quoted `#include "value"` directive.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self::new(value, IncludeKind::Quoted, IncludeType::Include)
    }

    /// Creates a system `#include <value>` directive.
    pub fn system(value: impl Into<String>) -> Self {
        Self::new(value, IncludeKind::System, IncludeType::Include)
    }

    /// Creates a macro-form `#include value` directive.
    pub fn macro_expression(value: impl Into<String>) -> Self {
        Self::new(value, IncludeKind::MacroExpression, IncludeType::Include)
    }

    /// Creates a directive with explicit kind and type.
    pub fn new(value: impl Into<String>, kind: IncludeKind, include_type: IncludeType) -> Self {
        Self {
            value: value.into(),
            kind,
            include_type,
        }
    }

    /// Returns this directive re-spelled as `#import`.
    pub fn as_import(mut self) -> Self {
        self.include_type = IncludeType::Import;
        self
    }

    /// Returns `true` for `#import` directives.
    pub fn is_import(&self) -> bool {
        self.include_type == IncludeType::Import
    }
}

impl fmt::Display for IncludeDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self.include_type {
            IncludeType::Include => "#include",
            IncludeType::Import => "#import",
        };
        match self.kind {
            IncludeKind::Quoted => write!(f, "{keyword} \"{}\"", self.value),
            IncludeKind::System => write!(f, "{keyword} <{}>", self.value),
            IncludeKind::MacroExpression => write!(f, "{keyword} {}", self.value),
        }
    }
}

/// The ordered include directives of one file.
///
/// When the file could not be parsed at all, the directive list is empty and
/// `parse_failed` is set. Such a file must be treated as having an include
/// that cannot be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeDirectives {
    directives: Vec<IncludeDirective>,
    parse_failed: bool,
}

impl IncludeDirectives {
    /// Wraps a successfully parsed directive list.
    pub fn new(directives: Vec<IncludeDirective>) -> Self {
        Self {
            directives,
            parse_failed: false,
        }
    }

    /// Returns the marker for a file whose content could not be parsed.
    pub fn parse_failure() -> Self {
        Self {
            directives: Vec::new(),
            parse_failed: true,
        }
    }

    /// Returns the directives in source order.
    pub fn all(&self) -> &[IncludeDirective] {
        &self.directives
    }

    /// Returns `true` if the file could not be parsed.
    pub fn parse_failed(&self) -> bool {
        self.parse_failed
    }

    /// Returns `true` if any directive has a macro-form argument.
    pub fn has_macro_includes(&self) -> bool {
        self.directives
            .iter()
            .any(|d| d.kind == IncludeKind::MacroExpression)
    }

    /// Returns a copy with every `#import` directive removed.
    pub fn discard_imports(&self) -> Self {
        Self {
            directives: self
                .directives
                .iter()
                .filter(|d| !d.is_import())
                .cloned()
                .collect(),
            parse_failed: self.parse_failed,
        }
    }

    /// Returns the number of directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Returns `true` if there are no directives.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// The outcome of resolving one directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// The directive matched this file, whose content had this hash.
    Resolved {
        /// Normalized path of the matched header.
        path: PathBuf,
        /// Content hash of the header at resolution time.
        content_hash: ContentHash,
    },
    /// No candidate exists in any search location. Typically a compiler
    /// built-in header; safe to leave untracked.
    Unresolved,
    /// The directive cannot be resolved statically.
    Unknown,
}

/// A directive paired with its resolution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedInclude {
    /// The directive as written.
    pub directive: IncludeDirective,
    /// Where it led.
    pub resolution: Resolution,
}

impl ResolvedInclude {
    /// Pairs a directive with a resolved header.
    pub fn resolved(directive: IncludeDirective, path: PathBuf, content_hash: ContentHash) -> Self {
        Self {
            directive,
            resolution: Resolution::Resolved { path, content_hash },
        }
    }

    /// Pairs a directive with the unresolved outcome.
    pub fn unresolved(directive: IncludeDirective) -> Self {
        Self {
            directive,
            resolution: Resolution::Unresolved,
        }
    }

    /// Pairs a directive with the unknown outcome.
    pub fn unknown(directive: IncludeDirective) -> Self {
        Self {
            directive,
            resolution: Resolution::Unknown,
        }
    }

    /// Returns the resolved header path, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.resolution {
            Resolution::Resolved { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Returns `true` if the resolution outcome is [`Resolution::Unknown`].
    pub fn is_unknown(&self) -> bool {
        self.resolution == Resolution::Unknown
    }
}
