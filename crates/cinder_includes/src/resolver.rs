//! Include resolution against ordered search roots.
//!
//! Quoted includes search the including file's directory first, then each
//! include root in declared order. System includes search the include roots
//! only. The first existing regular file wins. Macro-form includes cannot be
//! resolved statically and are reported as such regardless of the roots.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cinder_common::{normalize_path, ContentHash};

use crate::directive::{IncludeDirective, IncludeKind, ResolvedInclude};

/// Where a directive points, before any content is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeLocation {
    /// The first matching file, normalized.
    Found(PathBuf),
    /// No search location holds a matching file.
    NotFound,
    /// The directive's argument is not a literal header name.
    NotStatic,
}

/// Resolves directives against a fixed, ordered list of include roots.
///
/// File existence checks are memoized per candidate path, so a resolver
/// should live for one build: files created after a lookup are not seen.
#[derive(Debug)]
pub struct IncludeResolver {
    include_roots: Vec<PathBuf>,
    existence: HashMap<PathBuf, bool>,
}

impl IncludeResolver {
    /// Creates a resolver searching `include_roots` in the given order.
    pub fn new(include_roots: Vec<PathBuf>) -> Self {
        Self {
            include_roots,
            existence: HashMap::new(),
        }
    }

    /// Finds the file a directive in `including_file` refers to.
    pub fn locate(
        &mut self,
        directive: &IncludeDirective,
        including_file: &Path,
    ) -> IncludeLocation {
        let local_dir = match directive.kind {
            IncludeKind::MacroExpression => return IncludeLocation::NotStatic,
            IncludeKind::Quoted => including_file.parent().map(Path::to_path_buf),
            IncludeKind::System => None,
        };

        let search_dirs = local_dir.iter().chain(self.include_roots.iter());
        let candidates: Vec<PathBuf> = search_dirs
            .map(|dir| normalize_path(&dir.join(&directive.value)))
            .collect();

        for candidate in candidates {
            if self.is_file(&candidate) {
                return IncludeLocation::Found(candidate);
            }
        }
        IncludeLocation::NotFound
    }

    /// Resolves a directive to a concrete header and hashes its content from disk.
    ///
    /// Use [`resolve_with`](Self::resolve_with) when headers are read and
    /// cached elsewhere.
    pub fn resolve(
        &mut self,
        directive: &IncludeDirective,
        including_file: &Path,
    ) -> ResolvedInclude {
        self.resolve_with(directive, including_file, |path| {
            ContentHash::from_file(path)
                .map_err(|err| {
                    tracing::debug!(path = %path.display(), %err, "header is unreadable");
                })
                .ok()
        })
    }

    /// Resolves a directive, obtaining the located header's hash from `hash_header`.
    ///
    /// A header for which `hash_header` returns `None` exists but cannot be
    /// read. It is reported as [`Resolution::Unknown`](crate::Resolution::Unknown):
    /// its content cannot be tracked, so it must not be treated as absent.
    pub fn resolve_with<F>(
        &mut self,
        directive: &IncludeDirective,
        including_file: &Path,
        hash_header: F,
    ) -> ResolvedInclude
    where
        F: FnOnce(&Path) -> Option<ContentHash>,
    {
        match self.locate(directive, including_file) {
            IncludeLocation::Found(path) => match hash_header(&path) {
                Some(hash) => ResolvedInclude::resolved(directive.clone(), path, hash),
                None => ResolvedInclude::unknown(directive.clone()),
            },
            IncludeLocation::NotFound => ResolvedInclude::unresolved(directive.clone()),
            IncludeLocation::NotStatic => ResolvedInclude::unknown(directive.clone()),
        }
    }

    fn is_file(&mut self, candidate: &Path) -> bool {
        if let Some(&exists) = self.existence.get(candidate) {
            return exists;
        }
        let exists = candidate.is_file();
        self.existence.insert(candidate.to_path_buf(), exists);
        exists
    }
}
