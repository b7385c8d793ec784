//! Scanning of root sources and discovery of the headers they reach.
//!
//! Root sources are read, hashed, and parsed in parallel. Headers are then
//! discovered breadth-first from the roots with an explicit queue: each file's
//! directives are resolved, every resolved header is read and hashed once, and
//! headers not seen before are queued. A header reached again (including
//! through an include cycle) is not rescanned, but the edge to it is recorded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use cinder_common::ContentHash;
use cinder_includes::{IncludeDirectives, IncludeResolver, SourceIncludesParser};
use cinder_state::{CompilationStateBuilder, SourceFileState};
use rayon::prelude::*;

use crate::error::CompileError;

/// Content hash and directives of one file.
#[derive(Debug, Clone)]
struct FileScan {
    content_hash: ContentHash,
    directives: IncludeDirectives,
}

/// Builds fresh [`SourceFileState`]s for a set of root sources and every
/// header they reach.
pub struct IncrementalCompileFiles {
    parser: SourceIncludesParser,
    resolver: IncludeResolver,
    /// Every file read so far. `None` marks a header that resolved but could
    /// not be read.
    scans: HashMap<PathBuf, Option<FileScan>>,
}

impl IncrementalCompileFiles {
    /// Creates a scanner. The resolver should be fresh for this build.
    pub fn new(parser: SourceIncludesParser, resolver: IncludeResolver) -> Self {
        Self {
            parser,
            resolver,
            scans: HashMap::new(),
        }
    }

    /// Scans `sources` and every header reachable from them, adding each
    /// file's state to `builder` and each source to its root set.
    ///
    /// Fails only if a root source cannot be read.
    pub fn scan(
        &mut self,
        sources: &[PathBuf],
        builder: &mut CompilationStateBuilder,
    ) -> Result<(), CompileError> {
        let parser = self.parser;
        let roots: Vec<(PathBuf, FileScan)> = sources
            .par_iter()
            .map(|path| {
                let content = std::fs::read(path).map_err(|e| CompileError::SourceUnreadable {
                    path: path.clone(),
                    source: e,
                })?;
                let scan = FileScan {
                    content_hash: ContentHash::from_bytes(&content),
                    directives: parser.parse(&content),
                };
                Ok((path.clone(), scan))
            })
            .collect::<Result<_, CompileError>>()?;

        let mut queue = VecDeque::with_capacity(roots.len());
        let mut queued = HashSet::with_capacity(roots.len());
        for (path, scan) in roots {
            builder.add_source_file(path.clone());
            if queued.insert(path.clone()) {
                queue.push_back(path.clone());
            }
            self.scans.insert(path, Some(scan));
        }

        while let Some(path) = queue.pop_front() {
            let Some(Some(scan)) = self.scans.get(&path).cloned() else {
                continue;
            };
            let mut resolved_includes = Vec::with_capacity(scan.directives.len());
            for directive in scan.directives.all() {
                let scans = &mut self.scans;
                let resolved = self.resolver.resolve_with(directive, &path, |header| {
                    scan_header(scans, parser, header)
                });
                if let Some(header) = resolved.path() {
                    if queued.insert(header.to_path_buf()) {
                        queue.push_back(header.to_path_buf());
                    }
                }
                resolved_includes.push(resolved);
            }
            tracing::trace!(
                path = %path.display(),
                includes = resolved_includes.len(),
                "scanned file"
            );
            builder.add_file_state(SourceFileState {
                path,
                content_hash: scan.content_hash,
                include_directives: scan.directives,
                resolved_includes,
            });
        }
        Ok(())
    }
}

/// Reads, hashes, and parses a header once, returning its content hash.
/// `None` means the header exists but cannot be read.
fn scan_header(
    scans: &mut HashMap<PathBuf, Option<FileScan>>,
    parser: SourceIncludesParser,
    path: &Path,
) -> Option<ContentHash> {
    if let Some(scan) = scans.get(path) {
        return scan.as_ref().map(|s| s.content_hash);
    }
    let scan = match std::fs::read(path) {
        Ok(content) => Some(FileScan {
            content_hash: ContentHash::from_bytes(&content),
            directives: parser.parse(&content),
        }),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "included header is unreadable");
            None
        }
    };
    let hash = scan.as_ref().map(|s| s.content_hash);
    scans.insert(path.to_path_buf(), scan);
    hash
}
