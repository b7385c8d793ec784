//! Include directive extraction from C-family source text.
//!
//! The scanner performs the early translation phases that matter for finding
//! directives: backslash-newline splicing and comment removal (a comment becomes
//! one space). String and character literals are copied through untouched so
//! comment markers inside them are not misread. Each resulting logical line
//! that starts with `#include` or `#import` yields one [`IncludeDirective`].
//!
//! Conditional compilation is not evaluated. Directives in every `#if` branch
//! are reported, which can only add dependencies, never hide one.

use std::path::Path;

use crate::directive::{IncludeDirective, IncludeDirectives, IncludeKind, IncludeType};
use crate::error::ParseError;

/// Parses include directives from raw file content.
///
/// Never fails: content that is not text yields
/// [`IncludeDirectives::parse_failure`], which downstream treats as an include
/// that cannot be resolved.
pub fn parse_directives(content: &[u8]) -> IncludeDirectives {
    match try_parse_directives(content) {
        Ok(directives) => IncludeDirectives::new(directives),
        Err(err) => {
            tracing::debug!(%err, "treating unparsable content as an unknown include");
            IncludeDirectives::parse_failure()
        }
    }
}

/// Parses include directives, reporting content that is not text as an error.
pub fn try_parse_directives(content: &[u8]) -> Result<Vec<IncludeDirective>, ParseError> {
    if let Some(offset) = content.iter().position(|&b| b == 0) {
        return Err(ParseError::BinaryContent { offset });
    }
    std::str::from_utf8(content).map_err(|e| ParseError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })?;

    let mut scanner = Scanner {
        source: content,
        pos: 0,
    };
    Ok(scanner
        .logical_lines()
        .iter()
        .filter_map(|line| parse_directive_line(line))
        .collect())
}

/// Parses source files with a fixed `#import` policy.
#[derive(Debug, Clone, Copy)]
pub struct SourceIncludesParser {
    imports_are_includes: bool,
}

impl SourceIncludesParser {
    /// Creates a parser. When `imports_are_includes` is false, `#import`
    /// directives are dropped from every result.
    pub fn new(imports_are_includes: bool) -> Self {
        Self {
            imports_are_includes,
        }
    }

    /// Parses directives from already-read content.
    pub fn parse(&self, content: &[u8]) -> IncludeDirectives {
        let directives = parse_directives(content);
        if self.imports_are_includes {
            directives
        } else {
            directives.discard_imports()
        }
    }

    /// Reads and parses the file at `path`.
    pub fn parse_file(&self, path: &Path) -> std::io::Result<IncludeDirectives> {
        let content = std::fs::read(path)?;
        Ok(self.parse(&content))
    }
}

/// Interprets one logical line, returning a directive if it is an include or import.
fn parse_directive_line(line: &str) -> Option<IncludeDirective> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let keyword_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let include_type = match &rest[..keyword_len] {
        "include" => IncludeType::Include,
        "import" => IncludeType::Import,
        _ => return None,
    };
    let argument = rest[keyword_len..].trim();
    let (value, kind) = parse_argument(argument);
    Some(IncludeDirective::new(value, kind, include_type))
}

/// Classifies a directive argument. Anything that is not a complete
/// `"..."` or `<...>` header name is kept verbatim as a macro expression.
fn parse_argument(argument: &str) -> (&str, IncludeKind) {
    let literal = |open: char, close: char, kind: IncludeKind| {
        let inner = argument.strip_prefix(open)?;
        let end = inner.find(close)?;
        let value = &inner[..end];
        (!value.is_empty()).then_some((value, kind))
    };
    literal('"', '"', IncludeKind::Quoted)
        .or_else(|| literal('<', '>', IncludeKind::System))
        .unwrap_or((argument, IncludeKind::MacroExpression))
}

struct Scanner<'a> {
    source: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let idx = self.pos + offset;
        if idx < self.source.len() {
            self.source[idx]
        } else {
            0
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Length of a backslash-newline splice at the current position, or 0.
    fn splice_len(&self) -> usize {
        match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (b'\\', b'\n', _) => 2,
            (b'\\', b'\r', b'\n') => 3,
            _ => 0,
        }
    }

    /// Produces logical lines with splices joined and comments replaced.
    /// Only lines that can hold a directive are kept.
    fn logical_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut line = Vec::new();
        while !self.at_end() {
            let splice = self.splice_len();
            if splice > 0 {
                self.pos += splice;
                continue;
            }
            match (self.peek(), self.peek_at(1)) {
                (b'\n', _) => {
                    self.pos += 1;
                    Self::finish_line(&mut line, &mut lines);
                }
                (b'/', b'/') => self.skip_line_comment(),
                (b'/', b'*') => {
                    self.skip_block_comment();
                    line.push(b' ');
                }
                (quote @ (b'"' | b'\''), _) => self.copy_literal(quote, &mut line),
                (b, _) => {
                    self.pos += 1;
                    line.push(b);
                }
            }
        }
        Self::finish_line(&mut line, &mut lines);
        lines
    }

    fn finish_line(line: &mut Vec<u8>, lines: &mut Vec<String>) {
        let text = String::from_utf8_lossy(line);
        if text.trim_start().starts_with('#') {
            lines.push(text.into_owned());
        }
        line.clear();
    }

    fn skip_line_comment(&mut self) {
        self.pos += 2;
        while !self.at_end() && self.peek() != b'\n' {
            let splice = self.splice_len();
            self.pos += splice.max(1);
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while !self.at_end() {
            if self.peek() == b'*' && self.peek_at(1) == b'/' {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    /// Copies a string or character literal. Stops at the closing quote or
    /// at an unspliced newline, whichever comes first.
    fn copy_literal(&mut self, quote: u8, line: &mut Vec<u8>) {
        line.push(quote);
        self.pos += 1;
        while !self.at_end() {
            let splice = self.splice_len();
            if splice > 0 {
                self.pos += splice;
                continue;
            }
            match self.peek() {
                b'\n' => return,
                b'\\' => {
                    line.push(b'\\');
                    self.pos += 1;
                    if !self.at_end() && self.peek() != b'\n' {
                        line.push(self.peek());
                        self.pos += 1;
                    }
                }
                b if b == quote => {
                    line.push(b);
                    self.pos += 1;
                    return;
                }
                b => {
                    line.push(b);
                    self.pos += 1;
                }
            }
        }
    }
}
