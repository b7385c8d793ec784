//! Error types for directive parsing.

/// Reasons a file's content could not be scanned for directives.
///
/// These never abort a build: the parser converts them into an
/// [`IncludeDirectives::parse_failure`](crate::IncludeDirectives::parse_failure)
/// marker, and the file is recompiled every time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The content contains a NUL byte and is not source text.
    #[error("binary content at byte {offset}")]
    BinaryContent {
        /// Offset of the first NUL byte.
        offset: usize,
    },

    /// The content is not valid UTF-8.
    #[error("invalid UTF-8 at byte {offset}")]
    InvalidUtf8 {
        /// Length of the valid prefix.
        offset: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_content_display() {
        let err = ParseError::BinaryContent { offset: 12 };
        assert_eq!(err.to_string(), "binary content at byte 12");
    }

    #[test]
    fn invalid_utf8_display() {
        let err = ParseError::InvalidUtf8 { offset: 3 };
        assert_eq!(err.to_string(), "invalid UTF-8 at byte 3");
    }
}
