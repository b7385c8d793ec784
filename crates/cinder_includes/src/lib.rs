//! Include directive parsing and resolution for C-family sources.
//!
//! The [`parser`] extracts `#include`/`#import` directives from file content
//! without evaluating the preprocessor, and the [`resolver`] maps each
//! directive to a concrete header using ordered include roots.

#![warn(missing_docs)]

pub mod directive;
pub mod error;
pub mod parser;
pub mod resolver;

pub use directive::{
    IncludeDirective, IncludeDirectives, IncludeKind, IncludeType, Resolution, ResolvedInclude,
};
pub use error::ParseError;
pub use parser::{parse_directives, try_parse_directives, SourceIncludesParser};
pub use resolver::{IncludeLocation, IncludeResolver};
