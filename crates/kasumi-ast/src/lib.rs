//! Tag-tree syntax for Kasumi templates.
//!
//! Templates are flat text with three kinds of block tags (`{% if %}`,
//! `{% for %}`, `{% raw %}`) closed by `{% endif %}`, `{% endfor %}` and
//! `{% endraw %}`. The [`Scanner`] turns a template into a [`Tree`] of typed
//! nodes and [`Tree::serialize`] turns any subtree back into template text.
//! Everything else, including `{{ var }}` interpolation, stays literal text at
//! this layer.
//!
//! ```rust
//! let tree = kasumi_ast::parse("a{% if page.title %}b{% endif %}c").unwrap();
//! assert_eq!(tree.children(tree.root()).len(), 3);
//! assert_eq!(tree.to_source(), "a{% if page.title %}b{% endif %}c");
//! ```

mod scanner;
mod serializer;
mod tree;

pub use scanner::Scanner;
pub use tree::{Fields, Node, NodeId, NodeKind, ScopeBindings, Tree};

use thiserror::Error;

// ============================================================================
// Location
// ============================================================================

/// Location in source code (1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }

    /// Compute line and column (in characters) of a byte offset into `source`.
    pub fn from_offset(source: &str, byte_offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (pos, ch) in source.char_indices() {
            if pos >= byte_offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self {
            line,
            column,
            byte_offset,
        }
    }
}

// ============================================================================
// Delimiters
// ============================================================================

/// The three characters that make up tag boundaries.
///
/// A tag starts with `open` followed by `marker` and ends with `marker`
/// followed by `close`, so the defaults give `{%` ... `%}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiters {
    pub open: char,
    pub close: char,
    pub marker: char,
}

impl Delimiters {
    pub fn new(open: char, close: char, marker: char) -> Self {
        Self {
            open,
            close,
            marker,
        }
    }

    /// The two-character tag start, e.g. `{%`.
    pub fn tag_start(&self) -> String {
        [self.open, self.marker].iter().collect()
    }

    /// The two-character tag end, e.g. `%}`.
    pub fn tag_end(&self) -> String {
        [self.marker, self.close].iter().collect()
    }

    /// Wrap tag content in delimiters: `{%` + content + `%}`.
    pub fn wrap(&self, content: &str) -> String {
        let mut tag = String::with_capacity(content.len() + 4);
        tag.push(self.open);
        tag.push(self.marker);
        tag.push_str(content);
        tag.push(self.marker);
        tag.push(self.close);
        tag
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new('{', '}', '%')
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors reported by a strict [`Scanner`]. A lenient scanner never fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("'{found}' does not close '{expected}' at line {}, column {}", location.line, location.column)]
    MismatchedEndTag {
        expected: String,
        found: String,
        location: Location,
    },

    #[error("'{found}' has no open block to close at line {}, column {}", location.line, location.column)]
    UnexpectedEndTag { found: String, location: Location },

    #[error("'{tag}' opened at line {}, column {} is never closed", location.line, location.column)]
    UnclosedBlock { tag: String, location: Location },
}

// ============================================================================
// Parsing
// ============================================================================

/// Scan a template with the default `{% %}` delimiters in lenient mode.
pub fn parse(source: &str) -> Result<Tree, ScanError> {
    Scanner::default().scan(source)
}
