//! Single-pass tag scanner.
//!
//! Text mode accumulates characters until the tag start (`{%`). The tag
//! content up to the tag end (`%}`) is classified by its first
//! whitespace-separated word:
//! - `if`, `for`, `raw` open a block and descend into it
//! - `endif`, `endfor`, `endraw` close the innermost open block
//! - anything else is kept as literal text, delimiters included

use crate::tree::{NodeId, NodeKind, Tree};
use crate::{Delimiters, Location, ScanError};

/// Builds node trees from template text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scanner {
    delimiters: Delimiters,
    strict: bool,
}

impl Scanner {
    pub fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            strict: false,
        }
    }

    /// In strict mode end tags must match the kind of the block they close
    /// and every block must be closed. Lenient mode lets any end tag close
    /// the innermost block.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn delimiters(&self) -> Delimiters {
        self.delimiters
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Scan `source` into a fresh tree.
    pub fn scan(&self, source: &str) -> Result<Tree, ScanError> {
        let mut tree = Tree::new(self.delimiters);
        let root = tree.root();
        self.scan_into(&mut tree, root, source)?;
        Ok(tree)
    }

    /// Scan `source` and append the resulting nodes as children of `at`.
    pub fn scan_into(&self, tree: &mut Tree, at: NodeId, source: &str) -> Result<(), ScanError> {
        let mut pass = ScanPass {
            tree,
            source,
            strict: self.strict,
            base: at,
            current: at,
            text: String::new(),
            open_offsets: Vec::new(),
        };
        pass.run(&self.delimiters.tag_start(), &self.delimiters.tag_end())
    }
}

struct ScanPass<'a> {
    tree: &'a mut Tree,
    source: &'a str,
    strict: bool,
    base: NodeId,
    current: NodeId,
    text: String,
    open_offsets: Vec<usize>,
}

impl<'a> ScanPass<'a> {
    fn run(&mut self, tag_start: &str, tag_end: &str) -> Result<(), ScanError> {
        let source = self.source;
        let mut pos = 0;

        while pos < source.len() {
            let rest = &source[pos..];
            let Some(start) = rest.find(tag_start) else {
                self.text.push_str(rest);
                break;
            };

            let tag_at = pos + start;
            let inner_at = tag_at + tag_start.len();
            let Some(len) = source[inner_at..].find(tag_end) else {
                // Unterminated tag: everything left is text.
                self.text.push_str(rest);
                break;
            };

            self.text.push_str(&rest[..start]);
            let next = inner_at + len + tag_end.len();
            self.tag(&source[inner_at..inner_at + len], &source[tag_at..next], tag_at)?;
            pos = next;
        }

        if !self.text.is_empty() {
            self.flush();
        }

        if self.strict && self.current != self.base {
            let offset = self.open_offsets.last().copied().unwrap_or_default();
            return Err(ScanError::UnclosedBlock {
                tag: self.tree.content(self.current).trim().to_string(),
                location: Location::from_offset(source, offset),
            });
        }

        Ok(())
    }

    fn tag(&mut self, content: &str, literal: &str, offset: usize) -> Result<(), ScanError> {
        let name = content.split_whitespace().next().unwrap_or("");

        if let Some(kind) = NodeKind::from_open_tag(name) {
            self.flush();
            self.current = self.tree.append(self.current, kind, content);
            self.open_offsets.push(offset);
            return Ok(());
        }

        if let Some(kind) = NodeKind::from_end_tag(name) {
            return self.close(kind, name, content, literal, offset);
        }

        self.text.push_str(literal);
        Ok(())
    }

    fn close(
        &mut self,
        kind: NodeKind,
        name: &str,
        content: &str,
        literal: &str,
        offset: usize,
    ) -> Result<(), ScanError> {
        if self.current == self.base {
            if self.strict {
                return Err(ScanError::UnexpectedEndTag {
                    found: name.to_string(),
                    location: Location::from_offset(self.source, offset),
                });
            }
            // Nothing to close: keep the tag as text.
            self.text.push_str(literal);
            return Ok(());
        }

        let open_kind = self.tree.kind(self.current);
        if self.strict && open_kind != kind {
            return Err(ScanError::MismatchedEndTag {
                expected: format!("end{}", open_kind.tag_name().unwrap_or_default()),
                found: name.to_string(),
                location: Location::from_offset(self.source, offset),
            });
        }

        self.flush();
        self.tree.set_end_tag(self.current, content);
        self.open_offsets.pop();
        self.current = self.tree.parent(self.current).unwrap_or(self.base);
        Ok(())
    }

    fn flush(&mut self) {
        let text = std::mem::take(&mut self.text);
        self.tree.append(self.current, NodeKind::Text, text);
    }
}
