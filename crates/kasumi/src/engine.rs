//! Tree rewriting passes.
//!
//! A scanned tree goes through four passes, in order:
//! 1. raw: every Raw block becomes verbatim Text holding the literal source of its body
//! 2. loops: every For block becomes a Group with one re-scanned Group per item
//! 3. conditionals: every If block becomes a Group (true) or empty Text (false)
//! 4. substitution: `{{ ns.field }}` in non-verbatim Text is replaced from loop bindings
//!
//! Item names declared by `for` tags, and those declared on the [`Context`],
//! are known namespaces everywhere in the template. Outside their loop they
//! read as empty.
//!
//! Template mistakes are repaired in place with a visible diagnostic text
//! and the rest of the page keeps rendering.

use crate::context::{Context, Lookup, PAGE, SITE};
use crate::error::Result;
use crate::value::is_truthy;
use kasumi_ast::{NodeId, NodeKind, Scanner, Tree};
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[ \t]*([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z0-9_\-]+)[ \t]*\}\}")
        .expect("variable pattern is valid")
});

/// Inline replacement for a block that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    InvalidIf(String),
    InvalidFor(String),
    UnknownCollection(String),
    UnknownNamespace(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::InvalidIf(content) => write!(f, "INVALID IF ({content})"),
            Diagnostic::InvalidFor(content) => write!(f, "INVALID FOR ({content})"),
            Diagnostic::UnknownCollection(name) => write!(f, "UNKNOWN COLLECTION ({name})"),
            Diagnostic::UnknownNamespace(name) => write!(f, "UNKNOWN NAMESPACE ({name})"),
        }
    }
}

/// Runs the rewrite passes against one [`Context`].
pub struct Engine<'a> {
    context: &'a Context,
    scanner: Scanner,
}

impl<'a> Engine<'a> {
    pub fn new(context: &'a Context) -> Self {
        Self {
            context,
            scanner: Scanner::default(),
        }
    }

    /// Use a custom scanner (delimiters, strict end tags).
    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Scan, rewrite and serialize a template.
    pub fn render(&self, source: &str) -> Result<String> {
        let mut tree = self.scanner.scan(source)?;
        self.process(&mut tree)?;
        Ok(tree.to_output())
    }

    /// Run all four passes over `tree`.
    pub fn process(&self, tree: &mut Tree) -> Result<()> {
        let root = tree.root();
        resolve_raw(tree, root);
        let items = loop_items(tree, root);
        self.expand_loops(tree, root)?;
        self.conditionals(tree, root, &items);
        self.substitute(tree, root, &items);
        Ok(())
    }

    /// Expand every For block under `id`.
    ///
    /// Loop bodies are re-scanned per item, so this only fails when a strict
    /// scanner rejects a body.
    pub fn expand_loops(&self, tree: &mut Tree, id: NodeId) -> Result<()> {
        match tree.kind(id) {
            NodeKind::For => self.expand_loop(tree, id)?,
            NodeKind::Root | NodeKind::Text | NodeKind::If | NodeKind::Raw | NodeKind::Group => {}
        }
        for child in tree.children(id).to_vec() {
            self.expand_loops(tree, child)?;
        }
        Ok(())
    }

    fn expand_loop(&self, tree: &mut Tree, id: NodeId) -> Result<()> {
        let content = tree.content(id).trim().to_string();
        let Some(expr) = LoopExpr::parse(&content) else {
            report(tree, id, Diagnostic::InvalidFor(content));
            return Ok(());
        };
        let Some(items) = self.context.collection(expr.collection) else {
            report(
                tree,
                id,
                Diagnostic::UnknownCollection(expr.collection.to_string()),
            );
            return Ok(());
        };

        let body = tree.serialize_children(id);
        let scanner = Scanner::new(tree.delimiters()).strict(self.scanner.is_strict());
        let mut groups = Vec::with_capacity(items.len());
        for item in items {
            let group = tree.detached(id, NodeKind::Group);
            tree.bind(group, expr.item, item.clone());
            scanner.scan_into(tree, group, &body)?;
            resolve_raw(tree, group);
            groups.push(group);
        }
        tracing::debug!(collection = expr.collection, items = groups.len(), "expanded loop");
        tree.make_group(id, groups);
        Ok(())
    }

    /// Resolve every If block under `id`. A tree without If blocks is left
    /// untouched.
    pub fn resolve_conditionals(&self, tree: &mut Tree, id: NodeId) {
        let items = loop_items(tree, id);
        self.conditionals(tree, id, &items);
    }

    fn conditionals(&self, tree: &mut Tree, id: NodeId, items: &HashSet<String>) {
        match tree.kind(id) {
            NodeKind::If => match self.evaluate(tree, id, items) {
                Ok(true) => {
                    let children = tree.children(id).to_vec();
                    tree.make_group(id, children);
                }
                Ok(false) => {
                    tree.make_text(id, "");
                    return;
                }
                Err(diagnostic) => {
                    report(tree, id, diagnostic);
                    return;
                }
            },
            NodeKind::Root | NodeKind::Text | NodeKind::For | NodeKind::Raw | NodeKind::Group => {}
        }
        for child in tree.children(id).to_vec() {
            self.conditionals(tree, child, items);
        }
    }

    fn evaluate(
        &self,
        tree: &Tree,
        id: NodeId,
        items: &HashSet<String>,
    ) -> std::result::Result<bool, Diagnostic> {
        let content = tree.content(id).trim();
        let invalid = || Diagnostic::InvalidIf(content.to_string());

        let tokens: Vec<&str> = content.split_whitespace().collect();
        let ["if", path] = tokens.as_slice() else {
            return Err(invalid());
        };
        let (namespace, field) = split_path(path).ok_or_else(invalid)?;

        match self.context.resolve(tree, id, namespace, field) {
            Lookup::UnknownNamespace if !items.contains(namespace) => {
                Err(Diagnostic::UnknownNamespace(namespace.to_string()))
            }
            lookup => Ok(is_truthy(lookup.value())),
        }
    }

    /// Replace `{{ ns.field }}` tokens in Text nodes using loop bindings.
    ///
    /// `site` and `page` tokens, and tokens of unknown namespaces, are left
    /// as they are. A known namespace without the field, or an item
    /// namespace used outside its loop, yields the empty string.
    pub fn substitute_variables(&self, tree: &mut Tree, id: NodeId) {
        let items = loop_items(tree, id);
        self.substitute(tree, id, &items);
    }

    fn substitute(&self, tree: &mut Tree, id: NodeId, items: &HashSet<String>) {
        for node in tree.descendants(id) {
            if tree.kind(node) != NodeKind::Text || tree.is_verbatim(node) {
                continue;
            }
            let replaced = VARIABLE.replace_all(tree.content(node), |caps: &Captures| {
                let namespace = &caps[1];
                if namespace == SITE || namespace == PAGE {
                    return caps[0].to_string();
                }
                match tree.scope(node, namespace) {
                    Some(fields) => fields.get(&caps[2]).cloned().unwrap_or_default(),
                    None if self.context.is_item_namespace(namespace)
                        || items.contains(namespace) =>
                    {
                        String::new()
                    }
                    None => caps[0].to_string(),
                }
            });
            if let Cow::Owned(content) = replaced {
                tree.set_text(node, content);
            }
        }
    }
}

/// Item names declared by the `for` tags under `id`.
fn loop_items(tree: &Tree, id: NodeId) -> HashSet<String> {
    tree.descendants(id)
        .into_iter()
        .filter(|&node| tree.kind(node) == NodeKind::For)
        .filter_map(|node| LoopExpr::parse(tree.content(node).trim()).map(|e| e.item.to_string()))
        .collect()
}

/// Flatten every Raw block under `id` to literal text.
pub fn resolve_raw(tree: &mut Tree, id: NodeId) {
    match tree.kind(id) {
        NodeKind::Raw => {
            let literal = tree.serialize_children(id);
            tree.make_verbatim(id, literal);
        }
        NodeKind::Root | NodeKind::Text | NodeKind::If | NodeKind::For | NodeKind::Group => {
            for child in tree.children(id).to_vec() {
                resolve_raw(tree, child);
            }
        }
    }
}

fn report(tree: &mut Tree, id: NodeId, diagnostic: Diagnostic) {
    tracing::warn!(%diagnostic, "template block replaced with diagnostic");
    tree.make_text(id, diagnostic.to_string());
}

/// `for <item> in <collection>`
struct LoopExpr<'a> {
    item: &'a str,
    collection: &'a str,
}

impl<'a> LoopExpr<'a> {
    fn parse(content: &'a str) -> Option<Self> {
        let tokens: Vec<&str> = content.split_whitespace().collect();
        let ["for", item, "in", collection] = tokens.as_slice() else {
            return None;
        };
        if !is_identifier(item) || *item == SITE || *item == PAGE {
            return None;
        }
        if !collection.split('.').all(is_identifier) {
            return None;
        }
        Some(Self {
            item: *item,
            collection: *collection,
        })
    }
}

/// Split `namespace.field`.
fn split_path(path: &str) -> Option<(&str, &str)> {
    let (namespace, field) = path.split_once('.')?;
    let field_ok = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    (is_identifier(namespace) && field_ok).then_some((namespace, field))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
