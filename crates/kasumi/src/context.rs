//! Variable resolution for the rewrite passes.

use crate::error::{KasumiError, Result};
use crate::value::{collection_from_json, fields_from_json, Fields};
use kasumi_ast::{NodeId, Tree};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Namespace backed by the generation-wide site table.
pub const SITE: &str = "site";
/// Namespace backed by the current page's table.
pub const PAGE: &str = "page";
/// Item namespace of the `site.posts` loop, known even outside it.
pub const POST: &str = "post";

/// Outcome of resolving `namespace.field`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a str),
    /// The namespace is known but has no such field, or is a loop item
    /// namespace used outside its loop.
    Missing,
    /// Neither `site`, `page`, a bound loop item nor a known item name.
    UnknownNamespace,
}

impl<'a> Lookup<'a> {
    pub fn value(self) -> Option<&'a str> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::Missing | Lookup::UnknownNamespace => None,
        }
    }
}

/// Read-only tables a page is rendered against.
#[derive(Debug, Clone)]
pub struct Context {
    site: Fields,
    page: Fields,
    collections: HashMap<String, Vec<Fields>>,
    item_namespaces: HashSet<String>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            site: Fields::new(),
            page: Fields::new(),
            collections: HashMap::new(),
            item_namespaces: HashSet::from([POST.to_string()]),
        }
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(mut self, site: Fields) -> Self {
        self.site = site;
        self
    }

    pub fn with_page(mut self, page: Fields) -> Self {
        self.page = page;
        self
    }

    /// Register a named collection, e.g. `site.posts`, for `for` loops.
    pub fn with_collection(mut self, name: impl Into<String>, items: Vec<Fields>) -> Self {
        self.collections.insert(name.into(), items);
        self
    }

    /// Declare a loop item namespace. Outside its loop it resolves as
    /// empty instead of unknown. `post` is always declared.
    pub fn with_item_namespace(mut self, name: impl Into<String>) -> Self {
        self.item_namespaces.insert(name.into());
        self
    }

    pub fn is_item_namespace(&self, name: &str) -> bool {
        self.item_namespaces.contains(name)
    }

    /// Build a context from JSON data.
    ///
    /// The root must be an object. Its `site` and `page` objects become the
    /// two tables. Arrays of objects become collections named by their path:
    /// `{"site": {"posts": [...]}}` registers `site.posts`, and a top-level
    /// `{"items": [...]}` registers `items`.
    pub fn from_json(data: JsonValue) -> Result<Self> {
        let root = match data {
            JsonValue::Object(obj) => obj,
            _ => {
                return Err(KasumiError::TypeError {
                    message: "Root data must be an object".to_string(),
                });
            }
        };

        let mut context = Self::new();
        for (key, value) in &root {
            match value {
                JsonValue::Object(obj) => {
                    match key.as_str() {
                        SITE => context.site = fields_from_json(obj),
                        PAGE => context.page = fields_from_json(obj),
                        _ => {}
                    }
                    for (member, nested) in obj {
                        if let JsonValue::Array(items) = nested {
                            let name = format!("{key}.{member}");
                            let collection = collection_from_json(&name, items)?;
                            context.collections.insert(name, collection);
                        }
                    }
                }
                JsonValue::Array(items) => {
                    let collection = collection_from_json(key, items)?;
                    context.collections.insert(key.clone(), collection);
                }
                _ => {}
            }
        }
        Ok(context)
    }

    pub fn site(&self) -> &Fields {
        &self.site
    }

    pub fn page(&self) -> &Fields {
        &self.page
    }

    pub fn collection(&self, name: &str) -> Option<&[Fields]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    /// Resolve `namespace.field` as seen from `node`.
    ///
    /// `site` and `page` come from the tables; any other namespace is looked
    /// up in the scope bindings of `node` and its ancestors. A declared item
    /// namespace that no ancestor binds reads as [`Lookup::Missing`].
    pub fn resolve<'a>(
        &'a self,
        tree: &'a Tree,
        node: NodeId,
        namespace: &str,
        field: &str,
    ) -> Lookup<'a> {
        let table = match namespace {
            SITE => Some(&self.site),
            PAGE => Some(&self.page),
            _ => tree.scope(node, namespace),
        };
        match table {
            Some(fields) => fields
                .get(field)
                .map_or(Lookup::Missing, |value| Lookup::Found(value.as_str())),
            None if self.is_item_namespace(namespace) => Lookup::Missing,
            None => Lookup::UnknownNamespace,
        }
    }
}
