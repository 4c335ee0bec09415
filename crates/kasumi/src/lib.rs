//! Kasumi - a tag-tree template engine for small static websites
//!
//! Templates are HTML or Markdown with a handful of tags:
//! - `{% if ns.field %}...{% endif %}` keeps its body when the value is non-empty
//! - `{% for post in site.posts %}...{% endfor %}` repeats its body per item
//! - `{% raw %}...{% endraw %}` keeps its body from being interpreted
//! - `{{ ns.field }}` inserts a value
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let result = kasumi::render(
//!     "{% for post in site.posts %}<li>{{ post.title }}</li>{% endfor %}",
//!     json!({"site": {"posts": [{"title": "First"}, {"title": "Second"}]}}),
//! ).unwrap();
//!
//! assert_eq!(result, "<li>First</li><li>Second</li>");
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod generator;
pub mod markdown;
pub mod site;
pub mod value;

pub use context::{Context, Lookup};
pub use engine::{Diagnostic, Engine};
pub use error::{KasumiError, Result};
pub use generator::{Generator, Interpolated, RenderedPage};
pub use kasumi_ast::{Delimiters, Location, NodeId, NodeKind, ScanError, Scanner, Tree};
pub use markdown::{CommonMark, MarkdownRenderer};
pub use site::{Config, ContentType, Page, Partial, Site};
pub use value::{Fields, ToFields};

/// A checked template, rendered any number of times
///
/// Parsing only checks the source. Every render scans it again, after
/// `{{ site.x }}` and `{{ page.x }}` have been replaced for that context.
pub struct Kasumi {
    source: String,
    scanner: Scanner,
}

impl Kasumi {
    /// Scan a template source string
    ///
    /// # Example
    ///
    /// ```rust
    /// use serde_json::json;
    ///
    /// let tmpl = kasumi::Kasumi::parse("{% if page.title %}Hello, {{ page.title }}!{% endif %}").unwrap();
    /// let html = tmpl.render(json!({"page": {"title": "Alice"}})).unwrap();
    /// assert_eq!(html, "Hello, Alice!");
    /// ```
    pub fn parse(source: &str) -> Result<Self> {
        Self::parse_with(source, Scanner::default())
    }

    /// Scan with custom delimiters or strict end-tag checking
    pub fn parse_with(source: &str, scanner: Scanner) -> Result<Self> {
        scanner.scan(source)?;
        Ok(Self {
            source: source.to_string(),
            scanner,
        })
    }

    /// Render against JSON data (see [`Context::from_json`])
    pub fn render(&self, data: serde_json::Value) -> Result<String> {
        self.render_context(&Context::from_json(data)?)
    }

    /// Render against a prepared [`Context`]
    ///
    /// `{{ site.x }}` and `{{ page.x }}` are replaced first, then the tag
    /// tree is built and rewritten.
    pub fn render_context(&self, context: &Context) -> Result<String> {
        let interpolated = generator::replace_site_page_variables(
            &self.source,
            context.site(),
            context.page(),
            self.scanner.delimiters(),
        );
        let html = Engine::new(context)
            .with_scanner(self.scanner)
            .render(&interpolated.text)?;
        Ok(interpolated.restore(&html))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Convenience function: scan and render in one call
pub fn render(source: &str, data: serde_json::Value) -> Result<String> {
    Kasumi::parse(source)?.render(data)
}
