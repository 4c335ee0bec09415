//! Page pipeline: from a [`Site`] to rendered HTML strings.
//!
//! For each page:
//! 1. look up its layout
//! 2. convert the body (Markdown bodies go through [`render_masked`])
//! 3. put the body in place of `{{ content }}`
//! 4. expand `{% include name.html %}` until none remain
//! 5. replace `{{ site.x }}` and `{{ page.x }}`, holding back values that
//!    contain template syntax
//! 6. run the tag engine with `site.posts` as a loop collection, then put
//!    held values back
//! 7. prefix root-relative `href`s with the site base URL

use crate::context::Context;
use crate::engine::Engine;
use crate::error::{KasumiError, Result};
use crate::markdown::{render_masked, CommonMark, MarkdownRenderer};
use crate::site::{ContentType, Page, Site};
use crate::value::{Fields, ToFields};
use kasumi_ast::{Delimiters, NodeKind, Scanner};
use regex::{Captures, NoExpand, Regex};
use std::path::PathBuf;
use std::sync::LazyLock;

static CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[ ]*content[ ]*\}\}").expect("content pattern is valid")
});

static INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%[ ]*include[ ]*([A-Za-z0-9_\-]+)\.(?:html|markdown)[ ]*%\}")
        .expect("include pattern is valid")
});

static SITE_PAGE_VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{[ ]*(site|page)\.([A-Za-z0-9_\-]+)[ ]*\}\}")
        .expect("variable pattern is valid")
});

static HELD_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x{E000}([0-9]+)\x{E001}").expect("held value pattern is valid")
});

static ROOT_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="/([^/])"#).expect("href pattern is valid"));

static POST_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})-([01][0-9])-([0-3][0-9])-([A-Za-z0-9_\-]+)$")
        .expect("post name pattern is valid")
});

static CATEGORIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\- ]+$").expect("categories pattern is valid"));

/// Collection name under which posts are visible to `for` loops.
pub const POSTS_COLLECTION: &str = "site.posts";

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub name: String,
    /// Path relative to the destination directory.
    pub path: PathBuf,
    pub html: String,
}

pub struct Generator {
    markdown: Box<dyn MarkdownRenderer>,
    max_include_depth: usize,
    scanner: Scanner,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 10;

    pub fn new() -> Self {
        Self {
            markdown: Box::new(CommonMark),
            max_include_depth: Self::DEFAULT_MAX_INCLUDE_DEPTH,
            scanner: Scanner::default(),
        }
    }

    pub fn with_markdown(mut self, renderer: impl MarkdownRenderer + 'static) -> Self {
        self.markdown = Box::new(renderer);
        self
    }

    /// Rounds of include expansion before giving up on a (likely) cycle.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    /// Render every post and page of `site`.
    ///
    /// Post URLs are assigned first so listings on any page can link to
    /// them. Posts come out before pages, each in site order.
    pub fn generate(&self, site: &mut Site) -> Result<Vec<RenderedPage>> {
        for post in &mut site.posts {
            let segments = post_segments(post).map_err(|e| e.in_page(&post.name))?;
            post.url = format!("/{}", segments.join("/"));
        }

        let site = &*site;
        let site_fields = site.config.fields();
        let posts = site.post_fields();
        let mut rendered = Vec::with_capacity(site.posts.len() + site.pages.len());

        for post in &site.posts {
            let html = self
                .render_with(site, post, &site_fields, &posts)
                .map_err(|e| e.in_page(&post.name))?;
            rendered.push(RenderedPage {
                name: post.name.clone(),
                path: post_output_path(post)?,
                html,
            });
        }

        for page in &site.pages {
            let html = self
                .render_with(site, page, &site_fields, &posts)
                .map_err(|e| e.in_page(&page.name))?;
            rendered.push(RenderedPage {
                name: page.name.clone(),
                path: page_output_path(&page.name),
                html,
            });
        }

        tracing::debug!(outputs = rendered.len(), "site generated");
        Ok(rendered)
    }

    /// Render a single page or post of `site`.
    pub fn render_page(&self, site: &Site, page: &Page) -> Result<String> {
        self.render_with(site, page, &site.config.fields(), &site.post_fields())
    }

    fn render_with(
        &self,
        site: &Site,
        page: &Page,
        site_fields: &Fields,
        posts: &[Fields],
    ) -> Result<String> {
        let layout = site
            .layout(&page.layout)
            .ok_or_else(|| KasumiError::UnknownLayout {
                name: page.layout.clone(),
            })?;
        tracing::debug!(page = %page.name, layout = %layout.name, "rendering page");

        let body = match page.content_type {
            ContentType::Html => page.body.clone(),
            ContentType::Markdown => render_masked(self.markdown.as_ref(), &page.body),
        };

        let html = CONTENT.replace_all(&layout.body, NoExpand(&body));
        let html = self.expand_includes(site, html.into_owned())?;

        let page_fields = page.fields();
        let interpolated = replace_site_page_variables(
            &html,
            site_fields,
            &page_fields,
            self.scanner.delimiters(),
        );

        let context = Context::new()
            .with_site(site_fields.clone())
            .with_page(page_fields)
            .with_collection(POSTS_COLLECTION, posts.to_vec());
        let html = Engine::new(&context)
            .with_scanner(self.scanner)
            .render(&interpolated.text)?;
        let html = interpolated.restore(&html);

        Ok(add_base_url(&html, &site.config.base_url()))
    }

    /// Replace include tags with include bodies, round after round, until
    /// none are left.
    fn expand_includes(&self, site: &Site, mut html: String) -> Result<String> {
        for round in 0..self.max_include_depth {
            if !INCLUDE.is_match(&html) {
                return Ok(html);
            }

            let mut missing = None;
            let expanded = INCLUDE.replace_all(&html, |caps: &Captures| {
                match site.include(&caps[1]) {
                    Some(include) => include.body.clone(),
                    None => {
                        missing.get_or_insert_with(|| caps[1].to_string());
                        String::new()
                    }
                }
            });
            if let Some(name) = missing {
                return Err(KasumiError::UnknownInclude { name });
            }
            html = expanded.into_owned();
            tracing::debug!(round, "expanded includes");
        }

        match INCLUDE.captures(&html) {
            Some(caps) => Err(KasumiError::IncludeDepthExceeded {
                name: caps[1].to_string(),
                limit: self.max_include_depth,
            }),
            None => Ok(html),
        }
    }
}

/// Template text with `{{ site.x }}` and `{{ page.x }}` replaced.
///
/// Values containing a tag start or `{{` are held back behind placeholders
/// so the scanner never sees them; [`Interpolated::restore`] puts them into
/// the rendered output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interpolated {
    pub text: String,
    held: Vec<String>,
}

impl Interpolated {
    pub fn restore(&self, rendered: &str) -> String {
        if self.held.is_empty() {
            return rendered.to_string();
        }
        HELD_VALUE
            .replace_all(rendered, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| self.held.get(index))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Replace `{{ site.x }}` and `{{ page.x }}`; unknown fields become empty.
///
/// Raw blocks are found the way the scanner finds them and copied
/// unchanged.
pub fn replace_site_page_variables(
    html: &str,
    site: &Fields,
    page: &Fields,
    delimiters: Delimiters,
) -> Interpolated {
    let tag_start = delimiters.tag_start();
    let tag_end = delimiters.tag_end();
    let mut held: Vec<String> = Vec::new();
    let mut out = String::with_capacity(html.len());

    let mut replace = |segment: &str, out: &mut String| {
        let replaced = SITE_PAGE_VARIABLE.replace_all(segment, |caps: &Captures| {
            let table = if &caps[1] == "site" { site } else { page };
            let value = table.get(&caps[2]).map(String::as_str).unwrap_or_default();
            if value.contains(tag_start.as_str()) || value.contains("{{") {
                held.push(value.to_string());
                format!("\u{E000}{}\u{E001}", held.len() - 1)
            } else {
                value.to_string()
            }
        });
        out.push_str(&replaced);
    };

    // Blocks open inside the current raw block, the raw block included.
    let mut open = 0usize;
    let mut last = 0;
    let mut pos = 0;
    while let Some(start) = html[pos..].find(tag_start.as_str()) {
        let tag_at = pos + start;
        let inner_at = tag_at + tag_start.len();
        let Some(len) = html[inner_at..].find(tag_end.as_str()) else {
            break;
        };
        let next = inner_at + len + tag_end.len();
        let name = html[inner_at..inner_at + len]
            .split_whitespace()
            .next()
            .unwrap_or("");

        match (NodeKind::from_open_tag(name), NodeKind::from_end_tag(name)) {
            (Some(NodeKind::Raw), _) if open == 0 => {
                replace(&html[last..tag_at], &mut out);
                last = tag_at;
                open = 1;
            }
            (Some(_), _) if open > 0 => open += 1,
            (_, Some(_)) if open > 0 => {
                open -= 1;
                if open == 0 {
                    out.push_str(&html[last..next]);
                    last = next;
                }
            }
            _ => {}
        }
        pos = next;
    }
    if open == 0 {
        replace(&html[last..], &mut out);
    } else {
        out.push_str(&html[last..]);
    }

    Interpolated { text: out, held }
}

/// Prefix every root-relative `href="/..."` with `base_url`.
/// Protocol-relative `href="//..."` links are left alone.
pub fn add_base_url(html: &str, base_url: &str) -> String {
    if base_url.is_empty() {
        return html.to_string();
    }
    ROOT_HREF
        .replace_all(html, |caps: &Captures| {
            format!("href=\"{base_url}/{}", &caps[1])
        })
        .into_owned()
}

/// Output path of a page: `index.html`, `404.html` or `<name>/index.html`.
pub fn page_output_path(name: &str) -> PathBuf {
    match name {
        "index" => PathBuf::from("index.html"),
        "404" => PathBuf::from("404.html"),
        _ => PathBuf::from(name).join("index.html"),
    }
}

/// Output path of a post named `YYYY-MM-DD-slug`:
/// `<categories...>/YYYY/MM/DD/index.html`, or under `posts/` when the
/// post has no usable categories.
pub fn post_output_path(post: &Page) -> Result<PathBuf> {
    Ok(post_segments(post)?.iter().collect())
}

fn post_segments(post: &Page) -> Result<Vec<String>> {
    let caps = POST_NAME
        .captures(&post.name)
        .ok_or_else(|| KasumiError::InvalidPostName {
            name: post.name.clone(),
        })?;

    let mut segments: Vec<String> = Vec::new();
    if CATEGORIES.is_match(&post.categories) {
        segments.extend(post.categories.split_whitespace().map(str::to_string));
    }
    if segments.is_empty() {
        segments.push("posts".to_string());
    }
    segments.extend((1..=3).map(|i| caps[i].to_string()));
    segments.push("index.html".to_string());
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Config, Partial};
    use pretty_assertions::assert_eq;

    fn site() -> Site {
        let mut site = Site::new(Config {
            title: "Kasumi".to_string(),
            ..Config::default()
        });
        site.add_layout(Partial::new("default", "<main>{{ content }}</main>"));
        site
    }

    #[test]
    fn test_page_output_path() {
        assert_eq!(page_output_path("index"), PathBuf::from("index.html"));
        assert_eq!(page_output_path("404"), PathBuf::from("404.html"));
        assert_eq!(page_output_path("about"), PathBuf::from("about/index.html"));
    }

    #[test]
    fn test_post_output_path() {
        let post = Page::new("2024-03-28-hello-world", ContentType::Markdown, "");
        assert_eq!(
            post_output_path(&post).unwrap(),
            PathBuf::from("posts/2024/03/28/index.html")
        );

        let post = post.with_categories("rust  notes");
        assert_eq!(
            post_output_path(&post).unwrap(),
            PathBuf::from("rust/notes/2024/03/28/index.html")
        );

        let post = post.with_categories("../etc");
        assert_eq!(
            post_output_path(&post).unwrap(),
            PathBuf::from("posts/2024/03/28/index.html")
        );
    }

    #[test]
    fn test_invalid_post_name() {
        let post = Page::new("hello-world", ContentType::Markdown, "");
        assert!(matches!(
            post_output_path(&post),
            Err(KasumiError::InvalidPostName { .. })
        ));
    }

    #[test]
    fn test_replace_site_page_variables() {
        let site: Fields = [("title".to_string(), "S".to_string())].into();
        let page: Fields = [("title".to_string(), "P".to_string())].into();
        let interpolated = replace_site_page_variables(
            "{{ site.title }}/{{page.title}}/{{ page.nope }}/{{ post.title }}",
            &site,
            &page,
            Delimiters::default(),
        );
        assert_eq!(interpolated.text, "S/P//{{ post.title }}");
        assert_eq!(interpolated.restore("x"), "x");
    }

    #[test]
    fn test_site_page_variables_skip_raw() {
        let page: Fields = [("title".to_string(), "P".to_string())].into();
        let interpolated = replace_site_page_variables(
            "{{ page.title }}{% raw %}{{ page.title }}{% if x %}{% endif %}{{ page.title }}{% endraw %}{{ page.title }}",
            &Fields::new(),
            &page,
            Delimiters::default(),
        );
        assert_eq!(
            interpolated.text,
            "P{% raw %}{{ page.title }}{% if x %}{% endif %}{{ page.title }}{% endraw %}P"
        );
    }

    #[test]
    fn test_values_with_tag_syntax_are_held_back() {
        let page: Fields = [
            ("title".to_string(), "Using {% raw %} tags".to_string()),
            ("description".to_string(), "see {{ post.title }}".to_string()),
        ]
        .into();
        let interpolated = replace_site_page_variables(
            "<h1>{{ page.title }}</h1>{{ page.description }}",
            &Fields::new(),
            &page,
            Delimiters::default(),
        );
        assert!(!interpolated.text.contains("{%"));
        assert!(!interpolated.text.contains("{{"));
        assert_eq!(
            interpolated.restore(&interpolated.text),
            "<h1>Using {% raw %} tags</h1>see {{ post.title }}"
        );
    }

    #[test]
    fn test_page_title_with_raw_tag_renders_literally() {
        let site = site();
        let page = Page::new(
            "index",
            ContentType::Html,
            "<h1>{{ page.title }}</h1>{% if page.title %}ok{% endif %}<p>tail</p>",
        )
        .with_layout("default")
        .with_title("Using {% raw %} tags");
        assert_eq!(
            Generator::new().render_page(&site, &page).unwrap(),
            "<main><h1>Using {% raw %} tags</h1>ok<p>tail</p></main>"
        );
    }

    #[test]
    fn test_add_base_url() {
        let html = r#"<a href="/about/">a</a><a href="//cdn.example/x">b</a><a href="https://x">c</a>"#;
        assert_eq!(
            add_base_url(html, "https://example.com/blog"),
            r#"<a href="https://example.com/blog/about/">a</a><a href="//cdn.example/x">b</a><a href="https://x">c</a>"#
        );
        assert_eq!(add_base_url(html, ""), html);
    }

    #[test]
    fn test_layout_content_is_not_expanded() {
        let site = site();
        let page =
            Page::new("index", ContentType::Html, "costs $1 and ${x}").with_layout("default");
        assert_eq!(
            Generator::new().render_page(&site, &page).unwrap(),
            "<main>costs $1 and ${x}</main>"
        );
    }

    #[test]
    fn test_unknown_layout() {
        let site = site();
        let page = Page::new("index", ContentType::Html, "x").with_layout("missing");
        let err = Generator::new().render_page(&site, &page).unwrap_err();
        assert!(matches!(err, KasumiError::UnknownLayout { name } if name == "missing"));
    }

    #[test]
    fn test_include_cycle_is_reported() {
        let mut site = site();
        site.add_include(Partial::new("a", "{% include b.html %}"));
        site.add_include(Partial::new("b", "{% include a.html %}"));
        let page = Page::new("index", ContentType::Html, "{% include a.html %}").with_layout("default");
        let err = Generator::new()
            .with_max_include_depth(4)
            .render_page(&site, &page)
            .unwrap_err();
        assert!(matches!(
            err,
            KasumiError::IncludeDepthExceeded { limit: 4, .. }
        ));
    }
}
