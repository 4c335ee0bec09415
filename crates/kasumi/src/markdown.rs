//! Markdown to HTML conversion for page bodies.
//!
//! Template tags that must reach the tag engine untouched (`include`, `raw`,
//! `endraw`) are swapped for HTML comment placeholders before the Markdown
//! renderer runs and swapped back afterwards.

use pulldown_cmark::{html, Options, Parser};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static INCLUDE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%[ ]*include[ ]*[A-Za-z0-9_\-]+\.(?:html|markdown)[ ]*%\}")
        .expect("include pattern is valid")
});

static RAW_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{%[ ]*(?:endraw|raw)[ ]*%\}").expect("raw pattern is valid")
});

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<a href="([^"]*)""#).expect("anchor pattern is valid"));

/// Converts Markdown text to HTML.
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark with tables, footnotes and strikethrough. Links that are not
/// relative open in a new tab.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl MarkdownRenderer for CommonMark {
    fn render(&self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH;
        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        target_blank(&out)
    }
}

/// Add `target="_blank"` to every anchor whose link is not relative.
fn target_blank(html: &str) -> String {
    ANCHOR
        .replace_all(html, |caps: &Captures| {
            if is_relative_link(&caps[1]) {
                caps[0].to_string()
            } else {
                format!(r#"{} target="_blank""#, &caps[0])
            }
        })
        .into_owned()
}

/// `#frag`, `/path` (not `//host`), `./x` and `../x` are relative.
fn is_relative_link(link: &str) -> bool {
    link.is_empty()
        || link.starts_with('#')
        || (link.starts_with('/') && !link.starts_with("//"))
        || link.starts_with("./")
        || link.starts_with("../")
}

/// Render Markdown while keeping `include`/`raw`/`endraw` tags byte-identical.
pub fn render_masked(renderer: &dyn MarkdownRenderer, markdown: &str) -> String {
    let mut masked = markdown.to_string();
    let mut replaced: Vec<(String, String)> = Vec::new();

    for pattern in [&*INCLUDE_TAG, &*RAW_TAG] {
        let tags: Vec<String> = pattern
            .find_iter(&masked)
            .map(|m| m.as_str().to_string())
            .collect();
        for tag in tags {
            if replaced.iter().any(|(original, _)| *original == tag) {
                continue;
            }
            let placeholder = format!("<!--kasumi-tag-{}-->", replaced.len());
            masked = masked.replace(&tag, &placeholder);
            replaced.push((tag, placeholder));
        }
    }

    let mut html = renderer.render(&masked);
    for (tag, placeholder) in &replaced {
        html = html.replace(placeholder, tag);
    }
    html
}
