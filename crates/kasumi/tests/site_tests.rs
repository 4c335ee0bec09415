//! End-to-end tests for the page pipeline: layouts, includes, Markdown,
//! post listings and base URLs.

use kasumi::{Config, ContentType, Generator, KasumiError, MarkdownRenderer, Page, Partial, Site};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

const LAYOUT: &str = "<html><head><title>{{ site.title }} - {{ page.title }}</title></head><body>{% include header.html %}{{ content }}</body></html>";

fn blog() -> Site {
    let mut config = Config {
        title: "Kasumi".to_string(),
        url: "https://example.com".to_string(),
        ..Config::default()
    };
    config.custom.insert("theme".to_string(), "dark".to_string());

    let mut site = Site::new(config);
    site.add_layout(Partial::new("default", LAYOUT))
        .add_include(Partial::new("header", r#"<nav><a href="/">Home</a></nav>"#))
        .add_post(
            Page::new("2024-01-02-first", ContentType::Markdown, "# First\n\nHello *world*.\n")
                .with_layout("default")
                .with_title("First"),
        )
        .add_post(
            Page::new("2024-02-03-second", ContentType::Html, "<p>Second body</p>")
                .with_layout("default")
                .with_title("Second")
                .with_categories("rust"),
        )
        .add_page(
            Page::new(
                "index",
                ContentType::Html,
                r#"<ul>{% for post in site.posts %}<li><a href="{{ post.url }}">{{ post.title }}</a></li>{% endfor %}</ul>"#,
            )
            .with_layout("default")
            .with_title("Home"),
        );
    site
}

// ============================================================================
// Whole site
// ============================================================================

#[test]
fn generate_outputs_posts_then_pages() {
    let mut site = blog();
    let rendered = Generator::new().generate(&mut site).unwrap();

    let paths: Vec<PathBuf> = rendered.iter().map(|page| page.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("posts/2024/01/02/index.html"),
            PathBuf::from("rust/2024/02/03/index.html"),
            PathBuf::from("index.html"),
        ]
    );
    assert_eq!(site.posts[0].url, "/posts/2024/01/02/index.html");
    assert_eq!(site.posts[1].url, "/rust/2024/02/03/index.html");
}

#[test]
fn index_lists_posts_with_absolute_links() {
    let mut site = blog();
    let rendered = Generator::new().generate(&mut site).unwrap();
    let index = rendered.iter().find(|page| page.name == "index").unwrap();

    assert_eq!(
        index.html,
        concat!(
            "<html><head><title>Kasumi - Home</title></head><body>",
            r#"<nav><a href="https://example.com/">Home</a></nav>"#,
            "<ul>",
            r#"<li><a href="https://example.com/posts/2024/01/02/index.html">First</a></li>"#,
            r#"<li><a href="https://example.com/rust/2024/02/03/index.html">Second</a></li>"#,
            "</ul></body></html>"
        )
    );
}

#[test]
fn markdown_post_is_converted() {
    let mut site = blog();
    let rendered = Generator::new().generate(&mut site).unwrap();
    let post = &rendered[0];

    assert_eq!(post.name, "2024-01-02-first");
    assert!(post.html.starts_with("<html><head><title>Kasumi - First</title>"));
    assert!(post.html.contains("<h1>First</h1>"));
    assert!(post.html.contains("<em>world</em>"));
}

#[test]
fn base_url_includes_baseurl_segment() {
    let mut site = blog();
    site.config.baseurl = "blog".to_string();
    let rendered = Generator::new().generate(&mut site).unwrap();
    let index = rendered.iter().find(|page| page.name == "index").unwrap();

    assert!(index
        .html
        .contains(r#"<a href="https://example.com/blog/rust/2024/02/03/index.html">Second</a>"#));
}

// ============================================================================
// Single page
// ============================================================================

#[test]
fn site_and_page_fields_reach_templates() {
    let site = blog();
    let page = Page::new(
        "about",
        ContentType::Html,
        "{{ page.description }}|{{ site.theme }}|{{ page.nope }}|{% if page.author %}by{% endif %}",
    )
    .with_layout("default")
    .with_title("About")
    .with_description("Who we are");

    let html = Generator::new().render_page(&site, &page).unwrap();
    assert!(html.contains("<title>Kasumi - About</title>"));
    assert!(html.contains("Who we are|dark||</body>"));
}

#[test]
fn nested_includes_are_expanded() {
    let mut site = blog();
    site.add_include(Partial::new("outer", "[{% include inner.html %}]"))
        .add_include(Partial::new("inner", "{{ page.title }}"))
        .add_include(Partial::new("note", "*note*"));
    let page = Page::new(
        "about",
        ContentType::Html,
        "{% include outer.html %}{% include note.markdown %}",
    )
    .with_layout("default")
    .with_title("About");

    let html = Generator::new().render_page(&site, &page).unwrap();
    assert!(html.ends_with("[About]*note*</body></html>"));
}

#[test]
fn raw_survives_markdown_and_variables() {
    let site = blog();
    let page = Page::new(
        "about",
        ContentType::Markdown,
        "{% raw %}{{ page.title }} {% if page.title %}x{% endif %}{% endraw %}\n",
    )
    .with_layout("default")
    .with_title("About");

    let html = Generator::new().render_page(&site, &page).unwrap();
    assert!(html.contains("{{ page.title }} {% if page.title %}x{% endif %}"));
    assert!(!html.contains("{% raw %}"));
}

#[test]
fn custom_markdown_renderer() {
    struct Shout;
    impl MarkdownRenderer for Shout {
        fn render(&self, markdown: &str) -> String {
            markdown.to_uppercase()
        }
    }

    let site = blog();
    let page = Page::new("about", ContentType::Markdown, "quiet")
        .with_layout("default")
        .with_title("About");
    let html = Generator::new()
        .with_markdown(Shout)
        .render_page(&site, &page)
        .unwrap();
    assert!(html.contains(r#"<body><nav><a href="https://example.com/">Home</a></nav>QUIET</body>"#));
}

#[test]
fn template_mistakes_render_inline() {
    let site = blog();
    let page = Page::new(
        "about",
        ContentType::Html,
        "{% for post in site.drafts %}x{% endfor %}{% if oops %}y{% endif %}",
    )
    .with_layout("default");

    let html = Generator::new().render_page(&site, &page).unwrap();
    assert!(html.contains("UNKNOWN COLLECTION (site.drafts)INVALID IF (if oops)"));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unknown_include_names_the_page() {
    let mut site = blog();
    site.add_page(
        Page::new("about", ContentType::Html, "{% include missing.html %}").with_layout("default"),
    );

    let err = Generator::new().generate(&mut site).unwrap_err();
    match err {
        KasumiError::Page { name, source } => {
            assert_eq!(name, "about");
            assert!(matches!(
                *source,
                KasumiError::UnknownInclude { ref name } if name == "missing"
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_layout_names_the_page() {
    let mut site = blog();
    site.add_page(Page::new("about", ContentType::Html, "x").with_layout("wide"));

    let err = Generator::new().generate(&mut site).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Error generating 'about': Layout 'wide' does not exist"
    );
}

#[test]
fn invalid_post_name_stops_generation() {
    let mut site = blog();
    site.add_post(Page::new("first-post", ContentType::Markdown, "x").with_layout("default"));

    let err = Generator::new().generate(&mut site).unwrap_err();
    match err {
        KasumiError::Page { name, source } => {
            assert_eq!(name, "first-post");
            assert!(matches!(*source, KasumiError::InvalidPostName { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
