//! Site records handed over by whatever loads the source directory.
//!
//! All of them deserialize with serde, so front matter and `_config.yml`
//! can be read by any serde format. Field tables for templates come from a
//! fixed accessor list per record.

use crate::value::{fields_from, Fields, ToFields};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// How a body must be turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Markdown,
}

impl ContentType {
    /// Pick the content type from a file name extension.
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".markdown") || name.ends_with(".md") {
            ContentType::Markdown
        } else {
            ContentType::Html
        }
    }
}

/// Site-wide configuration, the `site` namespace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub subtitle: String,
    pub email: String,
    pub description: String,
    pub baseurl: String,
    pub url: String,
    pub github_username: String,
    pub custom: BTreeMap<String, String>,
}

impl Config {
    const FIELDS: &'static [(&'static str, fn(&Config) -> &str)] = &[
        ("title", |c| c.title.as_str()),
        ("subtitle", |c| c.subtitle.as_str()),
        ("email", |c| c.email.as_str()),
        ("description", |c| c.description.as_str()),
        ("baseurl", |c| c.baseurl.as_str()),
        ("url", |c| c.url.as_str()),
        ("github_username", |c| c.github_username.as_str()),
    ];

    /// Base URL prefixed to root-relative links: `url` or `url/baseurl`.
    pub fn base_url(&self) -> String {
        if self.baseurl.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{}", self.url, self.baseurl)
        }
    }
}

impl ToFields for Config {
    /// Named fields, plus `custom` entries that don't collide with them.
    fn fields(&self) -> Fields {
        let mut fields = fields_from(self, Self::FIELDS);
        for (key, value) in &self.custom {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
        fields
    }
}

/// A page or a post: front matter plus body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Page {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub content_type: ContentType,
    pub layout: String,
    pub title: String,
    pub permalink: String,
    pub description: String,
    pub author: String,
    pub author_link: String,
    pub date: String,
    pub categories: String,
    pub body: String,
    pub url: String,
}

impl Page {
    const FIELDS: &'static [(&'static str, fn(&Page) -> &str)] = &[
        ("layout", |p| p.layout.as_str()),
        ("title", |p| p.title.as_str()),
        ("permalink", |p| p.permalink.as_str()),
        ("description", |p| p.description.as_str()),
        ("author", |p| p.author.as_str()),
        ("author_link", |p| p.author_link.as_str()),
        ("date", |p| p.date.as_str()),
        ("categories", |p| p.categories.as_str()),
        ("body", |p| p.body.as_str()),
        ("url", |p| p.url.as_str()),
    ];

    pub fn new(
        name: impl Into<String>,
        content_type: ContentType,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = layout.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_categories(mut self, categories: impl Into<String>) -> Self {
        self.categories = categories.into();
        self
    }
}

impl ToFields for Page {
    fn fields(&self) -> Fields {
        fields_from(self, Self::FIELDS)
    }
}

/// A layout or an include: a named template body.
#[derive(Debug, Clone, Default)]
pub struct Partial {
    pub name: String,
    pub body: String,
    pub content_type: ContentType,
}

impl Partial {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            content_type: ContentType::Html,
        }
    }
}

/// Everything loaded from a source directory.
///
/// Pages and posts keep the order they were added in; that order is the
/// iteration order of `site.posts`.
#[derive(Debug, Clone, Default)]
pub struct Site {
    pub config: Config,
    pub pages: Vec<Page>,
    pub posts: Vec<Page>,
    pub layouts: HashMap<String, Partial>,
    pub includes: HashMap<String, Partial>,
}

impl Site {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn add_page(&mut self, page: Page) -> &mut Self {
        self.pages.push(page);
        self
    }

    pub fn add_post(&mut self, post: Page) -> &mut Self {
        self.posts.push(post);
        self
    }

    pub fn add_layout(&mut self, layout: Partial) -> &mut Self {
        self.layouts.insert(layout.name.clone(), layout);
        self
    }

    pub fn add_include(&mut self, include: Partial) -> &mut Self {
        self.includes.insert(include.name.clone(), include);
        self
    }

    pub fn layout(&self, name: &str) -> Option<&Partial> {
        self.layouts.get(name)
    }

    pub fn include(&self, name: &str) -> Option<&Partial> {
        self.includes.get(name)
    }

    /// Field tables of every post, in order.
    pub fn post_fields(&self) -> Vec<Fields> {
        self.posts.iter().map(ToFields::fields).collect()
    }
}
