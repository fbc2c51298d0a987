//! Converts documents and page contexts into template [`Value`]s.
//!
//! Every page is rendered from a [`PageContext`], which is either a single
//! document or a listing of the whole corpus. Both shapes expose the same
//! [`Page`] capability (`title`, `body`, `metadata`), available to templates
//! as `page`, so a layout can render either without knowing which it got.

use crate::config::SiteConfig;
use crate::document::Document;
use gtmpl_value::Value;
use std::collections::HashMap;
use url::Url;

/// Something a layout can render uniformly.
pub trait Page {
    /// The display title.
    fn title(&self) -> &str;

    /// The main content: rendered HTML for a document, the list of
    /// documents for a listing.
    fn body(&self) -> Value;

    /// Everything else a template might want to know.
    fn metadata(&self) -> Value;
}

/// A single document, as seen by its own page.
pub struct DocumentPage<'a> {
    pub document: &'a Document,
    pub base_url: Option<&'a Url>,
}

impl Page for DocumentPage<'_> {
    fn title(&self) -> &str {
        &self.document.title
    }

    fn body(&self) -> Value {
        Value::String(self.document.rendered_body.clone())
    }

    fn metadata(&self) -> Value {
        let mut value = document_value(self.document, self.base_url);
        if let Value::Object(fields) = &mut value {
            fields.remove("body");
            fields.remove("raw");
        }
        value
    }
}

/// The whole corpus, as seen by the index page.
pub struct Listing<'a> {
    pub title: &'a str,
    pub documents: &'a [Document],
    pub base_url: Option<&'a Url>,
}

impl Page for Listing<'_> {
    fn title(&self) -> &str {
        self.title
    }

    fn body(&self) -> Value {
        Value::Array(
            self.documents
                .iter()
                .map(|d| document_value(d, self.base_url))
                .collect(),
        )
    }

    fn metadata(&self) -> Value {
        object(vec![("count", Value::from(self.documents.len() as u64))])
    }
}

/// The data a single page is rendered with.
pub enum PageContext<'a> {
    /// A page for one document.
    Document {
        site: &'a SiteConfig,
        document: &'a Document,
    },

    /// A page listing every document in the corpus.
    Listing {
        site: &'a SiteConfig,
        documents: &'a [Document],
    },
}

impl<'a> PageContext<'a> {
    pub fn document(site: &'a SiteConfig, document: &'a Document) -> Self {
        PageContext::Document { site, document }
    }

    pub fn listing(site: &'a SiteConfig, documents: &'a [Document]) -> Self {
        PageContext::Listing { site, documents }
    }

    pub fn site(&self) -> &'a SiteConfig {
        match *self {
            PageContext::Document { site, .. } => site,
            PageContext::Listing { site, .. } => site,
        }
    }

    /// The display title: the document's title, or the site's title for a
    /// listing.
    pub fn title(&self) -> &'a str {
        match *self {
            PageContext::Document { document, .. } => &document.title,
            PageContext::Listing { site, .. } => &site.title,
        }
    }

    /// Converts the context into a [`Value::Object`] with fields `site`,
    /// `title`, and `page`, plus `document` for document pages or
    /// `documents` and `count` for listings.
    pub fn to_value(&self) -> Value {
        let site = self.site();
        let base_url = site.base_url();
        let base_url = base_url.as_ref();

        let mut fields = vec![
            ("site", Value::from(site.clone())),
            ("title", Value::String(self.title().to_owned())),
        ];
        match *self {
            PageContext::Document { document, .. } => {
                let page = DocumentPage { document, base_url };
                fields.push(("page", page_value(&page)));
                fields.push(("document", document_value(document, base_url)));
            }
            PageContext::Listing { documents, .. } => {
                let page = Listing {
                    title: self.title(),
                    documents,
                    base_url,
                };
                fields.push(("page", page_value(&page)));
                fields.push(("documents", page.body()));
                fields.push(("count", Value::from(documents.len() as u64)));
            }
        }
        object(fields)
    }
}

/// Converts any [`Page`] into an object with `title`, `body`, and `metadata`.
pub fn page_value(page: &dyn Page) -> Value {
    object(vec![
        ("title", Value::String(page.title().to_owned())),
        ("body", page.body()),
        ("metadata", page.metadata()),
    ])
}

/// Converts a [`Document`] into a [`Value::Object`]. The `url` field is the
/// document's page joined onto `base_url`, or its root-relative path when
/// there's no usable base URL.
pub fn document_value(document: &Document, base_url: Option<&Url>) -> Value {
    let href = document.href();
    let url = match base_url.and_then(|base| base.join(&href).ok()) {
        Some(url) => url.to_string(),
        None => format!("/{}", href),
    };
    let (summary, summarized) = document.summary();

    object(vec![
        ("id", Value::String(document.identifier.clone())),
        ("title", Value::String(document.title.clone())),
        ("date", Value::String(document.publish_date.format("%Y-%m-%d").to_string())),
        ("datetime", Value::String(document.publish_date.to_rfc3339())),
        ("description", Value::String(document.description.clone())),
        (
            "tags",
            Value::Array(document.tags.iter().cloned().map(Value::String).collect()),
        ),
        ("keywords", Value::String(document.keywords())),
        ("draft", Value::Bool(document.is_draft)),
        ("body", Value::String(document.rendered_body.clone())),
        ("raw", Value::String(document.raw_body.clone())),
        ("summary", Value::String(summary.to_owned())),
        ("summarized", Value::Bool(summarized)),
        ("path", Value::String(href)),
        ("url", Value::String(url)),
    ])
}

fn object(fields: Vec<(&str, Value)>) -> Value {
    let mut m: HashMap<String, Value> = HashMap::with_capacity(fields.len());
    for (key, value) in fields {
        m.insert(key.to_owned(), value);
    }
    Value::Object(m)
}
