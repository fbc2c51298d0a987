//! Composes output pages from a shared layout and a page-specific fragment.
//!
//! The layout is a template that calls `{{template "content" .}}` exactly
//! once; each fragment defines that block with
//! `{{define "content"}}...{{end}}`. The [`Composer`] reads the layout once
//! and keeps its source immutable. Every call to [`Composer::compose`] reads
//! the fragment afresh and parses layout and fragment into a brand new
//! [`Template`], so no definition from one page can leak into the next.
//! Only the fragment's definitions reach the page: whitespace around them is
//! dropped and anything else at its top level is an error.

use crate::value::PageContext;
use gtmpl::{Context, Template};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Renders pages by merging one layout with per-page fragments.
pub struct Composer {
    templates_directory: PathBuf,
    layout_path: PathBuf,
    layout: String,
}

impl Composer {
    /// Reads the layout `layout_name` from `templates_directory` and checks
    /// that it parses. Fragments are later resolved relative to the same
    /// directory.
    pub fn load(templates_directory: &Path, layout_name: &str) -> Result<Composer> {
        let layout_path = templates_directory.join(layout_name);
        let layout = read_template(&layout_path)?;
        Template::default()
            .parse(&layout)
            .map_err(|message| Error::Parse {
                path: layout_path.clone(),
                message,
            })?;
        debug!(layout = %layout_path.display(), "loaded layout");

        Ok(Composer {
            templates_directory: templates_directory.to_owned(),
            layout_path,
            layout,
        })
    }

    /// Renders the layout with the fragment `fragment_name` and writes the
    /// result to `output_path`, creating any missing parent directories. The
    /// page is rendered completely before the file is created, so a template
    /// error never leaves a partial file behind.
    pub fn compose(
        &self,
        fragment_name: &str,
        context: &PageContext,
        output_path: &Path,
    ) -> Result<()> {
        let page = self.render(fragment_name, context)?;

        if let Some(dir) = output_path.parent() {
            fs::create_dir_all(dir).map_err(|err| Error::Write {
                path: dir.to_owned(),
                source: err,
            })?;
        }
        fs::write(output_path, page).map_err(|err| Error::Write {
            path: output_path.to_owned(),
            source: err,
        })?;

        debug!(
            fragment = fragment_name,
            output = %output_path.display(),
            title = context.title(),
            "composed page"
        );
        Ok(())
    }

    /// Renders the layout with the fragment `fragment_name` into memory.
    pub fn render(&self, fragment_name: &str, context: &PageContext) -> Result<Vec<u8>> {
        let fragment_path = self.templates_directory.join(fragment_name);
        let fragment = read_template(&fragment_path)?;

        let mut source =
            String::with_capacity(self.layout.len() + FRAGMENT_MARKER.len() + fragment.len());
        source.push_str(&self.layout);
        source.push_str(FRAGMENT_MARKER);
        source.push_str(&fragment);

        let mut template = Template::default();
        template.parse(&source).map_err(|message| Error::Parse {
            path: fragment_path.clone(),
            message,
        })?;

        let context = Context::from(context.to_value()).map_err(|message| Error::Execute {
            layout: self.layout_path.clone(),
            fragment: fragment_path.clone(),
            message,
        })?;
        let mut page = Vec::new();
        template
            .execute(&mut page, &context)
            .map_err(|message| Error::Execute {
                layout: self.layout_path.clone(),
                fragment: fragment_path.clone(),
                message,
            })?;

        // Everything after the marker is what the fragment emits outside its
        // definitions; only whitespace is allowed there and it is dropped.
        if let Some(at) = rfind(&page, FRAGMENT_MARKER.as_bytes()) {
            let residue = &page[at + FRAGMENT_MARKER.len()..];
            if !residue.iter().all(u8::is_ascii_whitespace) {
                return Err(Error::OutsideDefinition {
                    path: fragment_path,
                });
            }
            page.truncate(at);
        }
        Ok(page)
    }
}

/// Separates the layout's output from the fragment's top-level output.
const FRAGMENT_MARKER: &str = "\u{1f}scriven:fragment\u{1f}";

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| Error::Read {
        path: path.to_owned(),
        source: err,
    })
}

/// The result of a fallible page-composition operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error composing a page.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a layout or fragment file can't be read.
    #[error("reading template `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when a layout or fragment isn't a valid template.
    #[error("parsing template `{}`: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// Returned when the merged template fails to execute, e.g. because it
    /// references an undefined template or field.
    #[error(
        "executing template `{}` with `{}`: {message}",
        .layout.display(),
        .fragment.display()
    )]
    Execute {
        layout: PathBuf,
        fragment: PathBuf,
        message: String,
    },

    /// Returned when a fragment has text or actions outside its
    /// `{{define}}` blocks.
    #[error("fragment `{}` has content outside `{{{{define}}}}` blocks", .path.display())]
    OutsideDefinition { path: PathBuf },

    /// Returned when the page can't be written.
    #[error("writing page `{}`", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Whether this is a template problem (as opposed to an I/O problem with
    /// the output).
    pub fn is_template_error(&self) -> bool {
        !matches!(self, Error::Write { .. })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::SiteConfig;
    use crate::document::Document;
    use tempfile::TempDir;

    const LAYOUT: &str = r#"<html><head><title>{{.title}}</title></head><body>{{template "content" .}}</body></html>"#;
    const POST: &str = r#"{{define "content"}}<article>{{.document.body}}</article>{{end}}"#;
    const INDEX: &str = r#"{{define "content"}}<ul>{{range .documents}}<li>{{.title}}</li>{{end}}</ul>{{end}}"#;

    fn templates() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("base.html"), LAYOUT).unwrap();
        fs::write(dir.path().join("post.html"), POST).unwrap();
        fs::write(dir.path().join("index.html"), INDEX).unwrap();
        dir
    }

    fn document(name: &str, title: &str) -> Document {
        Document::parse(
            &format!("---\ntitle: {}\ndate: 2024-01-15T10:00:00Z\n---\n**bold** & <em>raw</em>", title),
            Path::new(name),
        )
        .unwrap()
    }

    #[test]
    fn test_compose_document_page() -> Result<()> {
        let templates = templates();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();
        let doc = document("hello.md", "Hello");

        let path = out.path().join("posts").join("hello.html");
        composer.compose("post.html", &PageContext::document(&site, &doc), &path)?;

        let html = fs::read_to_string(&path).unwrap();
        assert!(html.starts_with("<html><head><title>Hello</title></head><body><article>"), "{}", html);
        assert!(html.contains("<strong>bold</strong> &amp; <em>raw</em>"), "{}", html);
        Ok(())
    }

    #[test]
    fn test_compose_does_not_leak_between_calls() -> Result<()> {
        let templates = templates();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig {
            title: String::from("Site"),
            ..SiteConfig::default()
        };
        let docs = vec![document("a.md", "Alpha"), document("b.md", "Beta")];

        composer.compose("post.html", &PageContext::document(&site, &docs[0]), &out.path().join("a.html"))?;
        composer.compose("index.html", &PageContext::listing(&site, &docs), &out.path().join("index.html"))?;
        composer.compose("post.html", &PageContext::document(&site, &docs[1]), &out.path().join("b.html"))?;

        let index = fs::read_to_string(out.path().join("index.html")).unwrap();
        assert!(index.contains("<ul><li>Alpha</li><li>Beta</li></ul>"), "{}", index);
        assert!(!index.contains("<article>"), "{}", index);

        let b = fs::read_to_string(out.path().join("b.html")).unwrap();
        assert!(b.contains("<title>Beta</title>"), "{}", b);
        assert!(!b.contains("<ul>"), "{}", b);
        Ok(())
    }

    #[test]
    fn test_load_missing_layout() {
        let templates = tempfile::tempdir().unwrap();
        match Composer::load(templates.path(), "base.html") {
            Err(err @ Error::Read { .. }) => assert!(err.is_template_error()),
            Err(other) => panic!("wanted Read error, got {:?}", other),
            Ok(_) => panic!("wanted Read error, got a composer"),
        }
    }

    #[test]
    fn test_compose_missing_fragment_leaves_no_file() -> Result<()> {
        let templates = templates();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();
        let path = out.path().join("missing.html");

        match composer.compose("nope.html", &PageContext::listing(&site, &[]), &path) {
            Err(Error::Read { path: fragment, .. }) => {
                assert_eq!(templates.path().join("nope.html"), fragment)
            }
            other => panic!("wanted Read error, got {:?}", other),
        }
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_render_drops_whitespace_outside_definitions() -> Result<()> {
        let templates = tempfile::tempdir().unwrap();
        fs::write(templates.path().join("base.html"), r#"<b>{{template "content" .}}</b>"#).unwrap();
        fs::write(templates.path().join("page.html"), "\n{{define \"content\"}}X{{end}}\n\n").unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();

        let page = composer.render("page.html", &PageContext::listing(&site, &[]))?;
        assert_eq!("<b>X</b>", String::from_utf8(page).unwrap());
        Ok(())
    }

    #[test]
    fn test_compose_rejects_text_outside_definitions() -> Result<()> {
        let templates = tempfile::tempdir().unwrap();
        fs::write(templates.path().join("base.html"), r#"<b>{{template "content" .}}</b>"#).unwrap();
        fs::write(
            templates.path().join("stray.html"),
            r#"STRAY {{define "content"}}X{{end}} TAIL"#,
        )
        .unwrap();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();
        let path = out.path().join("stray.html");

        match composer.compose("stray.html", &PageContext::listing(&site, &[]), &path) {
            Err(err @ Error::OutsideDefinition { .. }) => assert!(err.is_template_error()),
            other => panic!("wanted OutsideDefinition error, got {:?}", other),
        }
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_compose_undefined_field() -> Result<()> {
        let templates = templates();
        fs::write(
            templates.path().join("typo.html"),
            r#"{{define "content"}}{{.nosuchfield}}{{end}}"#,
        )
        .unwrap();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();
        let path = out.path().join("typo.html");

        match composer.compose("typo.html", &PageContext::listing(&site, &[]), &path) {
            Err(Error::Execute { fragment, .. }) => {
                assert_eq!(templates.path().join("typo.html"), fragment)
            }
            other => panic!("wanted Execute error, got {:?}", other),
        }
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_compose_bad_fragment_syntax() -> Result<()> {
        let templates = templates();
        fs::write(templates.path().join("bad.html"), r#"{{define "content"}}{{if}}{{end}}"#).unwrap();
        let out = tempfile::tempdir().unwrap();
        let composer = Composer::load(templates.path(), "base.html")?;
        let site = SiteConfig::default();
        let path = out.path().join("bad.html");

        let err = composer
            .compose("bad.html", &PageContext::listing(&site, &[]), &path)
            .unwrap_err();
        assert!(err.is_template_error(), "{:?}", err);
        assert!(!path.exists());
        Ok(())
    }
}
