//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the site configuration
//! ([`crate::config`]), assembling the corpus ([`crate::corpus`]), composing
//! the index and document pages ([`crate::compose`]), and copying the static
//! assets into the output directory. Also exports [`create_document`], which
//! scaffolds a new draft.

use crate::compose::{self, Composer};
use crate::config::{self, Config, SiteConfig, CONTENT_DIRECTORY};
use crate::corpus;
use crate::document::{Frontmatter, MARKDOWN_EXTENSION};
use crate::value::PageContext;
use chrono::{DateTime, FixedOffset, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// The layout every page is composed into.
pub const LAYOUT_TEMPLATE: &str = "base.html";

/// The fragment for the corpus listing.
pub const INDEX_TEMPLATE: &str = "index.html";

/// The fragment for a single document.
pub const POST_TEMPLATE: &str = "post.html";

/// The listing's file name in the output directory.
pub const INDEX_FILE: &str = "index.html";

const PLACEHOLDER_BODY: &str = "Write your post here...";

/// What a successful build produced.
#[derive(Debug)]
pub struct Summary {
    /// The number of document pages written.
    pub documents: usize,

    /// The number of static files copied.
    pub assets: usize,

    /// Set if copying static assets failed. This doesn't fail the build.
    pub asset_error: Option<Error>,
}

/// Builds the site for the project in the current directory, reading the
/// site configuration from `config_path` and writing to `output_directory`.
pub fn build(config_path: &Path, output_directory: &Path) -> Result<Summary> {
    build_site(&Config::new(Path::new("."), config_path, output_directory))
}

/// Builds the site described by `config`. The output directory is deleted
/// and recreated, so nothing from a previous build survives.
pub fn build_site(config: &Config) -> Result<Summary> {
    let site = SiteConfig::from_file(&config.site_config_path)?;
    let documents = corpus::assemble_with_threads(&config.content_directory, config.threads)?;
    let composer =
        Composer::load(&config.templates_directory, LAYOUT_TEMPLATE).map_err(Error::Layout)?;

    // Blow away the old output so pages for deleted or renamed documents
    // don't linger.
    rmdir(&config.output_directory)?;
    fs::create_dir_all(&config.output_directory).map_err(|err| Error::CreateDirectory {
        path: config.output_directory.clone(),
        source: err,
    })?;

    let index_path = config.output_directory.join(INDEX_FILE);
    composer
        .compose(INDEX_TEMPLATE, &PageContext::listing(&site, &documents), &index_path)
        .map_err(|err| Error::Compose {
            page: index_path.clone(),
            source: err,
        })?;

    for document in &documents {
        let path = config.output_directory.join(document.output_path());
        composer
            .compose(POST_TEMPLATE, &PageContext::document(&site, document), &path)
            .map_err(|err| Error::Compose { page: path, source: err })?;
    }

    let (assets, asset_error) = match copy_dir(&config.static_directory, &config.output_directory) {
        Ok(copied) => (copied, None),
        Err(err) => {
            warn!(error = ?err, "copying static assets failed; continuing without them");
            (0, Some(err))
        }
    };

    info!(
        documents = documents.len(),
        assets,
        output = %config.output_directory.display(),
        "built site"
    );
    Ok(Summary {
        documents: documents.len(),
        assets,
        asset_error,
    })
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                source: e,
            }),
        },
    }
}

/// Recursively copies the contents of `src` into `dst`, returning the number
/// of files copied. A missing `src` copies nothing.
fn copy_dir(src: &Path, dst: &Path) -> Result<usize> {
    if !src.is_dir() {
        debug!(directory = %src.display(), "no static directory");
        return Ok(0);
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(Error::Walk)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| Error::CreateDirectory {
                path: target,
                source: err,
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|err| Error::CopyAsset {
                path: entry.path().to_owned(),
                source: err,
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Converts a title into a file-name slug: lowercased, spaces become `-`,
/// and anything other than `a-z`, `0-9` and `-` is dropped.
pub fn title_slug(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Scaffolds a draft titled `title` in the current project's content
/// directory and returns its path.
pub fn create_document(title: &str) -> Result<PathBuf> {
    create_document_in(Path::new(CONTENT_DIRECTORY), title, Local::now().fixed_offset())
}

/// Scaffolds a draft titled `title` dated `now` in `dir` (created if
/// missing) and returns its path. The file is named
/// `<YYYY-MM-DD>-<slug>.md`. An existing file is never overwritten, and a
/// title with nothing to slug is rejected.
pub fn create_document_in(dir: &Path, title: &str, now: DateTime<FixedOffset>) -> Result<PathBuf> {
    let slug = title_slug(title);
    if slug.trim_matches('-').is_empty() {
        return Err(Error::EmptySlug {
            title: title.to_owned(),
        });
    }
    let name = format!("{}-{}.{}", now.format("%Y-%m-%d"), slug, MARKDOWN_EXTENSION);
    let path = dir.join(name);

    let source = Frontmatter {
        title: title.to_owned(),
        date: now,
        draft: true,
        ..Frontmatter::default()
    }
    .to_source(PLACEHOLDER_BODY)
    .map_err(Error::Serialize)?;

    fs::create_dir_all(dir).map_err(|err| Error::CreateDirectory {
        path: dir.to_owned(),
        source: err,
    })?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| Error::WriteDocument {
            path: path.clone(),
            source: err,
        })?;
    file.write_all(source.as_bytes())
        .map_err(|err| Error::WriteDocument {
            path: path.clone(),
            source: err,
        })?;

    info!(path = %path.display(), "created draft");
    Ok(path)
}

/// Represents the result of a build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site or scaffolding a document.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the site configuration can't be loaded.
    #[error("loading site configuration")]
    Config(#[from] config::Error),

    /// Returned when the corpus can't be assembled.
    #[error("assembling documents")]
    Assembly(#[from] corpus::Error),

    /// Returned when the layout can't be loaded.
    #[error("loading layout `{}`", LAYOUT_TEMPLATE)]
    Layout(#[source] compose::Error),

    /// Returned when a page can't be composed.
    #[error("composing `{}`", .page.display())]
    Compose {
        page: PathBuf,
        #[source]
        source: compose::Error,
    },

    /// Returned for I/O problems while cleaning the output directory.
    #[error("cleaning directory `{}`", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when a directory can't be created.
    #[error("creating directory `{}`", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when a static asset can't be copied.
    #[error("copying static asset `{}`", .path.display())]
    CopyAsset {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when the static directory can't be traversed.
    #[error("walking static directory")]
    Walk(#[source] walkdir::Error),

    /// Returned when a new document's title has no letters or digits to
    /// name its file after.
    #[error("title `{title}` has no letters or digits to build a file name from")]
    EmptySlug { title: String },

    /// Returned when a new document's frontmatter can't be serialized.
    #[error("serializing frontmatter")]
    Serialize(#[source] serde_yaml::Error),

    /// Returned when a new document can't be written, including when the
    /// file already exists.
    #[error("writing document `{}`", .path.display())]
    WriteDocument {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
