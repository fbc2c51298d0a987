//! Defines the [`Document`] type and the logic for parsing one source file
//! into memory. A source file is structured as follows:
//!
//! 1. Initial frontmatter fence (`---`) at the start of a line, preceded by
//!    nothing but whitespace
//! 2. YAML frontmatter with fields `title`, `date`, and optionally
//!    `description`, `tags`, and `draft`
//! 3. Terminal frontmatter fence (`---`) at the start of a line
//! 4. Markdown body
//!
//! For example:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16T09:30:00Z
//! tags: [greet]
//! ---
//! # Hello
//!
//! World
//! ```

use crate::markdown;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The extension (without the dot) of document source files.
pub const MARKDOWN_EXTENSION: &str = "md";

/// The extension of rendered pages.
pub const PAGE_EXTENSION: &str = "html";

/// The output subdirectory that document pages are written to.
pub const POSTS_DIRECTORY: &str = "posts";

const FENCE: &str = "---";

/// Marks where a document's summary ends.
const FOLD_TAG: &str = "<!-- more -->";

/// Zone-less timestamp forms accepted for `date`, read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Length of a `YYYY-MM-DD-` filename prefix.
const DATE_PREFIX_LEN: usize = 11;

/// One parsed source file.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub title: String,
    pub publish_date: DateTime<FixedOffset>,
    pub description: String,
    pub tags: Vec<String>,
    pub is_draft: bool,

    /// Derived from the source file name; see [`identifier`].
    pub identifier: String,

    /// The body rendered to HTML. Trusted, and inserted into pages without
    /// escaping.
    pub rendered_body: String,

    /// The markdown body, trimmed of surrounding whitespace.
    pub raw_body: String,
}

impl Document {
    /// Parses a document from its raw contents. `source_path` is only used to
    /// derive the identifier; nothing is read from disk.
    pub fn parse(input: &str, source_path: &Path) -> Result<Document> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let (metadata, body) = split(input).ok_or(Error::MalformedDocument)?;
        let frontmatter = Frontmatter::from_yaml(metadata)?;

        let raw_body = body.trim();
        let rendered_body =
            markdown::to_html(raw_body).map_err(Error::RenderFailure)?;

        Ok(Document {
            title: frontmatter.title,
            publish_date: frontmatter.date,
            description: frontmatter.description,
            tags: frontmatter.tags,
            is_draft: frontmatter.draft,
            identifier: identifier(source_path),
            rendered_body,
            raw_body: raw_body.to_owned(),
        })
    }

    /// Reads `path` and parses it with [`Document::parse`].
    pub fn parse_file(path: &Path) -> Result<Document> {
        let contents = fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_owned(),
            source: err,
        })?;
        Document::parse(&contents, path)
    }

    /// The tags joined into a single comma-separated string, suitable for a
    /// `<meta name="keywords">` tag.
    pub fn keywords(&self) -> String {
        self.tags.join(", ")
    }

    /// Returns the rendered body up to the fold tag (`<!-- more -->`) and
    /// whether the body was actually folded.
    pub fn summary(&self) -> (&str, bool) {
        match self.rendered_body.find(FOLD_TAG) {
            Some(i) => (&self.rendered_body[..i], true),
            None => (&self.rendered_body, false),
        }
    }

    /// The page's location relative to the output root, e.g.
    /// `posts/my-first-post.html`.
    pub fn output_path(&self) -> PathBuf {
        Path::new(POSTS_DIRECTORY)
            .join(format!("{}.{}", self.identifier, PAGE_EXTENSION))
    }

    /// The page's location as a URL path relative to the site root.
    pub fn href(&self) -> String {
        format!("{}/{}.{}", POSTS_DIRECTORY, self.identifier, PAGE_EXTENSION)
    }

    /// The frontmatter this document was parsed from.
    pub fn frontmatter(&self) -> Frontmatter {
        Frontmatter {
            title: self.title.clone(),
            date: self.publish_date,
            description: self.description.clone(),
            tags: self.tags.clone(),
            draft: self.is_draft,
        }
    }
}

/// Finds the two fences and returns the text between them and the text after
/// the second one. A fence is a line holding `---` and nothing else but
/// trailing whitespace.
fn split(input: &str) -> Option<(&str, &str)> {
    let mut fences = line_starts(input).filter(|&i| is_fence(&input[i..]));
    let first = fences.next()?;
    if !input[..first].trim().is_empty() {
        return None;
    }
    let second = fences.next()?;
    Some((
        &input[first + FENCE.len()..second],
        &input[second + FENCE.len()..],
    ))
}

fn is_fence(rest: &str) -> bool {
    rest.lines()
        .next()
        .map_or(false, |line| line.trim_end() == FENCE)
}

fn line_starts(input: &str) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0).chain(input.match_indices('\n').map(|(i, _)| i + 1))
}

/// Derives a document identifier from its source path: the file name less
/// its extension, less a leading `YYYY-MM-DD-` date prefix if there is one
/// (e.g., `content/posts/2024-01-15-my-first-post.md` becomes
/// `my-first-post`). Nothing else is normalized.
pub fn identifier(source_path: &Path) -> String {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match strip_date_prefix(&stem) {
        Some(rest) => rest.to_owned(),
        None => stem,
    }
}

fn strip_date_prefix(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    if bytes.len() <= DATE_PREFIX_LEN {
        return None;
    }
    let is_date_prefix =
        bytes[..DATE_PREFIX_LEN]
            .iter()
            .enumerate()
            .all(|(i, b)| match i {
                4 | 7 | 10 => *b == b'-',
                _ => b.is_ascii_digit(),
            });
    match is_date_prefix {
        // the prefix is all ASCII, so this is a char boundary
        true => Some(&name[DATE_PREFIX_LEN..]),
        false => None,
    }
}

/// The YAML frontmatter of a document. Missing fields take their defaults;
/// notably a missing `title` is empty and a missing `date` is
/// [`zero_timestamp`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Frontmatter {
    #[serde(default)]
    pub title: String,

    #[serde(
        default = "zero_timestamp",
        deserialize_with = "deserialize_date",
        serialize_with = "serialize_date"
    )]
    pub date: DateTime<FixedOffset>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub draft: bool,
}

impl Default for Frontmatter {
    fn default() -> Self {
        Frontmatter {
            title: String::new(),
            date: zero_timestamp(),
            description: String::new(),
            tags: Vec::new(),
            draft: false,
        }
    }
}

impl Frontmatter {
    /// Decodes a frontmatter block. A block with nothing but whitespace
    /// decodes to [`Frontmatter::default`].
    pub fn from_yaml(yaml: &str) -> Result<Frontmatter> {
        if yaml.trim().is_empty() {
            return Ok(Frontmatter::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::MalformedFrontmatter)
    }

    /// Renders a complete source file: fences, YAML, and `body`. Parsing the
    /// result with [`Document::parse`] yields this frontmatter back.
    pub fn to_source(&self, body: &str) -> std::result::Result<String, serde_yaml::Error> {
        let yaml = serde_yaml::to_string(self)?;
        let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
        let newline = match yaml.ends_with('\n') {
            true => "",
            false => "\n",
        };
        Ok(format!("{}\n{}{}{}\n\n{}\n", FENCE, yaml, newline, FENCE, body))
    }
}

/// The timestamp used for documents without a `date`:
/// `0001-01-01T00:00:00Z`.
pub fn zero_timestamp() -> DateTime<FixedOffset> {
    midnight_utc(NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN))
}

fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(NaiveTime::MIN).and_utc().fixed_offset()
}

/// Parses an RFC 3339 timestamp (`2024-01-15T10:00:00Z`), a timestamp
/// without a zone (`2024-01-15 10:00:00` or `2024-01-15T10:00:00.5`, taken as
/// UTC), or a bare date (`2024-01-15`, taken as midnight UTC).
pub fn parse_timestamp(s: &str) -> std::result::Result<DateTime<FixedOffset>, chrono::ParseError> {
    let s = s.trim();
    let err = match DateTime::parse_from_rfc3339(s) {
        Ok(timestamp) => return Ok(timestamp),
        Err(err) => err,
    };
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(timestamp.and_utc().fixed_offset());
        }
    }
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => Ok(midnight_utc(date)),
        Err(_) => Err(err),
    }
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(zero_timestamp()),
        Some(s) => parse_timestamp(&s)
            .map_err(|e| D::Error::custom(format!("invalid date `{}`: {}", s, e))),
    }
}

fn serialize_date<S>(date: &DateTime<FixedOffset>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&date.to_rfc3339())
}

/// Represents the result of a [`Document`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Document`].
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the source is missing one or both `---` fences, or has
    /// text before the first one.
    #[error("malformed document: expected a `---` fenced frontmatter block at the top")]
    MalformedDocument,

    /// Returned when the frontmatter isn't valid YAML or has badly-typed
    /// fields.
    #[error("malformed frontmatter")]
    MalformedFrontmatter(#[source] serde_yaml::Error),

    /// Returned when the markdown body couldn't be rendered.
    #[error("rendering markdown")]
    RenderFailure(#[source] io::Error),

    /// Returned when the source file couldn't be read.
    #[error("reading `{}`", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
