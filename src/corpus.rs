//! Assembles the corpus: every publishable [`Document`] in a content
//! directory, most recent first.

use crate::document::{self, Document, MARKDOWN_EXTENSION};
use std::collections::HashSet;
use std::fs::read_dir;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

/// Parses every `.md` file directly inside `dir` (subdirectories are not
/// searched), drops drafts, and sorts the rest by date, most recent first.
/// Documents with equal dates are ordered by identifier.
///
/// A missing `dir` yields an empty corpus. Any document that fails to parse
/// fails the whole assembly.
pub fn assemble(dir: &Path) -> Result<Vec<Document>> {
    assemble_with_threads(dir, 1)
}

/// Like [`assemble`], but parses with `threads` worker threads when
/// `threads >= 2`. The result is identical to [`assemble`]'s.
pub fn assemble_with_threads(dir: &Path, threads: usize) -> Result<Vec<Document>> {
    let sources = sources(dir)?;
    let documents = match threads < 2 {
        true => parse_sequential(&sources)?,
        false => parse_parallel(&sources, threads)?,
    };
    Ok(publishable(documents))
}

/// Lists the document source files in `dir`, sorted by path so errors are
/// reported deterministically.
fn sources(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(directory = %dir.display(), "content directory missing; corpus is empty");
            return Ok(Vec::new());
        }
        Err(err) => return Err(Error::ReadDirectory { path: dir.to_owned(), source: err }),
    };

    let mut sources = Vec::new();
    for result in entries {
        let entry = result.map_err(|err| Error::ReadDirectory {
            path: dir.to_owned(),
            source: err,
        })?;
        let path = entry.path();
        let is_markdown = path
            .extension()
            .map_or(false, |ext| ext == MARKDOWN_EXTENSION);
        if is_markdown && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

fn parse_one(path: &Path) -> Result<Document> {
    let document = Document::parse_file(path).map_err(|err| Error::Assembly {
        path: path.to_owned(),
        source: err,
    })?;
    debug!(path = %path.display(), id = %document.identifier, "parsed document");
    Ok(document)
}

fn parse_sequential(sources: &[PathBuf]) -> Result<Vec<Document>> {
    sources.iter().map(|path| parse_one(path)).collect()
}

fn parse_parallel(sources: &[PathBuf], threads: usize) -> Result<Vec<Document>> {
    use crossbeam_channel::unbounded;
    use std::thread;

    let (tx, rx) = unbounded::<&Path>();
    for path in sources {
        // the receiver is alive until the end of this function
        let _ = tx.send(path);
    }
    drop(tx);

    let failed = AtomicBool::new(false);
    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                let rx = rx.clone();
                let failed = &failed;
                scope.spawn(move || -> Result<Vec<Document>> {
                    let mut documents = Vec::new();
                    for path in rx {
                        if failed.load(Ordering::Relaxed) {
                            break;
                        }
                        match parse_one(path) {
                            Ok(document) => documents.push(document),
                            Err(err) => {
                                failed.store(true, Ordering::Relaxed);
                                return Err(err);
                            }
                        }
                    }
                    Ok(documents)
                })
            })
            .collect();

        let mut documents = Vec::with_capacity(sources.len());
        let mut first_error = None;
        for worker in workers {
            match worker.join() {
                Ok(Ok(parsed)) => documents.extend(parsed),
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(_) => {
                    first_error.get_or_insert(Error::WorkerPanicked);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(documents),
        }
    })
}

/// Drops drafts and sorts what's left, newest first.
fn publishable(documents: Vec<Document>) -> Vec<Document> {
    let mut published: Vec<Document> = documents.into_iter().filter(|d| !d.is_draft).collect();
    published.sort_by(|a, b| {
        b.publish_date
            .cmp(&a.publish_date)
            .then_with(|| a.identifier.cmp(&b.identifier))
    });

    let mut seen = HashSet::new();
    for document in &published {
        if !seen.insert(document.identifier.as_str()) {
            warn!(id = %document.identifier, "several documents share an identifier; their pages will overwrite each other");
        }
    }
    published
}

/// Represents the result of a corpus-assembly operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error assembling the corpus.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the content directory exists but couldn't be listed.
    #[error("reading content directory `{}`", .path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Returned when a single document fails to parse.
    #[error("parsing `{}`", .path.display())]
    Assembly {
        path: PathBuf,
        #[source]
        source: document::Error,
    },

    /// Returned when a parser thread panics.
    #[error("a document parser thread panicked")]
    WorkerPanicked,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, title: &str, date: &str, draft: bool) {
        let contents = format!(
            "---\ntitle: {}\ndate: {}\ndraft: {}\n---\n\nBody of {}.\n",
            title, date, draft, title
        );
        fs::write(dir.join(name), contents).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "2024-01-01-first.md", "First", "2024-01-01T00:00:00Z", false);
        write(dir.path(), "2024-03-01-third.md", "Third", "2024-03-01T00:00:00Z", false);
        write(dir.path(), "2024-02-01-second.md", "Second", "2024-02-01T00:00:00Z", false);
        write(dir.path(), "2024-04-01-draft.md", "Draft", "2024-04-01T00:00:00Z", true);
        write(dir.path(), "2024-05-01-another-draft.md", "Another", "2024-05-01T00:00:00Z", true);
        dir
    }

    fn ids(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.identifier.as_str()).collect()
    }

    #[test]
    fn test_assemble_filters_drafts_and_sorts() -> Result<()> {
        let dir = fixture();
        let documents = assemble(dir.path())?;

        assert_eq!(vec!["third", "second", "first"], ids(&documents));
        assert!(documents.iter().all(|d| !d.is_draft));
        for pair in documents.windows(2) {
            assert!(pair[0].publish_date >= pair[1].publish_date);
        }
        Ok(())
    }

    #[test]
    fn test_assemble_missing_directory() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let documents = assemble(&dir.path().join("nope"))?;
        assert!(documents.is_empty());
        Ok(())
    }

    #[test]
    fn test_assemble_empty_directory() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        assert!(assemble(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_assemble_ignores_other_files_and_subdirectories() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "post.md", "Post", "2024-01-01T00:00:00Z", false);
        fs::write(dir.path().join("notes.txt"), "not a document").unwrap();
        fs::write(dir.path().join("README"), "not a document either").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "deep.md", "Deep", "2024-01-01T00:00:00Z", false);
        fs::create_dir(dir.path().join("folder.md")).unwrap();

        assert_eq!(vec!["post"], ids(&assemble(dir.path())?));
        Ok(())
    }

    #[test]
    fn test_assemble_equal_dates_ordered_by_identifier() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.md", "B", "2024-01-01T00:00:00Z", false);
        write(dir.path(), "c.md", "C", "2024-01-01T00:00:00Z", false);
        write(dir.path(), "a.md", "A", "2024-01-01T00:00:00Z", false);

        assert_eq!(vec!["a", "b", "c"], ids(&assemble(dir.path())?));
        Ok(())
    }

    #[test]
    fn test_assemble_fails_on_bad_document() {
        let dir = fixture();
        fs::write(dir.path().join("broken.md"), "no frontmatter here").unwrap();

        match assemble(dir.path()) {
            Err(Error::Assembly { path, source }) => {
                assert_eq!(dir.path().join("broken.md"), path);
                assert!(matches!(source, document::Error::MalformedDocument));
            }
            other => panic!("wanted Assembly error, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_parallel_matches_sequential() -> Result<()> {
        let dir = fixture();
        for i in 0..20 {
            write(
                dir.path(),
                &format!("extra-{:02}.md", i),
                &format!("Extra {}", i),
                &format!("2023-06-{:02}T00:00:00Z", i % 5 + 1),
                i % 3 == 0,
            );
        }

        let sequential = assemble(dir.path())?;
        let parallel = assemble_with_threads(dir.path(), 4)?;
        assert_eq!(sequential, parallel);
        Ok(())
    }

    #[test]
    fn test_assemble_parallel_fails_on_bad_document() {
        let dir = fixture();
        fs::write(dir.path().join("broken.md"), "---\ntitle: [\n---\n").unwrap();

        match assemble_with_threads(dir.path(), 3) {
            Err(Error::Assembly { source, .. }) => {
                assert!(matches!(source, document::Error::MalformedFrontmatter(_)));
            }
            other => panic!("wanted Assembly error, got {:?}", other),
        }
    }
}
