//! The library code for the `scriven` static site generator. A build can be
//! broken down into three distinct steps:
//!
//! 1. Parsing documents from Markdown source files on disk
//!    ([`crate::document`]) and assembling them into a corpus
//!    ([`crate::corpus`])
//! 2. Converting the corpus into template data ([`crate::value`])
//! 3. Composing pages from a shared layout and per-page fragments and writing
//!    them to disk ([`crate::compose`])
//!
//! [`crate::build`] stitches the steps together and copies static assets
//! alongside the generated pages. [`crate::serve`] previews the result.
//!
//! Documents are Markdown files with a YAML frontmatter block:
//!
//! ```text
//! ---
//! title: Hello, world
//! date: 2024-01-15T10:00:00Z
//! tags: [intro]
//! ---
//!
//! The body, in Markdown.
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod compose;
pub mod config;
pub mod corpus;
pub mod document;
pub mod htmlrenderer;
pub mod markdown;
pub mod serve;
pub mod value;
