//! A minimal static file server for previewing a built site locally.
//!
//! Requests are resolved against the output directory: a path naming a file
//! serves that file, a path naming a directory serves its `index.html`, and
//! anything else (including any path with a `..` segment) is a 404. Query
//! strings are ignored.

use std::fs;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, info, warn};

/// The file served for a directory request.
pub const DIRECTORY_INDEX: &str = "index.html";

/// Serves `dir` on `127.0.0.1:<port>` until the process is stopped.
pub fn serve(dir: &Path, port: u16) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::MissingDirectory {
            path: dir.to_owned(),
        });
    }

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let server = Server::http(addr).map_err(|err| Error::Bind { addr, source: err })?;
    info!(directory = %dir.display(), "serving on http://{}", addr);

    for request in server.incoming_requests() {
        if let Err(err) = handle(request, dir) {
            warn!(error = %err, "responding to request failed");
        }
    }
    Ok(())
}

fn handle(request: Request, root: &Path) -> io::Result<()> {
    let url = request.url().to_owned();
    match resolve(root, &url) {
        Some(path) => match fs::read(&path) {
            Ok(content) => {
                debug!(url = %url, path = %path.display(), "200");
                let mut response = Response::from_data(content);
                if let Ok(header) = Header::from_bytes("Content-Type", content_type(&path)) {
                    response = response.with_header(header);
                }
                request.respond(response)
            }
            Err(err) => {
                warn!(url = %url, path = %path.display(), error = %err, "reading file failed");
                request.respond(Response::from_string("500 Internal Server Error").with_status_code(500))
            }
        },
        None => {
            debug!(url = %url, "404");
            request.respond(Response::from_string("404 Not Found").with_status_code(404))
        }
    }
}

/// Maps a request URL onto a file under `root`, or `None` if there's nothing
/// to serve.
pub fn resolve(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).ok()?;

    let mut local = root.to_owned();
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => local.push(name),
            _ => return None,
        }
    }

    if local.is_dir() {
        local.push(DIRECTORY_INDEX);
    }
    match local.is_file() {
        true => Some(local),
        false => None,
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Represents the result of serving a site.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error starting the preview server.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when there's no output directory to serve.
    #[error("`{}` doesn't exist; run `scriven build` first", .path.display())]
    MissingDirectory { path: PathBuf },

    /// Returned when the listening socket can't be bound.
    #[error("listening on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}
