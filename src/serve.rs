//! A minimal development file server over the output directory, GET-only
//! HTTP/1.1 with one thread per connection. Directory requests map to their
//! `index.html`. This exists so a generated site can be previewed without
//! extra tooling; it is not a production server.

use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::thread;

use tracing::{info, warn};

/// Serves `root` on `addr` until the process is killed.
pub fn serve(root: &Path, addr: &str) -> Result<()> {
    let listener =
        TcpListener::bind(addr).map_err(|err| Error::Bind(addr.to_owned(), err))?;
    info!(addr, root = %root.display(), "serving");
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "accepting connection");
                continue;
            }
        };
        let root = root.to_owned();
        thread::spawn(move || {
            if let Err(err) = handle_connection(&root, stream) {
                warn!(error = %err, "handling connection");
            }
        });
    }
    Ok(())
}

fn handle_connection(root: &Path, mut stream: TcpStream) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let response = respond(root, request_line.trim_end());
    stream.write_all(&response.into_bytes())?;
    stream.flush()
}

struct Response {
    status: u16,
    reason: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn plain(status: u16, reason: &'static str) -> Response {
        Response {
            status,
            reason,
            content_type: "text/plain; charset=utf-8",
            body: format!("{} {}\n", status, reason).into_bytes(),
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.reason,
            self.content_type,
            self.body.len()
        )
        .into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

// Resolves one request line against the served directory. Everything the
// resolver can't map to a file inside the root is a 404; only `..` needs an
// explicit guard since the root join can't otherwise escape.
fn respond(root: &Path, request_line: &str) -> Response {
    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return Response::plain(400, "Bad Request"),
    };
    if method != "GET" {
        return Response::plain(405, "Method Not Allowed");
    }

    let target = target.split('?').next().unwrap_or(target);
    if target.split('/').any(|segment| segment == "..") {
        return Response::plain(404, "Not Found");
    }

    let mut path = root.join(target.trim_start_matches('/'));
    if target.ends_with('/') || path.is_dir() {
        path = path.join("index.html");
    }
    match fs::read(&path) {
        Ok(body) => Response {
            status: 200,
            reason: "OK",
            content_type: content_type(&path),
            body,
        },
        Err(_) => Response::plain(404, "Not Found"),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// The result of starting the file server.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error starting the file server.
#[derive(Debug)]
pub enum Error {
    /// Returned when the listen address can't be bound.
    Bind(String, std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bind(addr, err) => write!(f, "binding `{}`: {}", addr, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind(_, err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();
        fs::create_dir(dir.path().join("sagas")).unwrap();
        fs::write(dir.path().join("sagas").join("index.html"), "sagas").unwrap();
        dir
    }

    #[test]
    fn test_root_serves_index() {
        let dir = fixture();
        let response = respond(dir.path(), "GET / HTTP/1.1");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "text/html; charset=utf-8");
        assert_eq!(response.body, b"<h1>home</h1>");
    }

    #[test]
    fn test_directory_without_trailing_slash() {
        let dir = fixture();
        let response = respond(dir.path(), "GET /sagas HTTP/1.1");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"sagas");
    }

    #[test]
    fn test_query_string_is_ignored() {
        let dir = fixture();
        let response = respond(dir.path(), "GET /style.css?v=2 HTTP/1.1");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "text/css; charset=utf-8");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = fixture();
        assert_eq!(respond(dir.path(), "GET /nope.html HTTP/1.1").status, 404);
    }

    #[test]
    fn test_traversal_is_not_found() {
        let dir = fixture();
        let response = respond(dir.path(), "GET /../../etc/passwd HTTP/1.1");
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_non_get_is_rejected() {
        let dir = fixture();
        assert_eq!(respond(dir.path(), "POST / HTTP/1.1").status, 405);
    }

    #[test]
    fn test_malformed_request_line() {
        let dir = fixture();
        assert_eq!(respond(dir.path(), "GET").status, 400);
    }

    #[test]
    fn test_response_bytes() {
        let bytes = Response::plain(404, "Not Found").into_bytes();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 14\r\n"));
        assert!(text.ends_with("\r\n\r\n404 Not Found\n"));
    }
}
