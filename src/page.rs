//! Loads a single standalone page, such as `content/about/index.md`. Pages
//! are plain frontmatter-plus-body files with none of the graph machinery:
//! no permalinks, no aggregation, one file in, one [`Page`] out.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::frontmatter::{self, Frontmatter};
use crate::markdown::{self, Render};
use crate::saga::parse_date;

/// A standalone page outside both the saga hierarchy and the posts sweep.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub title: String,

    /// The frontmatter `type`, defaulting to `"Page"`.
    pub kind: String,

    pub studio: String,
    pub summary: String,
    pub date: Option<DateTime<Utc>>,
    pub body_html: String,

    /// The full frontmatter mapping, kept so templates can reach keys the
    /// struct doesn't model.
    pub frontmatter: Frontmatter,
}

/// Loads the page at `path`. A missing file is an error; standalone pages
/// are referenced unconditionally by the site chrome.
pub fn load_page(path: &Path, renderer: &dyn Render) -> Result<Page> {
    let contents = fs::read_to_string(path)
        .map_err(|err| Error::Open(path.display().to_string(), err))?;
    let (fm, body) = frontmatter::split(&contents)?;
    Ok(Page {
        title: fm.str_field("title").unwrap_or_default().to_owned(),
        kind: fm
            .str_field("type")
            .filter(|s| !s.is_empty())
            .unwrap_or("Page")
            .to_owned(),
        studio: fm.str_field("studio").unwrap_or_default().to_owned(),
        summary: fm.str_field("summary").unwrap_or_default().to_owned(),
        date: fm.str_field("date").and_then(parse_date),
        body_html: renderer.render(body)?,
        frontmatter: fm,
    })
}

/// The result of a page-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a standalone page.
#[derive(Debug)]
pub enum Error {
    /// Returned when the page file can't be opened or read.
    Open(String, std::io::Error),

    /// Returned when the page's frontmatter can't be split or decoded.
    Frontmatter(frontmatter::Error),

    /// Returned when the markdown renderer rejects the page body.
    Render(markdown::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open(path, err) => write!(f, "opening page `{}`: {}", path, err),
            Error::Frontmatter(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open(_, err) => Some(err),
            Error::Frontmatter(err) => Some(err),
            Error::Render(err) => Some(err),
        }
    }
}

impl From<frontmatter::Error> for Error {
    /// Converts a [`frontmatter::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when splitting page files.
    fn from(err: frontmatter::Error) -> Error {
        Error::Frontmatter(err)
    }
}

impl From<markdown::Error> for Error {
    /// Converts a [`markdown::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when rendering page bodies.
    fn from(err: markdown::Error) -> Error {
        Error::Render(err)
    }
}
