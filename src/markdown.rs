//! The markdown-to-HTML seam. Rendering sits behind the [`Render`] trait so
//! the content pipeline can be exercised with a stub renderer in tests; the
//! production implementation wraps `pulldown-cmark`. The renderer is
//! constructed once at process start and passed into every call site rather
//! than living in a global.

use pulldown_cmark::{html, Options, Parser};
use std::fmt;

/// Renders a markdown body into HTML.
pub trait Render {
    /// Renders `markdown` and returns the resulting HTML fragment.
    fn render(&self, markdown: &str) -> Result<String>;
}

/// The production [`Render`] implementation, backed by `pulldown-cmark` with
/// tables, footnotes, strikethrough, and task lists enabled.
pub struct CmarkRenderer {
    options: Options,
}

impl CmarkRenderer {
    pub fn new() -> CmarkRenderer {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        CmarkRenderer { options }
    }
}

impl Default for CmarkRenderer {
    fn default() -> CmarkRenderer {
        CmarkRenderer::new()
    }
}

impl Render for CmarkRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        let mut out = String::new();
        html::push_html(&mut out, Parser::new_ext(markdown, self.options));
        Ok(out)
    }
}

/// The result of a render operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure reported by a [`Render`] implementation.
#[derive(Debug)]
pub struct Error(pub String);

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rendering markdown: {}", self.0)
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
