//! Generates `sitemap.xml` (sitemap protocol 0.9). Every addressable page
//! contributes one absolute URL with an optional last-modified date; entries
//! are deduplicated by exact URL keeping the newest date, and the final
//! document lists URLs in ascending order.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::{self, Config};
use crate::loader::Graph;
use crate::post::Post;

/// One `<url>` element of the sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    /// The absolute URL of the page.
    pub loc: String,

    /// The page's last-modified date, emitted as `YYYY-MM-DD`.
    pub last_mod: Option<DateTime<Utc>>,
}

/// Collects the sitemap entries for the whole site: the chrome pages, every
/// saga, arc, and episode page, and every post. Requires a configured base
/// URL.
pub fn collect_entries(
    config: &Config,
    graph: &Graph,
    posts: &[Post],
) -> Result<Vec<SitemapEntry>> {
    let mut merged: BTreeMap<String, Option<DateTime<Utc>>> = BTreeMap::new();
    let mut add = |loc: String, last_mod: Option<DateTime<Utc>>| {
        let slot = merged.entry(loc).or_insert(None);
        if newer(last_mod, *slot) {
            *slot = last_mod;
        }
    };

    for page in &["/", "/sagas/", "/library/", "/about/"] {
        add(config.absolute_url(page)?, None);
    }
    for saga in &graph.sagas {
        add(
            config.absolute_url(&format!("/sagas/{}/", saga.slug))?,
            saga.last_release,
        );
        for arc in &saga.arcs {
            add(
                config.absolute_url(&format!("/sagas/{}/{}/", saga.slug, arc.slug))?,
                arc.last_release,
            );
            for episode in &arc.episodes {
                add(
                    config.absolute_url(&format!(
                        "/sagas/{}/{}/{}/",
                        saga.slug, arc.slug, episode.slug
                    ))?,
                    episode.date,
                );
            }
        }
    }
    for post in posts {
        add(config.absolute_url(&post.permalink)?, Some(post.date));
    }

    Ok(merged
        .into_iter()
        .map(|(loc, last_mod)| SitemapEntry { loc, last_mod })
        .collect())
}

/// Renders the collected entries as a sitemap protocol 0.9 document.
pub fn render(entries: &[SitemapEntry]) -> String {
    let mut out = String::from(concat!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
        "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    ));
    for entry in entries {
        out.push_str("  <url>\n    <loc>");
        out.push_str(&escape(&entry.loc));
        out.push_str("</loc>\n");
        if let Some(date) = entry.last_mod {
            out.push_str("    <lastmod>");
            out.push_str(&date.format("%Y-%m-%d").to_string());
            out.push_str("</lastmod>\n");
        }
        out.push_str("  </url>\n");
    }
    out.push_str("</urlset>\n");
    out
}

/// Builds the complete `sitemap.xml` contents.
pub fn build_sitemap(config: &Config, graph: &Graph, posts: &[Post]) -> Result<String> {
    Ok(render(&collect_entries(config, graph, posts)?))
}

// Compares optional dates treating absent as oldest.
fn newer(candidate: Option<DateTime<Utc>>, current: Option<DateTime<Utc>>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// The result of a sitemap-generation operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error generating the sitemap.
#[derive(Debug)]
pub enum Error {
    /// Returned when absolute URLs can't be composed, notably when no base
    /// URL is configured.
    Config(config::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(err) => Some(err),
        }
    }
}

impl From<config::Error> for Error {
    /// Converts a [`config::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when composing absolute URLs.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}
