//! Generates `search.json`: a flat JSON array of lightweight records for
//! client-side search. Sagas, arcs, and episodes are indexed; posts are not.
//! URLs are site-relative (base path only), so the index works on any host
//! the site is deployed to.

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::loader::Graph;

/// One record of the search index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchEntry {
    pub title: String,

    /// The site-relative URL, with the base path applied.
    pub url: String,

    /// The record's type tag: `saga`, `arc`, or `episode`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// The breadcrumb locating the record: the saga title for arcs, `Saga ·
    /// Arc` for episodes.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub context: String,

    /// The episode date as `YYYY-MM-DD`, empty for undated records.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub date: String,
}

/// Flattens the content graph into search records, in graph order.
pub fn collect_entries(config: &Config, graph: &Graph) -> Vec<SearchEntry> {
    let mut entries = Vec::new();
    for saga in &graph.sagas {
        entries.push(SearchEntry {
            title: saga.title.clone(),
            url: config.href(&format!("/sagas/{}/", saga.slug)),
            kind: String::from("saga"),
            summary: saga.summary.clone(),
            tags: unique_tags(&saga.tags, &[]),
            context: String::new(),
            date: String::new(),
        });
        for arc in &saga.arcs {
            entries.push(SearchEntry {
                title: arc.title.clone(),
                url: config.href(&format!("/sagas/{}/{}/", saga.slug, arc.slug)),
                kind: String::from("arc"),
                summary: arc.summary.clone(),
                tags: unique_tags(&saga.tags, &[]),
                context: saga.title.clone(),
                date: String::new(),
            });
            for episode in &arc.episodes {
                entries.push(SearchEntry {
                    title: episode.title.clone(),
                    url: config.href(&format!(
                        "/sagas/{}/{}/{}/",
                        saga.slug, arc.slug, episode.slug
                    )),
                    kind: String::from("episode"),
                    summary: episode.summary.clone(),
                    tags: unique_tags(&episode.tags, &saga.tags),
                    context: format!("{} · {}", saga.title, arc.title),
                    date: episode
                        .date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                });
            }
        }
    }
    entries
}

/// Builds the complete `search.json` contents.
pub fn build_search_index(config: &Config, graph: &Graph) -> Result<String> {
    Ok(serde_json::to_string(&collect_entries(config, graph))?)
}

// Concatenates two tag lists, dropping empty strings and case-insensitive
// duplicates while preserving first-seen order and casing.
fn unique_tags(first: &[String], second: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    first
        .iter()
        .chain(second.iter())
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .cloned()
        .collect()
}

/// The result of a search-index operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error generating the search index.
#[derive(Debug)]
pub enum Error {
    /// Returned when the index can't be serialized to JSON.
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Json(err) => write!(f, "serializing search index: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when serializing the index.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}
