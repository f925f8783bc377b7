//! Generates `feed.xml`, an RSS 2.0 feed of the most recent content. Posts
//! and episodes are merged into one stream ordered by date descending with
//! title ascending on ties, truncated to a fixed cap.

use std::fmt;

use chrono::{DateTime, Utc};
use rss::{Channel, Guid, Item};

use crate::config::{self, Config};
use crate::loader::{cmp_date_desc, Graph};
use crate::post::Post;

/// The maximum number of items in the feed.
const FEED_CAP: usize = 20;

/// One feed item before serialization, with a site-relative URL.
#[derive(Debug, Clone)]
struct FeedItem {
    title: String,
    url: String,
    summary: String,
    date: Option<DateTime<Utc>>,
}

/// Builds the complete `feed.xml` contents. Requires a configured base URL
/// for item links and guids.
pub fn build_feed(config: &Config, graph: &Graph, posts: &[Post]) -> Result<String> {
    let items = collect_items(graph, posts);

    let mut channel = Channel::default();
    channel.set_title(config.title.clone());
    channel.set_link(config.absolute_url("/")?);
    channel.set_description(config.description.clone());
    channel.set_last_build_date(Utc::now().to_rfc2822());

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let url = config.absolute_url(&item.url)?;
        let mut guid = Guid::default();
        guid.set_value(url.clone());
        guid.set_permalink(true);

        let mut entry = Item::default();
        entry.set_title(item.title);
        entry.set_link(url);
        entry.set_guid(guid);
        entry.set_description(item.summary);
        if let Some(date) = item.date {
            entry.set_pub_date(date.to_rfc2822());
        }
        out.push(entry);
    }
    channel.set_items(out);

    Ok(channel.to_string())
}

// Merges all posts with every episode ref, newest first, and keeps the top
// of the combined stream.
fn collect_items(graph: &Graph, posts: &[Post]) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = Vec::with_capacity(posts.len() + graph.episode_refs.len());
    for post in posts {
        items.push(FeedItem {
            title: post.title.clone(),
            url: post.permalink.clone(),
            summary: post.summary.clone(),
            date: Some(post.date),
        });
    }
    for episode in &graph.episode_refs {
        items.push(FeedItem {
            title: episode.title.clone(),
            url: episode.permalink(),
            summary: episode.summary.clone(),
            date: episode.date,
        });
    }
    items.sort_by(|a, b| cmp_date_desc(a.date, b.date).then_with(|| a.title.cmp(&b.title)));
    items.truncate(FEED_CAP);
    items
}

/// The result of a feed-generation operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error generating the feed.
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
    /// the `?` operator when composing item links.
    fn from(err: config::Error) -> Error {
        Error::Config(err)
    }
}
