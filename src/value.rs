//! Conversions from the content graph types into [`gtmpl_value::Value`]s.
//! Each impl produces a [`Value::Object`] whose keys form the contract
//! between the generator and the theme templates. Dates surface as
//! `YYYY-MM-DD` strings, absent values as [`Value::Nil`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gtmpl_value::Value;

use crate::page::Page;
use crate::post::Post;
use crate::saga::{Arc, Episode, EpisodeRef, Saga, Status};
use crate::tags::{TagBucket, TagEntry};

pub(crate) fn date_value(date: Option<DateTime<Utc>>) -> Value {
    match date {
        Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
        None => Value::Nil,
    }
}

pub(crate) fn number_value(number: Option<u32>) -> Value {
    match number {
        Some(number) => Value::from(u64::from(number)),
        None => Value::Nil,
    }
}

pub(crate) fn string_list(list: &[String]) -> Value {
    Value::Array(list.iter().map(|s| Value::from(s.as_str())).collect())
}

impl From<&Status> for Value {
    fn from(status: &Status) -> Value {
        Value::String(status.to_string())
    }
}

impl From<&Episode> for Value {
    fn from(episode: &Episode) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::from(episode.slug.as_str()));
        m.insert("number".to_owned(), number_value(episode.number));
        m.insert("title".to_owned(), Value::from(episode.title.as_str()));
        m.insert("summary".to_owned(), Value::from(episode.summary.as_str()));
        m.insert("date".to_owned(), date_value(episode.date));
        m.insert("tags".to_owned(), string_list(&episode.tags));
        m.insert(
            "reading_time".to_owned(),
            Value::from(episode.reading_time.as_str()),
        );
        m.insert("body".to_owned(), Value::from(episode.body_html.as_str()));
        m.insert(
            "url".to_owned(),
            Value::String(format!(
                "/sagas/{}/{}/{}/",
                episode.saga_slug, episode.arc_slug, episode.slug
            )),
        );
        Value::Object(m)
    }
}

impl From<&EpisodeRef> for Value {
    fn from(episode: &EpisodeRef) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::from(episode.slug.as_str()));
        m.insert("number".to_owned(), number_value(episode.number));
        m.insert("title".to_owned(), Value::from(episode.title.as_str()));
        m.insert("summary".to_owned(), Value::from(episode.summary.as_str()));
        m.insert("date".to_owned(), date_value(episode.date));
        m.insert("tags".to_owned(), string_list(&episode.tags));
        m.insert(
            "saga_slug".to_owned(),
            Value::from(episode.saga_slug.as_str()),
        );
        m.insert(
            "saga_title".to_owned(),
            Value::from(episode.saga_title.as_str()),
        );
        m.insert("arc_slug".to_owned(), Value::from(episode.arc_slug.as_str()));
        m.insert(
            "arc_title".to_owned(),
            Value::from(episode.arc_title.as_str()),
        );
        m.insert("url".to_owned(), Value::String(episode.permalink()));
        Value::Object(m)
    }
}

impl From<&Arc> for Value {
    fn from(arc: &Arc) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::from(arc.slug.as_str()));
        m.insert("title".to_owned(), Value::from(arc.title.as_str()));
        m.insert("summary".to_owned(), Value::from(arc.summary.as_str()));
        m.insert("emoji".to_owned(), Value::from(arc.emoji.as_str()));
        m.insert("tags".to_owned(), string_list(&arc.tags));
        m.insert(
            "episode_count".to_owned(),
            Value::from(arc.episode_count as u64),
        );
        m.insert("last_release".to_owned(), date_value(arc.last_release));
        m.insert("status".to_owned(), Value::from(&arc.status));
        m.insert(
            "episodes".to_owned(),
            Value::Array(arc.episodes.iter().map(Value::from).collect()),
        );
        Value::Object(m)
    }
}

impl From<&Saga> for Value {
    fn from(saga: &Saga) -> Value {
        let option_ref = |opt: &Option<EpisodeRef>| match opt {
            Some(episode) => Value::from(episode),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::from(saga.slug.as_str()));
        m.insert("title".to_owned(), Value::from(saga.title.as_str()));
        m.insert("summary".to_owned(), Value::from(saga.summary.as_str()));
        m.insert("emoji".to_owned(), Value::from(saga.emoji.as_str()));
        m.insert("tags".to_owned(), string_list(&saga.tags));
        m.insert("repo".to_owned(), Value::from(saga.repo.as_str()));
        m.insert("rss".to_owned(), Value::from(saga.rss.as_str()));
        m.insert(
            "episode_count".to_owned(),
            Value::from(saga.episode_count as u64),
        );
        m.insert("last_release".to_owned(), date_value(saga.last_release));
        m.insert("status".to_owned(), Value::from(&saga.status));
        m.insert(
            "first_episode".to_owned(),
            option_ref(&saga.first_episode),
        );
        m.insert(
            "latest_episode".to_owned(),
            option_ref(&saga.latest_episode),
        );
        m.insert(
            "url".to_owned(),
            Value::String(format!("/sagas/{}/", saga.slug)),
        );
        m.insert(
            "arcs".to_owned(),
            Value::Array(saga.arcs.iter().map(Value::from).collect()),
        );
        Value::Object(m)
    }
}

impl From<&Post> for Value {
    fn from(post: &Post) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::from(post.title.as_str()));
        m.insert("type".to_owned(), Value::from(post.kind.as_str()));
        m.insert("saga".to_owned(), Value::from(post.saga.as_str()));
        m.insert("arc".to_owned(), Value::from(post.arc.as_str()));
        m.insert("studio".to_owned(), Value::from(post.studio.as_str()));
        m.insert("tags".to_owned(), string_list(&post.tags));
        m.insert("summary".to_owned(), Value::from(post.summary.as_str()));
        m.insert("date".to_owned(), date_value(Some(post.date)));
        m.insert(
            "reading_time".to_owned(),
            Value::from(post.reading_time.as_str()),
        );
        m.insert("slug".to_owned(), Value::from(post.slug.as_str()));
        m.insert("url".to_owned(), Value::from(post.permalink.as_str()));
        m.insert("body".to_owned(), Value::from(post.body_html.as_str()));
        Value::Object(m)
    }
}

impl From<&Page> for Value {
    fn from(page: &Page) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::from(page.title.as_str()));
        m.insert("type".to_owned(), Value::from(page.kind.as_str()));
        m.insert("studio".to_owned(), Value::from(page.studio.as_str()));
        m.insert("summary".to_owned(), Value::from(page.summary.as_str()));
        m.insert("date".to_owned(), date_value(page.date));
        m.insert("body".to_owned(), Value::from(page.body_html.as_str()));
        Value::Object(m)
    }
}

impl From<&TagEntry> for Value {
    fn from(entry: &TagEntry) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::from(entry.title.as_str()));
        m.insert("url".to_owned(), Value::from(entry.url.as_str()));
        m.insert("type".to_owned(), Value::from(entry.kind.as_str()));
        m.insert("summary".to_owned(), Value::from(entry.summary.as_str()));
        m.insert("date".to_owned(), date_value(entry.date));
        Value::Object(m)
    }
}

impl From<&TagBucket> for Value {
    fn from(bucket: &TagBucket) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("name".to_owned(), Value::from(bucket.name.as_str()));
        m.insert("slug".to_owned(), Value::from(bucket.slug.as_str()));
        m.insert("url".to_owned(), Value::String(bucket.permalink()));
        m.insert("count".to_owned(), Value::from(bucket.entries.len() as u64));
        m.insert(
            "entries".to_owned(),
            Value::Array(bucket.entries.iter().map(Value::from).collect()),
        );
        Value::Object(m)
    }
}
