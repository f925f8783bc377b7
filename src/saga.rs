//! The content graph types: [`Saga`]s composed of ordered [`Arc`]s of
//! [`Episode`]s, plus the denormalized [`EpisodeRef`] snapshot used wherever
//! episodes are listed outside their arc (feeds, search, the home page).
//! [`Status`] classifies how recently a saga or arc released.

use chrono::{DateTime, TimeZone, Utc};
use std::fmt;

/// A top-level serialized content container. Sagas are built up from
/// metadata files and episode files visited in arbitrary order; every
/// derived field (`episode_count`, `last_release`, `status`,
/// `first_episode`, `latest_episode`) is only meaningful after the post-scan
/// passes in [`crate::loader`] have run.
#[derive(Debug, Clone, Default)]
pub struct Saga {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub emoji: String,
    pub tags: Vec<String>,

    /// Optional source repository URL, shown on the saga page.
    pub repo: String,

    /// Optional external feed URL for the saga.
    pub rss: String,

    /// Explicit ordering weight. Unset sagas sort after all explicit values.
    pub order: Option<i64>,

    pub arcs: Vec<Arc>,
    pub episode_count: usize,
    pub last_release: Option<DateTime<Utc>>,
    pub status: Status,
    pub first_episode: Option<EpisodeRef>,
    pub latest_episode: Option<EpisodeRef>,
}

/// An ordered sub-grouping of episodes within a saga.
#[derive(Debug, Clone, Default)]
pub struct Arc {
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub emoji: String,
    pub tags: Vec<String>,

    /// Explicit ordering weight. Unset arcs sort after all explicit values.
    pub order: Option<i64>,

    pub episodes: Vec<Episode>,
    pub episode_count: usize,
    pub last_release: Option<DateTime<Utc>>,
    pub status: Status,
}

/// A single dated narrative unit, optionally numbered.
#[derive(Debug, Clone, Default)]
pub struct Episode {
    pub slug: String,

    /// The episode number. `number: 0` in frontmatter and an absent number
    /// both mean unnumbered.
    pub number: Option<u32>,

    pub title: String,
    pub summary: String,
    pub date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub reading_time: String,
    pub body_html: String,
    pub saga_slug: String,
    pub arc_slug: String,
}

impl Episode {
    /// The composite ordering key for episodes within an arc: numbered
    /// episodes order by number, unnumbered episodes sort after every
    /// numbered one, by date.
    pub fn sort_key(&self) -> (u32, Option<DateTime<Utc>>) {
        (self.number.unwrap_or(u32::MAX), self.date)
    }

    /// Produces the denormalized snapshot of this episode for use outside
    /// its arc. The saga and arc titles are passed in because the episode
    /// itself only carries slugs.
    pub fn to_ref(&self, saga_title: &str, arc_title: &str) -> EpisodeRef {
        EpisodeRef {
            slug: self.slug.clone(),
            number: self.number,
            title: self.title.clone(),
            summary: self.summary.clone(),
            date: self.date,
            tags: self.tags.clone(),
            saga_slug: self.saga_slug.clone(),
            saga_title: saga_title.to_owned(),
            arc_slug: self.arc_slug.clone(),
            arc_title: arc_title.to_owned(),
        }
    }
}

/// A read-only, denormalized cross-reference to an episode. Refs created
/// while the scan is still running may carry blank saga/arc titles; the
/// fix-up pass rewrites them from the finished graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpisodeRef {
    pub slug: String,
    pub number: Option<u32>,
    pub title: String,
    pub summary: String,
    pub date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub saga_slug: String,
    pub saga_title: String,
    pub arc_slug: String,
    pub arc_title: String,
}

impl EpisodeRef {
    /// The site-relative permalink for the episode page.
    pub fn permalink(&self) -> String {
        format!("/sagas/{}/{}/{}/", self.saga_slug, self.arc_slug, self.slug)
    }
}

/// How recently a saga or arc released, derived from `last_release` and the
/// current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NowAiring,
    Active,
    Paused,
    Hiatus,
}

impl Default for Status {
    fn default() -> Status {
        Status::Hiatus
    }
}

impl Status {
    /// Classifies a `last_release` date against `now`: none means
    /// [`Status::Hiatus`]; otherwise 30/90/180-day thresholds select
    /// [`Status::NowAiring`], [`Status::Active`], and [`Status::Paused`],
    /// with anything older falling back to [`Status::Hiatus`]. `now` is a
    /// parameter so classification is deterministic under test.
    pub fn classify(last_release: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Status {
        let last = match last_release {
            None => return Status::Hiatus,
            Some(last) => last,
        };
        let days = now.signed_duration_since(last).num_days();
        if days <= 30 {
            Status::NowAiring
        } else if days <= 90 {
            Status::Active
        } else if days <= 180 {
            Status::Paused
        } else {
            Status::Hiatus
        }
    }
}

impl fmt::Display for Status {
    /// Displays a [`Status`] as the label shown on saga pages.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Status::NowAiring => "Now Airing",
            Status::Active => "Active",
            Status::Paused => "Paused",
            Status::Hiatus => "Hiatus",
        })
    }
}

/// Parses a content date: RFC3339 first, then bare `YYYY-MM-DD` taken as
/// midnight UTC. Returns `None` for anything else.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(input) {
        return Some(date.with_timezone(&Utc));
    }
    match chrono::NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        Ok(date) => Some(Utc.from_utc_datetime(&date.and_hms(0, 0, 0))),
        Err(_) => None,
    }
}
