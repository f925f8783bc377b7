//! The tag index: buckets every post and episode by case-insensitive tag,
//! assigns each bucket a globally unique slug, and orders everything for the
//! library pages. Display names keep the first-encountered casing; later
//! variants merge silently.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::loader::cmp_date_desc;
use crate::post::Post;
use crate::saga::Saga;

/// A case-insensitive grouping of content sharing a tag.
#[derive(Debug, Clone, Default)]
pub struct TagBucket {
    /// The display name, in whichever casing was encountered first.
    pub name: String,

    /// A slug unique across all buckets.
    pub slug: String,

    /// The bucket's contents, sorted by date descending with title
    /// ascending on ties.
    pub entries: Vec<TagEntry>,
}

impl TagBucket {
    /// The site-relative permalink for the bucket's library page.
    pub fn permalink(&self) -> String {
        format!("/library/{}/", self.slug)
    }
}

/// One tagged item: a post or an episode.
#[derive(Debug, Clone, Default)]
pub struct TagEntry {
    pub title: String,

    /// The site-relative permalink of the item.
    pub url: String,

    pub kind: String,
    pub summary: String,
    pub date: Option<DateTime<Utc>>,
}

/// Buckets all posts and all episodes by tag. The result is sorted by
/// case-insensitive name ascending, and no two buckets share a slug.
pub fn build_tag_index(sagas: &[Saga], posts: &[Post]) -> Vec<TagBucket> {
    let mut buckets: HashMap<String, TagBucket> = HashMap::new();

    for post in posts {
        for tag in dedupe_tags(&post.tags) {
            add_entry(
                &mut buckets,
                tag,
                TagEntry {
                    title: post.title.clone(),
                    url: post.permalink.clone(),
                    kind: post.kind.clone(),
                    summary: post.summary.clone(),
                    date: Some(post.date),
                },
            );
        }
    }
    for saga in sagas {
        for arc in &saga.arcs {
            for episode in &arc.episodes {
                for tag in dedupe_tags(&episode.tags) {
                    add_entry(
                        &mut buckets,
                        tag,
                        TagEntry {
                            title: episode.title.clone(),
                            url: format!(
                                "/sagas/{}/{}/{}/",
                                episode.saga_slug, episode.arc_slug, episode.slug
                            ),
                            kind: String::from("Episode"),
                            summary: episode.summary.clone(),
                            date: episode.date,
                        },
                    );
                }
            }
        }
    }

    for bucket in buckets.values_mut() {
        bucket
            .entries
            .sort_by(|a, b| cmp_date_desc(a.date, b.date).then_with(|| a.title.cmp(&b.title)));
    }

    // Slugs are assigned over sorted keys so collisions resolve the same way
    // on every run. Keys are lowercased names, so the resulting list is
    // already in case-insensitive name order.
    let mut keys: Vec<String> = buckets.keys().cloned().collect();
    keys.sort();
    let mut used = HashSet::new();
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        // the key came out of the map just above
        let mut bucket = buckets.remove(&key).unwrap();
        bucket.slug = unique_tag_slug(&bucket.name, &mut used);
        out.push(bucket);
    }
    out
}

// Case-insensitive dedup preserving first-seen order, so an item tagged
// `[A, a]` contributes one entry, not two.
fn dedupe_tags(tags: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

fn add_entry(buckets: &mut HashMap<String, TagBucket>, tag: &str, entry: TagEntry) {
    let bucket = buckets
        .entry(tag.to_lowercase())
        .or_insert_with(|| TagBucket {
            name: tag.to_owned(),
            ..TagBucket::default()
        });
    bucket.entries.push(entry);
}

// Slugifies a tag name and makes the result unique: `-2`, `-3`, … up to
// 1000, then a timestamp suffix. Already-assigned slugs are never
// reassigned.
fn unique_tag_slug(name: &str, used: &mut HashSet<String>) -> String {
    let mut base = slug::slugify(name);
    if base.is_empty() {
        base = String::from("tag");
    }
    if used.insert(base.clone()) {
        return base;
    }
    for n in 2..1000 {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
    }
    let candidate = format!("{}-{}", base, Utc::now().timestamp());
    used.insert(candidate.clone());
    candidate
}
