//! Builds the content graph from the sagas root. One [`walkdir`] pass
//! classifies every markdown file by its relative path shape and feeds it to
//! the graph builder, which upserts [`Saga`]/[`Arc`] nodes by slug and
//! appends [`Episode`] leaves. Nothing about the walk order can be trusted,
//! so [`derive`] runs two passes after the scan: a fix-up pass that rewrites
//! the denormalized [`EpisodeRef`] titles from the finished nodes, and a
//! sort-and-aggregate pass that orders everything and computes the derived
//! fields.

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use crate::frontmatter::{self, Frontmatter};
use crate::markdown::{self, Render};
use crate::saga::{parse_date, Arc, Episode, EpisodeRef, Saga, Status};

/// The loaded content graph. `episode_refs` holds one denormalized snapshot
/// per episode; after [`derive`] it is sorted by date descending.
#[derive(Default)]
pub struct Graph {
    pub sagas: Vec<Saga>,
    pub episode_refs: Vec<EpisodeRef>,
}

/// Walks `root` and builds the raw content graph. Any saga, arc, or episode
/// file that fails to parse aborts the load with the offending file named in
/// the error. Call [`derive`] on the result before reading any derived or
/// ordered field.
pub fn load_sagas(root: &Path, renderer: &dyn Render) -> Result<Graph> {
    let mut graph = Graph::default();
    for result in WalkDir::new(root) {
        let entry = result?;
        if !entry.file_type().is_file() {
            continue;
        }
        // strip_prefix can't fail; root is an ancestor of every entry
        let rel = entry.path().strip_prefix(root).unwrap().to_owned();
        if rel.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let contents = fs::read_to_string(entry.path())?;
        ingest(&mut graph, &rel, &contents, renderer)
            .map_err(|e| Error::Annotated(format!("loading `{}`", rel.display()), Box::new(e)))?;
    }
    Ok(graph)
}

/// Classifies a single markdown file by its path relative to the sagas root
/// and applies it to the graph. Unrecognized path shapes are ignored before
/// any mutation happens, so stray files never create stub nodes.
pub(crate) fn ingest(
    graph: &mut Graph,
    rel: &Path,
    contents: &str,
    renderer: &dyn Render,
) -> Result<()> {
    let parts: Vec<&str> = match rel.iter().map(|c| c.to_str()).collect() {
        Some(parts) => parts,
        None => return Ok(()),
    };
    match parts.as_slice() {
        [saga, "index.md"] => {
            let (fm, _) = frontmatter::split(contents)?;
            let si = ensure_saga(&mut graph.sagas, saga);
            apply_saga(&mut graph.sagas[si], &fm);
        }
        [saga, arc, "index.md"] => {
            let (fm, _) = frontmatter::split(contents)?;
            let si = ensure_saga(&mut graph.sagas, saga);
            let ai = ensure_arc(&mut graph.sagas[si].arcs, arc);
            apply_arc(&mut graph.sagas[si].arcs[ai], &fm);
        }
        [saga, arc, file] => {
            // the extension was checked by the caller
            let stem = &file[..file.len() - ".md".len()];
            let episode = parse_episode(saga, arc, stem, contents, renderer)?;
            let si = ensure_saga(&mut graph.sagas, saga);
            let ai = ensure_arc(&mut graph.sagas[si].arcs, arc);
            graph.episode_refs.push(episode.to_ref(
                &graph.sagas[si].title,
                &graph.sagas[si].arcs[ai].title,
            ));
            graph.sagas[si].arcs[ai].episodes.push(episode);
        }
        _ => (),
    }
    Ok(())
}

/// Runs the two required post-scan passes over the graph. Pass one rewrites
/// every [`EpisodeRef`]'s saga/arc titles from the now-complete nodes. Pass
/// two sorts episodes, arcs, sagas, and refs, and computes every aggregate
/// (`episode_count`, `last_release`, `status`, `first_episode`,
/// `latest_episode`). `now` drives status classification.
pub fn derive(graph: &mut Graph, now: DateTime<Utc>) {
    for r in &mut graph.episode_refs {
        if let Some(saga) = graph.sagas.iter().find(|s| s.slug == r.saga_slug) {
            r.saga_title = saga.title.clone();
            if let Some(arc) = saga.arcs.iter().find(|a| a.slug == r.arc_slug) {
                r.arc_title = arc.title.clone();
            }
        }
    }

    for saga in &mut graph.sagas {
        for arc in &mut saga.arcs {
            arc.episodes.sort_by_key(|e| e.sort_key());
            arc.episode_count = arc.episodes.len();
            arc.last_release = arc.episodes.iter().filter_map(|e| e.date).max();
            arc.status = Status::classify(arc.last_release, now);
        }
        saga.arcs.sort_by(cmp_arcs);

        saga.episode_count = saga.arcs.iter().map(|a| a.episode_count).sum();
        saga.last_release = saga.arcs.iter().filter_map(|a| a.last_release).max();
        saga.status = Status::classify(saga.last_release, now);

        let first = saga
            .arcs
            .iter()
            .find(|a| !a.episodes.is_empty())
            .map(|a| a.episodes[0].to_ref(&saga.title, &a.title));
        let latest = saga.last_release.and_then(|last| {
            saga.arcs
                .iter()
                .flat_map(|a| a.episodes.iter().map(move |e| (a, e)))
                .find(|(_, e)| e.date == Some(last))
                .map(|(a, e)| e.to_ref(&saga.title, &a.title))
        });
        saga.first_episode = first;
        saga.latest_episode = latest;
    }

    graph.sagas.sort_by(cmp_sagas);
    graph
        .episode_refs
        .sort_by(|a, b| cmp_date_desc(a.date, b.date).then_with(|| a.title.cmp(&b.title)));
}

/// Compares optional dates newest-first, with absent dates sorting last.
pub(crate) fn cmp_date_desc(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Explicit `order` ascending with unset sorting last.
fn order_key(order: Option<i64>) -> (bool, i64) {
    (order.is_none(), order.unwrap_or(0))
}

fn cmp_arcs(a: &Arc, b: &Arc) -> Ordering {
    order_key(a.order)
        .cmp(&order_key(b.order))
        .then_with(|| a.title.cmp(&b.title))
}

fn cmp_sagas(a: &Saga, b: &Saga) -> Ordering {
    order_key(a.order)
        .cmp(&order_key(b.order))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| cmp_date_desc(a.last_release, b.last_release))
}

fn ensure_saga(sagas: &mut Vec<Saga>, slug: &str) -> usize {
    match sagas.iter().position(|s| s.slug == slug) {
        Some(i) => i,
        None => {
            sagas.push(Saga {
                slug: slug.to_owned(),
                ..Saga::default()
            });
            sagas.len() - 1
        }
    }
}

fn ensure_arc(arcs: &mut Vec<Arc>, slug: &str) -> usize {
    match arcs.iter().position(|a| a.slug == slug) {
        Some(i) => i,
        None => {
            arcs.push(Arc {
                slug: slug.to_owned(),
                ..Arc::default()
            });
            arcs.len() - 1
        }
    }
}

// Metadata application fills blank fields only; a stub created by an earlier
// episode keeps whatever a later index file can't improve on, and an index
// file visited first wins over any later duplicate.
fn apply_saga(saga: &mut Saga, fm: &Frontmatter) {
    fill_str(&mut saga.title, fm.str_field("title"));
    fill_str(&mut saga.summary, fm.str_field("summary"));
    fill_str(&mut saga.emoji, fm.str_field("emoji"));
    fill_str(&mut saga.repo, fm.str_field("repo"));
    fill_str(&mut saga.rss, fm.str_field("rss"));
    if saga.tags.is_empty() {
        saga.tags = fm.string_list("tags");
    }
    if saga.order.is_none() {
        saga.order = fm.int_field("order");
    }
}

fn apply_arc(arc: &mut Arc, fm: &Frontmatter) {
    fill_str(&mut arc.title, fm.str_field("title"));
    fill_str(&mut arc.summary, fm.str_field("summary"));
    fill_str(&mut arc.emoji, fm.str_field("emoji"));
    if arc.tags.is_empty() {
        arc.tags = fm.string_list("tags");
    }
    if arc.order.is_none() {
        arc.order = fm.int_field("order");
    }
}

fn fill_str(dst: &mut String, src: Option<&str>) {
    if dst.is_empty() {
        if let Some(src) = src {
            *dst = src.to_owned();
        }
    }
}

fn parse_episode(
    saga_slug: &str,
    arc_slug: &str,
    stem: &str,
    contents: &str,
    renderer: &dyn Render,
) -> Result<Episode> {
    let (fm, body) = frontmatter::split(contents)?;
    Ok(Episode {
        slug: fm
            .str_field("slug")
            .filter(|s| !s.is_empty())
            .unwrap_or(stem)
            .to_owned(),
        // zero means unnumbered
        number: match fm.int_field("number") {
            Some(n) if n > 0 => u32::try_from(n).ok(),
            _ => None,
        },
        title: fm.str_field("title").unwrap_or_default().to_owned(),
        summary: fm.str_field("summary").unwrap_or_default().to_owned(),
        date: fm.str_field("date").and_then(parse_date),
        tags: fm.string_list("tags"),
        reading_time: fm.str_field("reading_time").unwrap_or_default().to_owned(),
        body_html: renderer.render(body)?,
        saga_slug: saga_slug.to_owned(),
        arc_slug: arc_slug.to_owned(),
    })
}

/// The result of a graph-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error building the content graph.
#[derive(Debug)]
pub enum Error {
    /// Returned when a content file's frontmatter can't be split or decoded.
    Frontmatter(frontmatter::Error),

    /// Returned when the markdown renderer rejects an episode body.
    Render(markdown::Error),

    /// Returned for directory-walk I/O errors.
    WalkDir(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// An error with an annotation naming the offending file.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Frontmatter(err) => err.fmt(f),
            Error::Render(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Annotated(annotation, err) => write!(f, "{}: {}", annotation, err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Frontmatter(err) => Some(err),
            Error::Render(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<frontmatter::Error> for Error {
    /// Converts a [`frontmatter::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when splitting content files.
    fn from(err: frontmatter::Error) -> Error {
        Error::Frontmatter(err)
    }
}

impl From<markdown::Error> for Error {
    /// Converts a [`markdown::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when rendering episode bodies.
    fn from(err: markdown::Error) -> Error {
        Error::Render(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator during the content walk.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for fallible I/O operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::parse_date;
    use std::path::PathBuf;

    struct StubRenderer;

    impl Render for StubRenderer {
        fn render(&self, markdown: &str) -> markdown::Result<String> {
            Ok(markdown.trim().to_owned())
        }
    }

    fn now() -> DateTime<Utc> {
        parse_date("2024-06-30").unwrap()
    }

    fn ingest_all(files: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::default();
        for (path, contents) in files {
            ingest(&mut graph, &PathBuf::from(path), contents, &StubRenderer)
                .unwrap_or_else(|e| panic!("ingesting {}: {}", path, e));
        }
        graph
    }

    #[test]
    fn test_refs_resolve_titles_regardless_of_scan_order() {
        // The episode is visited before either index file exists, so its ref
        // is created with blank titles.
        let mut graph = ingest_all(&[
            (
                "ferris/basics/ep-1.md",
                "---\ntitle: Hello\nnumber: 1\ndate: 2024-06-01\n---\nbody",
            ),
            ("ferris/basics/index.md", "---\ntitle: Basics\norder: 1\n---\n"),
            ("ferris/index.md", "---\ntitle: Ferris\norder: 1\n---\n"),
        ]);
        assert_eq!(graph.episode_refs[0].saga_title, "");
        assert_eq!(graph.episode_refs[0].arc_title, "");

        derive(&mut graph, now());
        assert_eq!(graph.episode_refs[0].saga_title, "Ferris");
        assert_eq!(graph.episode_refs[0].arc_title, "Basics");
    }

    #[test]
    fn test_upsert_fills_blanks_but_never_overwrites() {
        let mut graph = ingest_all(&[
            ("ferris/index.md", "---\ntitle: First\n---\n"),
            ("ferris/index.md", "---\ntitle: Second\nsummary: Filled late\n---\n"),
        ]);
        derive(&mut graph, now());
        assert_eq!(graph.sagas.len(), 1);
        assert_eq!(graph.sagas[0].title, "First");
        assert_eq!(graph.sagas[0].summary, "Filled late");
    }

    #[test]
    fn test_stray_files_create_no_stubs() {
        let graph = ingest_all(&[
            ("readme.md", "---\ntitle: Stray\n---\n"),
            ("a/b/c/d.md", "---\ntitle: Too deep\n---\n"),
        ]);
        assert!(graph.sagas.is_empty());
        assert!(graph.episode_refs.is_empty());
    }

    #[test]
    fn test_mixed_numbering_orders_numbered_first() {
        let mut graph = ingest_all(&[
            ("s/a/index.md", "---\ntitle: A\n---\n"),
            ("s/index.md", "---\ntitle: S\n---\n"),
            ("s/a/later.md", "---\ntitle: Unnumbered\ndate: 2024-01-05\n---\n"),
            ("s/a/first.md", "---\ntitle: Numbered\nnumber: 1\ndate: 2024-01-01\n---\n"),
        ]);
        derive(&mut graph, now());
        let episodes = &graph.sagas[0].arcs[0].episodes;
        assert_eq!(episodes[0].title, "Numbered");
        assert_eq!(episodes[1].title, "Unnumbered");
    }

    #[test]
    fn test_number_zero_means_unnumbered() {
        let graph = ingest_all(&[(
            "s/a/ep.md",
            "---\ntitle: Zeroed\nnumber: 0\ndate: 2024-01-01\n---\n",
        )]);
        assert_eq!(graph.sagas[0].arcs[0].episodes[0].number, None);
    }

    #[test]
    fn test_aggregates() {
        let mut graph = ingest_all(&[
            ("s/index.md", "---\ntitle: S\n---\n"),
            ("s/one/index.md", "---\ntitle: One\norder: 1\n---\n"),
            ("s/two/index.md", "---\ntitle: Two\norder: 2\n---\n"),
            ("s/one/e1.md", "---\ntitle: E1\nnumber: 1\ndate: 2024-01-01\n---\n"),
            ("s/one/e2.md", "---\ntitle: E2\nnumber: 2\ndate: 2024-02-01\n---\n"),
            ("s/two/e3.md", "---\ntitle: E3\nnumber: 1\ndate: 2024-06-15\n---\n"),
        ]);
        derive(&mut graph, now());

        let saga = &graph.sagas[0];
        assert_eq!(saga.episode_count, 3);
        assert_eq!(saga.last_release, parse_date("2024-06-15"));
        assert_eq!(saga.status, Status::NowAiring);
        assert_eq!(saga.first_episode.as_ref().unwrap().title, "E1");
        assert_eq!(saga.latest_episode.as_ref().unwrap().title, "E3");

        let one = &saga.arcs[0];
        assert_eq!(one.title, "One");
        assert_eq!(one.episode_count, 2);
        assert_eq!(one.last_release, parse_date("2024-02-01"));
    }

    #[test]
    fn test_empty_saga_has_no_release_and_hiatus_status() {
        let mut graph = ingest_all(&[("s/index.md", "---\ntitle: S\n---\n")]);
        derive(&mut graph, now());
        let saga = &graph.sagas[0];
        assert_eq!(saga.last_release, None);
        assert_eq!(saga.status, Status::Hiatus);
        assert!(saga.first_episode.is_none());
        assert!(saga.latest_episode.is_none());
    }

    #[test]
    fn test_saga_ordering() {
        let mut graph = ingest_all(&[
            ("unordered/index.md", "---\ntitle: Unordered\n---\n"),
            ("beta/index.md", "---\ntitle: Beta\norder: 2\n---\n"),
            ("alpha/index.md", "---\ntitle: Alpha\norder: 2\n---\n"),
            ("first/index.md", "---\ntitle: First\norder: 1\n---\n"),
        ]);
        derive(&mut graph, now());
        let titles: Vec<&str> = graph.sagas.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Alpha", "Beta", "Unordered"]);
    }

    #[test]
    fn test_refs_sorted_most_recent_first() {
        let mut graph = ingest_all(&[
            ("s/a/old.md", "---\ntitle: Old\ndate: 2024-01-01\n---\n"),
            ("s/a/new.md", "---\ntitle: New\ndate: 2024-06-01\n---\n"),
            ("s/a/undated.md", "---\ntitle: Undated\n---\n"),
        ]);
        derive(&mut graph, now());
        let titles: Vec<&str> = graph.episode_refs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old", "Undated"]);
    }

    #[test]
    fn test_episode_slug_override() {
        let graph = ingest_all(&[(
            "s/a/2024-06-01-long-file-name.md",
            "---\ntitle: T\nslug: short\n---\n",
        )]);
        assert_eq!(graph.sagas[0].arcs[0].episodes[0].slug, "short");
    }

    #[test]
    fn test_load_sagas_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let arc_dir = dir.path().join("ferris").join("basics");
        fs::create_dir_all(&arc_dir)?;
        fs::write(
            dir.path().join("ferris").join("index.md"),
            "---\ntitle: Ferris\norder: 1\n---\n",
        )?;
        fs::write(arc_dir.join("index.md"), "---\ntitle: Basics\norder: 1\n---\n")?;
        fs::write(
            arc_dir.join("ep-1.md"),
            "---\ntitle: Hello\nnumber: 1\ndate: 2024-06-01\n---\n# Hi\n",
        )?;

        let mut graph = load_sagas(dir.path(), &StubRenderer)?;
        derive(&mut graph, now());
        assert_eq!(graph.sagas.len(), 1);
        assert_eq!(graph.sagas[0].arcs[0].episodes[0].body_html, "# Hi");
        assert_eq!(graph.episode_refs.len(), 1);
        Ok(())
    }

    #[test]
    fn test_bad_episode_aborts_load() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let arc_dir = dir.path().join("s").join("a");
        fs::create_dir_all(&arc_dir)?;
        fs::write(arc_dir.join("bad.md"), "no frontmatter here")?;

        match load_sagas(dir.path(), &StubRenderer) {
            Err(Error::Annotated(_, err)) => match *err {
                Error::Frontmatter(frontmatter::Error::MissingOpeningDelimiter) => (),
                other => panic!("wanted MissingOpeningDelimiter; found {:?}", other),
            },
            other => panic!("wanted annotated error; found {:?}", other.map(|_| ())),
        }
        Ok(())
    }
}
