//! Flat post loading. Posts live outside the saga hierarchy: every markdown
//! file under the posts root becomes one [`Post`], with its permalink either
//! taken from frontmatter or derived from the file path, and its date
//! falling back to the file's modification time. Unlike the saga loader,
//! this sweep can be configured to skip files that fail to parse.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::frontmatter;
use crate::markdown::{self, Render};
use crate::saga::parse_date;

/// A standalone content item outside the saga hierarchy.
#[derive(Debug, Clone)]
pub struct Post {
    pub title: String,

    /// The frontmatter `type`, defaulting to `"Post"`.
    pub kind: String,

    /// Optional free-form association with a saga/arc, used for display
    /// only; posts never join the content graph.
    pub saga: String,
    pub arc: String,

    pub studio: String,
    pub tags: Vec<String>,
    pub summary: String,
    pub date: DateTime<Utc>,
    pub reading_time: String,
    pub slug: String,
    pub permalink: String,
    pub body_html: String,
}

impl Default for Post {
    fn default() -> Post {
        use chrono::TimeZone;
        Post {
            title: String::new(),
            kind: String::new(),
            saga: String::new(),
            arc: String::new(),
            studio: String::new(),
            tags: Vec::new(),
            summary: String::new(),
            date: Utc.timestamp(0, 0),
            reading_time: String::new(),
            slug: String::new(),
            permalink: String::new(),
            body_html: String::new(),
        }
    }
}

/// What to do when a post file fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnPostError {
    /// Log the failure and continue the sweep without the file.
    Skip,

    /// Abort the whole run, as the saga loader does.
    Abort,
}

impl Default for OnPostError {
    fn default() -> OnPostError {
        OnPostError::Skip
    }
}

/// Normalizes a permalink: trims whitespace, maps empty to `/`, ensures a
/// leading slash, and leaves `.html` targets alone while everything else
/// gets exactly one trailing slash. Idempotent.
pub fn normalize_permalink(permalink: &str) -> String {
    let trimmed = permalink.trim();
    if trimmed.is_empty() {
        return String::from("/");
    }
    let mut out = String::new();
    if !trimmed.starts_with('/') {
        out.push('/');
    }
    out.push_str(trimmed);
    if out.ends_with(".html") {
        return out;
    }
    while out.ends_with('/') {
        out.pop();
    }
    out.push('/');
    out
}

/// Maps a normalized permalink to its file under `output_root`: `/` becomes
/// the root `index.html`, a `.html` permalink maps 1:1 to that file, and
/// anything else becomes a directory holding an `index.html`.
pub fn output_path(output_root: &Path, permalink: &str) -> PathBuf {
    let permalink = permalink.trim_start_matches('/');
    if permalink.is_empty() {
        return output_root.join("index.html");
    }
    if permalink.ends_with(".html") {
        return output_root.join(permalink);
    }
    output_root
        .join(permalink.trim_end_matches('/'))
        .join("index.html")
}

/// Sweeps `root` for post files and returns them sorted by date descending
/// (title ascending on ties). A missing posts root yields an empty list.
/// Parse failures are handled per `policy`; filesystem errors are always
/// fatal.
pub fn load_posts(root: &Path, renderer: &dyn Render, policy: OnPostError) -> Result<Vec<Post>> {
    let mut posts = Vec::new();
    if !root.is_dir() {
        return Ok(posts);
    }
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
        let modified = entry.metadata()?.modified()?;
        match parse_post(&rel, &contents, modified.into(), renderer) {
            Ok(post) => posts.push(post),
            Err(err) => match policy {
                OnPostError::Abort => {
                    return Err(Error::Annotated(
                        format!("parsing post `{}`", rel.display()),
                        Box::new(err),
                    ))
                }
                OnPostError::Skip => {
                    tracing::warn!(path = %rel.display(), error = %err, "skipping post");
                }
            },
        }
    }
    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.title.cmp(&b.title)));
    Ok(posts)
}

fn parse_post(
    rel: &Path,
    contents: &str,
    modified: DateTime<Utc>,
    renderer: &dyn Render,
) -> Result<Post> {
    let (fm, body) = frontmatter::split(contents)?;

    let stem = rel
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let slug = match fm.str_field("slug").filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_owned(),
        None => slug::slugify(stem),
    };

    let permalink = match fm.str_field("permalink") {
        Some(explicit) => normalize_permalink(explicit),
        None => normalize_permalink(&derived_permalink(rel, &slug)),
    };

    // unparseable or absent dates silently fall back to the file mtime
    let date = fm
        .str_field("date")
        .and_then(parse_date)
        .unwrap_or(modified);

    Ok(Post {
        title: fm.str_field("title").unwrap_or_default().to_owned(),
        kind: fm
            .str_field("type")
            .filter(|s| !s.is_empty())
            .unwrap_or("Post")
            .to_owned(),
        saga: fm.str_field("saga").unwrap_or_default().to_owned(),
        arc: fm.str_field("arc").unwrap_or_default().to_owned(),
        studio: fm.str_field("studio").unwrap_or_default().to_owned(),
        tags: fm.string_list("tags"),
        summary: fm.str_field("summary").unwrap_or_default().to_owned(),
        date,
        reading_time: fm.str_field("reading_time").unwrap_or_default().to_owned(),
        slug,
        permalink,
        body_html: renderer.render(body)?,
    })
}

// A post at `<subdirs>/<file>.md` lands at `/posts/<subdirs>/<slug>`.
fn derived_permalink(rel: &Path, slug: &str) -> String {
    match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => format!("/posts/{}/{}", parent.display(), slug),
        None => format!("/posts/{}", slug),
    }
}

/// The result of a post-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading posts.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post's frontmatter can't be split or decoded.
    Frontmatter(frontmatter::Error),

    /// Returned when the markdown renderer rejects a post body.
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
    /// use the `?` operator when splitting post files.
    fn from(err: frontmatter::Error) -> Error {
        Error::Frontmatter(err)
    }
}

impl From<markdown::Error> for Error {
    /// Converts a [`markdown::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when rendering post bodies.
    fn from(err: markdown::Error) -> Error {
        Error::Render(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator during the post sweep.
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

    struct StubRenderer;

    impl Render for StubRenderer {
        fn render(&self, markdown: &str) -> markdown::Result<String> {
            Ok(markdown.trim().to_owned())
        }
    }

    #[test]
    fn test_normalize_permalink() {
        struct TestCase {
            input: &'static str,
            wanted: &'static str,
        }

        let cases = [
            TestCase { input: "", wanted: "/" },
            TestCase { input: "   ", wanted: "/" },
            TestCase { input: "/", wanted: "/" },
            TestCase { input: "posts/foo", wanted: "/posts/foo/" },
            TestCase { input: "/posts/foo", wanted: "/posts/foo/" },
            TestCase { input: "/posts/foo//", wanted: "/posts/foo/" },
            TestCase { input: "about.html", wanted: "/about.html" },
            TestCase { input: "/docs/setup.html", wanted: "/docs/setup.html" },
            TestCase { input: "/docs/setup/index/", wanted: "/docs/setup/index/" },
        ];
        for case in &cases {
            let found = normalize_permalink(case.input);
            assert_eq!(
                case.wanted, found,
                "normalize({:?}): wanted {:?}; found {:?}",
                case.input, case.wanted, found
            );
            // idempotence
            assert_eq!(found, normalize_permalink(&found));
        }
    }

    #[test]
    fn test_output_path() {
        struct TestCase {
            permalink: &'static str,
            wanted: &'static str,
        }

        let cases = [
            TestCase { permalink: "/", wanted: "public/index.html" },
            TestCase { permalink: "", wanted: "public/index.html" },
            TestCase { permalink: "/posts/foo/", wanted: "public/posts/foo/index.html" },
            TestCase { permalink: "/about.html", wanted: "public/about.html" },
        ];
        for case in &cases {
            let found = output_path(Path::new("public"), case.permalink);
            assert_eq!(
                PathBuf::from(case.wanted),
                found,
                "output_path({:?})",
                case.permalink
            );
        }
    }

    #[test]
    fn test_load_posts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("2024"))?;
        fs::write(
            dir.path().join("2024").join("First Light.md"),
            "---\ntitle: First Light\ndate: 2024-01-01\ntags: [intro]\n---\nbody",
        )?;
        fs::write(
            dir.path().join("pinned.md"),
            "---\ntitle: Pinned\ndate: 2024-06-01\npermalink: /pinned.html\n---\nbody",
        )?;

        let posts = load_posts(dir.path(), &StubRenderer, OnPostError::Abort)?;
        assert_eq!(posts.len(), 2);
        // sorted by date descending
        assert_eq!(posts[0].title, "Pinned");
        assert_eq!(posts[0].permalink, "/pinned.html");
        assert_eq!(posts[1].permalink, "/posts/2024/first-light/");
        assert_eq!(posts[1].kind, "Post");
        assert_eq!(posts[1].tags, vec!["intro"]);
        Ok(())
    }

    #[test]
    fn test_missing_date_falls_back_to_mtime() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("undated.md"), "---\ntitle: Undated\n---\nbody")?;
        let posts = load_posts(dir.path(), &StubRenderer, OnPostError::Abort)?;
        let age = Utc::now().signed_duration_since(posts[0].date);
        assert!(age.num_minutes() < 5, "date should be near the file mtime");
        Ok(())
    }

    #[test]
    fn test_skip_policy_drops_bad_posts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("bad.md"), "no frontmatter")?;
        fs::write(dir.path().join("good.md"), "---\ntitle: Good\ndate: 2024-01-01\n---\nbody")?;

        let posts = load_posts(dir.path(), &StubRenderer, OnPostError::Skip)?;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Good");

        match load_posts(dir.path(), &StubRenderer, OnPostError::Abort) {
            Err(Error::Annotated(_, _)) => (),
            other => panic!("wanted annotated error; found {:?}", other.map(|p| p.len())),
        }
        Ok(())
    }

    #[test]
    fn test_missing_posts_root_is_empty() -> Result<()> {
        let posts = load_posts(
            Path::new("./does-not-exist"),
            &StubRenderer,
            OnPostError::Abort,
        )?;
        assert!(posts.is_empty());
        Ok(())
    }
}
