//! Frontmatter lint for the `check` subcommand. Walks the content tree,
//! classifies every markdown file the same way the loaders do, and validates
//! its frontmatter without rendering anything. Issues are collected rather
//! than failing fast, so one run reports every problem.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use walkdir::WalkDir;

use crate::frontmatter::{self, Frontmatter};
use crate::saga::parse_date;

/// One problem found in a content file.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// The offending file, relative to the content root.
    pub path: PathBuf,

    pub message: String,
}

impl fmt::Display for Issue {
    /// Displays an [`Issue`] as the `<path>: <message>` line printed by the
    /// CLI.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

// How a content file is interpreted, derived from its path shape.
enum Kind {
    Saga,
    Arc,
    Episode,
    Post,
    Page,
}

/// Lints every markdown file under the content root. The result is sorted
/// by path, then message.
pub fn check_content(root: &Path) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path).to_owned();
        let kind = match classify(&rel) {
            Some(kind) => kind,
            None => continue,
        };

        let contents = fs::read_to_string(path)
            .map_err(|err| Error::Open(path.display().to_string(), err))?;
        for message in check_file(&kind, &contents) {
            issues.push(Issue {
                path: rel.clone(),
                message,
            });
        }
    }
    issues.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
    Ok(issues)
}

// Mirrors the loaders' path classification: saga and arc metadata are
// `index.md` files at depth one and two under `sagas/`, episodes one file
// deeper, posts anywhere under `posts/`, and the about page at
// `about/index.md`. Everything else is not lintable content.
fn classify(rel: &Path) -> Option<Kind> {
    let parts: Vec<&str> = rel.iter().map(|p| p.to_str().unwrap_or("")).collect();
    match parts.as_slice() {
        ["sagas", _, "index.md"] => Some(Kind::Saga),
        ["sagas", _, _, "index.md"] => Some(Kind::Arc),
        ["sagas", _, _, _] => Some(Kind::Episode),
        ["about", "index.md"] => Some(Kind::Page),
        ["posts", ..] => Some(Kind::Post),
        _ => None,
    }
}

fn check_file(kind: &Kind, contents: &str) -> Vec<String> {
    let (fm, _) = match frontmatter::split(contents) {
        Ok(split) => split,
        Err(err) => return vec![format!("frontmatter: {}", err)],
    };

    let mut messages = Vec::new();
    match kind {
        Kind::Saga => {
            require_string(&fm, "title", &mut messages);
            require_string(&fm, "summary", &mut messages);
            require_int(&fm, "order", &mut messages);
            optional_string_map(&fm, "links", &mut messages);
        }
        Kind::Arc => {
            require_string(&fm, "title", &mut messages);
            require_string(&fm, "summary", &mut messages);
            require_int(&fm, "order", &mut messages);
            optional_string(&fm, "slug", &mut messages);
        }
        Kind::Episode => {
            require_string(&fm, "title", &mut messages);
            require_string(&fm, "summary", &mut messages);
            match fm.int_field("number") {
                None if fm.get("number").is_none() => {
                    messages.push(String::from("missing `number`"))
                }
                None => messages.push(String::from("`number` must be an integer")),
                Some(n) if n <= 0 => {
                    messages.push(String::from("`number` must be greater than zero"))
                }
                Some(_) => (),
            }
            check_date(&fm, true, &mut messages);
            optional_string(&fm, "reading_time", &mut messages);
            optional_string(&fm, "slug", &mut messages);
            optional_tags(&fm, &mut messages);
        }
        Kind::Post | Kind::Page => {
            require_string(&fm, "title", &mut messages);
            check_date(&fm, false, &mut messages);
            optional_tags(&fm, &mut messages);
        }
    }
    messages
}

fn require_string(fm: &Frontmatter, key: &str, messages: &mut Vec<String>) {
    match fm.get(key) {
        None => messages.push(format!("missing `{}`", key)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            messages.push(format!("`{}` must not be empty", key))
        }
        Some(Value::String(_)) => (),
        Some(_) => messages.push(format!("`{}` must be a string", key)),
    }
}

fn require_int(fm: &Frontmatter, key: &str, messages: &mut Vec<String>) {
    if fm.get(key).is_none() {
        messages.push(format!("missing `{}`", key));
    } else if fm.int_field(key).is_none() {
        messages.push(format!("`{}` must be an integer", key));
    }
}

fn optional_string(fm: &Frontmatter, key: &str, messages: &mut Vec<String>) {
    match fm.get(key) {
        None => (),
        Some(Value::String(s)) if s.trim().is_empty() => {
            messages.push(format!("`{}` must not be empty", key))
        }
        Some(Value::String(_)) => (),
        Some(_) => messages.push(format!("`{}` must be a string", key)),
    }
}

fn optional_string_map(fm: &Frontmatter, key: &str, messages: &mut Vec<String>) {
    if fm.get(key).is_some() && fm.string_map(key).is_none() {
        messages.push(format!("`{}` must be a map of strings", key));
    }
}

fn optional_tags(fm: &Frontmatter, messages: &mut Vec<String>) {
    match fm.get("tags") {
        None => (),
        Some(Value::Sequence(seq)) => {
            if seq.iter().any(|v| !matches!(v, Value::String(_))) {
                messages.push(String::from("`tags` must be a list of strings"));
            }
        }
        Some(_) => messages.push(String::from("`tags` must be a list of strings")),
    }
}

fn check_date(fm: &Frontmatter, required: bool, messages: &mut Vec<String>) {
    match fm.get("date") {
        None if required => messages.push(String::from("missing `date`")),
        None => (),
        Some(Value::String(s)) => {
            if parse_date(s).is_none() {
                messages.push(String::from("`date` must be RFC3339 or YYYY-MM-DD"));
            }
        }
        Some(_) => messages.push(String::from("`date` must be a string")),
    }
}

/// The result of a lint operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error walking or reading the content tree. Validation
/// problems are [`Issue`]s, never errors.
#[derive(Debug)]
pub enum Error {
    /// Returned when a content file can't be opened or read.
    Open(String, std::io::Error),

    /// Returned when the directory walk itself fails.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Open(path, err) => write!(f, "opening `{}`: {}", path, err),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open(_, err) => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator during the walk.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_clean_content_has_no_issues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(
            &root.join("sagas/s/index.md"),
            "---\ntitle: Saga\nsummary: ok\norder: 1\n---\n",
        );
        write_file(
            &root.join("sagas/s/a/index.md"),
            "---\ntitle: Arc\nsummary: ok\norder: 1\n---\n",
        );
        write_file(
            &root.join("sagas/s/a/e.md"),
            "---\ntitle: Ep\nsummary: ok\nnumber: 1\ndate: 2024-02-01\ntags: [rust]\n---\n",
        );
        write_file(
            &root.join("posts/hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-15\n---\n",
        );
        write_file(&root.join("about/index.md"), "---\ntitle: About\n---\n");

        assert_eq!(check_content(root).unwrap(), Vec::new());
    }

    #[test]
    fn test_saga_issues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(
            &root.join("sagas/s/index.md"),
            "---\ntitle: \"\"\nlinks: {repo: 3}\n---\n",
        );

        let issues = check_content(root).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "`links` must be a map of strings",
                "`title` must not be empty",
                "missing `order`",
                "missing `summary`",
            ]
        );
    }

    #[test]
    fn test_episode_issues() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(
            &root.join("sagas/s/a/e.md"),
            "---\ntitle: Ep\nsummary: ok\nnumber: 0\ndate: yesterday\ntags: [one, 2]\n---\n",
        );

        let issues = check_content(root).unwrap();
        let messages: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "`date` must be RFC3339 or YYYY-MM-DD",
                "`number` must be greater than zero",
                "`tags` must be a list of strings",
            ]
        );
    }

    #[test]
    fn test_broken_frontmatter_is_one_issue() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(&root.join("posts/broken.md"), "no frontmatter here\n");

        let issues = check_content(root).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("frontmatter:"));
        assert_eq!(issues[0].path, PathBuf::from("posts/broken.md"));
    }

    #[test]
    fn test_stray_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_file(&root.join("sagas/stray.md"), "not content\n");
        write_file(&root.join("notes.md"), "not content\n");

        assert_eq!(check_content(root).unwrap(), Vec::new());
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue {
            path: PathBuf::from("posts/x.md"),
            message: String::from("missing `title`"),
        };
        assert_eq!(issue.to_string(), "posts/x.md: missing `title`");
    }
}
