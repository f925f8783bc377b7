//! Project configuration. A `skald.yaml` file marks the project root and is
//! discovered by walking up parent directories; the theme ships its own
//! manifest, `theme/theme.yaml`, listing the template files for each view.
//! `SITE_BASE_URL` and `SITE_BASE_PATH` override the corresponding file
//! settings, so deployment targets don't need to edit the project file.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::post::OnPostError;

const PROJECT_FILE: &str = "skald.yaml";

/// The serialized shape of `skald.yaml`.
#[derive(Debug, Deserialize)]
struct Project {
    #[serde(default)]
    title: String,

    #[serde(default)]
    description: String,

    #[serde(default)]
    base_url: String,

    #[serde(default)]
    base_path: String,

    #[serde(default)]
    on_post_error: OnPostError,
}

/// The template manifest from `theme/theme.yaml`. Each view is an ordered
/// list of template files, concatenated before parsing so themes can share
/// partials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Theme {
    pub home: Vec<PathBuf>,
    pub sagas: Vec<PathBuf>,
    pub saga: Vec<PathBuf>,
    pub arc: Vec<PathBuf>,
    pub episode: Vec<PathBuf>,
    pub library: Vec<PathBuf>,
    pub tag: Vec<PathBuf>,
    pub post: Vec<PathBuf>,
    pub page: Vec<PathBuf>,
}

impl Theme {
    fn resolve(&mut self, theme_dir: &Path) {
        for list in [
            &mut self.home,
            &mut self.sagas,
            &mut self.saga,
            &mut self.arc,
            &mut self.episode,
            &mut self.library,
            &mut self.tag,
            &mut self.post,
            &mut self.page,
        ]
        .iter_mut()
        {
            for path in list.iter_mut() {
                *path = theme_dir.join(&*path);
            }
        }
    }
}

/// The fully resolved project configuration: site metadata, normalized URL
/// parts, content and output directories, and the theme manifest with every
/// template path resolved against the theme directory.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub title: String,
    pub description: String,

    /// The normalized base URL, without a trailing slash. Empty means
    /// unconfigured; [`Config::absolute_url`] then fails.
    pub base_url: String,

    /// The normalized base path: empty, or `/`-prefixed without a trailing
    /// slash.
    pub base_path: String,

    pub on_post_error: OnPostError,
    pub content_dir: PathBuf,
    pub sagas_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub about_path: PathBuf,
    pub static_dir: PathBuf,
    pub output_dir: PathBuf,
    pub templates: Theme,
}

impl Config {
    /// Finds `skald.yaml` in `dir` or the nearest parent directory and loads
    /// the configuration from it.
    pub fn from_directory(dir: &Path, output_dir: &Path) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            Config::from_project_file(&path, output_dir)
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, output_dir),
                None => Err(Error::ProjectFileNotFound),
            }
        }
    }

    /// Loads the configuration from the project file at `path`. The project
    /// root is the file's directory; content, theme, and static directories
    /// all resolve against it.
    pub fn from_project_file(path: &Path, output_dir: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .map_err(|err| Error::Open(path.display().to_string(), err))?;
        let mut project: Project = serde_yaml::from_str(&contents)?;

        if let Ok(value) = env::var("SITE_BASE_URL") {
            project.base_url = value;
        }
        if let Ok(value) = env::var("SITE_BASE_PATH") {
            project.base_path = value;
        }

        let project_root = match path.parent() {
            Some(root) => root.to_owned(),
            None => return Err(Error::ProjectFileNotFound),
        };
        let content_dir = project_root.join("content");
        let theme_dir = project_root.join("theme");

        let theme_path = theme_dir.join("theme.yaml");
        let theme_contents = fs::read_to_string(&theme_path)
            .map_err(|err| Error::Open(theme_path.display().to_string(), err))?;
        let mut templates: Theme = serde_yaml::from_str(&theme_contents)?;
        templates.resolve(&theme_dir);

        Ok(Config {
            title: project.title,
            description: project.description,
            base_url: normalize_base_url(&project.base_url)?,
            base_path: normalize_base_path(&project.base_path),
            on_post_error: project.on_post_error,
            sagas_dir: content_dir.join("sagas"),
            posts_dir: content_dir.join("posts"),
            about_path: content_dir.join("about").join("index.md"),
            content_dir,
            static_dir: project_root.join("static"),
            output_dir: output_dir.to_owned(),
            templates,
        })
    }

    /// Prefixes a site-relative path with the base path, producing the href
    /// a page should link to. `path` must start with `/`.
    pub fn href(&self, path: &str) -> String {
        format!("{}{}", self.base_path, path)
    }

    /// Composes the absolute URL for a site-relative path. Fails when no
    /// base URL is configured.
    pub fn absolute_url(&self, path: &str) -> Result<String> {
        if self.base_url.is_empty() {
            return Err(Error::MissingBaseUrl);
        }
        Ok(format!("{}{}", self.base_url, self.href(path)))
    }
}

/// Trims a base URL and strips trailing slashes. Non-empty results must
/// parse as a URL.
fn normalize_base_url(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    url::Url::parse(trimmed)
        .map_err(|err| Error::InvalidBaseUrl(trimmed.to_owned(), err))?;
    Ok(trimmed.to_owned())
}

/// Normalizes a base path to either the empty string or a `/`-prefixed
/// segment path with no trailing slash.
fn normalize_base_path(input: &str) -> String {
    let trimmed = input.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// The result of a configuration-loading operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or using the project configuration.
#[derive(Debug)]
pub enum Error {
    /// Returned when no `skald.yaml` exists in the start directory or any
    /// parent.
    ProjectFileNotFound,

    /// Returned when a configuration file can't be opened or read.
    Open(String, std::io::Error),

    /// Returned when a configuration file isn't valid YAML for its schema.
    Decode(serde_yaml::Error),

    /// Returned when the configured base URL doesn't parse.
    InvalidBaseUrl(String, url::ParseError),

    /// Returned when an operation needs an absolute URL but no base URL is
    /// configured.
    MissingBaseUrl,
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ProjectFileNotFound => write!(
                f,
                "could not find `{}` in the working directory or any parent",
                PROJECT_FILE
            ),
            Error::Open(path, err) => {
                write!(f, "opening configuration file `{}`: {}", path, err)
            }
            Error::Decode(err) => write!(f, "decoding configuration: {}", err),
            Error::InvalidBaseUrl(input, err) => {
                write!(f, "invalid base URL `{}`: {}", input, err)
            }
            Error::MissingBaseUrl => {
                write!(f, "a base URL is required to generate absolute URLs")
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProjectFileNotFound => None,
            Error::Open(_, err) => Some(err),
            Error::Decode(err) => Some(err),
            Error::InvalidBaseUrl(_, err) => Some(err),
            Error::MissingBaseUrl => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator when decoding configuration files.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Decode(err)
    }
}
