//! Exports the [`build_site`] function which stitches together the
//! high-level steps of building the output site: loading the content graph
//! ([`crate::loader`]) and the flat posts ([`crate::post`]), bucketing
//! everything by tag ([`crate::tags`]), rendering the HTML page tree
//! ([`crate::write`]), copying static assets, and generating the sitemap,
//! feed, and search index.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::feed;
use crate::loader;
use crate::markdown::Render;
use crate::page;
use crate::post;
use crate::search;
use crate::sitemap;
use crate::tags;
use crate::write::{self, TemplateSet, Writer};

/// Builds the whole site from a [`Config`]. The run either completes with
/// every artifact written under the output directory, or fails on the first
/// violated contract.
pub fn build_site(config: &Config, renderer: &dyn Render) -> Result<()> {
    let templates = TemplateSet::load(&config.templates)?;

    info!(path = %config.sagas_dir.display(), "loading sagas");
    let mut graph = loader::load_sagas(&config.sagas_dir, renderer)?;
    loader::derive(&mut graph, Utc::now());

    info!(path = %config.posts_dir.display(), "loading posts");
    let posts = post::load_posts(&config.posts_dir, renderer, config.on_post_error)?;

    let about = page::load_page(&config.about_path, renderer)?;
    let tag_index = tags::build_tag_index(&graph.sagas, &posts);

    // Blow away the previous run's page trees, but never the output root
    // itself: the user may have pointed it at a directory holding files we
    // don't own.
    for subdir in &["sagas", "library", "posts", "about", "static"] {
        rmdir(&config.output_dir.join(subdir))?;
    }
    fs::create_dir_all(&config.output_dir)?;

    info!(
        sagas = graph.sagas.len(),
        posts = posts.len(),
        tags = tag_index.len(),
        "writing pages"
    );
    let writer = Writer {
        config,
        templates: &templates,
    };
    writer.write_site(&graph, &posts, &tag_index, &about)?;

    if config.static_dir.is_dir() {
        info!(path = %config.static_dir.display(), "copying static assets");
        copy_dir(&config.static_dir, &config.output_dir.join("static"))?;
    }

    info!("writing sitemap.xml");
    fs::write(
        config.output_dir.join("sitemap.xml"),
        sitemap::build_sitemap(config, &graph, &posts)?,
    )?;
    info!("writing feed.xml");
    fs::write(
        config.output_dir.join("feed.xml"),
        feed::build_feed(config, &graph, &posts)?,
    )?;
    info!("writing search.json");
    fs::write(
        config.output_dir.join("search.json"),
        search::build_search_index(config, &graph)?,
    )?;

    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir(&src.join(entry.file_name()), &dst.join(entry.file_name()))?;
        } else {
            fs::copy(src.join(entry.file_name()), dst.join(entry.file_name()))?;
        }
    }
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) => match err.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err,
            }),
        },
    }
}

/// The result of a site-building operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error anywhere in the build pipeline.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors loading the saga graph.
    Loader(loader::Error),

    /// Returned for errors loading the flat posts.
    Post(post::Error),

    /// Returned for errors loading the about page.
    Page(page::Error),

    /// Returned for errors templating or writing HTML pages.
    Write(write::Error),

    /// Returned for errors generating the sitemap.
    Sitemap(sitemap::Error),

    /// Returned for errors generating the feed.
    Feed(feed::Error),

    /// Returned for errors generating the search index.
    Search(search::Error),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Loader(err) => err.fmt(f),
            Error::Post(err) => err.fmt(f),
            Error::Page(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Sitemap(err) => err.fmt(f),
            Error::Feed(err) => err.fmt(f),
            Error::Search(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "cleaning directory `{}`: {}", path.display(), err)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Loader(err) => Some(err),
            Error::Post(err) => Some(err),
            Error::Page(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Sitemap(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Search(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<loader::Error> for Error {
    /// Converts a [`loader::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when loading the graph.
    fn from(err: loader::Error) -> Error {
        Error::Loader(err)
    }
}

impl From<post::Error> for Error {
    /// Converts a [`post::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when loading posts.
    fn from(err: post::Error) -> Error {
        Error::Post(err)
    }
}

impl From<page::Error> for Error {
    /// Converts a [`page::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when loading the about page.
    fn from(err: page::Error) -> Error {
        Error::Page(err)
    }
}

impl From<write::Error> for Error {
    /// Converts a [`write::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when writing pages.
    fn from(err: write::Error) -> Error {
        Error::Write(err)
    }
}

impl From<sitemap::Error> for Error {
    /// Converts a [`sitemap::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when generating the sitemap.
    fn from(err: sitemap::Error) -> Error {
        Error::Sitemap(err)
    }
}

impl From<feed::Error> for Error {
    /// Converts a [`feed::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when generating the feed.
    fn from(err: feed::Error) -> Error {
        Error::Feed(err)
    }
}

impl From<search::Error> for Error {
    /// Converts a [`search::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator when generating the search index.
    fn from(err: search::Error) -> Error {
        Error::Search(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for other I/O.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::markdown::CmarkRenderer;

    const THEME_YAML: &str = "\
home: [home.html]
sagas: [sagas.html]
saga: [saga.html]
arc: [arc.html]
episode: [episode.html]
library: [library.html]
tag: [tag.html]
post: [post.html]
page: [page.html]
";

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn scaffold_project(root: &Path) {
        write_file(
            &root.join("skald.yaml"),
            "title: Example\ndescription: a site\nbase_url: https://example.com\n",
        );
        write_file(&root.join("theme").join("theme.yaml"), THEME_YAML);
        for view in &[
            "home", "sagas", "saga", "arc", "episode", "library", "tag", "post", "page",
        ] {
            write_file(
                &root.join("theme").join(format!("{}.html", view)),
                &format!("{}: {{{{.site.title}}}}", view),
            );
        }

        let sagas = root.join("content").join("sagas");
        write_file(
            &sagas.join("s").join("index.md"),
            "---\ntitle: Saga\nsummary: the saga\norder: 1\n---\n",
        );
        write_file(
            &sagas.join("s").join("a").join("index.md"),
            "---\ntitle: Arc\nsummary: the arc\norder: 1\n---\n",
        );
        write_file(
            &sagas.join("s").join("a").join("e.md"),
            "---\ntitle: Ep\nsummary: the episode\nnumber: 1\ndate: 2024-02-01\ntags: [rust]\n---\nBody.\n",
        );
        write_file(
            &root.join("content").join("posts").join("hello.md"),
            "---\ntitle: Hello\nsummary: hi\ndate: 2024-01-15\ntags: [rust]\n---\nHello.\n",
        );
        write_file(
            &root.join("content").join("about").join("index.md"),
            "---\ntitle: About\n---\nAbout.\n",
        );
        write_file(&root.join("static").join("style.css"), "body {}");
    }

    #[test]
    fn test_build_site() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        let out = dir.path().join("public");
        let config =
            Config::from_project_file(&dir.path().join("skald.yaml"), &out).unwrap();

        build_site(&config, &CmarkRenderer::default()).unwrap();

        for artifact in &[
            "index.html",
            "sagas/index.html",
            "sagas/s/index.html",
            "sagas/s/a/index.html",
            "sagas/s/a/e/index.html",
            "library/index.html",
            "library/rust/index.html",
            "posts/hello/index.html",
            "about/index.html",
            "static/style.css",
            "sitemap.xml",
            "feed.xml",
            "search.json",
        ] {
            assert!(out.join(artifact).is_file(), "missing {}", artifact);
        }

        let sitemap = fs::read_to_string(out.join("sitemap.xml")).unwrap();
        assert!(sitemap.contains("<loc>https://example.com/sagas/s/a/e/</loc>"));
        let search = fs::read_to_string(out.join("search.json")).unwrap();
        assert!(search.contains("\"title\":\"Ep\""));
    }

    #[test]
    fn test_build_site_missing_about_page() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        fs::remove_file(dir.path().join("content").join("about").join("index.md")).unwrap();
        let config = Config::from_project_file(
            &dir.path().join("skald.yaml"),
            &dir.path().join("public"),
        )
        .unwrap();

        match build_site(&config, &CmarkRenderer::default()) {
            Err(Error::Page(page::Error::Open(_, _))) => (),
            Err(other) => panic!("wanted Page error; found {:?}", other),
            Ok(()) => panic!("wanted Page error; found success"),
        }
    }

    #[test]
    fn test_build_site_stale_output_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        let out = dir.path().join("public");
        write_file(&out.join("sagas").join("old").join("index.html"), "stale");
        let config =
            Config::from_project_file(&dir.path().join("skald.yaml"), &out).unwrap();

        build_site(&config, &CmarkRenderer::default()).unwrap();
        assert!(!out.join("sagas").join("old").exists());
    }

    #[test]
    fn test_config_error_on_missing_base_url() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_project(dir.path());
        write_file(&dir.path().join("skald.yaml"), "title: Example\n");
        let config = Config::from_project_file(
            &dir.path().join("skald.yaml"),
            &dir.path().join("public"),
        )
        .unwrap();

        match build_site(&config, &CmarkRenderer::default()) {
            Err(Error::Sitemap(sitemap::Error::Config(config::Error::MissingBaseUrl))) => (),
            Err(other) => panic!("wanted Sitemap error; found {:?}", other),
            Ok(()) => panic!("wanted Sitemap error; found success"),
        }
    }
}
