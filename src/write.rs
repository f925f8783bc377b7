//! Renders the site's HTML pages through the theme templates and writes them
//! under the output directory. The theme contributes one template per view;
//! [`Writer`] pairs each view with its context object and output path.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use gtmpl::{Context, Template};
use gtmpl_value::Value;

use crate::config::{self, Config};
use crate::loader::{cmp_date_desc, Graph};
use crate::page::Page;
use crate::post::{self, Post};
use crate::saga::{Arc, Episode, EpisodeRef};
use crate::tags::TagBucket;
use crate::value::{date_value, number_value, string_list};

/// How many episodes the home page's latest-episodes strip shows.
const HOME_LATEST_LIMIT: usize = 6;

/// How many entries the home page's merged recent stream shows.
const HOME_RECENT_LIMIT: usize = 10;

/// The parsed theme templates, one per view.
pub struct TemplateSet {
    pub home: Template,
    pub sagas: Template,
    pub saga: Template,
    pub arc: Template,
    pub episode: Template,
    pub library: Template,
    pub tag: Template,
    pub post: Template,
    pub page: Template,
}

impl TemplateSet {
    /// Parses every view's template list from the theme manifest.
    pub fn load(theme: &config::Theme) -> Result<TemplateSet> {
        Ok(TemplateSet {
            home: parse_template(&theme.home)?,
            sagas: parse_template(&theme.sagas)?,
            saga: parse_template(&theme.saga)?,
            arc: parse_template(&theme.arc)?,
            episode: parse_template(&theme.episode)?,
            library: parse_template(&theme.library)?,
            tag: parse_template(&theme.tag)?,
            post: parse_template(&theme.post)?,
            page: parse_template(&theme.page)?,
        })
    }
}

// Concatenates the view's template files and parses the result as one
// template, so themes can share partials by listing them first.
fn parse_template(files: &[PathBuf]) -> Result<Template> {
    let mut contents = String::new();
    for file in files {
        let text = fs::read_to_string(file).map_err(|err| Error::OpenTemplateFile {
            path: file.clone(),
            err,
        })?;
        contents.push_str(&text);
        contents.push('\n');
    }
    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

/// Responsible for templating the whole page tree and writing it to disk.
pub struct Writer<'a> {
    pub config: &'a Config,
    pub templates: &'a TemplateSet,
}

impl Writer<'_> {
    /// Writes every HTML page of the site: the home page, the saga hierarchy,
    /// the tag library, all posts, and the about page.
    pub fn write_site(
        &self,
        graph: &Graph,
        posts: &[Post],
        tags: &[TagBucket],
        about: &Page,
    ) -> Result<()> {
        let out = &self.config.output_dir;
        let saga_values: Vec<Value> = graph.sagas.iter().map(Value::from).collect();

        let mut context = self.base_context();
        context.insert("sagas".to_owned(), Value::Array(saga_values.clone()));
        context.insert(
            "latest_episodes".to_owned(),
            Value::Array(
                graph
                    .episode_refs
                    .iter()
                    .take(HOME_LATEST_LIMIT)
                    .map(Value::from)
                    .collect(),
            ),
        );
        context.insert(
            "recent".to_owned(),
            recent_items(posts, &graph.episode_refs, HOME_RECENT_LIMIT),
        );
        self.render_to(&self.templates.home, context, &out.join("index.html"))?;

        let mut context = self.base_context();
        context.insert("sagas".to_owned(), Value::Array(saga_values));
        self.render_to(
            &self.templates.sagas,
            context,
            &out.join("sagas").join("index.html"),
        )?;

        for saga in &graph.sagas {
            let saga_dir = out.join("sagas").join(&saga.slug);
            let mut context = self.base_context();
            context.insert("saga".to_owned(), Value::from(saga));
            self.render_to(&self.templates.saga, context, &saga_dir.join("index.html"))?;

            for (ai, arc) in saga.arcs.iter().enumerate() {
                let arc_dir = saga_dir.join(&arc.slug);
                let mut context = self.base_context();
                context.insert("saga".to_owned(), Value::from(saga));
                context.insert("arc".to_owned(), Value::from(arc));
                let prev = if ai > 0 { saga.arcs.get(ai - 1) } else { None };
                context.insert("prev_arc".to_owned(), arc_link(prev, &saga.slug));
                context.insert(
                    "next_arc".to_owned(),
                    arc_link(saga.arcs.get(ai + 1), &saga.slug),
                );
                self.render_to(&self.templates.arc, context, &arc_dir.join("index.html"))?;

                for (ei, episode) in arc.episodes.iter().enumerate() {
                    let mut context = self.base_context();
                    context.insert("saga".to_owned(), Value::from(saga));
                    context.insert("arc".to_owned(), Value::from(arc));
                    context.insert("episode".to_owned(), Value::from(episode));
                    let prev = if ei > 0 { arc.episodes.get(ei - 1) } else { None };
                    context.insert("prev".to_owned(), episode_link(prev));
                    context.insert("next".to_owned(), episode_link(arc.episodes.get(ei + 1)));
                    self.render_to(
                        &self.templates.episode,
                        context,
                        &arc_dir.join(&episode.slug).join("index.html"),
                    )?;
                }
            }
        }

        let mut context = self.base_context();
        context.insert(
            "tags".to_owned(),
            Value::Array(tags.iter().map(Value::from).collect()),
        );
        self.render_to(
            &self.templates.library,
            context,
            &out.join("library").join("index.html"),
        )?;

        for bucket in tags {
            let mut context = self.base_context();
            context.insert("tag".to_owned(), Value::from(bucket));
            self.render_to(
                &self.templates.tag,
                context,
                &out.join("library").join(&bucket.slug).join("index.html"),
            )?;
        }

        for item in posts {
            let mut context = self.base_context();
            context.insert("post".to_owned(), Value::from(item));
            self.render_to(
                &self.templates.post,
                context,
                &post::output_path(out, &item.permalink),
            )?;
        }

        let mut context = self.base_context();
        context.insert("page".to_owned(), Value::from(about));
        self.render_to(
            &self.templates.page,
            context,
            &out.join("about").join("index.html"),
        )?;

        Ok(())
    }

    // Every view receives a `site` object alongside its own keys.
    fn base_context(&self) -> HashMap<String, Value> {
        let mut site: HashMap<String, Value> = HashMap::new();
        site.insert("title".to_owned(), Value::from(self.config.title.as_str()));
        site.insert(
            "description".to_owned(),
            Value::from(self.config.description.as_str()),
        );
        site.insert(
            "base_url".to_owned(),
            Value::from(self.config.base_url.as_str()),
        );
        site.insert(
            "base_path".to_owned(),
            Value::from(self.config.base_path.as_str()),
        );

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site".to_owned(), Value::Object(site));
        m
    }

    fn render_to(
        &self,
        template: &Template,
        context: HashMap<String, Value>,
        path: &Path,
    ) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let context = Context::from(Value::Object(context)).map_err(Error::Template)?;
        template.execute(&mut fs::File::create(path)?, &context)?;
        Ok(())
    }
}

// The home page's activity stream: every post and the most recent episodes,
// merged newest-first under one shape so templates can render the mix
// uniformly.
fn recent_items(posts: &[Post], refs: &[EpisodeRef], limit: usize) -> Value {
    let mut items: Vec<(Option<DateTime<Utc>>, String, Value)> = Vec::new();
    for post in posts {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::from(post.title.as_str()));
        m.insert("summary".to_owned(), Value::from(post.summary.as_str()));
        m.insert("date".to_owned(), date_value(Some(post.date)));
        m.insert("type".to_owned(), Value::from(post.kind.as_str()));
        m.insert("saga".to_owned(), Value::from(post.saga.as_str()));
        m.insert("arc".to_owned(), Value::from(post.arc.as_str()));
        m.insert("url".to_owned(), Value::from(post.permalink.as_str()));
        m.insert("tags".to_owned(), string_list(&post.tags));
        items.push((Some(post.date), post.title.clone(), Value::Object(m)));
    }
    for episode in refs.iter().take(limit) {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::from(episode.title.as_str()));
        m.insert("summary".to_owned(), Value::from(episode.summary.as_str()));
        m.insert("date".to_owned(), date_value(episode.date));
        m.insert("type".to_owned(), Value::from("Episode"));
        m.insert("saga".to_owned(), Value::from(episode.saga_title.as_str()));
        m.insert("arc".to_owned(), Value::from(episode.arc_title.as_str()));
        m.insert("url".to_owned(), Value::String(episode.permalink()));
        m.insert("tags".to_owned(), string_list(&episode.tags));
        items.push((episode.date, episode.title.clone(), Value::Object(m)));
    }
    items.sort_by(|a, b| cmp_date_desc(a.0, b.0).then_with(|| a.1.cmp(&b.1)));
    items.truncate(limit);
    Value::Array(items.into_iter().map(|(_, _, value)| value).collect())
}

// Nil when there is no neighboring episode, so templates can test for it.
fn episode_link(episode: Option<&Episode>) -> Value {
    match episode {
        Some(episode) => {
            let mut m: HashMap<String, Value> = HashMap::new();
            m.insert("title".to_owned(), Value::from(episode.title.as_str()));
            m.insert("slug".to_owned(), Value::from(episode.slug.as_str()));
            m.insert("number".to_owned(), number_value(episode.number));
            m.insert(
                "url".to_owned(),
                Value::String(format!(
                    "/sagas/{}/{}/{}/",
                    episode.saga_slug, episode.arc_slug, episode.slug
                )),
            );
            Value::Object(m)
        }
        None => Value::Nil,
    }
}

fn arc_link(arc: Option<&Arc>, saga_slug: &str) -> Value {
    match arc {
        Some(arc) => {
            let mut m: HashMap<String, Value> = HashMap::new();
            m.insert("title".to_owned(), Value::from(arc.title.as_str()));
            m.insert("slug".to_owned(), Value::from(arc.slug.as_str()));
            m.insert(
                "url".to_owned(),
                Value::String(format!("/sagas/{}/{}/", saga_slug, arc.slug)),
            );
            Value::Object(m)
        }
        None => Value::Nil,
    }
}

/// The result of a page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error templating or writing output pages.
#[derive(Debug)]
pub enum Error {
    /// Returned when a template file can't be opened or read.
    OpenTemplateFile { path: PathBuf, err: io::Error },

    /// Returned when a template file doesn't parse.
    ParseTemplate(String),

    /// Returned when rendering a template against a context fails.
    Template(String),

    /// Returned when an output file can't be written.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::OpenTemplateFile { path, err } => {
                write!(f, "opening template file `{}`: {}", path.display(), err)
            }
            Error::ParseTemplate(err) => write!(f, "parsing templates: {}", err),
            Error::Template(err) => write!(f, "rendering template: {}", err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Template(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. It allows us to use the
    /// `?` operator when writing output files.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template engine error message into an [`Error`]. It allows
    /// us to use the `?` operator when executing templates.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}
