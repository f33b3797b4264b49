//! Paginated HTML output.
//!
//! The renderer turns the item history into a directory of pages:
//! `index.html` holds everything not yet archived and is rewritten every
//! cycle; `page{n}.html` archives (1-based, page 1 = oldest items) are
//! written once and never rewritten. The renderer remembers which items it
//! has archived, so a late-arriving item that sorts older than an already
//! published archive stays in the index instead of vanishing into a frozen
//! page range.
//!
//! What a page looks like is a separate capability: the renderer decides
//! which items go in which page and hands them to a [`PageTemplate`].

use crate::history::{Item, ItemHistory};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tera::Tera;
use thiserror::Error;

/// Errors that abort the current cycle's output.
///
/// A render failure is fatal to the cycle but not to the process: the item
/// history is untouched, so the next scheduled cycle retries from the same
/// state.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Template expansion failed.
    #[error("Template error: {0}")]
    Template(String),
    /// A page artifact could not be persisted.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One output page handed to the template.
pub struct Page<'a> {
    /// 0 for the index, 1-based for archives (page 1 = oldest items).
    pub number: usize,
    /// Items for this page, newest first.
    pub items: &'a [&'a Item],
    /// Relative href of the next-older page, if any.
    pub older: Option<String>,
}

/// The pluggable template capability: items in, output artifact out.
pub trait PageTemplate: Send + Sync {
    fn render(&self, page: &Page<'_>) -> Result<String, RenderError>;
}

/// Number of archive pages to peel off `unarchived_len` pending items.
///
/// A page is only peeled while more than `2 * items_per_page` items would
/// remain behind, i.e. the k-th peel requires `unarchived_len >= (k + 2) *
/// items_per_page`. This debounces page creation: the index absorbs fresh
/// items until a full page's worth can be archived while still holding at
/// least `2 * items_per_page` itself.
///
/// Monotone in `unarchived_len`.
pub fn archive_count(unarchived_len: usize, items_per_page: usize) -> usize {
    if items_per_page == 0 {
        return 0;
    }
    (unarchived_len / items_per_page).saturating_sub(2)
}

/// Writes the paginated output for the current history.
///
/// Items enter an archive page at most once: the renderer tracks archived
/// `(feed_url, guid)` keys, and the index is exactly the items not yet
/// archived. An existing `page{n}.html` file is never overwritten.
pub struct PageRenderer {
    dir: PathBuf,
    items_per_page: usize,
    template: Box<dyn PageTemplate>,
    archived: HashSet<(String, String)>,
    pages_written: usize,
}

impl PageRenderer {
    /// `items_per_page` arrives pre-clamped from the shell.
    pub fn new(dir: impl Into<PathBuf>, items_per_page: usize, template: Box<dyn PageTemplate>) -> Self {
        Self {
            dir: dir.into(),
            items_per_page,
            template,
            archived: HashSet::new(),
            pages_written: 0,
        }
    }

    /// Renders the index and any newly qualifying archive pages.
    ///
    /// Each new archive page takes the oldest `items_per_page` items not yet
    /// archived; those items are then excluded from the index permanently.
    /// The index is always rewritten.
    pub fn render(&mut self, history: &ItemHistory) -> Result<(), RenderError> {
        let mut unarchived: Vec<&Item> = history
            .items()
            .iter()
            .filter(|item| !self.archived.contains(&(item.feed_url.clone(), item.guid.clone())))
            .collect();

        for _ in 0..archive_count(unarchived.len(), self.items_per_page) {
            let number = self.pages_written + 1;
            let chunk = unarchived.split_off(unarchived.len() - self.items_per_page);
            let path = self.dir.join(format!("page{number}.html"));
            // A file left by a previous run stays as published.
            if !path.exists() {
                let html = self.template.render(&Page {
                    number,
                    items: &chunk,
                    older: (number > 1).then(|| format!("page{}.html", number - 1)),
                })?;
                write_atomic(&path, &html)?;
                tracing::info!(page = number, items = chunk.len(), "finalized archive page");
            }
            for item in &chunk {
                self.archived
                    .insert((item.feed_url.clone(), item.guid.clone()));
            }
            self.pages_written = number;
        }

        let html = self.template.render(&Page {
            number: 0,
            items: &unarchived,
            older: (self.pages_written > 0).then(|| format!("page{}.html", self.pages_written)),
        })?;
        write_atomic(&self.dir.join("index.html"), &html)
    }
}

/// Built-in HTML template backed by tera.
///
/// The default layout is compiled in; a custom template file can replace it
/// wholesale (it receives the same context: `items`, `number`, `older`,
/// `generated_at`).
pub struct HtmlTemplate {
    tera: Tera,
}

const TEMPLATE_NAME: &str = "page.html";

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{% if number == 0 %}news{% else %}news - page {{ number }}{% endif %}</title>
</head>
<body>
<h1>{% if number == 0 %}news{% else %}news - page {{ number }}{% endif %}</h1>
<ul>
{% for item in items %}  <li>
    {% if item.link %}<a href="{{ item.link }}">{{ item.title }}</a>{% else %}{{ item.title }}{% endif %}
    {% if item.published_at %}<time datetime="{{ item.published_at }}">{{ item.published_at }}</time>{% endif %}
    {% if item.summary %}<p>{{ item.summary | striptags | truncate(length=300) }}</p>{% endif %}
  </li>
{% endfor %}</ul>
<nav>
{% if number != 0 %}  <a href="index.html">index</a>
{% endif %}{% if older %}  <a href="{{ older }}">older</a>
{% endif %}</nav>
<footer>generated {{ generated_at }}</footer>
</body>
</html>
"#;

impl HtmlTemplate {
    /// The compiled-in default layout.
    pub fn built_in() -> Result<Self, RenderError> {
        Self::from_source(DEFAULT_TEMPLATE)
    }

    /// A custom layout from template source (e.g. the `--template` flag).
    pub fn from_source(source: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, source)
            .map_err(|e| RenderError::Template(e.to_string()))?;
        Ok(Self { tera })
    }
}

impl PageTemplate for HtmlTemplate {
    fn render(&self, page: &Page<'_>) -> Result<String, RenderError> {
        let mut ctx = tera::Context::new();
        ctx.insert("number", &page.number);
        ctx.insert("items", page.items);
        ctx.insert("older", &page.older);
        ctx.insert("generated_at", &chrono::Utc::now().to_rfc3339());
        self.tera
            .render(TEMPLATE_NAME, &ctx)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}

/// Atomic write: temp file in the same directory, sync, rename.
///
/// Randomized temp filename so a crashed previous run can't collide.
fn write_atomic(path: &Path, content: &str) -> Result<(), RenderError> {
    let io_err = |source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    };

    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(io_err)?;

    let result = file
        .write_all(content.as_bytes())
        .and_then(|_| file.sync_all());
    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp_path);
        return Err(io_err(e));
    }
    drop(file);

    std::fs::rename(&temp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        io_err(e)
    })
}
