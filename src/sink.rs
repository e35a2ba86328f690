//! Where finished figures go: a multi-page document on disk, or nowhere.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::config::OutputConfig;
use crate::display::Display;
use crate::error::GalleryError;
use crate::figure::Figure;
use crate::render::render_svg;
use crate::revision::{RevisionSource, file_safe};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Persisted,
    /// Test mode: figures are produced and dropped.
    Suppressed,
}

impl OutputMode {
    /// Presence of `var` (any value) selects suppressed output.
    pub fn from_env(var: &str) -> Self {
        if std::env::var_os(var).is_some() {
            Self::Suppressed
        } else {
            Self::Persisted
        }
    }
}

/// `<prefix>-<revision>-<YYYY-MM-DD>.html`
pub fn artifact_name(prefix: &str, revision: &str, date: NaiveDate) -> String {
    format!(
        "{prefix}-{}-{}.html",
        file_safe(revision),
        date.format("%Y-%m-%d")
    )
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
section.page{page-break-after:always;margin-bottom:3em}\
section.page svg{max-width:100%;height:auto}";

/// Append-only HTML document of inline SVG pages.
struct Document {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Document {
    fn create(path: PathBuf, heading: &str) -> Result<Self, GalleryError> {
        let file = File::create(&path).map_err(|e| GalleryError::artifact(&path, e))?;
        let mut doc = Self {
            path,
            writer: BufWriter::new(file),
        };
        let heading = escape_html(heading);
        let header = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{heading}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<h1>{heading}</h1>\n"
        );
        doc.write(&header)?;
        Ok(doc)
    }

    /// Write and flush so an unfinished document still holds every page.
    fn write(&mut self, text: &str) -> Result<(), GalleryError> {
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| GalleryError::artifact(&self.path, e))
    }

    fn append_page(&mut self, figure: &Figure, svg: &str) -> Result<(), GalleryError> {
        let caption = escape_html(figure.title().unwrap_or(figure.label()));
        let page = format!(
            "<section class=\"page\" id=\"page-{n}\" data-figure=\"{n}\">\n<h2>{caption}</h2>\n{svg}\n</section>\n",
            n = figure.number()
        );
        self.write(&page)
    }

    fn close(mut self) -> Result<PathBuf, GalleryError> {
        self.write("</body>\n</html>\n")?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| GalleryError::artifact(&self.path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| GalleryError::artifact(&self.path, e))?;
        Ok(self.path)
    }
}

enum Target {
    Suppressed,
    Document(Document),
}

/// Destination for finished figures, chosen once per run.
pub struct ArtifactSink {
    target: Target,
    display: Option<Display>,
    page_size: (u32, u32),
    next_figure: u32,
    pages: usize,
}

impl ArtifactSink {
    pub fn suppressed(page_size: (u32, u32)) -> Self {
        Self {
            target: Target::Suppressed,
            display: None,
            page_size,
            next_figure: 1,
            pages: 0,
        }
    }

    /// Open a fresh document at `path`, replacing any file already there.
    pub fn persisted(
        path: impl Into<PathBuf>,
        heading: &str,
        page_size: (u32, u32),
    ) -> Result<Self, GalleryError> {
        let doc = Document::create(path.into(), heading)?;
        Ok(Self {
            target: Target::Document(doc),
            ..Self::suppressed(page_size)
        })
    }

    /// Pick the sink for this run. In persisted mode the revision is looked
    /// up first; if that fails nothing is created.
    pub fn select(
        mode: OutputMode,
        revision: &dyn RevisionSource,
        today: NaiveDate,
        output: &OutputConfig,
    ) -> Result<Self, GalleryError> {
        let page_size = output.page_size();
        match mode {
            OutputMode::Suppressed => {
                info!("test mode: figures will not be saved");
                Ok(Self::suppressed(page_size))
            }
            OutputMode::Persisted => {
                let revision = revision.describe()?;
                let name = artifact_name(&output.prefix, &revision, today);
                fs::create_dir_all(&output.dir)
                    .map_err(|e| GalleryError::artifact(&output.dir, e))?;
                let path = output.dir.join(name);
                info!("writing gallery to {}", path.display());
                let heading = format!("{} {} ({})", output.prefix, revision, today.format("%Y-%m-%d"));
                Self::persisted(path, &heading, page_size)
            }
        }
    }

    /// Also show every accepted figure in `display`.
    pub fn with_display(mut self, display: Display) -> Self {
        self.display = Some(display);
        self
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self.target, Target::Document(_))
    }

    pub fn is_interactive(&self) -> bool {
        self.display.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::Document(doc) => Some(&doc.path),
            Target::Suppressed => None,
        }
    }

    pub fn pages_written(&self) -> usize {
        self.pages
    }

    pub(crate) fn next_figure_number(&mut self) -> u32 {
        let n = self.next_figure;
        self.next_figure += 1;
        n
    }

    /// Persist the figure as the next page (if persisted), then display it
    /// (if interactive).
    pub fn accept(&mut self, figure: &Figure) -> Result<(), GalleryError> {
        if let Target::Document(doc) = &mut self.target {
            let svg = render_svg(figure, self.page_size)?;
            doc.append_page(figure, &svg)?;
            self.pages += 1;
        }
        if let Some(display) = &self.display {
            display.show(figure);
        }
        Ok(())
    }

    /// Close the document. Returns its path, or `None` when suppressed.
    pub fn finalize(self) -> Result<Option<PathBuf>, GalleryError> {
        match self.target {
            Target::Suppressed => Ok(None),
            Target::Document(doc) => {
                let path = doc.close()?;
                info!(pages = self.pages, "closed {}", path.display());
                Ok(Some(path))
            }
        }
    }
}
