//! Export a project's documents as one printable HTML document.
//!
//! Fetches every document of a project concurrently, renders each one's
//! Markdown to HTML, and assembles a single document: a title page
//! followed by one section per document, each starting on a new page. The
//! result is handed to a [`PrintSurface`] (by default a file the user
//! opens and prints or saves as PDF).
//!
//! The fetch is all-or-nothing: if any document cannot be loaded the
//! export fails with [`ViewerError::ExportFailed`] and nothing reaches the
//! surface.

use async_trait::async_trait;
use futures::future::try_join_all;
use pulldown_cmark::{html, Options, Parser};
use std::path::{Path, PathBuf};

use crate::directory::DocumentSource;
use crate::error::{Result, ViewerError};
use crate::models::{DocumentRef, Project};

/// Converts Markdown text to static HTML markup.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// CommonMark renderer with the GitHub-flavoured extensions generated docs use.
pub struct CmarkRenderer;

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_FOOTNOTES);

        let parser = Parser::new_ext(markdown, options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

/// The assembled export.
#[derive(Debug, Clone)]
pub struct PrintableDocument {
    pub title: String,
    /// Suggested file name, e.g. `Demo_documentation.html`.
    pub file_name: String,
    pub html: String,
}

/// Where a finished export is delivered.
#[async_trait]
pub trait PrintSurface: Send + Sync {
    async fn deliver(&self, document: &PrintableDocument) -> Result<()>;
}

/// Writes the export to an HTML file.
pub struct HtmlFileSurface {
    path: PathBuf,
}

impl HtmlFileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PrintSurface for HtmlFileSurface {
    async fn deliver(&self, document: &PrintableDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ViewerError::export(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&self.path, &document.html)
            .await
            .map_err(|e| ViewerError::export(format!("{}: {}", self.path.display(), e)))?;
        tracing::info!(path = %self.path.display(), bytes = document.html.len(), "export written");
        Ok(())
    }
}

/// Suggested export file name for a project.
///
/// The project name comes from the backend, so anything outside
/// `[A-Za-z0-9 ._-]` becomes `_` and leading dots are dropped; the result
/// is always a single path component.
pub fn export_file_name(project: &Project) -> String {
    let safe: String = project
        .name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.').trim();
    let stem = if safe.is_empty() { "project" } else { safe };
    format!("{}_documentation.html", stem)
}

/// Fetch, render, assemble, deliver.
pub struct ExportPipeline<'a> {
    source: &'a dyn DocumentSource,
    renderer: &'a dyn MarkdownRenderer,
    subtitle: String,
}

impl<'a> ExportPipeline<'a> {
    pub fn new(
        source: &'a dyn DocumentSource,
        renderer: &'a dyn MarkdownRenderer,
        subtitle: impl Into<String>,
    ) -> Self {
        Self {
            source,
            renderer,
            subtitle: subtitle.into(),
        }
    }

    /// Exports `project` and hands the result to `surface`.
    pub async fn export_project(
        &self,
        project: &Project,
        surface: &dyn PrintSurface,
    ) -> Result<PrintableDocument> {
        tracing::info!(project = %project.id, documents = project.files.len(), "exporting project");

        let contents = try_join_all(project.files.iter().map(|file| self.fetch(file)))
            .await
            .map_err(ViewerError::export)?;

        let document = self.assemble(project, &contents);
        surface.deliver(&document).await?;
        Ok(document)
    }

    async fn fetch<'f>(&self, file: &'f DocumentRef) -> Result<(&'f DocumentRef, String)> {
        let content = self.source.get_document(&file.path).await?;
        Ok((file, content))
    }

    fn assemble(&self, project: &Project, contents: &[(&DocumentRef, String)]) -> PrintableDocument {
        let title = escape_html(&project.name);
        let mut out = String::new();

        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{}</title>\n", title));
        out.push_str(PRINT_STYLE);
        out.push_str("</head>\n<body>\n");

        out.push_str("<div class=\"title-page\">\n");
        out.push_str(&format!("<h1>{}</h1>\n", title));
        out.push_str(&format!("<p>{}</p>\n", escape_html(&self.subtitle)));
        out.push_str(&format!(
            "<p class=\"date\">{}</p>\n",
            chrono::Local::now().format("%Y-%m-%d")
        ));
        out.push_str("</div>\n");

        for (file, markdown) in contents {
            let heading = file.name.strip_suffix(".md").unwrap_or(&file.name);
            out.push_str("<section class=\"chapter\">\n");
            out.push_str(&format!("<h1>{}</h1>\n", escape_html(heading)));
            out.push_str("<div class=\"markdown-body\">\n");
            out.push_str(&self.renderer.render(markdown));
            out.push_str("</div>\n</section>\n");
        }

        out.push_str("</body>\n</html>\n");

        PrintableDocument {
            title: project.name.clone(),
            file_name: export_file_name(project),
            html: out,
        }
    }
}

const PRINT_STYLE: &str = "<style>\n\
body { font-family: Arial, sans-serif; max-width: 800px; margin: 0 auto; padding: 40px; background: white; }\n\
.title-page { text-align: center; padding-top: 100px; margin-bottom: 60px; }\n\
.title-page h1 { font-size: 48px; color: #1e293b; }\n\
.title-page p { font-size: 18px; color: #64748b; }\n\
.chapter { page-break-before: always; margin-bottom: 40px; }\n\
.chapter > h1 { color: #2563eb; border-bottom: 2px solid #e5e7eb; padding-bottom: 10px; }\n\
pre { background: #f1f5f9; padding: 12px; overflow-x: auto; }\n\
</style>\n";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}
