//! Project directory client.
//!
//! Lists the projects the backend has generated documentation for and
//! fetches raw Markdown for individual documents.
//!
//! # Fallback
//!
//! The dynamic listing (`GET /api/projects`) is tried first. Any failure
//! there (connection error, non-2xx status, unparseable body) falls back
//! to the static snapshot at `/projects.json`. Only when both fail does
//! [`ProjectDirectory::list_projects`] return
//! [`ViewerError::DirectoryUnavailable`]. There is no caching and no retry
//! beyond that single fallback.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;

use crate::config::BackendConfig;
use crate::error::{Result, ViewerError};
use crate::models::{DocumentRef, Project};

/// Anything that can hand out raw document text by path.
///
/// Implemented by [`ProjectDirectory`]; the export pipeline depends on this
/// seam rather than on HTTP.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn get_document(&self, path: &str) -> Result<String>;
}

/// HTTP client for the project directory endpoints.
#[derive(Clone)]
pub struct ProjectDirectory {
    client: reqwest::Client,
    base: Url,
    projects_path: String,
    manifest_path: String,
}

impl ProjectDirectory {
    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base: config.base()?,
            projects_path: config.projects_path.clone(),
            manifest_path: config.manifest_path.clone(),
        })
    }

    /// Lists all projects, falling back to the static manifest.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        match self.fetch_projects(&self.projects_path).await {
            Ok(projects) => {
                tracing::debug!(count = projects.len(), "loaded project directory");
                Ok(projects)
            }
            Err(primary) => {
                tracing::warn!(
                    error = %primary,
                    fallback = %self.manifest_path,
                    "project directory unavailable, using static manifest"
                );
                self.fetch_projects(&self.manifest_path)
                    .await
                    .map_err(|fallback| {
                        ViewerError::directory(format!(
                            "{} ({}); fallback {} ({})",
                            self.projects_path, primary, self.manifest_path, fallback
                        ))
                    })
            }
        }
    }

    /// Fetches the raw Markdown served at `path`.
    pub async fn get_document(&self, path: &str) -> Result<String> {
        let url = self
            .base
            .join(path)
            .map_err(|e| ViewerError::document(path, e))?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ViewerError::document(path, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ViewerError::document(path, status));
        }

        resp.text().await.map_err(|e| ViewerError::document(path, e))
    }

    async fn fetch_projects(&self, path: &str) -> anyhow::Result<Vec<Project>> {
        let url = self.base.join(path)?;
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status);
        }
        let projects = resp.json::<Vec<Project>>().await?;
        Ok(projects)
    }
}

#[async_trait]
impl DocumentSource for ProjectDirectory {
    async fn get_document(&self, path: &str) -> Result<String> {
        ProjectDirectory::get_document(self, path).await
    }
}

/// Finds a project by id.
pub fn find_project<'a>(projects: &'a [Project], id: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.id == id)
}

/// Display title for a document file name.
///
/// `01_getting_started.md` becomes `Getting Started`: the extension and a
/// leading numeric ordering prefix are dropped, underscores become spaces,
/// and each word is capitalised.
pub fn document_title(name: &str) -> String {
    let stem = name.strip_suffix(".md").unwrap_or(name);

    let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
    let stem = if digits > 0 && stem[digits..].starts_with('_') {
        &stem[digits + 1..]
    } else {
        stem
    };

    let mut title = String::with_capacity(stem.len());
    let mut prev_word = false;
    for c in stem.chars() {
        let c = if c == '_' { ' ' } else { c };
        let is_word = c.is_alphanumeric();
        if is_word && !prev_word {
            title.extend(c.to_uppercase());
        } else {
            title.push(c);
        }
        prev_word = is_word;
    }
    title
}

/// Resolves an in-document link to a sibling document.
///
/// Only targets ending in `.md` are considered; they match the document
/// whose file name equals the last path segment (`./02_config.md` matches
/// `02_config.md`). Anything else is left to the caller.
pub fn resolve_link<'a>(project: &'a Project, href: &str) -> Option<&'a DocumentRef> {
    if !href.ends_with(".md") {
        return None;
    }
    let target = href.rsplit('/').next().unwrap_or(href);
    project.files.iter().find(|f| f.name == target)
}

/// Finds a document by file name, display title (case-insensitive), or
/// `.md` link.
pub fn find_document<'a>(project: &'a Project, selector: &str) -> Option<&'a DocumentRef> {
    if let Some(doc) = resolve_link(project, selector) {
        return Some(doc);
    }
    project.files.iter().find(|f| {
        f.name == selector || document_title(&f.name).eq_ignore_ascii_case(selector.trim())
    })
}
