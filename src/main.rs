//! # docview CLI
//!
//! Browse generated project documentation, run ingestion jobs while
//! following their live log, and export projects for printing.
//!
//! ## Usage
//!
//! ```bash
//! docview --config ./config/docview.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docview projects` | List projects known to the backend |
//! | `docview docs <project>` | List a project's documents |
//! | `docview show <project> [doc]` | Print a document's Markdown |
//! | `docview ingest --repo <url>` | Ingest a repository and stream its log |
//! | `docview ingest --path <dir>` | Ingest a backend-local directory |
//! | `docview export <project>` | Write a printable HTML export |
//!
//! ## Examples
//!
//! ```bash
//! # Against a backend on another host
//! docview --backend http://docs.internal:8000 projects
//!
//! # Ingest and follow the log as JSON lines
//! docview ingest --repo https://github.com/acme/widgets --progress json
//!
//! # Open a document by display title
//! docview show widgets "getting started"
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use docview::channel_ws::WebSocketTransport;
use docview::config::{self, Config, DEFAULT_CONFIG_PATH};
use docview::directory::{self, ProjectDirectory};
use docview::error::ViewerError;
use docview::export::{export_file_name, CmarkRenderer, ExportPipeline, HtmlFileSurface};
use docview::models::{IngestRequest, Project, SourceKind};
use docview::progress::{IngestProgressReporter, LogCursor, ProgressMode};
use docview::session::{SessionController, SessionSnapshot, SessionState};
use docview::submission::HttpJobSubmitter;

/// docview: browse generated documentation and run ingestion jobs.
#[derive(Parser)]
#[command(
    name = "docview",
    about = "docview: browse generated documentation and run ingestion jobs",
    version,
    long_about = "docview talks to a documentation backend: it lists projects and their \
    generated Markdown documents, starts ingestion jobs and streams their logs live, and \
    exports a project as a single printable document."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docview.toml`; built-in defaults apply when
    /// that file does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Backend base URL, overriding `[backend].base_url`.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all projects.
    ///
    /// Uses the backend's dynamic directory, or its static manifest when
    /// the directory endpoint is unavailable.
    Projects {
        /// Print the raw project list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the documents of a project.
    Docs {
        /// Project id.
        project: String,
    },

    /// Print a document's Markdown.
    Show {
        /// Project id.
        project: String,
        /// File name, display title, or `.md` link. Defaults to the first document.
        document: Option<String>,
    },

    /// Start an ingestion job and follow its log until it finishes.
    ///
    /// Exits 0 when the job completes, 1 when it fails, and 2 when the log
    /// stream ends before the job reports an outcome.
    #[command(group(ArgGroup::new("source").required(true).args(["repo", "path"])))]
    Ingest {
        /// Repository URL to clone and document.
        #[arg(long)]
        repo: Option<String>,

        /// Directory on the backend host to document.
        #[arg(long)]
        path: Option<String>,

        /// Display name for the resulting project.
        #[arg(long)]
        name: Option<String>,

        /// Output language, overriding `[ingest].language`.
        #[arg(long)]
        language: Option<String>,

        /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Export a project as one printable HTML document.
    Export {
        /// Project id.
        project: String,

        /// Output file. Defaults to `<output_dir>/<name>_documentation.html`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("docview=debug")
        } else {
            EnvFilter::new("docview=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut cfg = config::load_config_or_default(&cli.config)?;
    if let Some(base_url) = cli.backend {
        cfg.backend.base_url = base_url;
        config::validate(&cfg).context("Invalid --backend")?;
    }

    match cli.command {
        Commands::Projects { json } => {
            let directory = ProjectDirectory::from_config(&cfg.backend)?;
            let projects = directory.list_projects().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&projects)?);
            } else {
                print_projects(&projects);
            }
        }
        Commands::Docs { project } => {
            let directory = ProjectDirectory::from_config(&cfg.backend)?;
            let projects = directory.list_projects().await?;
            let project = lookup_project(&projects, &project)?;
            println!("{:<4} {:<36} PATH", "#", "TITLE");
            for (i, file) in project.files.iter().enumerate() {
                println!(
                    "{:<4} {:<36} {}",
                    i + 1,
                    directory::document_title(&file.name),
                    file.path
                );
            }
        }
        Commands::Show { project, document } => {
            let directory = ProjectDirectory::from_config(&cfg.backend)?;
            let projects = directory.list_projects().await?;
            let project = lookup_project(&projects, &project)?;
            let file = match document.as_deref() {
                Some(selector) => directory::find_document(project, selector)
                    .ok_or_else(|| anyhow!("no document '{}' in project {}", selector, project.id))?,
                None => project
                    .first_document()
                    .ok_or_else(|| anyhow!("project {} has no documents", project.id))?,
            };
            let content = directory.get_document(&file.path).await?;
            print!("{}", content);
            if !content.ends_with('\n') {
                println!();
            }
        }
        Commands::Ingest {
            repo,
            path,
            name,
            language,
            progress,
        } => {
            let request = build_request(repo, path, name, language.or(cfg.ingest.language.clone()))?;
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            return run_ingest(&cfg, request, mode).await;
        }
        Commands::Export { project, output } => {
            let directory = ProjectDirectory::from_config(&cfg.backend)?;
            let projects = directory.list_projects().await?;
            let project = lookup_project(&projects, &project)?;

            let path = output.unwrap_or_else(|| cfg.export.output_dir.join(export_file_name(project)));
            let surface = HtmlFileSurface::new(path);
            let pipeline = ExportPipeline::new(&directory, &CmarkRenderer, cfg.export.subtitle.clone());
            pipeline.export_project(project, &surface).await?;
            println!(
                "Exported {} documents to {}",
                project.files.len(),
                surface.path().display()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects.");
        return;
    }
    println!("{:<24} {:<32} DOCS", "ID", "NAME");
    for p in projects {
        println!("{:<24} {:<32} {}", p.id, p.name, p.files.len());
    }
}

fn lookup_project<'a>(projects: &'a [Project], id: &str) -> Result<&'a Project> {
    directory::find_project(projects, id).ok_or_else(|| anyhow!("project not found: {}", id))
}

fn build_request(
    repo: Option<String>,
    path: Option<String>,
    name: Option<String>,
    language: Option<String>,
) -> Result<IngestRequest> {
    let (kind, source) = match (repo, path) {
        (Some(url), None) => (SourceKind::Repository, url),
        (None, Some(dir)) => (SourceKind::LocalPath, dir),
        _ => bail!("exactly one of --repo or --path is required"),
    };
    let mut request = IngestRequest::new(kind, source);
    if let Some(name) = name {
        request = request.with_name(name);
    }
    if let Some(language) = language {
        request = request.with_language(language);
    }
    Ok(request)
}

async fn run_ingest(cfg: &Config, request: IngestRequest, mode: ProgressMode) -> Result<ExitCode> {
    let submitter = Arc::new(HttpJobSubmitter::from_config(&cfg.backend)?);
    let transport = Arc::new(WebSocketTransport::from_config(&cfg.backend)?);
    let grace = cfg.ingest.close_grace();
    let controller = SessionController::new(submitter, transport, grace);
    let reporter = mode.reporter();

    let accepted = match controller.submit(request).await {
        Ok(_) => true,
        // Recorded in the session log and reported below.
        Err(ViewerError::SubmissionFailed { .. }) => false,
        Err(err) => return Err(err.into()),
    };

    let snapshot = follow(&controller, reporter.as_ref()).await;

    if accepted && snapshot.state.is_terminal() && snapshot.channel_open {
        // Closure is scheduled after a terminal status; wait it out so
        // the backend can finish flushing.
        let _ = tokio::time::timeout(
            grace + Duration::from_secs(1),
            controller.wait_channel_closed(),
        )
        .await;
    }
    controller.teardown();

    if mode == ProgressMode::Off {
        for line in &snapshot.log {
            println!("{}", line);
        }
    }
    println!("{}", snapshot.state.as_str());

    Ok(match snapshot.state {
        SessionState::Completed => ExitCode::SUCCESS,
        SessionState::Failed => ExitCode::from(1),
        _ => {
            eprintln!("log stream ended before the job reported an outcome");
            ExitCode::from(2)
        }
    })
}

/// Reports the session's log until it settles.
async fn follow(
    controller: &SessionController,
    reporter: &dyn IngestProgressReporter,
) -> SessionSnapshot {
    let mut updates = controller.subscribe();
    let mut cursor = LogCursor::default();
    loop {
        {
            let snap = updates.borrow_and_update();
            cursor.advance(&snap.log, snap.state, reporter);
            if snap.is_settled() {
                return SessionSnapshot::clone(&snap);
            }
        }
        if updates.changed().await.is_err() {
            return controller.snapshot();
        }
    }
}
