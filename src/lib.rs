//! # docview
//!
//! A client for a documentation backend: browse generated projects, read
//! their Markdown documents, run ingestion jobs while following their live
//! log stream, and export a project as one printable document.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌────────────────────┐
//!   docview ingest ─▶│ SessionController  │──┬──▶ JobSubmitter ──▶ POST /api/ingest
//!                    │ (state + log)      │  │
//!                    └─────────▲──────────┘  └──▶ ChannelTransport ─▶ /ws/logs/{id}
//!                              └───────── ChannelEvent stream ◀─────────┘
//!
//!   docview projects/show ─▶ ProjectDirectory ─▶ GET /api/projects (→ /projects.json)
//!   docview export ────────▶ ExportPipeline ──▶ DocumentSource + MarkdownRenderer ─▶ PrintSurface
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds |
//! | [`models`] | Projects, requests, session ids, channel events |
//! | [`directory`] | Project directory client |
//! | [`submission`] | Job submission client |
//! | [`channel`] | Live status channel interface |
//! | [`channel_ws`] | WebSocket channel transport |
//! | [`session`] | Ingestion session controller |
//! | [`export`] | Printable export pipeline |
//! | [`progress`] | CLI progress reporters |

pub mod channel;
pub mod channel_ws;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod models;
pub mod progress;
pub mod session;
pub mod submission;
