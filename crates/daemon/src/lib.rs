//! # LanShare Daemon Library
//!
//! This crate provides the daemon (server) functionality for LanShare,
//! which shares one directory tree with browsers on the local network.
//!
//! ## Overview
//!
//! The daemon confines every request to a single share root and provides:
//!
//! - **Path Confinement**: Untrusted paths are normalized, canonicalized and
//!   checked against the root before any filesystem access
//! - **Browsing**: Ordered directory listings with sizes, times and breadcrumbs
//! - **Previews**: Extension-based preview hints and bounded text previews
//! - **Archives**: Directories streamed as ZIP files with a memory-then-disk buffer
//! - **Uploads**: Batches written into a directory with sanitized file names
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      FileShareServer                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                 HTTP Router (axum)                         │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! │                                                                  │
//! │  ┌──────────────┐ ┌───────────┐ ┌──────────────┐ ┌───────────┐ │
//! │  │  Directory   │ │ Previewer │ │   Archive    │ │  Upload   │ │
//! │  │   Lister     │ │           │ │   Streamer   │ │   Sink    │ │
//! │  └──────────────┘ └───────────┘ └──────────────┘ └───────────┘ │
//! │                                                                  │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                     Path Resolver                          │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, FileShareServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load or create configuration
//!     let mut config = Config::load_default()?;
//!     config.apply_env_overrides();
//!     config.validate()?;
//!
//!     // Serve until stopped
//!     let server = FileShareServer::new(config)?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Path confinement, listing, previews, archives and uploads
//! - [`router`]: HTTP routes and error responses
//! - [`server`]: Listener lifecycle

pub mod config;
pub mod files;
pub mod router;
pub mod server;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export files types for convenience
pub use files::{
    ArchiveJob, ArchiveStreamer, ConfinedPath, DirectoryLister, FileError, PathResolver,
    Previewer, RelativePath, Root, UploadSink,
};

// Re-export router types for convenience
pub use router::{router, AppState, RouterError};

// Re-export server types for convenience
pub use server::FileShareServer;
