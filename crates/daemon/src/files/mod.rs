//! File operations confined to the share root.
//!
//! This module provides the file share core:
//! - Path resolution and confinement ([`PathResolver`])
//! - Directory listing with display metadata ([`DirectoryLister`])
//! - Bounded text previews ([`Previewer`])
//! - Streamed ZIP archives of directories ([`ArchiveStreamer`])
//! - Batch uploads with name sanitization ([`UploadSink`])
//!
//! # Security
//!
//! Every operation takes a [`ConfinedPath`], which only the resolver can
//! produce. Paths are canonicalized before the containment check, so
//! symlinks pointing outside the root are rejected, and escapes are
//! reported the same way as missing paths.

pub mod archive;
pub mod browser;
pub mod error;
pub mod preview;
pub mod resolver;
pub mod spill;
pub mod upload;

pub use archive::{ArchiveJob, ArchiveStreamer, ChunkSender};
pub use browser::{human_size, DirectoryLister, Entry, Listing};
pub use error::FileError;
pub use preview::{preview_kind, Previewer};
pub use resolver::{ConfinedPath, Existence, PathResolver, RelativePath, Root};
pub use spill::SpillBuffer;
pub use upload::{sanitize_filename, UploadBatch, UploadSink};
