//! # LanShare Protocol Library
//!
//! This crate provides the wire types exchanged between the LanShare file
//! share daemon and its clients.
//!
//! ## Overview
//!
//! The daemon exposes one confined directory tree over HTTP. Every response
//! body that is not raw file or archive bytes is one of the JSON messages
//! defined here:
//!
//! - **Browsing**: [`DirectoryListing`] with ordered entries, stats and breadcrumbs
//! - **Previewing**: [`FilePreview`] with a presentation hint and optional text
//! - **Uploading**: [`UploadSummary`] counters for a batch
//! - **Errors**: [`ErrorMessage`] with a coarse [`ErrorCode`]
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{from_json, to_json, UploadSummary};
//!
//! let summary = UploadSummary { saved: 1, skipped: 1, failed: 0 };
//! let bytes = to_json(&summary).unwrap();
//! let decoded: UploadSummary = from_json(&bytes).unwrap();
//! assert_eq!(decoded.total(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Wire message definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    from_json, to_json, Breadcrumb, DirectoryListing, EntryInfo, EntryKind, ErrorCode,
    ErrorMessage, FilePreview, ListingStats, PreviewKind, UploadSummary, API_VERSION,
};
