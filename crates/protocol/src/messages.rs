//! Wire message definitions for LanShare.
//!
//! This module defines the JSON payloads exchanged between the file share
//! daemon and its clients. Paths inside messages are always root-relative,
//! forward-slash separated strings; the empty string denotes the share root.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;

/// Current API version, reported by the daemon.
pub const API_VERSION: u8 = 1;

// ============================================================================
// Browsing Messages
// ============================================================================

/// Kind of a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file (or a symlink to one).
    File,
    /// Directory (or a symlink to one).
    Directory,
}

/// A single child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    /// Entry name (not full path).
    pub name: String,
    /// Root-relative path used to reach the entry.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes. `None` for directories.
    pub size: Option<u64>,
    /// Human-readable size, `"—"` for directories.
    pub size_display: String,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: u64,
    /// Last modified time formatted for display.
    pub modified_display: String,
}

/// Aggregate counters for one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    /// Number of file entries.
    pub files: usize,
    /// Number of directory entries.
    pub folders: usize,
    /// Sum of the sizes of file entries.
    pub total_bytes: u64,
    /// `total_bytes` formatted for display.
    pub total_size: String,
}

/// One breadcrumb segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Display name of the segment.
    pub name: String,
    /// Root-relative path up to and including this segment.
    pub path: String,
}

/// Response to a browse request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// Root-relative path of the listed directory.
    pub path: String,
    /// Parent path, `None` when listing the root.
    pub parent: Option<String>,
    /// Breadcrumb trail, starting with the root.
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Children: directories first, then files, case-insensitive by name.
    pub entries: Vec<EntryInfo>,
    /// Counters derived from `entries`.
    pub stats: ListingStats,
}

// ============================================================================
// Preview Messages
// ============================================================================

/// How a client should present a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    /// Embed as a video player sourced from the raw file route.
    Video,
    /// Embed as an audio player sourced from the raw file route.
    Audio,
    /// Embed as an image.
    Image,
    /// Show the text prefix carried in the preview.
    Text,
    /// Embed as a document frame.
    Pdf,
    /// No preview; offer a download.
    None,
}

/// Response to a view request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePreview {
    /// Base name of the file.
    pub name: String,
    /// Root-relative path of the file.
    pub path: String,
    /// Root-relative path of the containing directory.
    pub parent: String,
    /// Presentation hint.
    pub kind: PreviewKind,
    /// Bounded text prefix, only present for [`PreviewKind::Text`].
    pub text: Option<String>,
}

// ============================================================================
// Upload Messages
// ============================================================================

/// Outcome of an upload batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Files written to disk.
    pub saved: usize,
    /// Items dropped because their name sanitized to nothing.
    pub skipped: usize,
    /// Items whose write failed part way.
    pub failed: usize,
}

impl UploadSummary {
    /// Total number of items seen in the batch.
    pub fn total(&self) -> usize {
        self.saved + self.skipped + self.failed
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error code for programmatic handling.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

/// Error codes for common error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Resource not found, or outside the share.
    NotFound,
    /// The request named the wrong kind of path.
    InvalidRequest,
    /// Request body exceeded the upload limit.
    PayloadTooLarge,
    /// Server-side error.
    InternalError,
}

/// Serialize a message to JSON bytes.
pub fn to_json<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserialize a message from JSON bytes.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
