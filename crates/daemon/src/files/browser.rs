//! Directory listing for confined paths.
//!
//! The lister reads the immediate children of one directory, stats each
//! child once, and derives the aggregate counters from that same pass. The
//! resulting order is part of the browsing contract: directories first, then
//! files, each group sorted by case-insensitive name.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use protocol::{DirectoryListing, EntryInfo, EntryKind, ListingStats};
use tracing::{debug, warn};

use super::error::FileError;
use super::resolver::{ConfinedPath, PathResolver, RelativePath};

/// Size shown for directories.
pub const DIRECTORY_SIZE_DISPLAY: &str = "—";

/// Display format for modification times.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A directory child with display metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Entry name (not full path).
    pub name: String,
    /// Root-relative path to reach the entry.
    pub relative: RelativePath,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (files only).
    pub size: Option<u64>,
    /// Last modified timestamp.
    pub modified: SystemTime,
}

impl Entry {
    /// Human-readable size, or a dash for directories.
    pub fn size_display(&self) -> String {
        match self.size {
            Some(size) if !self.is_dir => human_size(size),
            _ => DIRECTORY_SIZE_DISPLAY.to_string(),
        }
    }

    /// Local modification time formatted for display.
    pub fn modified_display(&self) -> String {
        let local: DateTime<Local> = self.modified.into();
        local.format(MODIFIED_FORMAT).to_string()
    }

    /// Convert to the wire representation.
    pub fn to_protocol(&self) -> EntryInfo {
        let modified = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        EntryInfo {
            name: self.name.clone(),
            path: self.relative.to_string(),
            kind: if self.is_dir {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: if self.is_dir { None } else { self.size },
            size_display: self.size_display(),
            modified,
            modified_display: self.modified_display(),
        }
    }
}

/// Counters for one listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingStatsSummary {
    /// Number of files.
    pub files: usize,
    /// Number of directories.
    pub folders: usize,
    /// Sum of file sizes.
    pub total_bytes: u64,
}

/// Ordered children of a directory together with their counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// The listed directory.
    pub directory: RelativePath,
    /// Directories first, then files, case-insensitive by name.
    pub entries: Vec<Entry>,
    /// Counters derived from `entries`.
    pub stats: ListingStatsSummary,
}

impl Listing {
    /// Convert to the wire representation, adding breadcrumbs and parent.
    pub fn to_protocol(&self) -> DirectoryListing {
        DirectoryListing {
            path: self.directory.to_string(),
            parent: self.directory.parent().map(|p| p.to_string()),
            breadcrumbs: self.directory.breadcrumbs(),
            entries: self.entries.iter().map(Entry::to_protocol).collect(),
            stats: ListingStats {
                files: self.stats.files,
                folders: self.stats.folders,
                total_bytes: self.stats.total_bytes,
                total_size: human_size(self.stats.total_bytes),
            },
        }
    }
}

/// Lists confined directories.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    resolver: PathResolver,
}

impl DirectoryLister {
    /// Create a lister. The resolver is used to confine symlinked children.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// List the immediate children of a directory.
    ///
    /// A child whose stat fails (for example because it was deleted
    /// concurrently) is left out. A failure reading the directory itself
    /// fails the whole listing.
    pub fn list(&self, dir: &ConfinedPath) -> Result<Listing, FileError> {
        let metadata = fs::metadata(dir.as_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(dir.relative().to_string())
            } else {
                FileError::Io(e)
            }
        })?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(dir.as_path().to_path_buf()));
        }

        let mut entries = Vec::new();
        let mut stats = ListingStatsSummary::default();

        for entry_result in fs::read_dir(dir.as_path())? {
            let entry = entry_result?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();

            let is_symlink = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
            if is_symlink {
                if let Err(e) = self.resolver.confine(&path) {
                    debug!(path = %path.display(), error = %e, "Hiding symlink that cannot be confined");
                    continue;
                }
            }

            // Follows symlinks, so a link to a directory lists as a directory.
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping entry that could not be stat'ed");
                    continue;
                }
            };

            let is_dir = metadata.is_dir();
            let size = if is_dir { None } else { Some(metadata.len()) };

            if is_dir {
                stats.folders += 1;
            } else {
                stats.files += 1;
                stats.total_bytes += metadata.len();
            }

            entries.push(Entry {
                relative: dir.relative().join(&name),
                name,
                is_dir,
                size,
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        entries.sort_by(compare_entries);

        debug!(
            path = %dir.relative(),
            files = stats.files,
            folders = stats.folders,
            "Listed directory"
        );

        Ok(Listing {
            directory: dir.relative().clone(),
            entries,
            stats,
        })
    }
}

/// Directories before files, then case-insensitive name, then exact name.
fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_dir
        .cmp(&a.is_dir)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Format a byte count for display.
///
/// Values below 1024 print as whole bytes; larger values use one decimal
/// and the largest unit up to TB.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", value, unit)
}
