//! Writing uploaded files into a confined directory.
//!
//! Client-declared names are never trusted. [`sanitize_filename`] turns a
//! declared name into a single safe path component or rejects it; rejected
//! items are counted as skipped. Each item is written independently, so one
//! failed write does not stop the rest of the batch.
//!
//! # Name rules
//!
//! A declared name is rejected outright when it contains a path separator
//! (`/` or `\`) or a NUL byte. Otherwise:
//!
//! 1. control characters are removed
//! 2. `<`, `>`, `:`, `"`, `|`, `?` and `*` become `_`
//! 3. leading dots and whitespace are removed, as are trailing dots and
//!    whitespace, repeatedly until neither end changes
//! 4. the result is cut to at most 255 bytes on a character boundary and
//!    rule 3 is applied again to the cut end
//! 5. Windows device names (`CON`, `NUL`, `COM1`, ...) get a `_` prefix
//!
//! A name that ends up empty is rejected.

use std::io;
use std::path::PathBuf;

use protocol::UploadSummary;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::error::FileError;
use super::resolver::ConfinedPath;

/// Longest accepted file name in bytes.
pub const MAX_NAME_BYTES: usize = 255;

const REPLACED_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a client-declared file name to a safe base name.
///
/// Returns `None` when the name must be skipped.
pub fn sanitize_filename(declared: &str) -> Option<String> {
    if declared.contains(['/', '\\', '\0']) {
        return None;
    }

    let cleaned: String = declared
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if REPLACED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = trim_name(&cleaned);
    let mut name = trim_name(truncate_to_boundary(trimmed, MAX_NAME_BYTES)).to_string();
    if name.is_empty() {
        return None;
    }

    let stem = name.split('.').next().unwrap_or_default();
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        name.insert(0, '_');
        name = truncate_to_boundary(&name, MAX_NAME_BYTES).to_string();
    }

    Some(name)
}

/// Strip leading dots and trailing dots, and whitespace at both ends, until stable.
fn trim_name(mut name: &str) -> &str {
    loop {
        let next = name
            .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
            .trim_end_matches(|c: char| c == '.' || c.is_whitespace());
        if next.len() == name.len() {
            return next;
        }
        name = next;
    }
}

fn truncate_to_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Writes upload batches below the share root.
#[derive(Debug, Clone, Default)]
pub struct UploadSink;

impl UploadSink {
    /// Create an upload sink.
    pub fn new() -> Self {
        Self
    }

    /// Prepare `dir` for a batch, creating it and missing ancestors.
    ///
    /// Fails with [`FileError::NotAFile`] when `dir` exists but is not a
    /// directory.
    pub async fn begin(&self, dir: &ConfinedPath) -> Result<UploadBatch, FileError> {
        match fs::metadata(dir.as_path()).await {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(FileError::NotAFile(dir.as_path().to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(dir.as_path()).await?;
                debug!(path = %dir.relative(), "Created upload directory");
            }
            Err(e) => return Err(FileError::Io(e)),
        }

        Ok(UploadBatch {
            dir: dir.clone(),
            summary: UploadSummary::default(),
        })
    }

    /// Save a whole batch of `(declared name, contents)` items into `dir`.
    pub async fn save<I, R>(&self, dir: &ConfinedPath, items: I) -> Result<UploadSummary, FileError>
    where
        I: IntoIterator<Item = (String, R)>,
        R: AsyncRead + Unpin,
    {
        let mut batch = self.begin(dir).await?;
        for (name, reader) in items {
            batch.save_item(&name, reader).await;
        }
        Ok(batch.finish())
    }
}

/// One in-progress upload into a prepared directory.
#[derive(Debug)]
pub struct UploadBatch {
    dir: ConfinedPath,
    summary: UploadSummary,
}

impl UploadBatch {
    /// The directory receiving this batch.
    pub fn dir(&self) -> &ConfinedPath {
        &self.dir
    }

    /// Counters so far.
    pub fn summary(&self) -> UploadSummary {
        self.summary
    }

    /// Record an item that was rejected before its contents were read.
    pub fn skip(&mut self, declared: &str) {
        debug!(name = %declared, "Skipping upload with unusable name");
        self.summary.skipped += 1;
    }

    /// Write one item, overwriting any file with the same sanitized name.
    ///
    /// Returns the path written, or `None` if the item was skipped or
    /// failed. A failed write leaves whatever was written on disk.
    pub async fn save_item<R>(&mut self, declared: &str, mut reader: R) -> Option<PathBuf>
    where
        R: AsyncRead + Unpin,
    {
        let Some(name) = sanitize_filename(declared) else {
            self.skip(declared);
            return None;
        };

        let target = self.dir.as_path().join(&name);
        match write_file(&target, &mut reader).await {
            Ok(bytes) => {
                info!(path = %self.dir.relative().join(&name), bytes, "Saved upload");
                self.summary.saved += 1;
                Some(target)
            }
            Err(e) => {
                warn!(
                    path = %self.dir.relative().join(&name),
                    error = %e,
                    "Upload write failed"
                );
                self.summary.failed += 1;
                None
            }
        }
    }

    /// Finish the batch and return its counters.
    pub fn finish(self) -> UploadSummary {
        debug!(
            path = %self.dir.relative(),
            saved = self.summary.saved,
            skipped = self.summary.skipped,
            failed = self.summary.failed,
            "Upload batch finished"
        );
        self.summary
    }
}

/// Create or truncate `target` and copy `reader` into it.
///
/// An existing symlink at `target` is replaced by a regular file, never
/// followed, so a link pointing out of the root cannot redirect the write.
async fn write_file<R>(target: &std::path::Path, reader: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let is_symlink = match fs::symlink_metadata(target).await {
        Ok(metadata) => metadata.file_type().is_symlink(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };

    let mut file = if is_symlink {
        debug!(path = %target.display(), "Replacing symlink with uploaded file");
        fs::remove_file(target).await?;
        // O_EXCL does not follow a link recreated in the meantime.
        OpenOptions::new().write(true).create_new(true).open(target).await?
    } else {
        File::create(target).await?
    };
    let bytes = tokio::io::copy(reader, &mut file).await?;
    file.flush().await?;
    Ok(bytes)
}
