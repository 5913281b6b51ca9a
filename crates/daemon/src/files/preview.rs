//! File previews for the view page.
//!
//! The preview kind is chosen from the file extension alone; only text
//! previews read file contents, and then only a bounded prefix.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use protocol::{FilePreview, PreviewKind};
use tracing::warn;

use super::error::FileError;
use super::resolver::ConfinedPath;

/// Default number of bytes shown in a text preview.
pub const DEFAULT_PREVIEW_BYTES: usize = 8000;

/// Text shown in place of contents that could not be read.
pub const READ_ERROR_TEXT: &str = "[Error reading file]";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const TEXT_EXTENSIONS: &[&str] = &["txt", "log", "md", "py", "json", "csv"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Classify a file name by its extension, case-insensitively.
pub fn preview_kind(name: &str) -> PreviewKind {
    let extension = match Path::new(name).extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return PreviewKind::None,
    };
    let ext = extension.as_str();

    if VIDEO_EXTENSIONS.contains(&ext) {
        PreviewKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        PreviewKind::Audio
    } else if IMAGE_EXTENSIONS.contains(&ext) {
        PreviewKind::Image
    } else if TEXT_EXTENSIONS.contains(&ext) {
        PreviewKind::Text
    } else if PDF_EXTENSIONS.contains(&ext) {
        PreviewKind::Pdf
    } else {
        PreviewKind::None
    }
}

/// Builds previews with a fixed text budget.
#[derive(Debug, Clone, Copy)]
pub struct Previewer {
    text_limit: usize,
}

impl Default for Previewer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_BYTES)
    }
}

impl Previewer {
    /// Create a previewer that reads at most `text_limit` bytes of text.
    pub fn new(text_limit: usize) -> Self {
        Self { text_limit }
    }

    /// The text budget in bytes.
    pub fn text_limit(&self) -> usize {
        self.text_limit
    }

    /// Describe a confined file for viewing.
    ///
    /// Directories yield [`FileError::NotAFile`]. A text file that cannot be
    /// read still produces a preview, with [`READ_ERROR_TEXT`] as its body.
    pub fn preview(&self, file: &ConfinedPath) -> Result<FilePreview, FileError> {
        let metadata = std::fs::metadata(file.as_path()).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(file.relative().to_string())
            } else {
                FileError::Io(e)
            }
        })?;
        if metadata.is_dir() {
            return Err(FileError::NotAFile(file.as_path().to_path_buf()));
        }

        let relative = file.relative();
        let name = relative
            .file_name()
            .map(str::to_string)
            .or_else(|| file.file_name())
            .unwrap_or_default();
        let kind = preview_kind(&name);

        let text = match kind {
            PreviewKind::Text => Some(match read_prefix(file.as_path(), self.text_limit) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %relative, error = %e, "Failed to read preview text");
                    READ_ERROR_TEXT.to_string()
                }
            }),
            _ => None,
        };

        Ok(FilePreview {
            name,
            path: relative.to_string(),
            parent: relative.parent().unwrap_or_default().to_string(),
            kind,
            text,
        })
    }
}

/// Read up to `limit` bytes and decode them as UTF-8.
///
/// A multi-byte character cut off by the limit is dropped; other invalid
/// sequences are replaced.
pub fn read_prefix(path: &Path, limit: usize) -> io::Result<String> {
    let file = File::open(path)?;
    let mut bytes = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut bytes)?;

    let keep = valid_prefix_len(&bytes);
    Ok(String::from_utf8_lossy(&bytes[..keep]).into_owned())
}

/// Length of `bytes` with an incomplete trailing UTF-8 sequence removed.
fn valid_prefix_len(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        // `error_len() == None` means the input ended mid-character.
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let tail_start = bytes.len().saturating_sub(3);
            for start in (tail_start..bytes.len()).rev() {
                if let Err(e) = std::str::from_utf8(&bytes[start..]) {
                    if e.valid_up_to() == 0 && e.error_len().is_none() {
                        return start;
                    }
                }
            }
            bytes.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::resolver::{PathResolver, Root};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let temp_dir = TempDir::new().unwrap();
        let root = Root::open(temp_dir.path().join("share")).unwrap();
        (temp_dir, PathResolver::new(root))
    }

    #[test]
    fn test_preview_kind_by_extension() {
        assert_eq!(preview_kind("movie.mp4"), PreviewKind::Video);
        assert_eq!(preview_kind("clip.WEBM"), PreviewKind::Video);
        assert_eq!(preview_kind("song.ogg"), PreviewKind::Video);
        assert_eq!(preview_kind("song.mp3"), PreviewKind::Audio);
        assert_eq!(preview_kind("beep.wav"), PreviewKind::Audio);
        assert_eq!(preview_kind("photo.JPeG"), PreviewKind::Image);
        assert_eq!(preview_kind("icon.bmp"), PreviewKind::Image);
        assert_eq!(preview_kind("notes.md"), PreviewKind::Text);
        assert_eq!(preview_kind("data.csv"), PreviewKind::Text);
        assert_eq!(preview_kind("paper.pdf"), PreviewKind::Pdf);
        assert_eq!(preview_kind("archive.tar.gz"), PreviewKind::None);
        assert_eq!(preview_kind("README"), PreviewKind::None);
        assert_eq!(preview_kind(".txt"), PreviewKind::None);
    }

    #[test]
    fn test_text_preview_is_bounded() {
        let (_temp_dir, resolver) = setup();
        let body = "x".repeat(100);
        fs::write(resolver.root().path().join("long.txt"), &body).unwrap();

        let previewer = Previewer::new(10);
        let preview = previewer.preview(&resolver.resolve("long.txt").unwrap()).unwrap();

        assert_eq!(preview.kind, PreviewKind::Text);
        assert_eq!(preview.text.as_deref(), Some("xxxxxxxxxx"));
        assert_eq!(preview.name, "long.txt");
        assert_eq!(preview.parent, "");
    }

    #[test]
    fn test_truncated_character_is_dropped() {
        let (_temp_dir, resolver) = setup();
        // "é" is two bytes; a limit of 2 cuts it in half.
        fs::write(resolver.root().path().join("accent.txt"), "aé").unwrap();

        let preview = Previewer::new(2)
            .preview(&resolver.resolve("accent.txt").unwrap())
            .unwrap();

        assert_eq!(preview.text.as_deref(), Some("a"));
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let (_temp_dir, resolver) = setup();
        fs::write(resolver.root().path().join("bin.log"), [b'o', b'k', 0xff, b'!']).unwrap();

        let preview = Previewer::default()
            .preview(&resolver.resolve("bin.log").unwrap())
            .unwrap();

        assert_eq!(preview.text.as_deref(), Some("ok\u{fffd}!"));
    }

    #[test]
    fn test_non_text_has_no_body() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("media")).unwrap();
        fs::write(root.join("media/clip.mp4"), [0u8; 16]).unwrap();

        let preview = Previewer::default()
            .preview(&resolver.resolve("media/clip.mp4").unwrap())
            .unwrap();

        assert_eq!(preview.kind, PreviewKind::Video);
        assert_eq!(preview.text, None);
        assert_eq!(preview.path, "media/clip.mp4");
        assert_eq!(preview.parent, "media");
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let (_temp_dir, resolver) = setup();
        fs::create_dir_all(resolver.root().path().join("docs")).unwrap();

        let result = Previewer::default().preview(&resolver.resolve("docs").unwrap());
        assert!(matches!(result, Err(FileError::NotAFile(_))));
    }

    #[test]
    fn test_unreadable_text_reports_error_body() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp_dir, resolver) = setup();
        let path = resolver.root().path().join("locked.txt");
        fs::write(&path, "secret").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        let preview = Previewer::default()
            .preview(&resolver.resolve("locked.txt").unwrap())
            .unwrap();

        // Root can still read the file, so accept either outcome.
        let text = preview.text.unwrap();
        assert!(text == READ_ERROR_TEXT || text == "secret");
    }

    #[test]
    fn test_valid_prefix_len() {
        assert_eq!(valid_prefix_len(b"plain"), 5);
        assert_eq!(valid_prefix_len(&"€".as_bytes()[..2]), 0);
        assert_eq!(valid_prefix_len(&[b'a', 0xff, b'b', 0xe2, 0x82]), 3);
        assert_eq!(valid_prefix_len(&[b'a', 0xff, b'b']), 3);
    }
}
