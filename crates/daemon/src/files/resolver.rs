//! Confinement of untrusted path strings to the share root.
//!
//! Every file operation starts here. A raw request path is normalized into a
//! [`RelativePath`], joined onto the [`Root`], canonicalized, and accepted
//! only if the canonical result is the root itself or a true descendant of
//! it. Containment is a component-wise ancestor test, so `/srv/share-evil`
//! is never considered inside `/srv/share`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use protocol::Breadcrumb;
use tracing::{debug, warn};

use super::error::FileError;

/// Display name of the root breadcrumb.
pub const ROOT_CRUMB_NAME: &str = "Home";

/// The canonical directory every request is confined to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: PathBuf,
}

impl Root {
    /// Open the root directory, creating it (and missing ancestors) first.
    ///
    /// The stored path is canonical, so later containment checks compare
    /// symlink-free forms on both sides.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        let canonical = fs::canonicalize(path)?;
        if !canonical.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("share root is not a directory: {}", canonical.display()),
            ));
        }
        Ok(Self { path: canonical })
    }

    /// The canonical root path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a canonical path is the root or one of its descendants.
    pub fn contains(&self, canonical: &Path) -> bool {
        canonical.starts_with(&self.path)
    }
}

/// A normalized, root-relative path.
///
/// Segments are separated by `/`; there are no empty, `.` or `..` segments
/// and no leading or trailing slash. The empty path denotes the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// The root itself.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize a raw, untrusted path string.
    ///
    /// Backslashes are treated as separators, empty and `.` segments are
    /// dropped and `..` removes the previous segment. A `..` with nothing
    /// left to remove would climb above the root and is rejected.
    pub fn parse(raw: &str) -> Result<Self, FileError> {
        let unified = raw.replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();

        for segment in unified.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(FileError::PathEscape(raw.to_string()));
                    }
                }
                s if s.contains('\0') => {
                    return Err(FileError::NotFound(raw.to_string()));
                }
                s => segments.push(s),
            }
        }

        Ok(Self(segments.join("/")))
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path denotes the root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The last segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Append a single child name.
    ///
    /// The name is expected to come from the filesystem (a directory entry),
    /// not from a client.
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => Some(Self::root()),
        }
    }

    /// The breadcrumb trail: the root crumb followed by one crumb per segment.
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut crumbs = vec![Breadcrumb {
            name: ROOT_CRUMB_NAME.to_string(),
            path: String::new(),
        }];

        let mut acc = RelativePath::root();
        for segment in self.segments() {
            acc = acc.join(segment);
            crumbs.push(Breadcrumb {
                name: segment.to_string(),
                path: acc.0.clone(),
            });
        }

        crumbs
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An absolute path proven to lie inside the root.
///
/// Only [`PathResolver`] constructs these, so holding one means the
/// containment check already happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: RelativePath,
}

impl ConfinedPath {
    /// The canonical absolute path.
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// The normalized relative path the client asked for.
    pub fn relative(&self) -> &RelativePath {
        &self.relative
    }

    /// The base name of the canonical path, if it has one.
    pub fn file_name(&self) -> Option<String> {
        self.absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Whether resolution requires the target to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// Listing, viewing and downloading need an existing target.
    Required,
    /// Upload targets may be created by the caller.
    MayBeMissing,
}

/// Maps untrusted path strings to [`ConfinedPath`]s.
///
/// Cheap to clone; the root is shared.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: Arc<Root>,
}

impl PathResolver {
    /// Create a resolver for the given root.
    pub fn new(root: Root) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    /// The root this resolver confines to.
    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Resolve a path that must already exist.
    pub fn resolve(&self, raw: &str) -> Result<ConfinedPath, FileError> {
        self.resolve_with(raw, Existence::Required)
    }

    /// Resolve a path the caller may create.
    pub fn resolve_for_create(&self, raw: &str) -> Result<ConfinedPath, FileError> {
        self.resolve_with(raw, Existence::MayBeMissing)
    }

    /// Resolve a raw path string against the root.
    pub fn resolve_with(
        &self,
        raw: &str,
        existence: Existence,
    ) -> Result<ConfinedPath, FileError> {
        let relative = RelativePath::parse(raw).inspect_err(|e| {
            if matches!(e, FileError::PathEscape(_)) {
                warn!(path = %raw, "Rejected path climbing above the share root");
            }
        })?;

        let mut candidate = self.root.path().to_path_buf();
        for segment in relative.segments() {
            candidate.push(segment);
        }

        match fs::canonicalize(&candidate) {
            Ok(canonical) => {
                self.check_contained(raw, &canonical)?;
                debug!(path = %relative, resolved = %canonical.display(), "Resolved path");
                Ok(ConfinedPath {
                    absolute: canonical,
                    relative,
                })
            }
            Err(e) if is_missing(&e) => match existence {
                Existence::Required => Err(FileError::NotFound(relative.to_string())),
                Existence::MayBeMissing => self.resolve_missing(raw, relative),
            },
            Err(e) => Err(FileError::Io(e)),
        }
    }

    /// Resolve a path whose tail does not exist yet.
    ///
    /// The longest existing prefix is canonicalized and confined; the
    /// missing segments are appended to it verbatim. A prefix ending in a
    /// dangling symlink cannot be confined and is rejected.
    fn resolve_missing(
        &self,
        raw: &str,
        relative: RelativePath,
    ) -> Result<ConfinedPath, FileError> {
        let segments: Vec<&str> = relative.segments().collect();
        let mut existing = self.root.path().to_path_buf();
        let mut present = 0;

        for segment in &segments {
            let next = existing.join(segment);
            match fs::symlink_metadata(&next) {
                Ok(_) => {
                    existing = next;
                    present += 1;
                }
                Err(e) if is_missing(&e) => break,
                Err(e) => return Err(FileError::Io(e)),
            }
        }

        let mut absolute = match fs::canonicalize(&existing) {
            Ok(canonical) => canonical,
            Err(e) if is_missing(&e) => {
                warn!(path = %raw, "Rejected path through a dangling symlink");
                return Err(FileError::PathEscape(raw.to_string()));
            }
            Err(e) => return Err(FileError::Io(e)),
        };
        self.check_contained(raw, &absolute)?;

        for segment in &segments[present..] {
            absolute.push(segment);
        }

        debug!(path = %relative, resolved = %absolute.display(), "Resolved path for creation");
        Ok(ConfinedPath { absolute, relative })
    }

    /// Confine a child discovered on disk, e.g. a symlink met while walking.
    ///
    /// Returns the canonical target when it lies inside the root.
    pub fn confine(&self, path: &Path) -> Result<PathBuf, FileError> {
        let canonical = fs::canonicalize(path).map_err(|e| {
            if is_missing(&e) {
                FileError::NotFound(path.display().to_string())
            } else {
                FileError::Io(e)
            }
        })?;
        self.check_contained(&path.display().to_string(), &canonical)?;
        Ok(canonical)
    }

    /// Resolve a direct child of an already confined directory.
    pub fn child(&self, parent: &ConfinedPath, name: &str) -> Result<ConfinedPath, FileError> {
        if name.contains('/') || name.contains('\\') || name == ".." || name == "." {
            return Err(FileError::PathEscape(name.to_string()));
        }
        self.resolve(parent.relative().join(name).as_str())
    }

    fn check_contained(&self, raw: &str, canonical: &Path) -> Result<(), FileError> {
        if self.root.contains(canonical) {
            Ok(())
        } else {
            warn!(
                path = %raw,
                resolved = %canonical.display(),
                "Rejected path resolving outside the share root"
            );
            Err(FileError::PathEscape(raw.to_string()))
        }
    }
}

/// Whether an IO error means some segment of the path is absent.
fn is_missing(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}
