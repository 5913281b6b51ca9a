//! On-demand ZIP archives of confined directories.
//!
//! An [`ArchiveJob`] names one directory inside the share root. The
//! [`ArchiveStreamer`] walks that directory depth-first, writes a deflated
//! ZIP into a [`SpillBuffer`] and then copies the finished archive into the
//! caller's sink. Every entry is named `<rootName>/<relative path>`; empty
//! directories get an explicit `name/` entry so they survive extraction.
//!
//! Jobs carry a [`CancellationToken`]. The walk and both copy loops check it
//! between chunks, so a client that disconnects stops the work promptly.

use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Datelike, Local, Timelike};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::FileError;
use super::resolver::{ConfinedPath, PathResolver};
use super::spill::SpillBuffer;

/// Archive root name used when the source has no final path component.
pub const FALLBACK_ROOT_NAME: &str = "shared";

/// Chunk size for copying file contents and archive bytes.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks buffered between the archive task and the response body.
pub const STREAM_CHANNEL_DEPTH: usize = 8;

/// Files at or above this size need ZIP64 extensions.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// One directory-to-ZIP conversion, consumed by a single download.
#[derive(Debug, Clone)]
pub struct ArchiveJob {
    source: ConfinedPath,
    cancel: CancellationToken,
}

impl ArchiveJob {
    /// Create a job for the given directory.
    pub fn new(source: ConfinedPath) -> Self {
        Self {
            source,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a job observing an existing cancellation token.
    pub fn with_cancellation(source: ConfinedPath, cancel: CancellationToken) -> Self {
        Self { source, cancel }
    }

    /// The directory being archived.
    pub fn source(&self) -> &ConfinedPath {
        &self.source
    }

    /// The token that aborts this job when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Name of the top-level folder inside the archive.
    pub fn root_name(&self) -> String {
        archive_root_name(self.source.as_path())
    }

    /// Suggested download file name, `<rootName>.zip`.
    pub fn file_name(&self) -> String {
        format!("{}.zip", self.root_name())
    }
}

/// Name of the top-level archive folder for a directory path.
pub fn archive_root_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| FALLBACK_ROOT_NAME.to_string())
}

/// Produces ZIP archives of confined directories.
#[derive(Debug, Clone)]
pub struct ArchiveStreamer {
    resolver: PathResolver,
    spill_threshold: usize,
}

impl ArchiveStreamer {
    /// Create a streamer that buffers up to `spill_threshold` bytes in memory.
    pub fn new(resolver: PathResolver, spill_threshold: usize) -> Self {
        Self {
            resolver,
            spill_threshold,
        }
    }

    /// The in-memory buffering limit in bytes.
    pub fn spill_threshold(&self) -> usize {
        self.spill_threshold
    }

    /// Archive the job's directory into `sink`, returning the bytes written.
    ///
    /// Output already written to the sink is not retracted on failure.
    pub fn stream<W: Write>(&self, job: &ArchiveJob, mut sink: W) -> Result<u64, FileError> {
        let mut buffer = self.build(job)?;
        let archive_len = buffer.rewind_for_read()?;

        let written = copy_cancellable(&mut buffer, &mut sink, job.cancellation())?;
        sink.flush()?;

        info!(
            path = %job.source().relative(),
            bytes = written,
            spilled = buffer.is_spilled(),
            "Archive streamed"
        );
        debug_assert_eq!(written, archive_len);
        Ok(written)
    }

    /// Write the complete archive into a fresh spill buffer.
    pub fn build(&self, job: &ArchiveJob) -> Result<SpillBuffer, FileError> {
        let source = job.source().as_path();
        let metadata = fs::metadata(source).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FileError::NotFound(job.source().relative().to_string())
            } else {
                FileError::Io(e)
            }
        })?;
        if !metadata.is_dir() {
            return Err(FileError::NotADirectory(source.to_path_buf()));
        }

        let mut builder = ArchiveBuilder {
            writer: ZipWriter::new(SpillBuffer::new(self.spill_threshold)),
            resolver: &self.resolver,
            cancel: job.cancellation(),
            source,
            root_name: job.root_name(),
            open_dirs: Vec::new(),
            files: 0,
            empty_dirs: 0,
        };
        builder.walk()?;

        let (files, empty_dirs) = (builder.files, builder.empty_dirs);
        let buffer = builder.writer.finish()?;
        debug!(
            path = %job.source().relative(),
            files,
            empty_dirs,
            "Archive built"
        );
        Ok(buffer)
    }

    /// Run the job on the blocking pool, delivering archive bytes as chunks.
    ///
    /// The receiver sees an `Err` item if the archive fails after streaming
    /// began. Dropping the receiver makes the next send fail, which ends the
    /// job; cancelling the job's token ends it sooner.
    pub fn spawn_stream(&self, job: ArchiveJob) -> mpsc::Receiver<io::Result<Bytes>> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
        let streamer = self.clone();

        tokio::task::spawn_blocking(move || {
            let sink = ChunkSender::new(tx.clone());
            match streamer.stream(&job, sink) {
                Ok(_) => {}
                Err(FileError::Cancelled) => {
                    debug!(path = %job.source().relative(), "Archive job cancelled");
                }
                Err(FileError::Io(e)) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!(path = %job.source().relative(), "Archive consumer went away");
                }
                Err(e) => {
                    warn!(path = %job.source().relative(), error = %e, "Archive job failed");
                    let _ = tx.blocking_send(Err(io::Error::other(e.to_string())));
                }
            }
        });

        rx
    }
}

/// A directory seen by the walk whose subtree is still being enumerated.
struct OpenDir {
    depth: usize,
    name: String,
    path: PathBuf,
    has_children: bool,
}

struct ArchiveBuilder<'a> {
    writer: ZipWriter<SpillBuffer>,
    resolver: &'a PathResolver,
    cancel: &'a CancellationToken,
    source: &'a Path,
    root_name: String,
    open_dirs: Vec<OpenDir>,
    files: usize,
    empty_dirs: usize,
}

impl ArchiveBuilder<'_> {
    fn walk(&mut self) -> Result<(), FileError> {
        let walker = WalkDir::new(self.source)
            .follow_links(false)
            .sort_by_file_name();

        for result in walker {
            if self.cancel.is_cancelled() {
                return Err(FileError::Cancelled);
            }

            let entry = match result {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    warn!(
                        path = ?err.path(),
                        error = %err,
                        "Skipping unreadable entry while archiving"
                    );
                    // A directory that could not be read is not known to be empty.
                    if let (Some(open), Some(path)) = (self.open_dirs.last_mut(), err.path()) {
                        if open.path == path {
                            open.has_children = true;
                        }
                    }
                    continue;
                }
            };

            let depth = entry.depth();
            self.close_dirs(depth)?;

            let name = self.entry_name(entry.path())?;
            let file_type = entry.file_type();

            // A parent only counts as non-empty once a child yields an entry.
            let added = if file_type.is_dir() {
                if let Some(parent) = self.open_dirs.last_mut() {
                    parent.has_children = true;
                }
                self.open_dirs.push(OpenDir {
                    depth,
                    name,
                    path: entry.path().to_path_buf(),
                    has_children: false,
                });
                false
            } else if file_type.is_file() {
                self.add_file(entry.path(), &name)?
            } else if file_type.is_symlink() {
                self.add_symlink(entry.path(), &name)?
            } else {
                debug!(path = %entry.path().display(), "Skipping special file");
                false
            };

            if added {
                if let Some(parent) = self.open_dirs.last_mut() {
                    parent.has_children = true;
                }
            }
        }

        self.close_dirs(0)
    }

    /// Finish every open directory at or below `depth`, recording empty ones.
    fn close_dirs(&mut self, depth: usize) -> Result<(), FileError> {
        while self.open_dirs.last().is_some_and(|d| d.depth >= depth) {
            let Some(dir) = self.open_dirs.pop() else {
                break;
            };
            if !dir.has_children {
                self.writer
                    .add_directory(format!("{}/", dir.name), FileOptions::default())?;
                self.empty_dirs += 1;
            }
        }
        Ok(())
    }

    fn entry_name(&self, path: &Path) -> Result<String, FileError> {
        let relative = path
            .strip_prefix(self.source)
            .map_err(|e| FileError::Io(io::Error::other(e)))?;

        let mut name = self.root_name.clone();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }
        Ok(name)
    }

    /// Add one regular file. Returns whether an entry was written.
    fn add_file(&mut self, path: &Path, name: &str) -> Result<bool, FileError> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "File vanished while archiving, skipping");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata()?;

        self.writer.start_file(name, file_options(&metadata))?;
        copy_cancellable(&mut file, &mut self.writer, self.cancel)?;
        self.files += 1;
        Ok(true)
    }

    /// Include a symlinked file only when its target stays inside the root.
    fn add_symlink(&mut self, path: &Path, name: &str) -> Result<bool, FileError> {
        match self.resolver.confine(path) {
            Ok(target) if target.is_file() => self.add_file(&target, name),
            Ok(_) => {
                debug!(path = %path.display(), "Not descending into symlinked directory");
                Ok(false)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping symlink while archiving");
                Ok(false)
            }
        }
    }
}

fn file_options(metadata: &Metadata) -> FileOptions {
    let mut options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(metadata.len() >= ZIP64_THRESHOLD)
        .unix_permissions(metadata.permissions().mode());

    if let Some(modified) = metadata.modified().ok().and_then(zip_datetime) {
        options = options.last_modified_time(modified);
    }
    options
}

/// Convert a filesystem timestamp to a ZIP (MS-DOS, local time) timestamp.
///
/// Returns `None` outside the 1980..=2107 range the format can represent.
fn zip_datetime(time: SystemTime) -> Option<zip::DateTime> {
    let local: DateTime<Local> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(local.year()).ok()?,
        local.month() as u8,
        local.day() as u8,
        local.hour() as u8,
        local.minute() as u8,
        local.second() as u8,
    )
    .ok()
}

/// Copy `reader` into `writer` chunk by chunk, stopping when cancelled.
fn copy_cancellable<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<u64, FileError> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(FileError::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Blocking `Write` adapter that forwards each write as a [`Bytes`] chunk.
///
/// Writes fail with `BrokenPipe` once the receiving side is dropped.
pub struct ChunkSender {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ChunkSender {
    /// Wrap the sending half of a chunk channel.
    pub fn new(tx: mpsc::Sender<io::Result<Bytes>>) -> Self {
        Self { tx }
    }
}

impl Write for ChunkSender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::resolver::Root;
    use std::collections::BTreeMap;
    use std::io::Cursor;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn setup() -> (TempDir, PathResolver) {
        let temp_dir = TempDir::new().unwrap();
        let root = Root::open(temp_dir.path().join("share")).unwrap();
        (temp_dir, PathResolver::new(root))
    }

    /// Read an archive back into name -> (is_dir, contents).
    fn extract(bytes: Vec<u8>) -> BTreeMap<String, (bool, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            out.insert(file.name().to_string(), (file.is_dir(), contents));
        }
        out
    }

    fn archive_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_docs_scenario() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("docs/archive")).unwrap();
        fs::write(root.join("docs/report.txt"), "0123456789").unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 1024 * 1024);
        let job = ArchiveJob::new(resolver.resolve("docs").unwrap());
        let mut out = Vec::new();
        let written = streamer.stream(&job, &mut out).unwrap();

        assert_eq!(written, out.len() as u64);
        assert_eq!(job.file_name(), "docs.zip");

        let entries = extract(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries.get("docs/report.txt"),
            Some(&(false, b"0123456789".to_vec()))
        );
        assert_eq!(entries.get("docs/archive/"), Some(&(true, Vec::new())));
    }

    #[test]
    fn test_roundtrip_with_unicode_and_spaces() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("tree/sub dir/deeper")).unwrap();
        fs::create_dir_all(root.join("tree/empty")).unwrap();
        fs::write(root.join("tree/a.txt"), "alpha").unwrap();
        fs::write(root.join("tree/sub dir/my notes.md"), "notes with spaces").unwrap();
        fs::write(root.join("tree/sub dir/deeper/résumé 日本.txt"), "ünïcödé").unwrap();
        let big: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 256) as u8).collect();
        fs::write(root.join("tree/sub dir/blob.bin"), &big).unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 1024 * 1024);
        let job = ArchiveJob::new(resolver.resolve("tree").unwrap());
        let mut out = Vec::new();
        streamer.stream(&job, &mut out).unwrap();
        let entries = extract(out);

        let files: Vec<&String> = entries.iter().filter(|(_, v)| !v.0).map(|(k, _)| k).collect();
        assert_eq!(
            files,
            vec![
                "tree/a.txt",
                "tree/sub dir/blob.bin",
                "tree/sub dir/deeper/résumé 日本.txt",
                "tree/sub dir/my notes.md",
            ]
        );
        assert_eq!(entries["tree/a.txt"].1, b"alpha");
        assert_eq!(entries["tree/sub dir/my notes.md"].1, b"notes with spaces");
        assert_eq!(
            entries["tree/sub dir/deeper/résumé 日本.txt"].1,
            "ünïcödé".as_bytes()
        );
        assert_eq!(entries["tree/sub dir/blob.bin"].1, big);
        assert_eq!(entries.get("tree/empty/"), Some(&(true, Vec::new())));
        // Non-empty directories get no explicit entry.
        assert!(!entries.contains_key("tree/sub dir/"));
    }

    #[test]
    fn test_spill_threshold_does_not_change_output() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("data/empty")).unwrap();
        for i in 0..20 {
            fs::write(root.join(format!("data/file{i:02}.txt")), format!("payload {i}").repeat(500))
                .unwrap();
        }
        let dir = resolver.resolve("data").unwrap();

        let small = ArchiveStreamer::new(resolver.clone(), 128);
        let large = ArchiveStreamer::new(resolver.clone(), 64 * 1024 * 1024);

        let spilled = small.build(&ArchiveJob::new(dir.clone())).unwrap();
        assert!(spilled.is_spilled());
        let in_memory = large.build(&ArchiveJob::new(dir.clone())).unwrap();
        assert!(!in_memory.is_spilled());

        let mut out_small = Vec::new();
        small.stream(&ArchiveJob::new(dir.clone()), &mut out_small).unwrap();
        let mut out_large = Vec::new();
        large.stream(&ArchiveJob::new(dir), &mut out_large).unwrap();

        assert_eq!(extract(out_small), extract(out_large));
    }

    #[test]
    fn test_depth_first_order() {
        let (_temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("top/a/inner")).unwrap();
        fs::create_dir_all(root.join("top/b")).unwrap();
        fs::write(root.join("top/a/inner/x.txt"), "x").unwrap();
        fs::write(root.join("top/a/y.txt"), "y").unwrap();
        fs::write(root.join("top/b/z.txt"), "z").unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 1024);
        let mut out = Vec::new();
        streamer
            .stream(&ArchiveJob::new(resolver.resolve("top").unwrap()), &mut out)
            .unwrap();

        let names = archive_names(&out);
        let last_a = names.iter().rposition(|n| n.starts_with("top/a/")).unwrap();
        let first_b = names.iter().position(|n| n.starts_with("top/b/")).unwrap();
        assert!(last_a < first_b, "siblings interleaved: {names:?}");
    }

    #[test]
    fn test_empty_directory_archive() {
        let (_temp_dir, resolver) = setup();
        fs::create_dir_all(resolver.root().path().join("nothing")).unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 1024);
        let mut out = Vec::new();
        streamer
            .stream(&ArchiveJob::new(resolver.resolve("nothing").unwrap()), &mut out)
            .unwrap();

        assert_eq!(archive_names(&out), vec!["nothing/"]);
    }

    #[test]
    fn test_archiving_the_root_uses_its_name() {
        let (_temp_dir, resolver) = setup();
        fs::write(resolver.root().path().join("top.txt"), "t").unwrap();

        let job = ArchiveJob::new(resolver.resolve("").unwrap());
        assert_eq!(job.root_name(), "share");

        let mut out = Vec::new();
        ArchiveStreamer::new(resolver.clone(), 1024)
            .stream(&job, &mut out)
            .unwrap();
        assert_eq!(archive_names(&out), vec!["share/top.txt"]);
    }

    #[test]
    fn test_root_name_fallback() {
        assert_eq!(archive_root_name(Path::new("/")), FALLBACK_ROOT_NAME);
        assert_eq!(archive_root_name(Path::new("/srv/music")), "music");
    }

    #[test]
    fn test_not_a_directory() {
        let (_temp_dir, resolver) = setup();
        fs::write(resolver.root().path().join("file.txt"), "x").unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 1024);
        let job = ArchiveJob::new(resolver.resolve("file.txt").unwrap());
        let result = streamer.stream(&job, Vec::new());

        assert!(matches!(result, Err(FileError::NotADirectory(_))));
    }

    #[test]
    fn test_cancelled_job_stops() {
        let (_temp_dir, resolver) = setup();
        fs::create_dir_all(resolver.root().path().join("dir")).unwrap();
        fs::write(resolver.root().path().join("dir/a.txt"), "a").unwrap();

        let job = ArchiveJob::new(resolver.resolve("dir").unwrap());
        job.cancellation().cancel();

        let result = ArchiveStreamer::new(resolver.clone(), 1024).stream(&job, Vec::new());
        assert!(matches!(result, Err(FileError::Cancelled)));
    }

    #[test]
    fn test_symlinks_are_confined() {
        let (temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("pack")).unwrap();
        fs::write(root.join("real.txt"), "inside").unwrap();
        fs::write(temp_dir.path().join("secret.txt"), "outside").unwrap();
        fs::create_dir_all(temp_dir.path().join("outdir")).unwrap();
        fs::write(temp_dir.path().join("outdir/leak.txt"), "leak").unwrap();
        symlink(root.join("real.txt"), root.join("pack/inside-link")).unwrap();
        symlink(temp_dir.path().join("secret.txt"), root.join("pack/outside-link")).unwrap();
        symlink(temp_dir.path().join("outdir"), root.join("pack/outside-dir")).unwrap();

        let mut out = Vec::new();
        ArchiveStreamer::new(resolver.clone(), 1024)
            .stream(&ArchiveJob::new(resolver.resolve("pack").unwrap()), &mut out)
            .unwrap();
        let entries = extract(out);

        assert_eq!(entries.get("pack/inside-link").map(|e| e.1.as_slice()), Some(&b"inside"[..]));
        assert!(!entries.contains_key("pack/outside-link"));
        assert!(entries.keys().all(|k| !k.contains("leak")));
    }

    #[test]
    fn test_directory_with_only_skipped_children_is_kept() {
        let (temp_dir, resolver) = setup();
        let root = resolver.root().path();
        fs::create_dir_all(root.join("top/holder")).unwrap();
        fs::write(root.join("top/a.txt"), "a").unwrap();
        fs::write(temp_dir.path().join("outside.txt"), "secret").unwrap();
        symlink(temp_dir.path().join("outside.txt"), root.join("top/holder/out")).unwrap();

        let mut out = Vec::new();
        ArchiveStreamer::new(resolver.clone(), 1024)
            .stream(&ArchiveJob::new(resolver.resolve("top").unwrap()), &mut out)
            .unwrap();
        let entries = extract(out);

        assert_eq!(entries.get("top/holder/").map(|e| e.0), Some(true));
        assert!(!entries.contains_key("top/holder/out"));
        assert!(!entries.contains_key("top/"));
        assert_eq!(entries.get("top/a.txt").map(|e| e.1.as_slice()), Some(&b"a"[..]));
    }

    #[test]
    fn test_closed_sink_is_broken_pipe() {
        let (_temp_dir, resolver) = setup();
        fs::create_dir_all(resolver.root().path().join("dir")).unwrap();
        fs::write(resolver.root().path().join("dir/a.txt"), "a").unwrap();

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let result = ArchiveStreamer::new(resolver.clone(), 1024).stream(
            &ArchiveJob::new(resolver.resolve("dir").unwrap()),
            ChunkSender::new(tx),
        );

        match result {
            Err(FileError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_stream_delivers_archive() {
        let (_temp_dir, resolver) = setup();
        fs::create_dir_all(resolver.root().path().join("music/empty")).unwrap();
        fs::write(resolver.root().path().join("music/track.mp3"), vec![7u8; 300_000]).unwrap();

        let streamer = ArchiveStreamer::new(resolver.clone(), 4096);
        let mut rx = streamer.spawn_stream(ArchiveJob::new(resolver.resolve("music").unwrap()));

        let mut bytes = Vec::new();
        while let Some(chunk) = rx.recv().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }

        let entries = extract(bytes);
        assert_eq!(entries["music/track.mp3"].1.len(), 300_000);
        assert!(entries.contains_key("music/empty/"));
    }

    #[test]
    fn test_zip_datetime_range() {
        assert!(zip_datetime(SystemTime::UNIX_EPOCH).is_none());
        assert!(zip_datetime(SystemTime::now()).is_some());
    }
}
