//! Memory-then-disk buffer for archive output.
//!
//! The ZIP writer needs a seekable sink to patch local headers after each
//! entry. [`SpillBuffer`] keeps output in memory until it reaches the
//! configured threshold and then moves it to an anonymous temporary file,
//! without the writer noticing the switch.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;
use tracing::debug;

/// Seekable buffer that spills to a temporary file above a threshold.
#[derive(Debug)]
pub struct SpillBuffer {
    inner: SpooledTempFile,
    threshold: usize,
    spill_logged: bool,
}

impl SpillBuffer {
    /// Create a buffer that holds at most `threshold` bytes in memory.
    pub fn new(threshold: usize) -> Self {
        Self {
            inner: SpooledTempFile::new(threshold),
            threshold,
            spill_logged: false,
        }
    }

    /// The in-memory limit in bytes.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Whether the contents have moved to disk.
    pub fn is_spilled(&self) -> bool {
        self.inner.is_rolled()
    }

    /// Rewind and return the number of bytes buffered.
    pub fn rewind_for_read(&mut self) -> io::Result<u64> {
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(0))?;
        Ok(len)
    }
}

impl Write for SpillBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if !self.spill_logged && self.inner.is_rolled() {
            self.spill_logged = true;
            debug!(threshold = self.threshold, "Archive buffer spilled to disk");
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Read for SpillBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SpillBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_and_read_back(threshold: usize, data: &[u8]) -> (bool, Vec<u8>) {
        let mut buffer = SpillBuffer::new(threshold);
        for chunk in data.chunks(7) {
            buffer.write_all(chunk).unwrap();
        }
        let spilled = buffer.is_spilled();
        let len = buffer.rewind_for_read().unwrap();
        assert_eq!(len, data.len() as u64);

        let mut out = Vec::new();
        buffer.read_to_end(&mut out).unwrap();
        (spilled, out)
    }

    #[test]
    fn test_stays_in_memory_below_threshold() {
        let data = b"small payload";
        let (spilled, out) = write_and_read_back(1024, data);

        assert!(!spilled);
        assert_eq!(out, data);
    }

    #[test]
    fn test_spills_above_threshold() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let (spilled, out) = write_and_read_back(64, &data);

        assert!(spilled);
        assert_eq!(out, data);
    }

    #[test]
    fn test_seek_back_and_patch() {
        let mut buffer = SpillBuffer::new(4);
        buffer.write_all(b"hello world").unwrap();
        buffer.seek(SeekFrom::Start(0)).unwrap();
        buffer.write_all(b"J").unwrap();
        buffer.seek(SeekFrom::End(0)).unwrap();

        buffer.rewind_for_read().unwrap();
        let mut out = String::new();
        buffer.read_to_string(&mut out).unwrap();

        assert_eq!(out, "Jello world");
        assert_eq!(buffer.threshold(), 4);
    }
}
