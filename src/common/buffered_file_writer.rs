use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::common::error::{Error, Result};
use crate::common::file_buffer::FileBuffer;
use crate::common::file_system::{FileFlags, FileLockType, UnifiedFileHandle, UnifiedFileSystem};

/// Append-only writer that combines small writes into one fixed buffer.
///
/// `committed` counts the bytes already handed to the file, so the absolute
/// position of the next appended byte is `committed + buffer.len()` without
/// asking the file system. Writes larger than the whole buffer bypass it.
///
/// A failed write poisons the writer: every later call returns `Misuse`.
pub struct BufferedFileWriter {
    fs: Arc<UnifiedFileSystem>,
    buffer: FileBuffer,
    committed: u64,
    handle: UnifiedFileHandle,
    poisoned: bool,
}

impl BufferedFileWriter {
    /// Opens `path` for writing. With `FileFlags::APPEND` the committed
    /// counter starts at the current file length, otherwise at zero.
    pub fn open(
        fs: Arc<UnifiedFileSystem>,
        path: &Path,
        flags: FileFlags,
        lock: FileLockType,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Misuse("write buffer capacity must be non-zero"));
        }

        let handle = fs.open_file(path, flags | FileFlags::WRITE, lock)?;
        let committed = if flags.contains(FileFlags::APPEND) {
            fs.file_size(&handle)?
        } else {
            0
        };

        Ok(Self {
            fs,
            buffer: FileBuffer::new(capacity),
            committed,
            handle,
            poisoned: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Position the next appended byte will occupy in the file.
    pub fn current_offset(&self) -> u64 {
        self.committed + self.buffer.len() as u64
    }

    /// Bytes handed to the file so far, excluding what is still buffered.
    pub fn committed_offset(&self) -> u64 {
        self.committed
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_usable()?;

        if self.buffer.push(bytes) {
            return Ok(());
        }

        self.flush()?;
        if self.buffer.push(bytes) {
            return Ok(());
        }

        debug!(
            path = %self.path().display(),
            bytes = bytes.len(),
            offset = self.committed,
            "write larger than buffer, bypassing it"
        );
        self.commit(bytes)
    }

    /// Hands the buffered bytes to the file. No-op when nothing is buffered.
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable()?;

        if self.buffer.is_empty() {
            return Ok(());
        }

        let nr_bytes = self.buffer.len();
        if let Err(source) = self.fs.write(&self.handle, self.buffer.as_slice()) {
            return Err(self.poison(source));
        }
        self.committed += nr_bytes as u64;
        self.buffer.clear();

        debug!(
            path = %self.path().display(),
            bytes = nr_bytes,
            committed = self.committed,
            "flushed write buffer"
        );
        Ok(())
    }

    /// Flushes, then asks the file system to persist the file.
    pub fn sync(&mut self) -> Result<()> {
        self.flush()?;
        if let Err(source) = self.fs.fsync(&self.handle) {
            return Err(self.poison(source));
        }
        Ok(())
    }

    /// Length of the file as the file system reports it. Buffered bytes are
    /// not visible until flushed.
    pub fn file_size_on_disk(&self) -> Result<u64> {
        Ok(self.fs.file_size(&self.handle)?)
    }

    /// Flushes and closes the underlying handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        self.handle.close()?;
        Ok(())
    }

    fn commit(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(source) = self.fs.write(&self.handle, bytes) {
            return Err(self.poison(source));
        }
        self.committed += bytes.len() as u64;
        Ok(())
    }

    fn poison(&mut self, source: std::io::Error) -> Error {
        self.poisoned = true;
        warn!(
            path = %self.path().display(),
            offset = self.committed,
            error = %source,
            "write failed, writer is no longer usable"
        );
        Error::WriteFailure {
            offset: self.committed,
            source,
        }
    }

    fn check_usable(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::Misuse("writer used after a failed write"));
        }
        Ok(())
    }
}

impl Drop for BufferedFileWriter {
    fn drop(&mut self) {
        if self.poisoned {
            return;
        }
        if let Err(e) = self.flush() {
            error!(path = %self.path().display(), error = %e, "final flush failed");
        }
    }
}
