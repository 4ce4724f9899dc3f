use std::collections::HashMap;
use std::fmt::Debug;
use std::io::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::FileFlags;
use super::FileLockType;

pub trait DynFileHandle: Debug + Send + Sync {
    fn path(&self) -> &Path;
    fn close(&mut self) -> Result<()>;
}

/// Object-safe file system for implementations plugged in at runtime.
pub trait DynFileSystem: Debug + Send + Sync {
    fn open_file(&self, path: &Path, flags: FileFlags, lock: FileLockType) -> Result<Box<dyn DynFileHandle>>;

    fn write(&self, handle: &dyn DynFileHandle, buffer: &[u8]) -> Result<()>;

    fn read_at(&self, handle: &dyn DynFileHandle, buffer: &mut [u8], location: u64) -> Result<usize>;

    fn file_size(&self, handle: &dyn DynFileHandle) -> Result<u64>;

    fn fsync(&self, handle: &dyn DynFileHandle) -> Result<()>;
}

#[derive(Debug)]
struct MemoryFileHandle {
    path: PathBuf,
}

impl DynFileHandle for MemoryFileHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryFiles {
    files: HashMap<PathBuf, Vec<u8>>,
    /// Total bytes accepted across all files
    used: u64,
}

/// In-memory file system. Writes append to the end of the file; an optional
/// quota makes writes fail with `ENOSPC` once the total would exceed it.
/// Locks are accepted and ignored.
///
/// Clones share the same files, so a test can keep one to inspect what a
/// writer produced.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    inner: Arc<Mutex<MemoryFiles>>,
    quota: Option<u64>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            inner: Arc::default(),
            quota: Some(quota),
        }
    }

    /// Snapshot of a file's contents.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryFiles> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(path: &Path) -> Error {
    Error::new(ErrorKind::NotFound, format!("no such file: {}", path.display()))
}

impl DynFileSystem for MemoryFileSystem {
    fn open_file(&self, path: &Path, flags: FileFlags, _lock: FileLockType) -> Result<Box<dyn DynFileHandle>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        match inner.files.get_mut(path) {
            Some(data) => {
                if flags.contains(FileFlags::TRUNCATE) {
                    inner.used -= data.len() as u64;
                    data.clear();
                }
            }
            None if flags.contains(FileFlags::CREATE) => {
                inner.files.insert(path.to_path_buf(), Vec::new());
            }
            None => return Err(not_found(path)),
        }

        Ok(Box::new(MemoryFileHandle {
            path: path.to_path_buf(),
        }))
    }

    fn write(&self, handle: &dyn DynFileHandle, buffer: &[u8]) -> Result<()> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let available = match self.quota {
            Some(quota) => quota.saturating_sub(inner.used),
            None => u64::MAX,
        };
        let accepted = buffer.len().min(available as usize);

        let data = inner
            .files
            .get_mut(handle.path())
            .ok_or_else(|| not_found(handle.path()))?;
        data.extend_from_slice(&buffer[..accepted]);
        inner.used += accepted as u64;

        if accepted < buffer.len() {
            return Err(Error::from_raw_os_error(libc::ENOSPC));
        }
        Ok(())
    }

    fn read_at(&self, handle: &dyn DynFileHandle, buffer: &mut [u8], location: u64) -> Result<usize> {
        let inner = self.lock();
        let data = inner
            .files
            .get(handle.path())
            .ok_or_else(|| not_found(handle.path()))?;

        let start = (location as usize).min(data.len());
        let n = buffer.len().min(data.len() - start);
        buffer[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn file_size(&self, handle: &dyn DynFileHandle) -> Result<u64> {
        let inner = self.lock();
        inner
            .files
            .get(handle.path())
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(handle.path()))
    }

    fn fsync(&self, _handle: &dyn DynFileHandle) -> Result<()> {
        Ok(())
    }
}
