pub mod dynamic_fs;
pub mod static_fs;

use std::io::{Error, ErrorKind, Result};
use std::path::Path;

use bitflags::bitflags;
use dynamic_fs::{DynFileHandle, DynFileSystem};
use static_fs::{LocalFileHandle, LocalFileSystem, SFileHandle, SFileSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileLockType {
    NoLock,
    ReadLock,
    WriteLock,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u16 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
        const TRUNCATE = 1 << 3;
        const APPEND = 1 << 4;
    }
}

/// File system used by the store: the local one, or a plugged-in
/// implementation behind a trait object.
#[derive(Debug)]
pub enum UnifiedFileSystem {
    Local(LocalFileSystem),
    Plugin(Box<dyn DynFileSystem>),
}

#[derive(Debug)]
pub enum UnifiedFileHandle {
    Local(LocalFileHandle),
    Plugin(Box<dyn DynFileHandle>),
}

fn handle_mismatch() -> Error {
    Error::new(
        ErrorKind::InvalidInput,
        "file handle does not belong to this file system",
    )
}

impl UnifiedFileSystem {
    pub fn local() -> Self {
        UnifiedFileSystem::Local(LocalFileSystem)
    }

    pub fn plugin(fs: impl DynFileSystem + 'static) -> Self {
        UnifiedFileSystem::Plugin(Box::new(fs))
    }

    pub fn open_file(
        &self,
        path: &Path,
        flags: FileFlags,
        lock: FileLockType,
    ) -> Result<UnifiedFileHandle> {
        match self {
            UnifiedFileSystem::Local(fs) => fs.open_file(path, flags, lock).map(UnifiedFileHandle::Local),
            UnifiedFileSystem::Plugin(fs) => fs.open_file(path, flags, lock).map(UnifiedFileHandle::Plugin),
        }
    }

    /// Writes all of `buffer` at the handle's current position.
    pub fn write(&self, handle: &UnifiedFileHandle, buffer: &[u8]) -> Result<()> {
        match (self, handle) {
            (UnifiedFileSystem::Local(fs), UnifiedFileHandle::Local(h)) => fs.write(h, buffer),
            (UnifiedFileSystem::Plugin(fs), UnifiedFileHandle::Plugin(h)) => fs.write(&**h, buffer),
            _ => Err(handle_mismatch()),
        }
    }

    /// Reads up to `buffer.len()` bytes at `location`, returning how many were read.
    pub fn read_at(&self, handle: &UnifiedFileHandle, buffer: &mut [u8], location: u64) -> Result<usize> {
        match (self, handle) {
            (UnifiedFileSystem::Local(fs), UnifiedFileHandle::Local(h)) => fs.read_at(h, buffer, location),
            (UnifiedFileSystem::Plugin(fs), UnifiedFileHandle::Plugin(h)) => {
                fs.read_at(&**h, buffer, location)
            }
            _ => Err(handle_mismatch()),
        }
    }

    pub fn file_size(&self, handle: &UnifiedFileHandle) -> Result<u64> {
        match (self, handle) {
            (UnifiedFileSystem::Local(fs), UnifiedFileHandle::Local(h)) => fs.file_size(h),
            (UnifiedFileSystem::Plugin(fs), UnifiedFileHandle::Plugin(h)) => fs.file_size(&**h),
            _ => Err(handle_mismatch()),
        }
    }

    pub fn fsync(&self, handle: &UnifiedFileHandle) -> Result<()> {
        match (self, handle) {
            (UnifiedFileSystem::Local(fs), UnifiedFileHandle::Local(h)) => fs.fsync(h),
            (UnifiedFileSystem::Plugin(fs), UnifiedFileHandle::Plugin(h)) => fs.fsync(&**h),
            _ => Err(handle_mismatch()),
        }
    }
}

impl UnifiedFileHandle {
    pub fn path(&self) -> &Path {
        match self {
            UnifiedFileHandle::Local(h) => h.path(),
            UnifiedFileHandle::Plugin(h) => h.path(),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            UnifiedFileHandle::Local(h) => h.close(),
            UnifiedFileHandle::Plugin(h) => h.close(),
        }
    }
}
