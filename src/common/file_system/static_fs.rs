use std::ffi::CString;
use std::io::{Error, ErrorKind, Result};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};

use super::FileFlags;
use super::FileLockType;

pub trait SFileHandle: Send + Sync {
    fn path(&self) -> &Path;
    fn close(&mut self) -> Result<()>;
}

pub trait SFileSystem: Send + Sync + Sized {
    type Handle: SFileHandle;

    fn open_file(&self, path: &Path, flags: FileFlags, lock: FileLockType) -> Result<Self::Handle>;

    fn write(&self, handle: &Self::Handle, buffer: &[u8]) -> Result<()>;

    fn read_at(&self, handle: &Self::Handle, buffer: &mut [u8], location: u64) -> Result<usize>;

    fn file_size(&self, handle: &Self::Handle) -> Result<u64>;

    fn fsync(&self, handle: &Self::Handle) -> Result<()>;

}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[derive(Debug)]
pub struct LocalFileHandle {
    pub path: PathBuf,
    pub fd: RawFd,
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|e| Error::new(ErrorKind::InvalidInput, e))
}

impl SFileHandle for LocalFileHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) -> Result<()> {
        if self.fd < 0 {
            return Ok(());
        }
        let fd = self.fd;
        self.fd = -1;
        if unsafe { libc::close(fd) } < 0 {
            return Err(Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for LocalFileHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(path = %self.path.display(), error = %e, "failed to close file handle");
        }
    }
}

impl SFileSystem for LocalFileSystem {
    type Handle = LocalFileHandle;

    fn open_file(&self, path: &Path, flags: FileFlags, lock_type: FileLockType) -> Result<LocalFileHandle> {
        debug_assert!(
            !flags.contains(FileFlags::READ | FileFlags::CREATE),
            "cannot combine READ and CREATE flags"
        );

        let mut open_flags = libc::O_CLOEXEC;
        open_flags |= if flags.contains(FileFlags::WRITE) {
            libc::O_RDWR
        } else {
            libc::O_RDONLY
        };

        if flags.contains(FileFlags::CREATE) {
            open_flags |= libc::O_CREAT;
        }
        if flags.contains(FileFlags::APPEND) {
            open_flags |= libc::O_APPEND;
        }

        let c_path = c_path(path)?;
        let fd = unsafe { libc::open(c_path.as_ptr(), open_flags, 0o666 as libc::c_uint) };
        if fd == -1 {
            return Err(Error::last_os_error());
        }

        // Owned from here on, so early returns close the descriptor.
        let handle = LocalFileHandle {
            path: path.to_path_buf(),
            fd,
        };

        // flock locks belong to the open file description, so a second open
        // of the same path conflicts even within this process. Truncation
        // waits until the lock is held.
        let operation = match lock_type {
            FileLockType::NoLock => None,
            FileLockType::ReadLock => Some(libc::LOCK_SH),
            FileLockType::WriteLock => Some(libc::LOCK_EX),
        };
        if let Some(operation) = operation {
            if unsafe { libc::flock(handle.fd, operation | libc::LOCK_NB) } == -1 {
                return Err(Error::last_os_error());
            }
        }

        if flags.contains(FileFlags::TRUNCATE) && unsafe { libc::ftruncate(handle.fd, 0) } == -1 {
            return Err(Error::last_os_error());
        }

        Ok(handle)
    }

    fn write(&self, handle: &LocalFileHandle, buffer: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buffer.len() {
            let rest = &buffer[written..];
            let result = unsafe { libc::write(handle.fd, rest.as_ptr() as *const libc::c_void, rest.len()) };

            if result == -1 {
                let err = Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if result == 0 {
                return Err(Error::new(
                    ErrorKind::WriteZero,
                    format!("write stalled after {} of {} bytes", written, buffer.len()),
                ));
            }
            written += result as usize;
        }
        Ok(())
    }

    fn read_at(&self, handle: &LocalFileHandle, buffer: &mut [u8], location: u64) -> Result<usize> {
        let mut read = 0;
        while read < buffer.len() {
            let rest = &mut buffer[read..];
            let result = unsafe {
                libc::pread(
                    handle.fd,
                    rest.as_mut_ptr() as *mut libc::c_void,
                    rest.len(),
                    (location + read as u64) as libc::off_t,
                )
            };

            if result == -1 {
                let err = Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if result == 0 {
                break;
            }
            read += result as usize;
        }
        Ok(read)
    }

    fn file_size(&self, handle: &LocalFileHandle) -> Result<u64> {
        let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();

        if unsafe { libc::fstat(handle.fd, stat.as_mut_ptr()) } == -1 {
            return Err(Error::last_os_error());
        }

        let stat = unsafe { stat.assume_init() };
        Ok(stat.st_size as u64)
    }

    fn fsync(&self, handle: &LocalFileHandle) -> Result<()> {
        if unsafe { libc::fsync(handle.fd) } == -1 {
            Err(Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.dat");
        let fs = LocalFileSystem;

        let handle = fs
            .open_file(&path, FileFlags::WRITE | FileFlags::CREATE | FileFlags::TRUNCATE, FileLockType::NoLock)
            .unwrap();
        fs.write(&handle, b"hello ").unwrap();
        fs.write(&handle, b"world").unwrap();
        assert_eq!(fs.file_size(&handle).unwrap(), 11);

        let mut buf = [0u8; 5];
        assert_eq!(fs.read_at(&handle, &mut buf, 6).unwrap(), 5);
        assert_eq!(&buf, b"world");

        // Short read at the tail.
        let mut buf = [0u8; 8];
        assert_eq!(fs.read_at(&handle, &mut buf, 9).unwrap(), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystem;
        let mut handle = fs
            .open_file(&dir.path().join("c.dat"), FileFlags::WRITE | FileFlags::CREATE, FileLockType::WriteLock)
            .unwrap();
        handle.close().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_open_missing_for_read_fails() {
        let dir = TempDir::new().unwrap();
        let err = LocalFileSystem
            .open_file(&dir.path().join("missing.dat"), FileFlags::READ, FileLockType::NoLock)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_write_lock_excludes_second_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.dat");
        let fs = LocalFileSystem;
        let flags = FileFlags::WRITE | FileFlags::CREATE | FileFlags::TRUNCATE;

        let first = fs.open_file(&path, flags, FileLockType::WriteLock).unwrap();
        fs.write(&first, b"keep").unwrap();

        let err = fs.open_file(&path, flags, FileLockType::WriteLock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        let err = fs.open_file(&path, FileFlags::READ, FileLockType::ReadLock).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);

        // The refused open must not have truncated the file.
        assert_eq!(fs.file_size(&first).unwrap(), 4);

        // An unlocked descriptor closing does not release the lock.
        let other = fs.open_file(&path, FileFlags::READ, FileLockType::NoLock).unwrap();
        drop(other);
        assert!(fs.open_file(&path, flags, FileLockType::WriteLock).is_err());

        drop(first);
        fs.open_file(&path, flags, FileLockType::WriteLock).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"");
    }

    #[test]
    fn test_read_locks_are_shared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.dat");
        let fs = LocalFileSystem;
        fs.open_file(&path, FileFlags::WRITE | FileFlags::CREATE, FileLockType::NoLock)
            .unwrap();

        let a = fs.open_file(&path, FileFlags::READ, FileLockType::ReadLock).unwrap();
        let b = fs.open_file(&path, FileFlags::READ, FileLockType::ReadLock).unwrap();
        let err = fs
            .open_file(&path, FileFlags::WRITE, FileLockType::WriteLock)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        drop((a, b));
    }
}
