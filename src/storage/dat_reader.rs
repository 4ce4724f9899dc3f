use std::path::Path;
use std::sync::Arc;

use crate::common::error::{Error, Result};
use crate::common::file_system::{FileFlags, FileLockType, UnifiedFileHandle, UnifiedFileSystem};
use crate::common::serializer::{Deserializer, SliceDeserializer};
use crate::storage::storage_info::{FeatureOffset, MAX_LENGTH_HEADER_SIZE};

/// Reads records back from a finished dat store.
///
/// `read_at` and `iter` need a store written with
/// `RecordFraming::LengthPrefixed`; `read_raw` works on either framing when
/// the caller knows the record length.
///
/// The reader holds a shared lock, so no collector can reopen and truncate
/// the store while it is being read.
pub struct DatReader {
    fs: Arc<UnifiedFileSystem>,
    handle: UnifiedFileHandle,
    file_size: u64,
}

impl DatReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_file_system(Arc::new(UnifiedFileSystem::local()), path.as_ref())
    }

    pub fn with_file_system(fs: Arc<UnifiedFileSystem>, path: &Path) -> Result<Self> {
        let handle = fs.open_file(path, FileFlags::READ, FileLockType::ReadLock)?;
        let file_size = fs.file_size(&handle)?;
        Ok(Self { fs, handle, file_size })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Exactly `len` bytes starting at `offset`.
    pub fn read_raw(&self, offset: FeatureOffset, len: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(len as u64).filter(|end| *end <= self.file_size);
        if end.is_none() {
            return Err(Error::Corrupt {
                offset,
                reason: format!("{} bytes requested past end of {}-byte store", len, self.file_size),
            });
        }

        let mut data = vec![0u8; len];
        let read = self.fs.read_at(&self.handle, &mut data, offset)?;
        if read != len {
            return Err(Error::Corrupt {
                offset,
                reason: format!("short read: {} of {} bytes", read, len),
            });
        }
        Ok(data)
    }

    /// Payload of the length-prefixed record whose header starts at `offset`.
    pub fn read_at(&self, offset: FeatureOffset) -> Result<Vec<u8>> {
        self.read_record_with_next(offset).map(|(payload, _)| payload)
    }

    /// Every record in file order, with its offset.
    pub fn iter(&self) -> Records<'_> {
        Records {
            reader: self,
            offset: 0,
            done: false,
        }
    }

    fn read_record_with_next(&self, offset: FeatureOffset) -> Result<(Vec<u8>, FeatureOffset)> {
        if offset >= self.file_size {
            return Err(Error::Corrupt {
                offset,
                reason: format!("offset past end of {}-byte store", self.file_size),
            });
        }

        let header_len = (self.file_size - offset).min(MAX_LENGTH_HEADER_SIZE as u64) as usize;
        let header = self.read_raw(offset, header_len)?;
        let mut de = SliceDeserializer::new(&header);
        let payload_len = de.read_varint().map_err(|e| Error::Corrupt {
            offset,
            reason: format!("bad length header: {e}"),
        })?;

        let payload_offset = offset + de.position() as u64;
        let next = payload_offset
            .checked_add(payload_len)
            .filter(|next| *next <= self.file_size)
            .ok_or_else(|| Error::Corrupt {
                offset,
                reason: format!("record of {} bytes runs past end of store", payload_len),
            })?;

        let payload = self.read_raw(payload_offset, payload_len as usize)?;
        Ok((payload, next))
    }
}

/// Iterator over `(offset, payload)` pairs. Stops after the first error.
pub struct Records<'a> {
    reader: &'a DatReader,
    offset: FeatureOffset,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<(FeatureOffset, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.reader.file_size {
            return None;
        }

        match self.reader.read_record_with_next(self.offset) {
            Ok((payload, next)) => {
                let offset = self.offset;
                self.offset = next;
                Some(Ok((offset, payload)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
