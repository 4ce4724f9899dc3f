//! Writes features to the dat store.
//!
//! Each feature is serialized into a scratch buffer and appended through a
//! [`BufferedFileWriter`]. The offset captured just before the append is the
//! feature's permanent identifier: once the store is flushed it addresses
//! the first byte of that feature's record. Offsets are assigned from the
//! writer's own byte count, so buffering never shifts them.
//!
//! The collector also keeps the union of every written feature's bounding
//! rectangle. It is updated per write and does not depend on flushes.
//!
//! A collector is `Open` until `finish()`, which flushes and moves it to
//! `Closed`. Writing to a closed collector is a caller bug and reports
//! `Error::Misuse`. Dropping an open collector finishes it.
//!
//! The collector is meant for a single generation pass on one thread;
//! `write` takes `&mut self`, so offset capture and append cannot interleave.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use crate::common::buffered_file_writer::BufferedFileWriter;
use crate::common::error::{Error, Result};
use crate::common::file_system::{FileFlags, FileLockType, UnifiedFileSystem};
use crate::common::serializer::{MemorySerializer, Serializer};
use crate::config::{CollectorConfig, OpenMode, RecordFraming};
use crate::geometry::rect::RectD;
use crate::storage::feature::Feature;
use crate::storage::storage_info::FeatureOffset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Open,
    Closed,
}

/// What a finished store contains.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSummary {
    pub feature_count: u64,
    pub file_size: u64,
    pub bounds: RectD,
}

pub struct FeaturesCollector {
    writer: BufferedFileWriter,
    /// Reused for every feature's serialized bytes
    scratch: MemorySerializer,
    /// Reused for length headers
    header: MemorySerializer,
    bounds: RectD,
    feature_count: u64,
    framing: RecordFraming,
    sync_on_finish: bool,
    state: CollectorState,
}

impl FeaturesCollector {
    /// Opens a dat store on the local file system.
    pub fn create(path: impl AsRef<Path>, config: CollectorConfig) -> Result<Self> {
        Self::with_file_system(Arc::new(UnifiedFileSystem::local()), path.as_ref(), config)
    }

    pub fn with_file_system(fs: Arc<UnifiedFileSystem>, path: &Path, config: CollectorConfig) -> Result<Self> {
        let flags = match config.open_mode {
            OpenMode::Truncate => FileFlags::CREATE | FileFlags::TRUNCATE,
            OpenMode::Append => FileFlags::CREATE | FileFlags::APPEND,
        };
        let lock = if config.lock {
            FileLockType::WriteLock
        } else {
            FileLockType::NoLock
        };

        let writer = BufferedFileWriter::open(fs, path, flags, lock, config.buffer_capacity)?;
        info!(
            path = %path.display(),
            buffer = config.buffer_capacity,
            framing = ?config.framing,
            start_offset = writer.current_offset(),
            "opened feature store"
        );

        Ok(Self {
            writer,
            scratch: MemorySerializer::new(),
            header: MemorySerializer::new(),
            bounds: RectD::empty(),
            feature_count: 0,
            framing: config.framing,
            sync_on_finish: config.sync_on_finish,
            state: CollectorState::Open,
        })
    }

    /// Serializes `feature` into the store and returns its offset.
    pub fn write<F: Feature>(&mut self, feature: &F) -> Result<FeatureOffset> {
        self.check_open()?;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let result = match feature.serialize(&mut scratch) {
            Ok(()) => self.write_bytes(scratch.as_slice(), &feature.bounding_rect()),
            Err(e) => Err(e.into()),
        };
        self.scratch = scratch;
        result
    }

    /// Stores an already serialized feature with the given bounds and
    /// returns its offset.
    pub fn write_bytes(&mut self, bytes: &[u8], rect: &RectD) -> Result<FeatureOffset> {
        self.check_open()?;

        let offset = self.writer.current_offset();
        if self.framing == RecordFraming::LengthPrefixed {
            self.header.clear();
            self.header.write_varint(bytes.len() as u64)?;
            self.writer.append(self.header.as_slice())?;
        }
        self.writer.append(bytes)?;

        self.bounds.add_rect(rect);
        self.feature_count += 1;
        Ok(offset)
    }

    /// Flushes every written feature to the file and closes the collector.
    /// Calling it again returns the same summary without writing anything.
    pub fn finish(&mut self) -> Result<CollectorSummary> {
        if self.state == CollectorState::Open {
            if self.sync_on_finish {
                self.writer.sync()?;
            } else {
                self.writer.flush()?;
            }
            self.state = CollectorState::Closed;
        }

        let summary = CollectorSummary {
            feature_count: self.feature_count,
            file_size: self.file_size()?,
            bounds: self.bounds,
        };
        info!(
            path = %self.writer.path().display(),
            features = summary.feature_count,
            bytes = summary.file_size,
            bounds = ?summary.bounds,
            "finished feature store"
        );
        Ok(summary)
    }

    /// Union of the bounding rectangles of all features written so far.
    /// Empty (`!is_valid()`) until the first write.
    pub fn bounds(&self) -> RectD {
        self.bounds
    }

    pub fn feature_count(&self) -> u64 {
        self.feature_count
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn path(&self) -> &Path {
        self.writer.path()
    }

    /// Size of the store file as seen on disk; only complete after a flush.
    pub fn file_size(&self) -> Result<u64> {
        self.writer.file_size_on_disk()
    }

    /// `file_size` for consumers that address features with 32-bit offsets.
    pub fn file_size_u32(&self) -> Result<u32> {
        u32::try_from(self.file_size()?).map_err(|_| Error::Misuse("feature store too large for 32-bit offsets"))
    }

    /// Flushes buffered records without closing the collector.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        self.writer.flush()
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            CollectorState::Open => Ok(()),
            CollectorState::Closed => Err(Error::Misuse("feature written after finish")),
        }
    }
}

impl Drop for FeaturesCollector {
    fn drop(&mut self) {
        if self.state == CollectorState::Closed || self.writer.is_poisoned() {
            return;
        }
        if let Err(e) = self.finish() {
            error!(path = %self.writer.path().display(), error = %e, "failed to finish feature store on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::common::file_system::dynamic_fs::MemoryFileSystem;
    use crate::common::serializer::Serializable;

    /// Feature whose record is `len` copies of `fill`.
    struct Blob {
        fill: u8,
        len: usize,
        rect: RectD,
    }

    impl Serializable for Blob {
        fn serialize<S: Serializer>(&self, serializer: &mut S) -> io::Result<()> {
            serializer.write_data(&vec![self.fill; self.len])
        }
    }

    impl Feature for Blob {
        fn bounding_rect(&self) -> RectD {
            self.rect
        }
    }

    fn blob(fill: u8, len: usize, rect: RectD) -> Blob {
        Blob { fill, len, rect }
    }

    fn memory_collector(config: CollectorConfig) -> (MemoryFileSystem, FeaturesCollector) {
        let mem = MemoryFileSystem::new();
        let fs = Arc::new(UnifiedFileSystem::plugin(mem.clone()));
        let collector = FeaturesCollector::with_file_system(fs, Path::new("features.dat"), config).unwrap();
        (mem, collector)
    }

    #[test]
    fn test_three_records_through_small_buffer() {
        let (mem, mut collector) = memory_collector(CollectorConfig::default().with_buffer_capacity(16));

        let ids = [
            collector.write(&blob(1, 10, RectD::new(0.0, 0.0, 1.0, 1.0))).unwrap(),
            collector.write(&blob(2, 10, RectD::new(2.0, 2.0, 3.0, 3.0))).unwrap(),
            collector.write(&blob(3, 10, RectD::new(-1.0, -1.0, 0.0, 0.0))).unwrap(),
        ];
        assert_eq!(ids, [0, 10, 20]);

        let summary = collector.finish().unwrap();
        assert_eq!(summary.file_size, 30);
        assert_eq!(summary.feature_count, 3);
        assert_eq!(summary.bounds, RectD::new(-1.0, -1.0, 3.0, 3.0));

        let data = mem.contents(Path::new("features.dat")).unwrap();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(data[*id as usize], i as u8 + 1);
        }
    }

    #[test]
    fn test_offsets_are_running_sum() {
        let (_mem, mut collector) = memory_collector(CollectorConfig::default().with_buffer_capacity(7));

        let mut expected = 0u64;
        for len in [1usize, 6, 7, 8, 0, 3, 20, 2] {
            let id = collector.write(&blob(0xAB, len, RectD::empty())).unwrap();
            assert_eq!(id, expected);
            expected += len as u64;
        }
        assert_eq!(collector.finish().unwrap().file_size, expected);
    }

    #[test]
    fn test_bounds_track_every_write() {
        let (_mem, mut collector) = memory_collector(CollectorConfig::default().with_buffer_capacity(5));
        assert!(!collector.bounds().is_valid());

        let rects = [
            RectD::new(10.0, 10.0, 11.0, 12.0),
            RectD::new(-5.0, 3.0, -4.0, 4.0),
            RectD::new(0.0, -7.0, 1.0, 0.0),
            RectD::new(20.0, 0.0, 21.0, 1.0),
        ];
        let mut expected = RectD::empty();
        for (i, rect) in rects.iter().enumerate() {
            collector.write(&blob(0, 3 + i, *rect)).unwrap();
            expected.add_rect(rect);
            assert_eq!(collector.bounds(), expected);
        }
    }

    #[test]
    fn test_write_after_finish_is_misuse() {
        let (_mem, mut collector) = memory_collector(CollectorConfig::default());
        collector.write(&blob(1, 4, RectD::empty())).unwrap();
        collector.finish().unwrap();

        let err = collector.write(&blob(1, 4, RectD::empty())).unwrap_err();
        assert!(err.is_misuse());
        assert_eq!(collector.state(), CollectorState::Closed);
        assert_eq!(collector.feature_count(), 1);
    }

    #[test]
    fn test_finish_twice_writes_nothing_more() {
        let (mem, mut collector) = memory_collector(CollectorConfig::default());
        collector.write(&blob(9, 5, RectD::empty())).unwrap();

        let first = collector.finish().unwrap();
        let second = collector.finish().unwrap();
        assert_eq!(first, second);
        assert_eq!(mem.contents(Path::new("features.dat")).unwrap(), vec![9u8; 5]);
    }

    #[test]
    fn test_finish_empty_store() {
        let (mem, mut collector) = memory_collector(CollectorConfig::default());
        let summary = collector.finish().unwrap();
        assert_eq!(summary.file_size, 0);
        assert_eq!(summary.feature_count, 0);
        assert!(!summary.bounds.is_valid());
        assert_eq!(mem.contents(Path::new("features.dat")).unwrap(), b"");
    }

    #[test]
    fn test_drop_finishes_open_collector() {
        let (mem, mut collector) = memory_collector(CollectorConfig::default());
        collector.write(&blob(4, 3, RectD::empty())).unwrap();
        drop(collector);
        assert_eq!(mem.contents(Path::new("features.dat")).unwrap(), vec![4u8; 3]);
    }

    #[test]
    fn test_length_prefixed_offsets_address_headers() {
        let (mem, mut collector) = memory_collector(
            CollectorConfig::default()
                .with_buffer_capacity(16)
                .with_framing(RecordFraming::LengthPrefixed),
        );

        let a = collector.write(&blob(1, 3, RectD::empty())).unwrap();
        let b = collector.write(&blob(2, 200, RectD::empty())).unwrap();
        let c = collector.write(&blob(3, 1, RectD::empty())).unwrap();
        // 1-byte header for 3, 2-byte header for 200.
        assert_eq!((a, b, c), (0, 4, 206));
        collector.finish().unwrap();

        let data = mem.contents(Path::new("features.dat")).unwrap();
        assert_eq!(data.len(), 208);
        assert_eq!(data[a as usize], 3);
        assert_eq!(&data[b as usize..b as usize + 2], &[0xC8, 0x01]);
        assert_eq!(&data[c as usize..], &[1, 3]);
    }

    #[test]
    fn test_write_failure_is_fatal() {
        let mem = MemoryFileSystem::with_quota(12);
        let fs = Arc::new(UnifiedFileSystem::plugin(mem.clone()));
        let mut collector = FeaturesCollector::with_file_system(
            fs,
            Path::new("full.dat"),
            CollectorConfig::default().with_buffer_capacity(8),
        )
        .unwrap();

        assert_eq!(collector.write(&blob(1, 8, RectD::empty())).unwrap(), 0);
        assert_eq!(collector.write(&blob(2, 8, RectD::empty())).unwrap(), 8);
        let err = collector.write(&blob(3, 8, RectD::empty())).unwrap_err();
        assert!(err.is_write_failure(), "unexpected error: {err}");

        let err = collector.write(&blob(4, 1, RectD::empty())).unwrap_err();
        assert!(err.is_misuse());
        assert!(collector.finish().unwrap_err().is_misuse());
        assert_eq!(collector.feature_count(), 2);
        drop(collector);

        // The first record is still where its offset says.
        assert_eq!(&mem.contents(Path::new("full.dat")).unwrap()[..8], &[1u8; 8]);
    }

    #[test]
    fn test_file_size_u32() {
        let (_mem, mut collector) = memory_collector(CollectorConfig::default());
        collector.write(&blob(0, 17, RectD::empty())).unwrap();
        collector.finish().unwrap();
        assert_eq!(collector.file_size_u32().unwrap(), 17);
    }
}
