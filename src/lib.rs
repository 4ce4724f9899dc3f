//! Feature-encoding stage of a map-data generation pipeline.
//!
//! Features built upstream are serialized one at a time into an append-only
//! "dat" store. Every feature is addressed by the absolute byte offset of its
//! record, and the collector keeps the union of all feature bounds.
//!
//! ```ignore
//! use featstore::{CollectorConfig, FeaturesCollector};
//!
//! let mut collector = FeaturesCollector::create("world.dat", CollectorConfig::default())?;
//! for feature in features {
//!     let id = collector.write(&feature)?;
//!     index.insert(id, feature.bounding_rect());
//! }
//! let summary = collector.finish()?;
//! ```

pub mod common;
pub mod config;
pub mod geometry;
pub mod storage;

pub use crate::common::error::{Error, Result};
pub use crate::config::{CollectorConfig, OpenMode, RecordFraming};
pub use crate::geometry::rect::{PointD, RectD};
pub use crate::storage::dat_reader::DatReader;
pub use crate::storage::feature::Feature;
pub use crate::storage::features_collector::{CollectorSummary, FeaturesCollector};
pub use crate::storage::storage_info::FeatureOffset;
