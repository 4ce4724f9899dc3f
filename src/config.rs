use serde::{Deserialize, Serialize};

use crate::storage::storage_info::DEFAULT_WRITE_BUFFER_SIZE;

/// How each feature record is laid out in the dat store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFraming {
    /// Record bytes exactly as the feature serialized them. Only the offsets
    /// issued at write time can find records again.
    #[default]
    Raw,
    /// A varint payload length precedes every record, so the store can be
    /// walked without the issued offsets.
    LengthPrefixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Start from an empty file.
    #[default]
    Truncate,
    /// Keep existing records; new offsets continue after them.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub buffer_capacity: usize,
    pub framing: RecordFraming,
    pub open_mode: OpenMode,
    /// fsync the store after the final flush in `finish()`
    pub sync_on_finish: bool,
    /// Hold an exclusive lock on the store file while writing
    pub lock: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            buffer_capacity: DEFAULT_WRITE_BUFFER_SIZE,
            framing: RecordFraming::Raw,
            open_mode: OpenMode::Truncate,
            sync_on_finish: false,
            lock: true,
        }
    }
}

impl CollectorConfig {
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_framing(mut self, framing: RecordFraming) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_open_mode(mut self, open_mode: OpenMode) -> Self {
        self.open_mode = open_mode;
        self
    }

    pub fn with_sync_on_finish(mut self, sync: bool) -> Self {
        self.sync_on_finish = sync;
        self
    }

    pub fn with_lock(mut self, lock: bool) -> Self {
        self.lock = lock;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_takes_defaults() {
        let config: CollectorConfig = serde_json::from_str(r#"{"framing":"length_prefixed"}"#).unwrap();
        assert_eq!(config, CollectorConfig::default().with_framing(RecordFraming::LengthPrefixed));
        assert_eq!(config.buffer_capacity, DEFAULT_WRITE_BUFFER_SIZE);
        assert_eq!(config.open_mode, OpenMode::Truncate);
        assert!(!config.sync_on_finish);
        assert!(config.lock);

        let empty: CollectorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, CollectorConfig::default());
    }

    #[test]
    fn test_config_json_form() {
        let config = CollectorConfig::default()
            .with_buffer_capacity(4096)
            .with_open_mode(OpenMode::Append)
            .with_sync_on_finish(true)
            .with_lock(false);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"buffer_capacity":4096,"framing":"raw","open_mode":"append","sync_on_finish":true,"lock":false}"#
        );
        assert_eq!(serde_json::from_str::<CollectorConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_unknown_variant_rejected() {
        assert!(serde_json::from_str::<CollectorConfig>(r#"{"open_mode":"overwrite"}"#).is_err());
    }
}
