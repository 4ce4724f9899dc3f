//! Error types for the feature store.
//!
//! A failed write is fatal: the sink that produced it is poisoned and every
//! later call reports `Misuse`. Nothing here is retried internally.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Writing or flushing bytes to the store file failed.
    #[error("write failure at offset {offset}: {source}")]
    WriteFailure {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The caller used a store or sink in a state that forbids it.
    #[error("misuse: {0}")]
    Misuse(&'static str),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A length-prefixed store could not be parsed back.
    #[error("corrupt record at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
}

impl Error {
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Error::WriteFailure { .. })
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse(_))
    }
}
