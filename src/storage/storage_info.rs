/// Absolute byte position of a feature record in the dat store. Issued once
/// per feature and never changes.
pub type FeatureOffset = u64;

/// Size of the collector's write-combining buffer.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 48_000;

/// Largest length header a length-prefixed record can carry (a u64 varint).
pub const MAX_LENGTH_HEADER_SIZE: usize = 10;

