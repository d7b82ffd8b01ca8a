//! Bw-tree constants.

/// Slots per mapping table chunk. Chunks are allocated lazily.
pub(crate) const MAPPING_CHUNK_SIZE: usize = 4096;

/// Backoff steps after which a retrying writer yields its time slice
/// instead of only spinning.
pub(crate) const BACKOFF_YIELD_STEP: u32 = 6;

/// Largest exponent used for the backoff spin window (2^10 spins).
pub(crate) const BACKOFF_MAX_EXPONENT: u32 = 10;
