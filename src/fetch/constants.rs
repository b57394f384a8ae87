//! Constants for the fetch module (timeouts, write chunking).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large images).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Size of each write when streaming a body to disk.
pub const WRITE_CHUNK_SIZE: usize = 1024;
