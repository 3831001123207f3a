//! File discovery and identity hashing

mod scanner;

pub use scanner::{file_identity, generate_track_id, scan, DiscoveredFile};
