/// Error definitions
pub mod error;
/// Classification, indexing, encoding and writing of `.esc` maps
pub mod export;
/// Insertion-ordered index backing every ordinal in the output format
pub mod index;
/// Read-only scene model and the in-memory snapshot implementation
pub mod scene;

pub use error::{EscherError, EscherResult};
