//! Optional persistence: transcripts of completed turns and the polling cursor.

pub mod db;
pub mod error;
pub mod store;

pub use error::MemoryError;
pub use store::{TranscriptRecorder, TranscriptStore};
