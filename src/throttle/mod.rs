//! Bandwidth pacing for readers.

mod rate;
mod reader;

pub use rate::{Rate, CHUNK_SIZE};
pub use reader::PacedReader;
