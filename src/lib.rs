//! Pacer - bandwidth-pacing reader
//!
//! This crate wraps any [`std::io::Read`] in a [`PacedReader`] that caps its
//! throughput at a configured rate in kilobits per second. Each read asks the
//! wrapped source for at most one 125-byte chunk and then sleeps out the rest
//! of that chunk's time budget on the calling thread.
//!
//! ```no_run
//! use std::io::Read;
//! use pacer::PacedReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = std::fs::File::open("payload.bin")?;
//! let mut slow = PacedReader::new(file, 100.0)?;
//!
//! let mut contents = Vec::new();
//! slow.read_to_end(&mut contents)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod throttle;
pub mod transfer;

pub use error::{PacerError, Result};
pub use throttle::{PacedReader, Rate, CHUNK_SIZE};
