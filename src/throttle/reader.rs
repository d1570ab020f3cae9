//! The pacing reader.

use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::rate::{Rate, CHUNK_SIZE};
use crate::error::Result;

/// A reader that caps the throughput of the reader it wraps.
///
/// Every call to [`read`](Read::read) asks the wrapped source for at most
/// [`CHUNK_SIZE`] bytes and then sleeps until one chunk interval has passed
/// since the call started. The interval is spent on every call, including
/// ones that hit end-of-stream, fail, or are given an empty buffer.
///
/// Time is not carried over between calls. A call that finishes early never
/// earns credit for the next one, and a source slower than the interval is
/// never made up for later. The pacer only ever adds delay.
///
/// The source is taken by value; pass `&mut reader` to keep ownership.
/// The pacer never closes it.
#[derive(Debug)]
pub struct PacedReader<R> {
    /// The wrapped source
    source: R,
    /// Configured rate
    rate: Rate,
    /// Minimum duration of a single read call
    chunk_interval: Duration,
}

impl<R: Read> PacedReader<R> {
    /// Wrap `source` so it is read at no more than `rate_kbps` kilobits per second.
    ///
    /// Fails with [`PacerError::InvalidRate`](crate::error::PacerError::InvalidRate)
    /// if the rate is not a finite number greater than zero. Nothing is read
    /// from `source` here.
    pub fn new(source: R, rate_kbps: f64) -> Result<Self> {
        let rate = Rate::from_kbps(rate_kbps)?;
        Ok(Self::with_rate(source, rate))
    }

    /// Wrap `source` with an already validated rate.
    pub fn with_rate(source: R, rate: Rate) -> Self {
        let chunk_interval = rate.chunk_interval();

        debug!(
            rate = %rate,
            chunk_size = CHUNK_SIZE,
            chunk_interval = ?chunk_interval,
            "Creating paced reader"
        );

        Self {
            source,
            rate,
            chunk_interval,
        }
    }
}

impl<R> PacedReader<R> {
    /// The configured rate.
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// The minimum duration of each read call.
    pub fn chunk_interval(&self) -> Duration {
        self.chunk_interval
    }

    /// Get a reference to the wrapped source.
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Get a mutable reference to the wrapped source.
    ///
    /// Reading through this reference bypasses the pacing.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Unwrap the pacer, returning the wrapped source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

impl<R: Read> Read for PacedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = Instant::now();

        let request = buf.len().min(CHUNK_SIZE);
        let result = self.source.read(&mut buf[..request]);

        let elapsed = start.elapsed();
        let remaining = self.chunk_interval.saturating_sub(elapsed);
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }

        match &result {
            Ok(n) => trace!(
                requested = request,
                bytes = n,
                elapsed = ?elapsed,
                slept = ?remaining,
                "Paced read"
            ),
            Err(e) => trace!(
                requested = request,
                error = %e,
                elapsed = ?elapsed,
                slept = ?remaining,
                "Paced read failed"
            ),
        }

        result
    }
}
