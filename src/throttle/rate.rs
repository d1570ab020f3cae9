//! Rate representation and the rate-to-interval conversion.
//!
//! Rates are expressed in kilobits per second where one kilobit is 1000 bits.
//! A chunk is [`CHUNK_SIZE`] bytes, which is exactly one kilobit, so the time
//! budget for one chunk is `1 / kbps` seconds.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PacerError, Result};

/// Maximum number of bytes requested from the wrapped source per read.
pub const CHUNK_SIZE: usize = 125;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_KILOBIT: f64 = 1000.0;

/// A validated transfer rate in kilobits per second.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Rate(f64);

impl Rate {
    /// Create a rate from a kilobits-per-second value.
    ///
    /// Fails with [`PacerError::InvalidRate`] unless `kbps` is finite,
    /// greater than zero, and large enough that one chunk interval fits in
    /// a [`Duration`].
    pub fn from_kbps(kbps: f64) -> Result<Self> {
        if !(kbps.is_finite() && kbps > 0.0) {
            return Err(PacerError::InvalidRate(kbps));
        }

        let rate = Rate(kbps);
        Duration::try_from_secs_f64(CHUNK_SIZE as f64 / rate.bytes_per_sec())
            .map_err(|_| PacerError::InvalidRate(kbps))?;
        Ok(rate)
    }

    /// The rate in kilobits per second.
    pub fn kbps(&self) -> f64 {
        self.0
    }

    /// The rate in bytes per second.
    pub fn bytes_per_sec(&self) -> f64 {
        self.0 * BITS_PER_KILOBIT / BITS_PER_BYTE
    }

    /// Minimum wall-clock time one read of up to [`CHUNK_SIZE`] bytes takes.
    pub fn chunk_interval(&self) -> Duration {
        self.min_duration_for(CHUNK_SIZE as u64)
    }

    /// Lower bound on the time needed to move `bytes` at this rate.
    ///
    /// Saturates at [`Duration::MAX`].
    pub fn min_duration_for(&self, bytes: u64) -> Duration {
        Duration::try_from_secs_f64(bytes as f64 / self.bytes_per_sec()).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kbps", self.0)
    }
}

impl FromStr for Rate {
    type Err = PacerError;

    /// Parse `"64"`, `"64kbps"` or `"64 kbps"`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let number = trimmed
            .strip_suffix("kbps")
            .map(str::trim_end)
            .unwrap_or(trimmed);

        let kbps: f64 = number
            .parse()
            .map_err(|_| PacerError::Config(format!("Failed to parse rate '{}'", s)))?;
        Rate::from_kbps(kbps)
    }
}
