//! Copying a paced source into a writer.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::throttle::{PacedReader, CHUNK_SIZE};

/// Summary of a finished copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopyStats {
    /// Bytes written to the destination
    pub bytes: u64,
    /// Wall-clock time spent copying
    pub elapsed: Duration,
    /// Whether the copy ended because `stop` was raised
    pub interrupted: bool,
}

impl CopyStats {
    /// Observed throughput in kilobits per second.
    ///
    /// Returns `None` when no time has elapsed.
    pub fn effective_kbps(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            Some(self.bytes as f64 * 8.0 / 1000.0 / secs)
        } else {
            None
        }
    }
}

/// Copy `reader` into `writer` until end-of-stream, an error, or `stop`.
///
/// `stop` is checked before every chunk, so a raised flag takes effect
/// after at most one chunk interval plus however long the source blocks.
/// Interrupted reads are retried; any other error ends the copy.
pub fn paced_copy<R, W>(
    reader: &mut PacedReader<R>,
    writer: &mut W,
    stop: &AtomicBool,
) -> io::Result<CopyStats>
where
    R: Read,
    W: Write + ?Sized,
{
    let start = Instant::now();
    let mut buf = [0u8; CHUNK_SIZE];
    let mut bytes: u64 = 0;
    let mut interrupted = false;

    loop {
        if stop.load(Ordering::SeqCst) {
            debug!(bytes = bytes, "Stop requested, ending copy");
            interrupted = true;
            break;
        }

        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        writer.write_all(&buf[..n])?;
        bytes += n as u64;
    }

    writer.flush()?;

    let stats = CopyStats {
        bytes,
        elapsed: start.elapsed(),
        interrupted,
    };

    info!(
        bytes = stats.bytes,
        elapsed = ?stats.elapsed,
        effective_kbps = stats.effective_kbps().unwrap_or(0.0),
        interrupted = stats.interrupted,
        "Copy finished"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::io::Cursor;

    /// Fails with `Interrupted` once, then behaves like the wrapped cursor.
    struct InterruptOnce {
        inner: Cursor<Vec<u8>>,
        fired: bool,
    }

    impl Read for InterruptOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.fired {
                self.fired = true;
                return Err(io::Error::new(io::ErrorKind::Interrupted, "signal"));
            }
            self.inner.read(buf)
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_copy_whole_source() {
        let mut data = vec![0u8; 1000];
        rand::thread_rng().fill_bytes(&mut data);
        let mut reader = PacedReader::new(Cursor::new(data.clone()), 1000.0).unwrap();
        let mut out = Vec::new();

        let stats = paced_copy(&mut reader, &mut out, &AtomicBool::new(false)).unwrap();

        assert_eq!(out, data);
        assert_eq!(stats.bytes, 1000);
        assert!(!stats.interrupted);
        // 8 data chunks plus the end-of-stream read, 1ms each
        assert!(stats.elapsed >= Duration::from_millis(9));
    }

    #[test]
    fn test_effective_rate_stays_under_target() {
        let data = vec![7u8; 500];
        let mut reader = PacedReader::new(Cursor::new(data), 100.0).unwrap();
        let mut out = Vec::new();

        let stats = paced_copy(&mut reader, &mut out, &AtomicBool::new(false)).unwrap();

        let kbps = stats.effective_kbps().unwrap();
        assert!(kbps <= 100.0, "effective rate {} exceeds target", kbps);
    }

    #[test]
    fn test_stop_before_start() {
        let mut reader = PacedReader::new(Cursor::new(vec![1u8; 64]), 1000.0).unwrap();
        let mut out = Vec::new();

        let stats = paced_copy(&mut reader, &mut out, &AtomicBool::new(true)).unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.bytes, 0);
        assert!(out.is_empty());
        assert_eq!(reader.get_ref().position(), 0);
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let source = InterruptOnce {
            inner: Cursor::new(b"after the signal".to_vec()),
            fired: false,
        };
        let mut reader = PacedReader::new(source, 1000.0).unwrap();
        let mut out = Vec::new();

        let stats = paced_copy(&mut reader, &mut out, &AtomicBool::new(false)).unwrap();

        assert_eq!(out, b"after the signal");
        assert_eq!(stats.bytes, 16);
    }

    #[test]
    fn test_write_error_propagates() {
        let mut reader = PacedReader::new(Cursor::new(vec![1u8; 10]), 1000.0).unwrap();

        let err = paced_copy(&mut reader, &mut BrokenPipe, &AtomicBool::new(false)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_effective_kbps_without_elapsed_time() {
        let stats = CopyStats {
            bytes: 10,
            elapsed: Duration::ZERO,
            interrupted: false,
        };
        assert_eq!(stats.effective_kbps(), None);

        let stats = CopyStats {
            bytes: 1000,
            elapsed: Duration::from_secs(1),
            interrupted: false,
        };
        assert_eq!(stats.effective_kbps(), Some(8.0));
    }
}
