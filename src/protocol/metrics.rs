//! Transfer metrics
//!
//! Every operation ends with an elapsed-time report, produced after the
//! payload phase and never before it.

use std::fmt;
use std::time::Instant;

/// Elapsed time and byte count for one operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferMetrics {
    pub elapsed_seconds: f32,
    pub byte_count: i32,
}

impl TransferMetrics {
    pub fn new(elapsed_seconds: f32, byte_count: i32) -> Self {
        Self {
            elapsed_seconds,
            byte_count,
        }
    }
}

impl fmt::Display for TransferMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time elapsed: {}s\nFile size: {} bytes",
            self.elapsed_seconds, self.byte_count
        )
    }
}

/// Timer started at the beginning of a payload phase
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    pub fn finish(&self, byte_count: i32) -> TransferMetrics {
        TransferMetrics::new(self.elapsed_seconds(), byte_count)
    }
}
