//! Output sink for operator-facing messages
//!
//! Quiet mode is a property of the sink handed to the dispatcher, chosen once
//! when the session is built. Informational lines are dropped when quiet;
//! failures are always written so every command still reports an outcome.

use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Operator-facing message sink
pub struct Console {
    quiet: bool,
    out: Box<dyn Write + Send>,
}

impl Console {
    /// Console writing to the process stdout
    pub fn stdout(quiet: bool) -> Self {
        Self::with_writer(quiet, io::stdout())
    }

    pub fn with_writer(quiet: bool, writer: impl Write + Send + 'static) -> Self {
        Self {
            quiet,
            out: Box::new(writer),
        }
    }

    /// Console that captures everything into a shared buffer
    pub fn captured(quiet: bool) -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::with_writer(quiet, captured.clone()), captured)
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Informational line, suppressed in quiet mode
    pub fn info(&mut self, message: impl Display) {
        if !self.quiet {
            self.line(message);
        }
    }

    /// Failure line, always written
    pub fn error(&mut self, message: impl Display) {
        self.line(message);
    }

    /// Raw text without a trailing newline, suppressed in quiet mode
    pub fn raw(&mut self, text: &str) {
        if !self.quiet {
            let _ = self.out.write_all(text.as_bytes());
            let _ = self.out.flush();
        }
    }

    fn line(&mut self, message: impl Display) {
        // Operator output is best effort; a closed stdout must not end the session.
        let _ = writeln!(self.out, "{message}");
        let _ = self.out.flush();
    }
}

/// Shared in-memory buffer behind [`Console::captured`]
#[derive(Clone, Default)]
pub struct CapturedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
