//! Command Dispatcher
//!
//! Client-side state machine driving one [`Session`]:
//!
//! ```text
//!            ┌────────── line ──────────┐
//!            ▼                          │
//!   AwaitingCommand ── dispatch ── outcome reported
//!            │
//!            └── QUIT / fatal error ──► Closed
//! ```
//!
//! Each command runs at most once; nothing is retried. Outcomes go to the
//! [`Console`] so quiet mode is decided once, when the dispatcher is built.

use crate::engine::{Confirm, DeleteOutcome, RetrieveOutcome};
use crate::error::{FtpError, Result};
use crate::output::Console;
use crate::protocol::{Command, CommandKind};
use crate::session::Session;

const PROMPT: &str = "Enter a command: ";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

const HELP: &str = "\
Commands:
  STOR <file>    upload a file from the local directory
  RETR <file>    download a file into the local directory
  DEL <file>     delete a file on the server (asks for confirmation)
  LIST, LS       list the files on the server
  QUIT, EXIT, BYE
                 close the session
  SHOW, DISPLAY, HELP
                 show this table
  CLEAR          clear the screen";

/// Dispatcher states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    AwaitingCommand,
    Closed,
}

/// Commands handled without touching the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalCommand {
    Help,
    Clear,
}

impl LocalCommand {
    fn parse(line: &str) -> Option<Self> {
        let word = line.split_whitespace().next()?;
        if ["SHOW", "DISPLAY", "HELP"]
            .iter()
            .any(|w| word.eq_ignore_ascii_case(w))
        {
            Some(LocalCommand::Help)
        } else if word.eq_ignore_ascii_case("CLEAR") {
            Some(LocalCommand::Clear)
        } else {
            None
        }
    }
}

/// Client command loop over one session
pub struct Dispatcher<C> {
    session: Option<Session>,
    console: Console,
    confirm: C,
    state: DispatcherState,
}

impl<C: Confirm> Dispatcher<C> {
    pub fn new(session: Session, console: Console, confirm: C) -> Self {
        Self {
            session: Some(session),
            console,
            confirm,
            state: DispatcherState::AwaitingCommand,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    /// Write the input prompt
    pub fn prompt(&mut self) {
        self.console.raw(PROMPT);
    }

    pub fn print_help(&mut self) {
        self.console.info(HELP);
    }

    /// Run one operator line and report its outcome
    pub fn execute_line(&mut self, line: &str) -> DispatcherState {
        if self.state == DispatcherState::Closed {
            return self.state;
        }
        let line = line.trim();
        if line.is_empty() {
            return self.state;
        }

        if let Some(local) = LocalCommand::parse(line) {
            match local {
                LocalCommand::Help => self.print_help(),
                LocalCommand::Clear => self.console.raw(CLEAR_SCREEN),
            }
            return self.state;
        }

        let command = match Command::parse_line(line) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!("Rejected input {:?}: {}", line, e);
                self.console.error(format!("Error: {e}"));
                return self.state;
            }
        };

        if let Err(e) = self.dispatch(&command) {
            self.console.error(format!("Error: {e}"));
            if e.is_session_fatal() {
                tracing::warn!("Session torn down after {}: {}", command.kind, e);
                self.console.error("Session terminated");
                self.session = None;
                self.state = DispatcherState::Closed;
            }
        }
        self.state
    }

    /// End the session as if QUIT had been typed
    pub fn close(&mut self) -> DispatcherState {
        if self.state == DispatcherState::AwaitingCommand {
            if let Err(e) = self.quit() {
                self.console.error(format!("Error: {e}"));
            }
        }
        self.state
    }

    fn dispatch(&mut self, command: &Command) -> Result<()> {
        tracing::debug!("Dispatching {}", command.kind);
        let Some(session) = self.session.as_mut() else {
            return Err(FtpError::Rejected("command on a closed session".to_string()));
        };

        match command.kind {
            CommandKind::Store => {
                let name = command.require_filename()?;
                self.console.info(format!("Uploading {name}..."));
                let source = session.local_dir().join(name);
                let metrics = session.store(&source)?;
                self.console.info(format!("{name} stored"));
                self.console.info(metrics);
            }
            CommandKind::Retrieve => {
                let name = command.require_filename()?;
                self.console.info(format!("Downloading {name}..."));
                match session.retrieve(name)? {
                    RetrieveOutcome::Retrieved(metrics) => {
                        self.console.info(format!("{name} retrieved"));
                        self.console.info(metrics);
                    }
                    RetrieveOutcome::NotFound => {
                        self.console.error(format!("{name}: file not found on server"));
                    }
                }
            }
            CommandKind::Delete => {
                let name = command.require_filename()?;
                match session.delete(name, &mut self.confirm)? {
                    DeleteOutcome::Deleted(metrics) => {
                        self.console.info(format!("{name} deleted"));
                        self.console.info(format!("Time elapsed: {}s", metrics.elapsed_seconds));
                    }
                    DeleteOutcome::Failed(_) => {
                        self.console.error(format!("{name}: server could not delete the file"));
                    }
                    DeleteOutcome::Abandoned(_) => {
                        self.console.info(format!("Delete of {name} abandoned"));
                    }
                    DeleteOutcome::NotFound => {
                        self.console.error(format!("{name}: file not found on server"));
                    }
                }
            }
            CommandKind::List => {
                let listing = session.list()?;
                self.console.info(listing);
            }
            CommandKind::Quit => return self.quit(),
        }
        Ok(())
    }

    fn quit(&mut self) -> Result<()> {
        self.state = DispatcherState::Closed;
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session.quit()?;
        self.console.info("Connection closed");
        Ok(())
    }
}
