//! Command definitions
//!
//! Commands reach the protocol two ways: typed by an operator as a line of
//! text, and as a short ASCII token on the wire. Both are matched
//! case-insensitively.

use std::fmt;

use crate::error::{FtpError, Result};

use super::codec::MAX_FILENAME_LEN;

/// Longest command token on the wire
pub const MAX_TOKEN_LEN: usize = 4;

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Store,
    Retrieve,
    Delete,
    List,
    Quit,
}

impl CommandKind {
    /// Token written on the wire for this command
    pub fn token(&self) -> &'static str {
        match self {
            CommandKind::Store => "STOR",
            CommandKind::Retrieve => "RETR",
            CommandKind::Delete => "DEL",
            CommandKind::List => "LIST",
            CommandKind::Quit => "QUIT",
        }
    }

    /// Whether the command carries a filename argument
    pub fn takes_filename(&self) -> bool {
        matches!(
            self,
            CommandKind::Store | CommandKind::Retrieve | CommandKind::Delete
        )
    }

    /// Match a complete wire token, including the LIST and QUIT aliases
    pub fn from_token(token: &[u8]) -> Option<Self> {
        let token = std::str::from_utf8(token).ok()?.trim();
        MNEMONICS
            .iter()
            .find(|(mnemonic, _)| token.eq_ignore_ascii_case(mnemonic))
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Every recognized mnemonic, longest-prefix matches first
const MNEMONICS: &[(&str, CommandKind)] = &[
    ("STOR", CommandKind::Store),
    ("RETR", CommandKind::Retrieve),
    ("LIST", CommandKind::List),
    ("QUIT", CommandKind::Quit),
    ("EXIT", CommandKind::Quit),
    ("DEL", CommandKind::Delete),
    ("BYE", CommandKind::Quit),
    ("LS", CommandKind::List),
];

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,

    /// Filename argument, present for STOR, RETR and DEL
    pub filename: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind, filename: Option<String>) -> Self {
        Self { kind, filename }
    }

    /// Parse an operator line such as `stor notes.txt`
    ///
    /// The mnemonic is matched as a fixed-width prefix; everything after it,
    /// trimmed, is the filename argument.
    pub fn parse_line(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        let (mnemonic, kind) = MNEMONICS
            .iter()
            .find(|(mnemonic, _)| has_prefix_ignore_case(trimmed, mnemonic))
            .ok_or_else(|| FtpError::UnknownCommand(trimmed.to_string()))?;

        if !kind.takes_filename() {
            return Ok(Self::new(*kind, None));
        }

        let filename = trimmed[mnemonic.len()..].trim();
        validate_filename(filename)?;
        Ok(Self::new(*kind, Some(filename.to_string())))
    }

    /// The filename argument, or an error for commands that need one
    pub fn require_filename(&self) -> Result<&str> {
        self.filename
            .as_deref()
            .ok_or_else(|| FtpError::InvalidFilename(String::new()))
    }
}

fn has_prefix_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Check that a filename fits the short length field
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_FILENAME_LEN {
        return Err(FtpError::InvalidFilename(name.to_string()));
    }
    Ok(())
}
