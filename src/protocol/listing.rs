//! Directory listing
//!
//! The stream transport sends a listing field by field; the datagram
//! transport sends the rendered text below as a single datagram:
//!
//! ```text
//! \t<name> - <size> bytes
//! ...
//!
//! Total directory size: <total> bytes
//! Total number of files: <count>
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::FramingError;

const TOTAL_SIZE_PREFIX: &str = "Total directory size: ";
const TOTAL_COUNT_PREFIX: &str = "Total number of files: ";

/// One file in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub size: u32,
}

impl ListingEntry {
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// Ordered listing with aggregate totals
///
/// Listings built locally keep `total_size` equal to the saturating sum of
/// entry sizes and `total_count` equal to the number of entries. Listings
/// received from a peer carry the totals the peer reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    entries: Vec<ListingEntry>,
    total_size: u32,
    total_count: u32,
}

impl DirectoryListing {
    pub fn new(entries: Vec<ListingEntry>) -> Self {
        let total_size = entries
            .iter()
            .fold(0u32, |acc, entry| acc.saturating_add(entry.size));
        let total_count = u32::try_from(entries.len()).unwrap_or(u32::MAX);
        Self {
            entries,
            total_size,
            total_count,
        }
    }

    /// Listing with totals as reported by a peer
    pub fn from_parts(entries: Vec<ListingEntry>, total_size: u32, total_count: u32) -> Self {
        Self {
            entries,
            total_size,
            total_count,
        }
    }

    /// Whether the totals agree with the entries
    pub fn is_consistent(&self) -> bool {
        let local = Self::new(self.entries.clone());
        local.total_size == self.total_size && local.total_count == self.total_count
    }

    /// List the regular files directly inside `dir`, sorted by name
    ///
    /// Subdirectories are skipped, as are names that are not valid UTF-8 or
    /// contain control characters; the text form holds one entry per line.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("Skipping non UTF-8 filename in {}", dir.display());
                continue;
            };
            if name.chars().any(char::is_control) {
                tracing::warn!(
                    "Skipping filename {:?} in {}: contains control characters",
                    name,
                    dir.display()
                );
                continue;
            }
            let size = u32::try_from(metadata.len()).unwrap_or(u32::MAX);
            entries.push(ListingEntry::new(name, size));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Text form sent over the datagram transport
    pub fn render(&self) -> String {
        self.render_bounded(usize::MAX).0
    }

    /// Text form cut down to at most `max_len` bytes
    ///
    /// Trailing entries are dropped until the text fits; the totals still
    /// describe the whole directory. Returns the text and the number of
    /// entries it shows.
    pub fn render_bounded(&self, max_len: usize) -> (String, usize) {
        let footer = format!(
            "\n\n{}{} bytes\n{}{}",
            TOTAL_SIZE_PREFIX, self.total_size, TOTAL_COUNT_PREFIX, self.total_count
        );
        let budget = max_len.saturating_sub(footer.len());

        let mut text = String::new();
        let mut shown = 0;
        for entry in &self.entries {
            let line = format!("\t{} - {} bytes", entry.name, entry.size);
            let separator = usize::from(shown > 0);
            if text.len() + separator + line.len() > budget {
                break;
            }
            if shown > 0 {
                text.push('\n');
            }
            text.push_str(&line);
            shown += 1;
        }
        text.push_str(&footer);
        (text, shown)
    }

    /// Parse the text form produced by [`DirectoryListing::render`]
    pub fn parse_text(text: &str) -> Result<Self, FramingError> {
        let mut entries = Vec::new();
        let mut total_size = None;
        let mut total_count = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix(TOTAL_SIZE_PREFIX) {
                let value = rest.strip_suffix(" bytes").unwrap_or(rest);
                total_size = Some(parse_number(value, line)?);
            } else if let Some(rest) = line.strip_prefix(TOTAL_COUNT_PREFIX) {
                total_count = Some(parse_number(rest, line)?);
            } else {
                entries.push(parse_entry(line)?);
            }
        }

        match (total_size, total_count) {
            (Some(size), Some(count)) => Ok(Self::from_parts(entries, size, count)),
            _ => Err(FramingError::Malformed(
                "listing is missing its totals".to_string(),
            )),
        }
    }
}

fn parse_entry(line: &str) -> Result<ListingEntry, FramingError> {
    let body = line.strip_prefix('\t').unwrap_or(line);
    let (name, size) = body
        .rsplit_once(" - ")
        .ok_or_else(|| FramingError::Malformed(format!("bad listing line: {line:?}")))?;
    let size = size
        .strip_suffix(" bytes")
        .ok_or_else(|| FramingError::Malformed(format!("bad listing line: {line:?}")))?;
    Ok(ListingEntry::new(name, parse_number(size, line)?))
}

fn parse_number(value: &str, line: &str) -> Result<u32, FramingError> {
    value
        .trim()
        .parse()
        .map_err(|_| FramingError::Malformed(format!("bad number in listing line: {line:?}")))
}

impl fmt::Display for DirectoryListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
