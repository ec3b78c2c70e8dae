//! Roster files: ordered handle lists, one per line.
//!
//! Filtering happens here, before anything reaches the engine: blank lines
//! and `#` comments are dropped silently, a leading `@` is stripped, and
//! handles shorter than three characters are rejected with a per-line
//! warning. The engine only ever sees valid targets.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::types::Target;

/// Minimum accepted handle length after stripping the `@` prefix.
pub const MIN_HANDLE_LEN: usize = 3;

/// Roster file failures.
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// The file could not be read.
    #[error("failed to read roster {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// A filtered roster ready for the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    /// Valid targets, in input order.
    pub targets: Vec<Target>,
    /// Blank and `#`-comment lines dropped.
    pub ignored_lines: u32,
    /// Non-blank lines rejected as invalid handles.
    pub rejected_lines: u32,
}

/// Load and filter a roster file.
///
/// # Errors
///
/// Returns [`RosterError::Io`] when the file cannot be read.
pub fn load_roster(path: &Path) -> Result<Roster, RosterError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RosterError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_roster(&contents))
}

/// Filter roster text into targets. Pure; see the module docs for the rules.
pub fn parse_roster(contents: &str) -> Roster {
    let mut roster = Roster::default();
    for (line_no, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            roster.ignored_lines = roster.ignored_lines.saturating_add(1);
            continue;
        }
        let handle = line.trim_start_matches('@').trim();
        if handle.len() >= MIN_HANDLE_LEN {
            roster.targets.push(Target::new(handle));
        } else {
            warn!(
                line = line_no.saturating_add(1),
                content = raw,
                "skipping invalid handle"
            );
            roster.rejected_lines = roster.rejected_lines.saturating_add(1);
        }
    }
    roster
}
