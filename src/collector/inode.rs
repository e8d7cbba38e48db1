//! Inode statistics
//!
//! Inode counts are read by running `df --output=itotal,iused,iavail,ipcent`
//! against the volume path and parsing the data row of its report.

use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Data row of the report: three counts and a percentage.
static INODE_ROW_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s+(\d+)\s+(\d+)\s+(\d+)%").expect("Invalid inode row regex")
});

const DF_COMMAND: &str = "df";
const DF_OUTPUT_COLUMNS: &str = "--output=itotal,iused,iavail,ipcent";

/// Inode usage of the filesystem containing a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InodeStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent_used: u8,
}

/// Run `df` for `path` and parse its inode report.
pub fn inode_stats(path: &Path) -> Result<InodeStats> {
    debug!(path = %path.display(), "Reading inode statistics");

    let output = Command::new(DF_COMMAND)
        .arg(DF_OUTPUT_COLUMNS)
        .arg(path)
        .output()
        .map_err(|e| Error::CommandFailed {
            command: DF_COMMAND.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: DF_COMMAND.to_string(),
            reason: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    trace!(output = %stdout, "df output");
    parse_inode_stats(&stdout)
}

/// Parse the first `<total> <used> <available> <percent>%` row in `output`.
pub fn parse_inode_stats(output: &str) -> Result<InodeStats> {
    let caps = INODE_ROW_REGEX
        .captures(output)
        .ok_or_else(|| Error::InodeParse(format!("no inode row in {:?}", output.trim())))?;

    let field = |idx: usize| -> Result<u64> {
        let raw = &caps[idx];
        raw.parse::<u64>()
            .map_err(|e| Error::InodeParse(format!("field {} ({:?}): {}", idx, raw, e)))
    };

    let percent = field(4)?;
    let percent_used = u8::try_from(percent)
        .map_err(|_| Error::InodeParse(format!("percentage out of range: {}", percent)))?;

    Ok(InodeStats {
        total: field(1)?,
        used: field(2)?,
        available: field(3)?,
        percent_used,
    })
}
