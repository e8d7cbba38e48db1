//! Directory Size
//!
//! Recursive apparent-size accounting for a volume's directory tree.
//!
//! The walk runs on a dedicated producer thread that pushes one size per
//! regular file into a bounded channel; the calling thread drains and sums.
//! Dropping the sender at the end of the walk closes the channel, which is
//! what terminates the consumer.

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam::channel::{bounded, Sender};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Capacity of the size queue between the walker and the summer.
pub const SIZE_QUEUE_CAPACITY: usize = 1000;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Total apparent size in bytes of every regular file under `path`.
///
/// Entries that vanish or cannot be read during the walk contribute zero.
/// A missing or unreadable root yields zero.
pub fn total_size(path: &Path) -> u64 {
    debug!(path = %path.display(), "Computing directory size");

    let (tx, rx) = bounded::<u64>(SIZE_QUEUE_CAPACITY);
    let root = path.to_path_buf();

    let producer = thread::Builder::new()
        .name("dirsize-walk".to_string())
        .spawn(move || walk_sizes(root, tx));

    if let Err(e) = producer {
        debug!(path = %path.display(), error = %e, "Failed to spawn directory walker");
        return 0;
    }

    rx.iter().sum()
}

/// Same as [`total_size`], expressed in megabytes and rounded for display.
pub fn size_in_megabytes(path: &Path) -> f64 {
    round(total_size(path) as f64 / BYTES_PER_MEGABYTE, 0.5, 2)
}

fn walk_sizes(root: PathBuf, tx: Sender<u64>) {
    for entry in WalkDir::new(&root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                trace!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(meta) => {
                if tx.send(meta.len()).is_err() {
                    // Receiver went away; nobody is summing anymore.
                    return;
                }
            }
            Err(e) => {
                trace!(path = %entry.path().display(), error = %e, "Skipping vanished file");
            }
        }
    }
}

/// Threshold rounding to `places` decimal places.
///
/// The value is scaled by `10^places`; if the fractional remainder is at
/// least `round_on` the result is rounded up, otherwise down. A small
/// tolerance absorbs binary representation error so that e.g. `1.005`
/// (stored as `1.00499999...`) still rounds up at threshold `0.5`.
pub fn round(value: f64, round_on: f64, places: i32) -> f64 {
    const TOLERANCE: f64 = 1e-9;

    let pow = 10f64.powi(places);
    let scaled = value * pow;
    let fraction = scaled - scaled.trunc();

    let rounded = if fraction.abs() + TOLERANCE >= round_on {
        if scaled.is_sign_negative() {
            scaled.floor()
        } else {
            scaled.ceil()
        }
    } else {
        scaled.trunc()
    };

    rounded / pow
}
