// THEORY:
// The `stats` module is the append-only measurement record of a session: one
// `(timestamp, roi name, mean, std, median)` entry per region per processed
// camera frame. Insertion order is timestamp order because entries are only
// ever produced inside the per-frame transaction.
//
// Key architectural principles:
// 1.  **Append-Only**: Entries are never mutated or dropped for the lifetime
//     of a run; the log is the raw material for both the live plot and the
//     trace export.
// 2.  **Reverse-Scan Reads**: The plot needs only the two most recent entries
//     for one region. Lookups walk backwards from the tail and stop early
//     instead of rescanning the whole log every refresh.
// 3.  **Plain Statistics**: Mean, population standard deviation and median
//     (middle-pair average for even counts) over raw channel bytes. An empty
//     region records zeros so downstream consumers stay finite.

use tracing::trace;

/// Which statistic of a region the plot displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiStatistic {
    Mean,
    Median,
    StdDev,
}

/// One measurement of one region on one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsLogEntry {
    /// Capture time in seconds.
    pub timestamp: f64,
    pub roi_name: String,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

impl StatsLogEntry {
    pub fn statistic(&self, kind: RoiStatistic) -> f64 {
        match kind {
            RoiStatistic::Mean => self.mean,
            RoiStatistic::Median => self.median,
            RoiStatistic::StdDev => self.std_dev,
        }
    }
}

/// Computes (mean, population std, median) over raw sample bytes.
pub fn region_statistics(values: &[u8]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let count = values.len() as f64;
    let sum: f64 = values.iter().map(|v| *v as f64).sum();
    let mean = sum / count;
    let variance = values
        .iter()
        .map(|v| (*v as f64 - mean).powi(2))
        .sum::<f64>()
        / count;

    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    };

    (mean, variance.sqrt(), median)
}

/// Append-only time series of region statistics.
pub struct StatsLogger {
    entries: Vec<StatsLogEntry>,
}

impl StatsLogger {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[StatsLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Computes and appends the statistics of one region's samples.
    pub fn log_region(&mut self, timestamp: f64, roi_name: &str, values: &[u8]) {
        let (mean, std_dev, median) = region_statistics(values);
        trace!(roi = roi_name, mean, std_dev, median, "roi statistics");
        self.entries.push(StatsLogEntry {
            timestamp,
            roi_name: roi_name.to_string(),
            mean,
            std_dev,
            median,
        });
    }

    /// The two most recent entries for `roi_name`, oldest first, provided at
    /// least three matching entries exist (the plot refuses to draw from a
    /// shorter history). Walks backwards and stops as soon as it has seen
    /// three matches.
    pub fn latest_pair(&self, roi_name: &str) -> Option<(&StatsLogEntry, &StatsLogEntry)> {
        let mut found: [Option<&StatsLogEntry>; 2] = [None, None];
        let mut matches = 0usize;
        for entry in self.entries.iter().rev() {
            if entry.roi_name == roi_name {
                match matches {
                    0 => found[1] = Some(entry),
                    1 => found[0] = Some(entry),
                    _ => return Some((found[0]?, found[1]?)),
                }
                matches += 1;
            }
        }
        None
    }

    /// One plain-text line per entry, for the trace export.
    pub fn export_lines(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&format!(
                "{:.6} : {} : {:.4} : {:.4} : {:.4}\n",
                entry.timestamp, entry.roi_name, entry.mean, entry.std_dev, entry.median
            ));
        }
        out
    }
}

impl Default for StatsLogger {
    fn default() -> Self {
        Self::new()
    }
}
