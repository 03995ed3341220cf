//! Packet-arrival traces in JSON-lines form.
//!
//! Each non-blank line that does not start with `#` holds one arrival:
//!
//! ```text
//! {"at": 0.001, "bytes": 1500, "sender": 3, "tag": "AllReduce", "kind": 7}
//! ```
//!
//! Only `at` (seconds) and `bytes` are required; every other field maps onto
//! [`Packet`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Packet, SimTime};

/// One scheduled arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Arrival time.
    pub at: SimTime,
    #[serde(flatten)]
    pub packet: Packet,
}

/// Parse a trace from any buffered reader.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let record: TraceRecord = serde_json::from_str(trimmed).map_err(|e| Error::Trace {
            line: idx + 1,
            reason: e.to_string(),
        })?;

        if !record.at.as_secs().is_finite() || record.at.as_secs() < 0.0 {
            return Err(Error::Trace {
                line: idx + 1,
                reason: format!("arrival time must be a non-negative number, got {}", record.at),
            });
        }

        records.push(record);
    }

    Ok(records)
}

/// Load a trace file.
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceRecord>> {
    let file = File::open(path.as_ref())?;
    parse_trace(BufReader::new(file))
}

/// Latest arrival time in `records`.
pub fn last_arrival(records: &[TraceRecord]) -> Option<SimTime> {
    records.iter().map(|r| r.at).max()
}
