// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental parsing of the agent's line-delimited event stream.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Token usage payload carried by `message_delta` records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// One record from the event stream, discriminated by its `type` field.
///
/// Unrecognized types parse as `Unknown` so a newer agent binary never
/// breaks the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart,
    MessageStop,
    ContentBlockDelta,
    ToolUse {
        #[serde(default)]
        name: Option<String>,
    },
    ToolResult {
        #[serde(default)]
        is_error: Option<bool>,
    },
    MessageDelta {
        #[serde(default)]
        usage: Option<TokenUsage>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Event plus its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub event: StreamEvent,
}

/// Parse new records from a JSONL stream log starting at the given byte
/// offset. Returns the records plus the offset to resume from.
///
/// An incomplete final line (no trailing newline) is left unconsumed so
/// the next call re-reads it once the writer finishes it. Unparseable
/// complete lines are skipped with a warning rather than wedging the tail.
pub fn parse_records_from(path: &Path, offset: u64) -> (Vec<StreamRecord>, u64) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return (Vec::new(), offset),
    };

    let mut reader = BufReader::new(file);
    if reader.seek(SeekFrom::Start(offset)).is_err() {
        return (Vec::new(), offset);
    }

    let mut records = Vec::new();
    let mut current_offset = offset;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(n) => {
                if !line.ends_with('\n') {
                    // Incomplete line; don't advance, re-read next time.
                    break;
                }
                current_offset += n as u64;

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<StreamRecord>(trimmed) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(error = %e, "unparseable stream record, skipping");
                    }
                }
            }
            Err(_) => break,
        }
    }

    (records, current_offset)
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
