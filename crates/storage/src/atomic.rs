// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe file writes: `target.tmp` → fsync → rename over `target`.
//!
//! Helpers here return plain `io::Result`; callers wrap failures with
//! their component code via [`gaffer_core::error::io_error`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Write `bytes` to `target` atomically.
///
/// The temp file lives in the same directory so the final rename never
/// crosses a filesystem boundary.
pub fn atomic_write(target: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(target);
    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, target)
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(target: &Path, value: &T) -> io::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    bytes.push(b'\n');
    atomic_write(target, &bytes)
}

/// Read and deserialize `target`; `Ok(None)` when the file is absent.
pub fn read_json<T: DeserializeOwned>(target: &Path) -> io::Result<Option<T>> {
    let bytes = match fs::read(target) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&bytes).map(Some).map_err(io::Error::other)
}

/// Append one JSON line to `target` in a single write, then fsync.
///
/// A whole-line write plus fsync keeps partial lines from ever being
/// observable after a crash; readers drop an unterminated final line.
pub fn append_jsonl<T: Serialize>(target: &Path, value: &T) -> io::Result<u64> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(value).map_err(io::Error::other)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(target)?;
    file.write_all(&line)?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

/// Read every complete JSON line from `target`.
///
/// Missing file reads as empty. An unterminated trailing line (crash
/// mid-append) is skipped; corrupt complete lines are reported.
pub fn read_jsonl<T: DeserializeOwned>(target: &Path) -> io::Result<Vec<T>> {
    let text = match fs::read_to_string(target) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let complete = match text.rfind('\n') {
        Some(pos) => &text[..=pos],
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for line in complete.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line).map_err(io::Error::other)?);
    }
    Ok(records)
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
