// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Doc {
    name: String,
    value: u64,
}

#[test]
fn atomic_write_creates_parents_and_leaves_no_tmp() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested/deep/file.json");

    atomic_write(&target, b"hello").unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"hello");
    assert!(!target.with_file_name("file.json.tmp").exists());
}

#[test]
fn atomic_write_replaces_existing_content_entirely() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("file.json");

    atomic_write(&target, b"a long first version").unwrap();
    atomic_write(&target, b"v2").unwrap();

    assert_eq!(fs::read(&target).unwrap(), b"v2");
}

#[test]
fn json_roundtrip() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("doc.json");
    let doc = Doc {
        name: "x".into(),
        value: 42,
    };

    write_json(&target, &doc).unwrap();
    let back: Option<Doc> = read_json(&target).unwrap();
    assert_eq!(back, Some(doc));
}

#[test]
fn read_json_missing_file_is_none() {
    let dir = TempDir::new().unwrap();
    let back: Option<Doc> = read_json(&dir.path().join("absent.json")).unwrap();
    assert!(back.is_none());
}

#[test]
fn read_json_corrupt_file_is_error() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("bad.json");
    fs::write(&target, "{truncated").unwrap();
    let result: io::Result<Option<Doc>> = read_json(&target);
    assert!(result.is_err());
}

#[test]
fn jsonl_append_and_read_in_order() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("log.jsonl");

    for value in 0..3 {
        append_jsonl(
            &target,
            &Doc {
                name: "n".into(),
                value,
            },
        )
        .unwrap();
    }

    let records: Vec<Doc> = read_jsonl(&target).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].value, 0);
    assert_eq!(records[2].value, 2);
}

#[test]
fn jsonl_append_returns_growing_offsets() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("log.jsonl");

    let first = append_jsonl(&target, &Doc { name: "a".into(), value: 1 }).unwrap();
    let second = append_jsonl(&target, &Doc { name: "b".into(), value: 2 }).unwrap();
    assert!(second > first);
    assert_eq!(second, fs::metadata(&target).unwrap().len());
}

#[test]
fn jsonl_reader_drops_unterminated_trailing_line() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("log.jsonl");

    append_jsonl(&target, &Doc { name: "a".into(), value: 1 }).unwrap();
    // Simulate a crash mid-append: partial line, no trailing newline.
    let mut existing = fs::read(&target).unwrap();
    existing.extend_from_slice(b"{\"name\":\"b\",\"val");
    fs::write(&target, existing).unwrap();

    let records: Vec<Doc> = read_jsonl(&target).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, 1);
}

#[test]
fn jsonl_missing_file_reads_empty() {
    let dir = TempDir::new().unwrap();
    let records: Vec<Doc> = read_jsonl(&dir.path().join("absent.jsonl")).unwrap();
    assert!(records.is_empty());
}
