// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId;
}

#[test]
fn define_id_roundtrip_and_display() {
    let id = TestId::new("abc-123");
    assert_eq!(id.as_str(), "abc-123");
    assert_eq!(id.to_string(), "abc-123");
    assert_eq!(id, "abc-123");

    let from_string: TestId = "xyz".into();
    assert_eq!(from_string, TestId::new("xyz"));
}

#[test]
fn define_id_serde_is_transparent_string() {
    let id = TestId::new("abc");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"abc\"");
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn short_truncates_long_ids_only() {
    let id = TestId::new("abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(20), "abcdefgh");
    assert_eq!("xy".short(8), "xy");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let idgen = UuidIdGen;
    let a = idgen.next();
    let b = idgen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn seq_gen_is_deterministic() {
    let idgen = SeqIdGen::new();
    assert_eq!(idgen.next(), "id-0");
    assert_eq!(idgen.next(), "id-1");

    let clone = idgen.clone();
    assert_eq!(clone.next(), "id-2", "clones share the counter");
}
