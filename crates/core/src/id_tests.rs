// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct ProbeId;
}

#[test]
fn short_truncates_long_ids() {
    let id = ProbeId::new("abcdef123456");
    assert_eq!(id.short(6), "abcdef");
}

#[test]
fn short_returns_whole_id_when_small() {
    let id = ProbeId::new("abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn display_and_as_str_agree() {
    let id = ProbeId::new("task-42");
    assert_eq!(format!("{}", id), "task-42");
    assert_eq!(id.as_str(), "task-42");
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
fn sequential_gen_counts_up() {
    let idgen = SequentialIdGen::new("t");
    assert_eq!(idgen.next(), "t-1");
    assert_eq!(idgen.next(), "t-2");
    let cloned = idgen.clone();
    assert_eq!(cloned.next(), "t-3");
}
