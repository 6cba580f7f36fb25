// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recipient address grammar.
//!
//! A recipient is a concrete agent (`rig/name`), a wildcard pattern
//! (`*/name`, `rig/*`), a role group (`role:reviewer`), or a named
//! list/queue/channel (`list:crew`, `queue:triage`, `channel:general`).

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Parsed recipient address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Concrete agent address in rig/name form.
    Agent { rig: String, name: String },
    /// `*/name`: the named agent on any rig.
    AnyRig { name: String },
    /// `rig/*`: every agent on one rig.
    AllInRig { rig: String },
    /// Role-based group.
    Role(String),
    /// Named mailing list.
    List(String),
    /// Named work queue.
    Queue(String),
    /// Named channel.
    Channel(String),
}

impl Address {
    /// Whether this address matches the concrete agent `rig/name`.
    pub fn matches(&self, rig: &str, name: &str) -> bool {
        match self {
            Address::Agent { rig: r, name: n } => r == rig && n == name,
            Address::AnyRig { name: n } => n == name,
            Address::AllInRig { rig: r } => r == rig,
            _ => false,
        }
    }

    /// Whether resolution requires a registry lookup (groups and named
    /// destinations) rather than direct matching.
    pub fn is_group(&self) -> bool {
        !matches!(self, Address::Agent { .. })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Agent { rig, name } => write!(f, "{}/{}", rig, name),
            Address::AnyRig { name } => write!(f, "*/{}", name),
            Address::AllInRig { rig } => write!(f, "{}/*", rig),
            Address::Role(role) => write!(f, "role:{}", role),
            Address::List(name) => write!(f, "list:{}", name),
            Address::Queue(name) => write!(f, "queue:{}", name),
            Address::Channel(name) => write!(f, "channel:{}", name),
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid(s, "address is empty"));
        }
        if let Some(role) = s.strip_prefix("role:") {
            return named(role, s, "role").map(Address::Role);
        }
        if let Some(name) = s.strip_prefix("list:") {
            return named(name, s, "list").map(Address::List);
        }
        if let Some(name) = s.strip_prefix("queue:") {
            return named(name, s, "queue").map(Address::Queue);
        }
        if let Some(name) = s.strip_prefix("channel:") {
            return named(name, s, "channel").map(Address::Channel);
        }
        match s.split_once('/') {
            Some(("*", "*")) => Err(invalid(s, "at most one wildcard segment is allowed")),
            Some(("*", name)) => Ok(Address::AnyRig {
                name: segment(name, s)?,
            }),
            Some((rig, "*")) => Ok(Address::AllInRig {
                rig: segment(rig, s)?,
            }),
            Some((rig, name)) => Ok(Address::Agent {
                rig: segment(rig, s)?,
                name: segment(name, s)?,
            }),
            None => Err(invalid(s, "expected rig/name form")
                .with_hint("use rig/name, */name, rig/*, or a role:/list:/queue:/channel: prefix")),
        }
    }
}

fn named(value: &str, raw: &str, kind: &str) -> Result<String> {
    if value.is_empty() {
        return Err(invalid(raw, format!("{} name is empty", kind)));
    }
    Ok(value.to_string())
}

fn segment(value: &str, raw: &str) -> Result<String> {
    if value.is_empty() {
        return Err(invalid(raw, "address segment is empty"));
    }
    if value.contains('*') {
        return Err(invalid(raw, "wildcard must be a whole segment"));
    }
    Ok(value.to_string())
}

fn invalid(raw: &str, message: impl Into<String>) -> Error {
    Error::user("mail.InvalidFormat", message).with_context("address", raw)
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;
