// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured error type shared across all components.
//!
//! Every fallible operation returns an [`Error`] carrying a stable dotted
//! code (`queue.Claim`, `mailbox.MessageNotFound`), a [`Category`] driving
//! retry and surfacing policy, a flat context map, an actionable hint, and
//! an optional chained cause. Adapter crates keep their own small error
//! enums and wrap them at the component boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error category driving retry and surfacing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Retryable: lock timeouts, I/O busy, network blips.
    Transient,
    /// Will not succeed on retry: not-found, invalid reference.
    Permanent,
    /// Requires user action: bad input, conflict, uncommitted changes.
    User,
    /// Environmental: permissions, missing binaries, disk full.
    System,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Transient => write!(f, "transient"),
            Category::Permanent => write!(f, "permanent"),
            Category::User => write!(f, "user"),
            Category::System => write!(f, "system"),
        }
    }
}

/// Structured error value.
///
/// Context keys are kept sorted (BTreeMap) so rendered output is stable.
#[derive(Debug)]
pub struct Error {
    code: String,
    category: Category,
    message: String,
    context: BTreeMap<String, String>,
    hint: Option<String>,
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(code: impl Into<String>, category: Category, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            category,
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
            cause: None,
        }
    }

    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Category::Transient, message)
    }

    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Category::Permanent, message)
    }

    pub fn user(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Category::User, message)
    }

    pub fn system(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, Category::System, message)
    }

    /// Attach a diagnostic key/value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Attach a human-actionable recovery suggestion.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a chained lower-level cause.
    #[must_use]
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Whether the retry wrapper should attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        self.category == Category::Transient
    }

    /// Full user-visible rendering: `<code>: <message>` followed by
    /// `Context:` and `Hint:` blocks when present.
    pub fn render(&self) -> String {
        let mut out = format!("{}: {}", self.code, self.message);
        if !self.context.is_empty() {
            out.push_str("\nContext:");
            for (key, value) in &self.context {
                out.push_str(&format!("\n  {}: {}", key, value));
            }
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\nHint: {}", hint));
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Wrap an I/O error with a code and path context.
///
/// I/O failures default to Transient; permission and not-found errors are
/// mapped to their proper categories.
pub fn io_error(code: &str, path: &std::path::Path, err: std::io::Error) -> Error {
    let category = match err.kind() {
        std::io::ErrorKind::PermissionDenied => Category::System,
        std::io::ErrorKind::NotFound => Category::Permanent,
        std::io::ErrorKind::StorageFull => Category::System,
        _ => Category::Transient,
    };
    Error::new(code, category, err.to_string())
        .with_context("path", path.display())
        .with_cause(err)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
