// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Category-aware retry wrapper with exponential backoff.
//!
//! Only [`Category::Transient`](crate::Category::Transient) errors are
//! retried; everything else surfaces immediately. The cancelable variant
//! gives up between attempts when the shutdown signal flips.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

/// Backoff schedule for one retry profile.
///
/// `delay_n = min(initial * multiplier^n, max)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl RetryConfig {
    /// Network calls: 5 attempts, 500ms → 30s.
    pub fn network() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }

    /// Local file I/O: 3 attempts, 50ms → 2s.
    pub fn file_io() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }

    /// Issue-database queries: 4 attempts, 100ms → 5s.
    pub fn database() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            multiplier: 2.0,
        }
    }

    /// Delay before the attempt following attempt number `n` (0-based).
    pub fn delay_after(&self, n: u32) -> Duration {
        let exp = self.multiplier.powi(n as i32);
        let ms = (self.initial_delay_ms as f64 * exp).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

impl Default for RetryConfig {
    /// Default profile: 3 attempts, 100ms → 10s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

/// Invoke `op`, retrying Transient failures per `cfg`.
pub async fn with_retry<T, Fut, F>(cfg: &RetryConfig, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_inner(cfg, None, op, Error::is_retryable).await
}

/// Like [`with_retry`] but gives up between attempts once `cancel` flips true.
pub async fn with_retry_cancelable<T, Fut, F>(
    cfg: &RetryConfig,
    cancel: watch::Receiver<bool>,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    retry_inner(cfg, Some(cancel), op, Error::is_retryable).await
}

/// Full-control variant with a custom retry predicate.
pub async fn with_retry_if<T, Fut, F, P>(cfg: &RetryConfig, op: F, should_retry: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    retry_inner(cfg, None, op, should_retry).await
}

async fn retry_inner<T, Fut, F, P>(
    cfg: &RetryConfig,
    mut cancel: Option<watch::Receiver<bool>>,
    mut op: F,
    should_retry: P,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !should_retry(&err) || attempt >= cfg.max_attempts {
                    return Err(err.with_context("attempts", attempt));
                }
                let delay = cfg.delay_after(attempt - 1);
                tracing::warn!(
                    code = err.code(),
                    attempt,
                    max_attempts = cfg.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                );
                if let Some(rx) = cancel.as_mut() {
                    if *rx.borrow() {
                        return Err(cancelled(attempt).with_cause(err));
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = rx.changed() => {
                            if *rx.borrow() {
                                return Err(cancelled(attempt).with_cause(err));
                            }
                        }
                    }
                } else {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn cancelled(attempt: u32) -> Error {
    Error::permanent("retry.Cancelled", "retry abandoned on shutdown signal")
        .with_context("attempts", attempt)
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
