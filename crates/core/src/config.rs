// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration.
//!
//! Loaded from `<root>/config.json`; every field has a default so a missing
//! file yields a fully usable configuration. Duration-valued keys accept
//! either plain seconds (`120`) or a suffixed string (`"2m"`).

use crate::error::{Error, Result};
use crate::retry::RetryConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// Parse a duration string like "30s", "5m", "1h" into a Duration.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, suffix) = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| (&s[..i], &s[i..]))
        .unwrap_or((s, ""));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier = match suffix.trim() {
        "ms" | "millis" | "milliseconds" => {
            return Ok(Duration::from_millis(num));
        }
        "" | "s" | "sec" | "secs" | "seconds" => 1,
        "m" | "min" | "mins" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(format!("unknown duration suffix: {}", other)),
    };

    Ok(Duration::from_secs(num * multiplier))
}

/// Seconds-valued config field accepting `120` or `"2m"`.
fn duration_secs<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Secs(n) => Ok(n),
        Raw::Text(s) => parse_duration(&s)
            .map(|d| d.as_secs())
            .map_err(serde::de::Error::custom),
    }
}

/// Mail orchestrator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Backlog scan cadence for the inbound loop, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub poll_interval: u64,
    /// Minimum wait before a failed delivery re-enters inbound, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub retry_delay: u64,
    /// Attempts before a message moves to dead-letter.
    pub max_retries: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: 30,
            retry_delay: 60,
            max_retries: 3,
        }
    }
}

/// Cross-process lock tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Acquisition timeout, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub default_timeout: u64,
    /// Age past which a lock with a dead PID may be stolen, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub stale_age: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout: 30,
            stale_age: 300,
        }
    }
}

/// Named retry profiles, each overridable from config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryProfiles {
    pub network: RetryConfig,
    pub file_io: RetryConfig,
    pub database: RetryConfig,
    pub default: RetryConfig,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            network: RetryConfig::network(),
            file_io: RetryConfig::file_io(),
            database: RetryConfig::database(),
            default: RetryConfig::default(),
        }
    }
}

/// Full coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target agent pool size.
    pub parallel_agents: usize,
    /// Delay between successive agent spawns, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub agent_startup_stagger: u64,
    /// Monitor/heartbeat evaluation cadence, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub heartbeat_interval: u64,
    /// Heartbeat freshness bound, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub heartbeat_timeout: u64,
    /// Claim age past which an unhealthy owner's claim is reclaimable, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub stale_work_timeout: u64,
    /// Wall-clock cap on one session, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub session_timeout: u64,
    /// No-heartbeat window after which a session counts as stalled, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub stall_threshold: u64,
    /// Bounded wait for an agent to appear running after spawn, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub session_startup_wait: u64,
    /// Command-hook execution timeout, seconds.
    #[serde(deserialize_with = "duration_secs")]
    pub hook_timeout: u64,
    /// Consecutive failures before an agent is not replaced.
    pub max_agent_failures: u32,
    pub orchestrator: OrchestratorConfig,
    pub lock: LockConfig,
    pub retry: RetryProfiles,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_agents: 3,
            agent_startup_stagger: 5,
            heartbeat_interval: 10,
            heartbeat_timeout: 120,
            stale_work_timeout: 7200,
            session_timeout: 3600,
            stall_threshold: 300,
            session_startup_wait: 10,
            hook_timeout: 30,
            max_agent_failures: 3,
            orchestrator: OrchestratorConfig::default(),
            lock: LockConfig::default(),
            retry: RetryProfiles::default(),
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields defaults, malformed JSON is
    /// a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::system("config.IO", e.to_string())
                    .with_context("path", path.display())
                    .with_cause(e));
            }
        };
        serde_json::from_str(&text).map_err(|e| {
            Error::user("config.Invalid", e.to_string())
                .with_context("path", path.display())
                .with_hint("fix the JSON syntax or delete the file to use defaults")
                .with_cause(e)
        })
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout)
    }

    pub fn stale_work_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_work_timeout)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold)
    }

    pub fn session_startup_wait(&self) -> Duration {
        Duration::from_secs(self.session_startup_wait)
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout)
    }

    pub fn agent_startup_stagger(&self) -> Duration {
        Duration::from_secs(self.agent_startup_stagger)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
