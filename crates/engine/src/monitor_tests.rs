// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gaffer_adapters::{StreamRecord, TokenUsage};
use gaffer_core::FakeClock;
use gaffer_storage::RootLayout;
use tempfile::TempDir;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn fast_cfg() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(20),
        stall_threshold: Duration::from_secs(300),
        session_timeout: Duration::from_secs(3600),
    }
}

struct Fixture {
    _dir: TempDir,
    agents: AgentStateStore,
    clock: FakeClock,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let agents = AgentStateStore::new(RootLayout::new(dir.path()));
        agents.ensure_agent(&AgentId::new("agent-1")).unwrap();
        Self {
            _dir: dir,
            agents,
            clock: FakeClock::new(),
        }
    }

    fn monitor(&self, cfg: MonitorConfig) -> SessionMonitor<FakeClock> {
        SessionMonitor::new(
            AgentId::new("agent-1"),
            self.agents.clone(),
            self.clock.clone(),
            cfg,
        )
    }
}

fn record(event: gaffer_adapters::StreamEvent) -> StreamRecord {
    StreamRecord {
        timestamp: None,
        event,
    }
}

#[tokio::test]
async fn closed_stream_means_dead() {
    let fx = Fixture::new();
    let monitor = fx.monitor(fast_cfg());
    let (tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    drop(tx);
    let outcome = timeout(WAIT, monitor.run(rx, shutdown_rx)).await.unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::Dead);
}

#[tokio::test]
async fn session_gone_event_means_dead() {
    let fx = Fixture::new();
    let monitor = fx.monitor(fast_cfg());
    let (tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    tx.send(WatchEvent::SessionGone).await.unwrap();
    let outcome = timeout(WAIT, monitor.run(rx, shutdown_rx)).await.unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::Dead);
}

#[tokio::test]
async fn shutdown_signal_cancels() {
    let fx = Fixture::new();
    let monitor = fx.monitor(fast_cfg());
    let (_tx, rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let run = tokio::spawn(async move { monitor.run(rx, shutdown_rx).await });
    shutdown_tx.send(true).unwrap();

    let outcome = timeout(WAIT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::Cancelled);
}

#[tokio::test]
async fn stalls_when_heartbeat_goes_quiet() {
    let fx = Fixture::new();
    let monitor = fx.monitor(fast_cfg());
    let (_tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock = fx.clock.clone();

    let run = tokio::spawn(async move { monitor.run(rx, shutdown_rx).await });
    // Let the monitor record its baseline before the clock jumps.
    tokio::time::sleep(Duration::from_millis(50)).await;
    clock.advance(Duration::from_secs(301));

    let outcome = timeout(WAIT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::Stalled);
}

#[tokio::test]
async fn times_out_past_wall_clock_budget() {
    let fx = Fixture::new();
    let monitor = fx.monitor(MonitorConfig {
        poll_interval: Duration::from_millis(20),
        stall_threshold: Duration::from_secs(10_000),
        session_timeout: Duration::from_secs(3600),
    });
    let (_tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock = fx.clock.clone();

    let run = tokio::spawn(async move { monitor.run(rx, shutdown_rx).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    clock.advance(Duration::from_secs(3601));

    let outcome = timeout(WAIT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::TimedOut);
}

#[tokio::test]
async fn records_update_heartbeat_counters_and_tokens() {
    let fx = Fixture::new();
    let agent = AgentId::new("agent-1");
    let monitor = fx.monitor(fast_cfg());
    let (tx, rx) = mpsc::channel(8);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    fx.clock.set_epoch_secs(2_000_000);
    tx.send(WatchEvent::Records(vec![
        record(StreamEvent::MessageStop),
        record(StreamEvent::ToolUse {
            name: Some("Bash".into()),
        }),
        record(StreamEvent::ToolUse {
            name: Some("Bash".into()),
        }),
        record(StreamEvent::Error {
            message: Some("rate limited".into()),
        }),
        record(StreamEvent::MessageDelta {
            usage: Some(TokenUsage {
                input_tokens: 100,
                output_tokens: 25,
                ..TokenUsage::default()
            }),
        }),
    ]))
    .await
    .unwrap();
    tx.send(WatchEvent::SessionGone).await.unwrap();

    let outcome = timeout(WAIT, monitor.run(rx, shutdown_rx)).await.unwrap().unwrap();
    assert_eq!(outcome, MonitorOutcome::Dead);

    let metrics = fx.agents.read_metrics(&agent).unwrap();
    assert_eq!(metrics.session_metrics.messages, 1);
    assert_eq!(metrics.session_metrics.tool_invocations, 2);
    assert_eq!(metrics.session_metrics.errors, 1);
    assert_eq!(metrics.tool_usage.get("Bash"), Some(&2));
    assert_eq!(metrics.api_usage.input_tokens, 100);
    assert_eq!(metrics.api_usage.output_tokens, 25);

    assert_eq!(fx.agents.read_heartbeat(&agent), Some(2_000_000));

    let errors = std::fs::read_to_string(
        fx._dir.path().join("agents/agent-1/logs/errors.log"),
    )
    .unwrap();
    assert!(errors.contains("rate limited"));
}
