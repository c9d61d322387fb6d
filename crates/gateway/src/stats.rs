//! Counters behind `/status`, fed from the domain event bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use repobot_core::event::{DomainEvent, EventBus};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Stats {
    events_received: AtomicU64,
    events_accepted: AtomicU64,
    runs_completed: AtomicU64,
    runs_truncated: AtomicU64,
    runs_failed: AtomicU64,
    actions_executed: AtomicU64,
    action_errors: AtomicU64,
    tokens_used: AtomicU64,
}

/// Point-in-time view of [`Stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_received: u64,
    pub events_accepted: u64,
    pub runs_completed: u64,
    pub runs_truncated: u64,
    pub runs_failed: u64,
    pub actions_executed: u64,
    pub action_errors: u64,
    pub tokens_used: u64,
}

impl Stats {
    pub fn record(&self, event: &DomainEvent) {
        let bump = |counter: &AtomicU64, by: u64| {
            counter.fetch_add(by, Ordering::Relaxed);
        };
        match event {
            DomainEvent::EventReceived { accepted, .. } => {
                bump(&self.events_received, 1);
                if *accepted {
                    bump(&self.events_accepted, 1);
                }
            }
            DomainEvent::ModelResponded { tokens_used, .. } => {
                bump(&self.tokens_used, u64::from(*tokens_used));
            }
            DomainEvent::ActionExecuted { is_error, .. } => {
                bump(&self.actions_executed, 1);
                if *is_error {
                    bump(&self.action_errors, 1);
                }
            }
            DomainEvent::RunFinished { outcome, .. } => match outcome.as_str() {
                "completed" => bump(&self.runs_completed, 1),
                "truncated" => bump(&self.runs_truncated, 1),
                _ => bump(&self.runs_failed, 1),
            },
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            events_received: get(&self.events_received),
            events_accepted: get(&self.events_accepted),
            runs_completed: get(&self.runs_completed),
            runs_truncated: get(&self.runs_truncated),
            runs_failed: get(&self.runs_failed),
            actions_executed: get(&self.actions_executed),
            action_errors: get(&self.action_errors),
            tokens_used: get(&self.tokens_used),
        }
    }

    /// Keep `stats` current with everything published on `bus`.
    pub fn track(stats: Arc<Stats>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => stats.record(&event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "Status counters lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    #[serde(flatten)]
    pub counters: StatsSnapshot,
}
