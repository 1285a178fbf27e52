use std::sync::{Arc, Mutex};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLogEventKind {
    SessionStarted,
    TickAdvanced,
    ActionApplied,
    ActionRejected,
    TradeClosed,
    SessionStopped,
    TradesExported,
}

impl RunLogEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::TickAdvanced => "tick_advanced",
            Self::ActionApplied => "action_applied",
            Self::ActionRejected => "action_rejected",
            Self::TradeClosed => "trade_closed",
            Self::SessionStopped => "session_stopped",
            Self::TradesExported => "trades_exported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogEvent {
    pub tick: u64,
    pub kind: RunLogEventKind,
    pub detail: String,
}

impl RunLogEvent {
    pub fn new(tick: u64, kind: RunLogEventKind, detail: impl Into<String>) -> Self {
        Self {
            tick,
            kind,
            detail: detail.into(),
        }
    }
}

pub trait RunLogWriter {
    fn write(&mut self, event: RunLogEvent);
}

#[derive(Debug, Default)]
pub struct InMemoryRunLogWriter {
    events: Vec<RunLogEvent>,
}

impl InMemoryRunLogWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RunLogEvent] {
        &self.events
    }

    pub fn kinds(&self) -> Vec<RunLogEventKind> {
        self.events.iter().map(|event| event.kind).collect()
    }
}

impl RunLogWriter for InMemoryRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        self.events.push(event);
    }
}

/// Forwards run-log events to `tracing`. Ticks are debug-level so a
/// default `info` filter only shows operator activity.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunLogWriter;

impl RunLogWriter for TracingRunLogWriter {
    fn write(&mut self, event: RunLogEvent) {
        let kind = event.kind.as_str();
        match event.kind {
            RunLogEventKind::TickAdvanced => {
                tracing::debug!(tick = event.tick, kind, "{}", event.detail)
            }
            RunLogEventKind::ActionRejected => {
                tracing::warn!(tick = event.tick, kind, "{}", event.detail)
            }
            _ => tracing::info!(tick = event.tick, kind, "{}", event.detail),
        }
    }
}

/// Shares one writer between the session task and its owner, so tests can
/// inspect what a running session logged.
#[derive(Debug, Default)]
pub struct SharedRunLogWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for SharedRunLogWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: RunLogWriter> SharedRunLogWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        let guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }
}

impl<W: RunLogWriter> RunLogWriter for SharedRunLogWriter<W> {
    fn write(&mut self, event: RunLogEvent) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.write(event);
    }
}
