use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use common::{AlertSink, JobKind, MoverEvent};

/// Forwards every publish call to each inner sink, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl AlertSink for FanoutSink {
    async fn on_mover_events(&self, job: JobKind, events: &[MoverEvent]) {
        for sink in &self.sinks {
            sink.on_mover_events(job, events).await;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedMover {
    pub job: JobKind,
    #[serde(flatten)]
    pub event: MoverEvent,
}

/// Bounded in-memory history of published movers, newest last.
#[derive(Clone)]
pub struct MoverLog {
    capacity: usize,
    entries: Arc<RwLock<VecDeque<LoggedMover>>>,
}

impl MoverLog {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Up to `limit` most recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<LoggedMover> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MoverLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl AlertSink for MoverLog {
    async fn on_mover_events(&self, job: JobKind, events: &[MoverEvent]) {
        let mut entries = self.entries.write().await;
        for event in events {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(LoggedMover {
                job,
                event: event.clone(),
            });
        }
    }
}
