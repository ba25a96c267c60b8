//! ==============================================================================
//! poller.rs - snapshot poller feeding the history buffer
//! ==============================================================================
//!
//! purpose:
//!     asks the reading store for its snapshot on a fixed period and merges
//!     every answer into the dashboard's history buffer.
//!
//! scheduling:
//!
//!     ┌────────────┐  spawn per tick   ┌─────────┐
//!     │   ticker   │ ────────────────> │  fetch  │ ──┐
//!     │ (interval) │                   │  fetch  │ ──┤ (seq, result)
//!     └────────────┘                   └─────────┘   │
//!                                                    ▼
//!                                             ┌────────────┐
//!                                             │   merger   │ -> DashboardView
//!                                             └────────────┘
//!
//!     a slow request never delays the next tick. results are merged one at a
//!     time in completion order by the only writer of the view. a result that
//!     completes after a newer one still lands in history but does not
//!     replace `latest`.
//!
//! failure policy:
//!     a failed poll appends nothing. history and the last good snapshot are
//!     kept and `notice` carries a message until the next success.
//!
//! relationships:
//!     - uses: history.rs (HistoryBuffer)
//!     - uses: error.rs (PollError)
//!     - used by: main.rs (starts the poller), server.rs (reads the view)
//!
//! ==============================================================================

use crate::domain::{timestamp_ms, SensorSnapshot};
use crate::error::PollError;
use crate::history::HistoryBuffer;

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

pub const FETCH_FAILED_NOTICE: &str = "Failed to fetch sensor data. Using placeholder values.";

// ==============================================================================
// snapshot sources
// ==============================================================================

/// where the poller gets snapshots from
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<SensorSnapshot, PollError>> + Send;
}

/// GET against a reading store
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl SnapshotSource for HttpSource {
    async fn fetch(&self) -> Result<SensorSnapshot, PollError> {
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PollError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| PollError::Decode(e.to_string()))
    }
}

// ==============================================================================
// dashboard view - what the poller produces
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    /// newest snapshot received, None until the first successful poll
    pub latest: Option<SensorSnapshot>,
    /// last poll error shown to the user, cleared on success
    pub notice: Option<String>,
    /// unix timestamp (ms) of last successful poll
    pub last_update: u64,
    pub history: HistoryBuffer,
    #[serde(skip)]
    latest_seq: u64,
}

pub type SharedView = Arc<RwLock<DashboardView>>;

impl DashboardView {
    pub fn new(history: HistoryBuffer) -> Self {
        Self {
            latest: None,
            notice: None,
            last_update: 0,
            history,
            latest_seq: 0,
        }
    }

    /// snapshot for the cards: latest if any, placeholder otherwise
    pub fn current(&self) -> SensorSnapshot {
        self.latest.unwrap_or(SensorSnapshot::PLACEHOLDER)
    }

    /// merge the outcome of poll number `seq`, completed at `now_ms`
    pub fn apply(&mut self, seq: u64, result: Result<SensorSnapshot, PollError>, now_ms: u64) {
        match result {
            Ok(snapshot) => {
                self.history.record(&snapshot, now_ms);
                if seq > self.latest_seq {
                    self.latest = Some(snapshot);
                    self.latest_seq = seq;
                }
                self.notice = None;
                self.last_update = now_ms;
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "sensor poll failed");
                self.notice = Some(FETCH_FAILED_NOTICE.to_string());
            }
        }
    }
}

// ==============================================================================
// task handle
// ==============================================================================

/// background tasks that stop when the handle is stopped or dropped
pub struct TaskHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn new(tasks: Vec<JoinHandle<()>>) -> Self {
        Self { tasks }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// cancel every task, consuming the handle
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ==============================================================================
// poller
// ==============================================================================

pub struct Poller<S> {
    source: Arc<S>,
    interval: Duration,
    view: SharedView,
    show_sensor_data: bool,
}

impl<S: SnapshotSource> Poller<S> {
    pub fn new(source: S, interval: Duration, view: SharedView) -> Self {
        Self {
            source: Arc::new(source),
            interval,
            view,
            show_sensor_data: false,
        }
    }

    pub fn show_sensor_data(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    /// start ticking; the first poll fires immediately
    pub fn start(self) -> TaskHandle {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Result<SensorSnapshot, PollError>)>();

        let source = self.source;
        let period = self.interval;
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // dropping the set on abort cancels in-flight fetches
            let mut in_flight = JoinSet::new();
            let mut seq = 0u64;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        seq += 1;
                        let source = source.clone();
                        let tx = tx.clone();
                        in_flight.spawn(async move {
                            let result = source.fetch().await;
                            let _ = tx.send((seq, result));
                        });
                    }
                    Some(_) = in_flight.join_next() => {}
                }
            }
        });

        let view = self.view;
        let show = self.show_sensor_data;
        let merger = tokio::spawn(async move {
            while let Some((seq, result)) = rx.recv().await {
                if show {
                    if let Ok(s) = &result {
                        tracing::debug!(seq, snapshot = ?s, "polled snapshot");
                    }
                }
                view.write().await.apply(seq, result, timestamp_ms());
            }
        });

        TaskHandle::new(vec![ticker, merger])
    }
}
