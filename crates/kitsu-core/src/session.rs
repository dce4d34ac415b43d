//! Explicit timer sessions.
//!
//! A session is owned by whoever runs the timer (a request handler, a
//! terminal, a station UI). There is no process-wide "current run":
//! two operators timing two steps hold two independent sessions.

use crate::error::SessionError;
use crate::model::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A running or stopped timing of one process step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerSession {
    edge_id: String,
    operator: Option<String>,
    batch_id: Option<String>,
    started_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
    laps: Vec<DateTime<Utc>>,
}

impl TimerSession {
    /// Starts timing `edge_id` at `at`.
    pub fn start(edge_id: impl Into<String>, operator: Option<String>, at: DateTime<Utc>) -> Self {
        let edge_id = edge_id.into();
        debug!("Timer started for edge {} at {}", edge_id, at);
        Self {
            edge_id,
            operator,
            batch_id: None,
            started_at: at,
            stopped_at: None,
            laps: Vec::new(),
        }
    }

    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn edge_id(&self) -> &str {
        &self.edge_id
    }

    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Records an intermediate lap mark.
    pub fn lap(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if !self.is_running() {
            return Err(SessionError::AlreadyStopped);
        }
        if at < self.started_at {
            return Err(SessionError::StopBeforeStart);
        }
        self.laps.push(at);
        Ok(())
    }

    /// Lap lengths in seconds, measured from the previous mark.
    pub fn lap_durations(&self) -> Vec<f64> {
        let mut previous = self.started_at;
        self.laps
            .iter()
            .map(|mark| {
                let secs = (*mark - previous).num_milliseconds() as f64 / 1000.0;
                previous = *mark;
                secs
            })
            .collect()
    }

    pub fn stop(&mut self, at: DateTime<Utc>) -> Result<(), SessionError> {
        if !self.is_running() {
            return Err(SessionError::AlreadyStopped);
        }
        if at < self.started_at {
            return Err(SessionError::StopBeforeStart);
        }
        self.stopped_at = Some(at);
        Ok(())
    }

    /// Consumes a stopped session into an immutable event.
    ///
    /// The duration is recomputed from the two timestamps. Lap marks
    /// travel with the event as lap lengths.
    pub fn finish(self, event_id: Option<String>) -> Result<Event, SessionError> {
        let end = self.stopped_at.ok_or(SessionError::NotStopped)?;
        let id = event_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let duration = (end - self.started_at).num_milliseconds() as f64 / 1000.0;
        let laps = self.lap_durations();

        let mut event = Event::new(id, self.edge_id, self.started_at)
            .with_end(end)
            .with_duration(duration)
            .with_laps(laps);
        event.operator = self.operator;
        event.batch_id = self.batch_id;
        Ok(event)
    }
}
