//! Timing utilities for render sessions.
//!
//! Every render is identified by a [`SessionToken`] that is embedded in all
//! of its scratch filenames, so two renders sharing a work directory never
//! collide. [`StageTimer`] logs how long each pipeline stage took.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for one render invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a token from wall-clock millis, the process id, and a
    /// process-local sequence number.
    pub fn new() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{millis}-{}-{seq}", std::process::id()))
    }

    /// Build a token from a known string (tests, resumed sessions).
    pub fn from_string(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measures one pipeline stage and logs its duration when finished.
#[derive(Debug)]
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    pub fn start(stage: &'static str) -> Self {
        tracing::debug!(stage, "Stage started");
        Self {
            stage,
            started: Instant::now(),
        }
    }

    /// Seconds elapsed since the stage started.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Log the elapsed time and return it in milliseconds.
    pub fn finish(self) -> u128 {
        let elapsed_ms = self.started.elapsed().as_millis();
        tracing::info!(stage = self.stage, elapsed_ms, "Stage finished");
        elapsed_ms
    }
}

/// Milliseconds since the Unix epoch, used for fallback output names.
pub fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
