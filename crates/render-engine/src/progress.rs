//! Render progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use podreel_common::error::{PodreelError, PodreelResult};

/// Coarse phases of a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    /// Rendering one clip per segment and gap.
    Generation,
    /// Concatenation, BGM mix and final encode.
    Assembly,
    /// Publishing the result. Reported by callers outside the engine.
    Upload,
}

impl RenderPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Assembly => "assembly",
            Self::Upload => "upload",
        }
    }

    fn slot(&self) -> usize {
        match self {
            Self::Generation => 0,
            Self::Assembly => 1,
            Self::Upload => 2,
        }
    }
}

/// Progress callback: phase and fraction in `[0, 1]`.
pub type ProgressCallback = Box<dyn Fn(RenderPhase, f64) + Send + Sync>;

/// Forwards progress to a callback, never letting a phase go backwards.
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: Mutex<[f64; 3]>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: Mutex::new([0.0; 3]),
        }
    }

    /// A reporter that drops every update.
    pub fn silent() -> Self {
        Self::new(None)
    }

    /// Report `fraction` for `phase`. Values below the last report are raised.
    pub fn report(&self, phase: RenderPhase, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let value = match self.last.lock() {
            Ok(mut last) => {
                let slot = &mut last[phase.slot()];
                *slot = slot.max(fraction);
                *slot
            }
            Err(_) => fraction,
        };
        if let Some(callback) = &self.callback {
            callback(phase, value);
        }
    }

    /// Scope covering the whole of `phase`.
    pub fn scope(&self, phase: RenderPhase) -> ProgressScope<'_> {
        ProgressScope {
            reporter: self,
            phase,
            start: 0.0,
            end: 1.0,
        }
    }
}

/// A sub-range of one phase.
///
/// Nested steps get disjoint sub-ranges through [`ProgressScope::sub`], so a
/// step only ever reports its own local `0..1` fraction.
#[derive(Clone, Copy)]
pub struct ProgressScope<'a> {
    reporter: &'a ProgressReporter,
    phase: RenderPhase,
    start: f64,
    end: f64,
}

impl<'a> ProgressScope<'a> {
    /// Report a local fraction of this scope.
    pub fn report(&self, fraction: f64) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.reporter
            .report(self.phase, self.start + (self.end - self.start) * fraction);
    }

    /// The part of this scope between local fractions `from` and `to`.
    pub fn sub(&self, from: f64, to: f64) -> ProgressScope<'a> {
        let from = from.clamp(0.0, 1.0);
        let to = to.clamp(from, 1.0);
        let span = self.end - self.start;
        ProgressScope {
            reporter: self.reporter,
            phase: self.phase,
            start: self.start + span * from,
            end: self.start + span * to,
        }
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    pub fn finish(&self) {
        self.report(1.0);
    }
}

/// Shared flag asking a running render to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> PodreelResult<()> {
        if self.is_cancelled() {
            Err(PodreelError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (ProgressReporter, Arc<Mutex<Vec<(RenderPhase, f64)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Some(Box::new(move |phase, value| {
            sink.lock().unwrap().push((phase, value));
        })));
        (reporter, seen)
    }

    #[test]
    fn test_reports_are_monotonic_per_phase() {
        let (reporter, seen) = recording();
        reporter.report(RenderPhase::Assembly, 0.5);
        reporter.report(RenderPhase::Assembly, 0.2);
        reporter.report(RenderPhase::Generation, 0.1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[1], (RenderPhase::Assembly, 0.5));
        assert_eq!(seen[2], (RenderPhase::Generation, 0.1));
    }

    #[test]
    fn test_nested_scopes_map_into_parent_range() {
        let (reporter, seen) = recording();
        let assembly = reporter.scope(RenderPhase::Assembly);
        let concat = assembly.sub(0.0, 0.6);
        let merge = concat.sub(0.8, 1.0);
        let (start, end) = merge.bounds();
        assert!((start - 0.48).abs() < 1e-9 && (end - 0.6).abs() < 1e-9);
        merge.report(0.5);
        let value = seen.lock().unwrap()[0].1;
        assert!((value - 0.54).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_fractions_are_clamped() {
        let (reporter, seen) = recording();
        let scope = reporter.scope(RenderPhase::Generation).sub(0.2, 0.4);
        scope.report(7.0);
        scope.report(f64::NAN);
        let seen = seen.lock().unwrap();
        assert!((seen[0].1 - 0.4).abs() < 1e-9);
        assert!((seen[1].1 - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RenderPhase::Generation).unwrap(),
            "\"generation\""
        );
        assert_eq!(RenderPhase::Upload.as_str(), "upload");
    }
}
