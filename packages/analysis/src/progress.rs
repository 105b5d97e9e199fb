//! Progress reporting for analysis runs.
//!
//! Defines a [`ProgressSink`] trait that decouples progress reporting
//! from any specific rendering backend (e.g., `indicatif` progress bars,
//! UI status lines, or silence). Implementations are provided upstream in
//! crates that choose a rendering strategy.

/// Receives `(percent, message)` updates from long-running operations.
///
/// Percentages handed to a sink are always within `[0, 100]`.
pub trait ProgressSink: Send + Sync {
    /// Reports overall completion and a human-readable status message.
    fn report(&self, percent: f64, message: &str);
}

/// A no-op implementation of [`ProgressSink`] that silently ignores all
/// progress updates.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _percent: f64, _message: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(f64, &str) + Send + Sync,
{
    fn report(&self, percent: f64, message: &str) {
        self(percent, message);
    }
}

/// Maps `[0, 100]` onto a sub-range of another sink, so that one area's
/// run can occupy its slice of a multi-area progress bar.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: f64,
    end: f64,
}

impl<'a> ScaledProgress<'a> {
    /// Creates a sink reporting into `[start, end]` of `inner`.
    #[must_use]
    pub fn new(inner: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        let start = clamp_percent(start);
        Self {
            inner,
            start,
            end: clamp_percent(end).max(start),
        }
    }
}

impl ProgressSink for ScaledProgress<'_> {
    fn report(&self, percent: f64, message: &str) {
        let scaled = (self.end - self.start).mul_add(clamp_percent(percent) / 100.0, self.start);
        self.inner.report(scaled, message);
    }
}

/// Clamps a percentage into `[0, 100]`; NaN becomes zero.
#[must_use]
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

/// Reports through `sink` with the percentage clamped.
pub fn emit(sink: &dyn ProgressSink, percent: f64, message: &str) {
    sink.report(clamp_percent(percent), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn clamps_out_of_range_values() {
        let seen = Mutex::new(Vec::new());
        let sink = |percent: f64, _: &str| seen.lock().unwrap().push(percent);

        emit(&sink, -5.0, "low");
        emit(&sink, 250.0, "high");
        emit(&sink, f64::NAN, "nan");
        emit(&sink, 42.0, "mid");

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 100.0, 0.0, 42.0]);
    }

    #[test]
    fn scaled_progress_maps_into_sub_range() {
        let seen = Mutex::new(Vec::new());
        let sink = |percent: f64, message: &str| {
            seen.lock().unwrap().push((percent, message.to_string()));
        };

        let scaled = ScaledProgress::new(&sink, 50.0, 75.0);
        scaled.report(0.0, "start");
        scaled.report(100.0, "end");
        scaled.report(200.0, "over");

        let seen = seen.lock().unwrap();
        assert!((seen[0].0 - 50.0).abs() < 1e-9);
        assert!((seen[1].0 - 75.0).abs() < 1e-9);
        assert!((seen[2].0 - 75.0).abs() < 1e-9);
        assert_eq!(seen[1].1, "end");
    }

    #[test]
    fn null_progress_accepts_anything() {
        emit(&NullProgress, 10.0, "ignored");
    }
}
