//! Metric capture backed by `metrics_util::debugging::DebuggingRecorder`.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// A local recorder plus a snapshotter reading what it recorded.
///
/// Recording is thread-local: spawn work on a current-thread runtime inside
/// [`record`](Self::record) so every task reports to this recorder.
pub struct MetricsCapture {
    recorder: DebuggingRecorder,
    snapshotter: Snapshotter,
}

impl MetricsCapture {
    /// Create an empty capture.
    #[must_use]
    pub fn new() -> Self {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        Self {
            recorder,
            snapshotter,
        }
    }

    /// Run `f` with this capture installed as the local recorder.
    pub fn record<T>(&self, f: impl FnOnce() -> T) -> T {
        metrics::with_local_recorder(&self.recorder, f)
    }

    /// Sum of counter `name` across series whose labels include every pair in
    /// `labels`.
    #[must_use]
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, ..)| {
                key.key().name() == name
                    && labels.iter().all(|(k, v)| {
                        key.key()
                            .labels()
                            .any(|label| label.key() == *k && label.value() == *v)
                    })
            })
            .map(|(.., value)| match value {
                DebugValue::Counter(count) => count,
                _ => 0,
            })
            .sum()
    }

    /// Current value of gauge `name`, if it was recorded.
    #[must_use]
    pub fn gauge(&self, name: &str) -> Option<f64> {
        self.snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(gauge) if key.key().name() == name => Some(gauge.into_inner()),
                _ => None,
            })
    }
}

impl Default for MetricsCapture {
    fn default() -> Self { Self::new() }
}
