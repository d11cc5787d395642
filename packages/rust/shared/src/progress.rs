//! Progress callbacks shared by the dashboard pipeline and the model fetchers.

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each chunk written during a download.
    fn bytes_downloaded(&self, current: u64, total: Option<u64>);
    /// Called when the operation completes.
    fn done(&self);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn bytes_downloaded(&self, _current: u64, _total: Option<u64>) {}
    fn done(&self) {}
}
