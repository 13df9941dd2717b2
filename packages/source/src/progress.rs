//! Progress reporting for long-running pipeline stages.
//!
//! [`ProgressCallback`] decouples progress reporting from any rendering
//! backend. The CLI plugs in `indicatif` bars; library callers and tests use
//! [`NullProgress`].

/// Receives progress updates from a running stage.
pub trait ProgressCallback: Send + Sync {
    /// Advance progress by `delta` units (records).
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}
