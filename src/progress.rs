//! Progress reporting and cooperative cancellation hooks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives `(unit_name, percent, message)` updates. Implementations must be fast.
pub trait ProgressSink {
    fn report(&mut self, unit: &str, percent: f64, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, f64, &str),
{
    fn report(&mut self, unit: &str, percent: f64, message: &str) {
        self(unit, percent, message)
    }
}

/// Discards every update
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _unit: &str, _percent: f64, _message: &str) {}
}

/// Polled stop probe. Checked at sheet, column and batch boundaries only.
pub trait StopSignal {
    fn should_stop(&self) -> bool;
}

impl<F> StopSignal for F
where
    F: Fn() -> bool,
{
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Never asks to stop
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Cloneable stop handle; set it from any thread or task.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the next run can proceed
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl StopSignal for StopFlag {
    fn should_stop(&self) -> bool {
        self.is_stopped()
    }
}
