//! User-initiated exit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::MonitorError;

/// Polled once per loop iteration
pub trait ExitControl {
    /// Wait up to `wait` for an exit request and report whether one arrived
    fn should_exit(&mut self, wait: Duration) -> bool;
}

impl<T: ExitControl + ?Sized> ExitControl for Box<T> {
    fn should_exit(&mut self, wait: Duration) -> bool {
        (**self).should_exit(wait)
    }
}

/// Exit request shared with a signal handler
#[derive(Debug, Clone, Default)]
pub struct ExitFlag {
    requested: Arc<AtomicBool>,
}

impl ExitFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag raised by Ctrl-C
    pub fn install_ctrlc() -> Result<Self, MonitorError> {
        let flag = Self::new();
        let requested = Arc::clone(&flag.requested);
        ctrlc::set_handler(move || {
            info!("Exit requested");
            requested.store(true, Ordering::SeqCst);
        })
        .map_err(|e| MonitorError::Signal(e.to_string()))?;
        Ok(flag)
    }

    pub fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl ExitControl for ExitFlag {
    fn should_exit(&mut self, wait: Duration) -> bool {
        if !wait.is_zero() && !self.is_set() {
            std::thread::sleep(wait);
        }
        self.is_set()
    }
}
