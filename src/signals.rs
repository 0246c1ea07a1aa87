//! Interrupt/signal handling for graceful shutdown
//!
//! Ctrl+C sets a global flag and stops the run registered here, so the
//! runner finishes the request in flight and returns its partial results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::pipeline::RunControl;

/// Global flag for Ctrl+C interrupt handling
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Run to stop on interrupt
static ACTIVE_RUN: Mutex<Option<RunControl>> = Mutex::new(None);

/// Check if the application was interrupted (Ctrl+C pressed)
#[inline]
pub fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Set the interrupted flag and stop the active run (called from signal handler)
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
    if let Ok(active) = ACTIVE_RUN.lock() {
        if let Some(control) = active.as_ref() {
            control.stop();
        }
    }
}

/// Reset the interrupted flag
#[inline]
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Make `control` the run an interrupt stops
pub fn register_run(control: RunControl) {
    if let Ok(mut active) = ACTIVE_RUN.lock() {
        *active = Some(control);
    }
}

pub fn clear_run() {
    if let Ok(mut active) = ACTIVE_RUN.lock() {
        *active = None;
    }
}
