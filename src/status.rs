//! Exit status codes for the CLI
//!
//! - 0: every step answered 2xx and every test passed
//! - 1: the run could not be started or was aborted
//! - 10: the run finished but at least one step or test failed
//! - 130: user interrupted (Ctrl+C, standard SIGINT exit code)

use std::process::{ExitCode, Termination};

/// Exit status codes following standard Unix conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitStatus {
    /// Run completed and everything passed
    Success = 0,
    /// Startup failure, invalid input or aborted run
    Error = 1,
    /// Run completed with failing steps or tests
    TestsFailed = 10,
    /// User interrupted (Ctrl+C) - standard SIGINT code
    Interrupted = 130,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status as u8)
    }
}

impl Termination for ExitStatus {
    fn report(self) -> ExitCode {
        ExitCode::from(self as u8)
    }
}

impl ExitStatus {
    /// Exit status for a finished run
    pub fn from_outcome(all_passed: bool) -> Self {
        if all_passed {
            ExitStatus::Success
        } else {
            ExitStatus::TestsFailed
        }
    }

    /// Create an exit status from a raw exit code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitStatus::Success,
            10 => ExitStatus::TestsFailed,
            130 => ExitStatus::Interrupted,
            _ => ExitStatus::Error,
        }
    }
}
