//! Console output: colors and the run progress bar

pub mod progress;
pub mod terminal;

pub use progress::ProgressReporter;
pub use terminal::{colors, colorize, error, label, muted, success, warning, RESET};
