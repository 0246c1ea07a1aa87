//! Progress bar fed from the run status channel

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::pipeline::{RunState, RunStatus};

/// Draws run progress until dropped or finished
pub struct ProgressReporter {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl ProgressReporter {
    /// Follow a run's status on stderr; must be called inside a tokio runtime
    pub fn spawn(mut rx: watch::Receiver<RunStatus>) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);

        let task = {
            let bar = bar.clone();
            tokio::spawn(async move {
                loop {
                    let status = rx.borrow_and_update().clone();
                    bar.set_length(status.total as u64);
                    bar.set_position(status.completed as u64);
                    bar.set_message(status_message(&status));

                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
        };

        Self { bar, task }
    }

    pub fn finish(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }
}

fn status_message(status: &RunStatus) -> String {
    match &status.state {
        RunState::Paused => format!("{}% paused", status.progress),
        RunState::Failed(message) => format!("failed: {}", message),
        _ => format!("{}%", status.progress),
    }
}
