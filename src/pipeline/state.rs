//! Run state machine and the pause/resume/stop handle

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed(String),
}

/// Something that moves a run between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Start,
    Pause,
    Resume,
    Finish,
    Fail(String),
    Stop,
}

impl RunState {
    /// Next state for an event, or `None` if the transition is not allowed
    pub fn on(&self, event: RunEvent) -> Option<RunState> {
        use RunEvent as E;
        use RunState as S;

        match (self, event) {
            (S::Idle | S::Completed | S::Failed(_), E::Start) => Some(S::Running),
            (S::Running, E::Pause) => Some(S::Paused),
            (S::Paused, E::Resume) => Some(S::Running),
            (S::Running, E::Finish) => Some(S::Completed),
            (S::Running | S::Paused, E::Fail(message)) => Some(S::Failed(message)),
            (S::Running | S::Paused, E::Stop) => Some(S::Idle),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }
}

/// State plus progress, as published to observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub state: RunState,
    /// 0 to 100
    pub progress: u8,
    pub completed: usize,
    pub total: usize,
}

impl RunStatus {
    /// Record one more finished unit of work
    pub fn advance(&mut self) {
        self.completed += 1;
        self.progress = progress_percent(self.completed, self.total);
    }
}

/// `round(100 * completed / total)`, 0 when there is nothing to do
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (100.0 * completed as f64 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// What the runner should do at a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Stop,
}

/// Cloneable handle to observe and steer a run from other tasks
#[derive(Debug, Clone)]
pub struct RunControl {
    tx: Arc<watch::Sender<RunStatus>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn status(&self) -> RunStatus {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        self.tx.borrow().state.clone()
    }

    /// Receiver that sees every status change
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.tx.subscribe()
    }

    /// Apply an event; returns whether the transition was allowed
    pub fn apply(&self, event: RunEvent) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|status| match status.state.on(event) {
            Some(next) => {
                status.state = next;
                applied = true;
                true
            }
            None => false,
        });
        applied
    }

    pub fn pause(&self) -> bool {
        self.apply(RunEvent::Pause)
    }

    pub fn resume(&self) -> bool {
        self.apply(RunEvent::Resume)
    }

    pub fn stop(&self) -> bool {
        self.apply(RunEvent::Stop)
    }

    /// Start a run of `total` units, resetting progress
    pub(crate) fn start(&self, total: usize) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|status| match status.state.on(RunEvent::Start) {
            Some(next) => {
                *status = RunStatus { state: next, progress: 0, completed: 0, total };
                applied = true;
                true
            }
            None => false,
        });
        applied
    }

    pub(crate) fn advance(&self) {
        self.tx.send_modify(RunStatus::advance);
    }

    /// Jump progress forward, e.g. past requests skipped by an early stop
    pub(crate) fn advance_to(&self, completed: usize) {
        self.tx.send_if_modified(|status| {
            if completed <= status.completed {
                return false;
            }
            status.completed = completed.min(status.total);
            status.progress = progress_percent(status.completed, status.total);
            true
        });
    }

    /// Wait until the run may continue
    ///
    /// Returns immediately while running, blocks while paused, and reports
    /// `Stop` for any other state.
    pub async fn checkpoint(&self) -> Checkpoint {
        let mut rx = self.tx.subscribe();
        loop {
            let state = rx.borrow_and_update().state.clone();
            match state {
                RunState::Running => return Checkpoint::Continue,
                RunState::Paused => {
                    if rx.changed().await.is_err() {
                        return Checkpoint::Stop;
                    }
                }
                _ => return Checkpoint::Stop,
            }
        }
    }
}
