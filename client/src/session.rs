use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::machine::{AnalysisMachine, AnalysisState, AttemptId, Command, Msg};
use crate::transport::{Transport, TransportError};
use crate::validator::{self, Limits, UploadCandidate, ValidationRejection, ValidationReport};

/// Runs an `AnalysisMachine` on the tokio runtime.
///
/// Validation and submission run as spawned tasks that report back over a
/// channel; `step` applies the next completion. Only one task is tracked at
/// a time, and superseding an attempt aborts it.
pub struct Session<T> {
    machine: AnalysisMachine,
    transport: Arc<T>,
    limits: Limits,
    tx: mpsc::UnboundedSender<Msg>,
    rx: mpsc::UnboundedReceiver<Msg>,
    in_flight: Option<(AttemptId, JoinHandle<()>)>,
    state_tx: watch::Sender<AnalysisState>,
}

impl<T: Transport + 'static> Session<T> {
    pub fn new(transport: Arc<T>, limits: Limits) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = AnalysisMachine::new();
        let (state_tx, _) = watch::channel(machine.state().clone());
        Self {
            machine,
            transport,
            limits,
            tx,
            rx,
            in_flight: None,
            state_tx,
        }
    }

    pub fn state(&self) -> &AnalysisState {
        self.machine.state()
    }

    /// Every transition is published here; renderers typically wait for
    /// `AnalysisState::is_terminal`.
    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.state_tx.subscribe()
    }

    pub fn select_files(&mut self, files: Vec<UploadCandidate>) {
        self.dispatch(Msg::FilesSelected(files));
    }

    pub fn reset(&mut self) {
        self.dispatch(Msg::Reset);
    }

    pub fn dispatch(&mut self, msg: Msg) {
        if let Msg::Validated { attempt, .. } | Msg::Settled { attempt, .. } = &msg {
            if self.in_flight.as_ref().is_some_and(|(id, _)| id == attempt) {
                self.in_flight = None;
            }
        }

        for command in self.machine.update(msg) {
            self.execute(command);
        }
        self.state_tx.send_replace(self.machine.state().clone());
    }

    /// Waits for the next task completion and applies it.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(msg) => {
                self.dispatch(msg);
                true
            }
            None => false,
        }
    }

    /// Applies completions that have already arrived, without waiting.
    pub fn drain(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            self.dispatch(msg);
        }
    }

    /// Steps until the current attempt leaves `Validating`/`Submitting`.
    pub async fn settle(&mut self) -> &AnalysisState {
        while self.machine.state().is_in_flight() {
            if !self.step().await {
                break;
            }
        }
        self.machine.state()
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Validate { attempt, candidate } => {
                let tx = self.tx.clone();
                let limits = self.limits;
                let handle = tokio::spawn(async move {
                    let byte_size = candidate.byte_size();
                    let report = match tokio::task::spawn_blocking(move || {
                        validator::inspect(&candidate, &limits)
                    })
                    .await
                    {
                        Ok(report) => report,
                        Err(e) => ValidationReport::rejected(
                            ValidationRejection::DecodeFailed {
                                reason: e.to_string(),
                            },
                            byte_size,
                        ),
                    };
                    let _ = tx.send(Msg::Validated { attempt, report });
                });
                self.track(attempt, handle);
            }
            Command::Submit { attempt, candidate } => {
                let tx = self.tx.clone();
                let transport = Arc::clone(&self.transport);
                let handle = tokio::spawn(async move {
                    let outcome = AssertUnwindSafe(transport.submit_for_prediction(candidate))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            log::error!("transport panicked during attempt {}", attempt);
                            Err(TransportError::Network {
                                message: "the transport failed unexpectedly".to_string(),
                            })
                        });
                    let _ = tx.send(Msg::Settled { attempt, outcome });
                });
                self.track(attempt, handle);
            }
            Command::Cancel { attempt } => {
                if let Some((id, handle)) = self.in_flight.take() {
                    if id == attempt {
                        log::debug!("aborting work of attempt {}", id);
                        handle.abort();
                    } else {
                        self.in_flight = Some((id, handle));
                    }
                }
            }
        }
    }

    fn track(&mut self, attempt: AttemptId, handle: JoinHandle<()>) {
        if let Some((previous, stale)) = self.in_flight.replace((attempt, handle)) {
            log::debug!("aborting untracked work of attempt {}", previous);
            stale.abort();
        }
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.in_flight.take() {
            handle.abort();
        }
    }
}
