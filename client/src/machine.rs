//! Lifecycle of an analysis attempt as a pure transition function.
//!
//! `AnalysisMachine::update` consumes one `Msg` and returns the `Command`s
//! the caller must run. Completions come back stamped with the attempt that
//! spawned them and are applied only while that attempt is still current.

use derive_more::Display;
use shared::PredictionResult;

use crate::transport::TransportError;
use crate::validator::{self, UploadCandidate, ValidationRejection, ValidationReport, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "#{}", _0)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisAttempt {
    pub id: AttemptId,
    pub candidate: UploadCandidate,
}

#[derive(Debug, Clone)]
pub enum AnalysisState {
    Idle {
        rejection: Option<ValidationRejection>,
    },
    Validating {
        attempt: AnalysisAttempt,
    },
    Submitting {
        attempt: AnalysisAttempt,
        report: ValidationReport,
    },
    Succeeded {
        attempt: AnalysisAttempt,
        report: ValidationReport,
        result: PredictionResult,
    },
    Failed {
        attempt: AnalysisAttempt,
        report: ValidationReport,
        error: TransportError,
    },
}

impl AnalysisState {
    pub fn attempt(&self) -> Option<&AnalysisAttempt> {
        match self {
            AnalysisState::Idle { .. } => None,
            AnalysisState::Validating { attempt }
            | AnalysisState::Submitting { attempt, .. }
            | AnalysisState::Succeeded { attempt, .. }
            | AnalysisState::Failed { attempt, .. } => Some(attempt),
        }
    }

    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt().map(|attempt| attempt.id)
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            AnalysisState::Submitting { report, .. }
            | AnalysisState::Succeeded { report, .. }
            | AnalysisState::Failed { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            AnalysisState::Validating { .. } | AnalysisState::Submitting { .. }
        )
    }

    /// Settled states: a result, a transport failure, or a surfaced rejection.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisState::Succeeded { .. }
                | AnalysisState::Failed { .. }
                | AnalysisState::Idle {
                    rejection: Some(_)
                }
        )
    }
}

#[derive(Debug)]
pub enum Msg {
    FilesSelected(Vec<UploadCandidate>),
    Validated {
        attempt: AttemptId,
        report: ValidationReport,
    },
    Settled {
        attempt: AttemptId,
        outcome: Result<PredictionResult, TransportError>,
    },
    Reset,
}

#[derive(Debug, Clone)]
pub enum Command {
    Validate {
        attempt: AttemptId,
        candidate: UploadCandidate,
    },
    Submit {
        attempt: AttemptId,
        candidate: UploadCandidate,
    },
    Cancel {
        attempt: AttemptId,
    },
}

#[derive(Debug)]
pub struct AnalysisMachine {
    last_issued: u64,
    state: AnalysisState,
}

impl Default for AnalysisMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisMachine {
    pub fn new() -> Self {
        Self {
            last_issued: 0,
            state: AnalysisState::Idle { rejection: None },
        }
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::FilesSelected(files) => self.handle_files_selected(files),
            Msg::Validated { attempt, report } => self.handle_validated(attempt, report),
            Msg::Settled { attempt, outcome } => self.handle_settled(attempt, outcome),
            Msg::Reset => self.handle_reset(),
        }
    }

    fn handle_files_selected(&mut self, files: Vec<UploadCandidate>) -> Vec<Command> {
        if files.is_empty() {
            return Vec::new();
        }

        let mut commands = self.cancel_in_flight();
        let id = self.issue_id();

        match validator::check_selection(&files) {
            Ok(Some(candidate)) => {
                log::info!("attempt {} started for {}", id, candidate.file_name);
                let attempt = AnalysisAttempt {
                    id,
                    candidate: candidate.clone(),
                };
                commands.push(Command::Validate {
                    attempt: id,
                    candidate: attempt.candidate.clone(),
                });
                self.state = AnalysisState::Validating { attempt };
            }
            Ok(None) => self.state = AnalysisState::Idle { rejection: None },
            Err(rejection) => {
                log::warn!("attempt {} rejected: {}", id, rejection);
                self.state = AnalysisState::Idle {
                    rejection: Some(rejection),
                };
            }
        }

        commands
    }

    fn handle_validated(&mut self, id: AttemptId, report: ValidationReport) -> Vec<Command> {
        let attempt = match &self.state {
            AnalysisState::Validating { attempt } if attempt.id == id => attempt.clone(),
            _ => {
                log::debug!("ignoring validation result of superseded attempt {}", id);
                return Vec::new();
            }
        };

        if let Verdict::Rejected(rejection) = &report.verdict {
            log::warn!("attempt {} rejected: {}", id, rejection);
            self.state = AnalysisState::Idle {
                rejection: Some(rejection.clone()),
            };
            return Vec::new();
        }

        if let Some(warning) = report.verdict.warning() {
            log::info!("attempt {} accepted with warning: {:?}", id, warning);
        }

        let command = Command::Submit {
            attempt: id,
            candidate: attempt.candidate.clone(),
        };
        self.state = AnalysisState::Submitting { attempt, report };
        vec![command]
    }

    fn handle_settled(
        &mut self,
        id: AttemptId,
        outcome: Result<PredictionResult, TransportError>,
    ) -> Vec<Command> {
        let previous = std::mem::replace(&mut self.state, AnalysisState::Idle { rejection: None });
        self.state = match previous {
            AnalysisState::Submitting { attempt, report } if attempt.id == id => match outcome {
                Ok(result) => {
                    log::info!("attempt {} succeeded: {}", id, result.prediction);
                    AnalysisState::Succeeded {
                        attempt,
                        report,
                        result,
                    }
                }
                Err(error) => {
                    log::warn!("attempt {} failed: {}", id, error);
                    AnalysisState::Failed {
                        attempt,
                        report,
                        error,
                    }
                }
            },
            other => {
                log::debug!("ignoring prediction outcome of superseded attempt {}", id);
                other
            }
        };
        Vec::new()
    }

    /// Clears candidate, verdict and result together.
    fn handle_reset(&mut self) -> Vec<Command> {
        let commands = self.cancel_in_flight();
        self.state = AnalysisState::Idle { rejection: None };
        commands
    }

    fn cancel_in_flight(&self) -> Vec<Command> {
        match &self.state {
            AnalysisState::Validating { attempt } | AnalysisState::Submitting { attempt, .. } => {
                log::info!("attempt {} superseded", attempt.id);
                vec![Command::Cancel { attempt: attempt.id }]
            }
            _ => Vec::new(),
        }
    }

    fn issue_id(&mut self) -> AttemptId {
        self.last_issued += 1;
        AttemptId(self.last_issued)
    }
}
