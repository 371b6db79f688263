//! Pure derivation of display data from a settled analysis.

use shared::{Diagnosis, PredictionResult};
use strum_macros::{Display, IntoStaticStr};

use crate::machine::AnalysisState;
use crate::transport::TransportError;
use crate::validator::{ValidationRejection, ValidationReport, ValidationWarning};

pub const MEDICAL_DISCLAIMER: &str = "This is an educational tool only. NOT for medical diagnosis. Always consult healthcare professionals.";
pub const GENERIC_FAILURE_TITLE: &str = "Analysis failed";
pub const GENERIC_FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";
pub const URGENT_GUIDANCE: &str = "Seek immediate medical attention";

const STATIC_GUIDANCE: &[&str] = &[
    "Share this result with a qualified healthcare professional.",
    "Do not use this result as a substitute for a clinical diagnosis.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceTier {
    High,
    Moderate,
    Low,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            ConfidenceTier::High
        } else if confidence >= 0.7 {
            ConfidenceTier::Moderate
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConfidenceTier::High => "High confidence",
            ConfidenceTier::Moderate => "Moderate confidence",
            ConfidenceTier::Low => "Low confidence — please consult a professional",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ConfidenceTier::High => Severity::Success,
            ConfidenceTier::Moderate => Severity::Warning,
            ConfidenceTier::Low => Severity::Danger,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            ConfidenceTier::High => "text-green-600",
            ConfidenceTier::Moderate => "text-yellow-600",
            ConfidenceTier::Low => "text-red-600",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Positive,
    Warning,
}

impl Indicator {
    pub fn for_diagnosis(diagnosis: Diagnosis) -> Self {
        match diagnosis {
            Diagnosis::Normal => Indicator::Positive,
            Diagnosis::Pneumonia => Indicator::Warning,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Indicator::Positive => "check-circle",
            Indicator::Warning => "alert-circle",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Indicator::Positive => Severity::Success,
            Indicator::Warning => Severity::Danger,
        }
    }
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", confidence * 100.0)
}

pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    let value = bytes as f64;
    if value >= MIB {
        format!("{:.1} MiB", value / MIB)
    } else if value >= KIB {
        format!("{:.1} KiB", value / KIB)
    } else {
        format!("{} B", bytes)
    }
}

/// Server-side content check notice, kept apart from the label block.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationNotice {
    pub message: String,
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub diagnosis: Diagnosis,
    pub indicator: Indicator,
    pub confidence: String,
    pub confidence_fraction: f64,
    pub tier: ConfidenceTier,
    pub raw_score: f64,
    pub guidance: Vec<String>,
    pub disclaimer: String,
    pub validation_notice: Option<ValidationNotice>,
}

pub fn present_result(result: &PredictionResult) -> ResultView {
    let mut guidance: Vec<String> = STATIC_GUIDANCE.iter().map(|line| line.to_string()).collect();
    if result.prediction == Diagnosis::Pneumonia {
        guidance.push(URGENT_GUIDANCE.to_string());
    }

    let validation_notice = result.validation_warning.as_ref().map(|message| ValidationNotice {
        message: message.clone(),
        confidence: result.validation_confidence.map(|pct| format!("{}%", pct)),
    });

    ResultView {
        diagnosis: result.prediction,
        indicator: Indicator::for_diagnosis(result.prediction),
        confidence: format_confidence(result.confidence),
        confidence_fraction: result.confidence.clamp(0.0, 1.0),
        tier: ConfidenceTier::from_confidence(result.confidence),
        raw_score: result.raw_score,
        guidance,
        disclaimer: result.disclaimer.clone(),
        validation_notice,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateView {
    pub file_name: String,
    pub dimensions: Option<String>,
    pub size: String,
    pub format: Option<String>,
    pub notice: Option<String>,
}

pub fn present_candidate(file_name: &str, report: &ValidationReport) -> CandidateView {
    let notice = report.verdict.warning().map(|warning| match warning {
        ValidationWarning::UnusualAspectRatio { ratio } => format!(
            "Unusual aspect ratio ({:.2}:1). Chest X-rays are usually close to square, so the result may be less reliable.",
            ratio
        ),
    });

    CandidateView {
        file_name: file_name.to_string(),
        dimensions: report
            .image
            .map(|image| format!("{} × {} px", image.width, image.height)),
        size: format_bytes(report.byte_size),
        format: report
            .image
            .and_then(|image| image.format)
            .map(|format| format!("{:?}", format).to_uppercase()),
        notice,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Rejected(ValidationRejection),
    Transport(TransportError),
}

impl From<ValidationRejection> for Failure {
    fn from(rejection: ValidationRejection) -> Self {
        Failure::Rejected(rejection)
    }
}

impl From<TransportError> for Failure {
    fn from(error: TransportError) -> Self {
        Failure::Transport(error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailureView {
    pub title: String,
    pub message: String,
    pub suggestion: Option<String>,
}

/// One message per failure kind. Structured server answers are shown
/// verbatim; "Invalid Image Type" keeps its own title. Anything the server
/// did not explain falls back to the generic message.
pub fn describe_failure(failure: &Failure) -> FailureView {
    match failure {
        Failure::Rejected(rejection) => describe_rejection(rejection),
        Failure::Transport(TransportError::ServerStructured { detail, .. }) => {
            let title = if detail.is_invalid_image_type() {
                detail.error.clone()
            } else {
                GENERIC_FAILURE_TITLE.to_string()
            };
            FailureView {
                title,
                message: detail.message.clone(),
                suggestion: detail.suggestion.clone(),
            }
        }
        Failure::Transport(_) => FailureView {
            title: GENERIC_FAILURE_TITLE.to_string(),
            message: GENERIC_FAILURE_MESSAGE.to_string(),
            suggestion: None,
        },
    }
}

fn describe_rejection(rejection: &ValidationRejection) -> FailureView {
    let (title, message) = match rejection {
        ValidationRejection::TooManyFiles { count } => (
            "One image at a time",
            format!("{} files were selected. Please select a single chest X-ray image.", count),
        ),
        ValidationRejection::InvalidType { file_name, .. } => (
            "Unsupported file type",
            format!("{} is not a PNG or JPEG image.", file_name),
        ),
        ValidationRejection::TooLarge { size, limit } => (
            "File too large",
            format!(
                "This file is {}. The maximum file size is {}.",
                format_bytes(*size),
                format_bytes(*limit)
            ),
        ),
        ValidationRejection::DecodeFailed { .. } => (
            "Unreadable image",
            "The file could not be read as an image. It may be corrupt.".to_string(),
        ),
        ValidationRejection::TooSmallFileSize { size, limit } => (
            "File too small",
            format!(
                "This file is only {}. Files under {} are likely corrupt or too low quality to analyze.",
                format_bytes(*size),
                format_bytes(*limit)
            ),
        ),
        ValidationRejection::TooSmallDimensions { width, height, min } => (
            "Image too small",
            format!(
                "The image is {} × {} px. Both sides must be at least {} px.",
                width, height, min
            ),
        ),
    };

    FailureView {
        title: title.to_string(),
        message,
        suggestion: Some("Select a different chest X-ray image and try again.".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    Empty,
    Busy(&'static str),
    Analysis {
        candidate: CandidateView,
        result: ResultView,
    },
    Failure {
        candidate: Option<CandidateView>,
        failure: FailureView,
    },
}

pub fn present(state: &AnalysisState) -> Presentation {
    match state {
        AnalysisState::Idle { rejection: None } => Presentation::Empty,
        AnalysisState::Idle {
            rejection: Some(rejection),
        } => Presentation::Failure {
            candidate: None,
            failure: describe_failure(&Failure::Rejected(rejection.clone())),
        },
        AnalysisState::Validating { .. } => Presentation::Busy("Checking image..."),
        AnalysisState::Submitting { .. } => Presentation::Busy("Analyzing X-ray..."),
        AnalysisState::Succeeded {
            attempt,
            report,
            result,
        } => Presentation::Analysis {
            candidate: present_candidate(&attempt.candidate.file_name, report),
            result: present_result(result),
        },
        AnalysisState::Failed {
            attempt,
            report,
            error,
        } => Presentation::Failure {
            candidate: Some(present_candidate(&attempt.candidate.file_name, report)),
            failure: describe_failure(&Failure::Transport(error.clone())),
        },
    }
}
