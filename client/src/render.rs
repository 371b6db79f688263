use shared::{HealthStatus, ModelInfo};
use std::io::{self, Write};

use crate::presenter::{
    CandidateView, FailureView, Indicator, MEDICAL_DISCLAIMER, Presentation, ResultView,
};

const METER_WIDTH: usize = 30;

pub fn render(out: &mut impl Write, presentation: &Presentation) -> io::Result<()> {
    match presentation {
        Presentation::Empty => Ok(()),
        Presentation::Busy(label) => writeln!(out, "{}", label),
        Presentation::Analysis { candidate, result } => {
            render_candidate(out, candidate)?;
            writeln!(out)?;
            render_result(out, result)
        }
        Presentation::Failure { candidate, failure } => {
            if let Some(candidate) = candidate {
                render_candidate(out, candidate)?;
                writeln!(out)?;
            }
            render_failure(out, failure)
        }
    }
}

fn render_candidate(out: &mut impl Write, candidate: &CandidateView) -> io::Result<()> {
    let mut details = vec![candidate.size.clone()];
    if let Some(dimensions) = &candidate.dimensions {
        details.insert(0, dimensions.clone());
    }
    if let Some(format) = &candidate.format {
        details.push(format.clone());
    }
    writeln!(out, "Image: {} ({})", candidate.file_name, details.join(", "))?;
    if let Some(notice) = &candidate.notice {
        writeln!(out, "  ! {}", notice)?;
    }
    Ok(())
}

fn render_result(out: &mut impl Write, result: &ResultView) -> io::Result<()> {
    writeln!(out, "MEDICAL DISCLAIMER: {}", MEDICAL_DISCLAIMER)?;
    writeln!(out)?;

    let symbol = match result.indicator {
        Indicator::Positive => "✔",
        Indicator::Warning => "⚠",
    };
    writeln!(out, "Prediction: {} {}", symbol, result.diagnosis)?;

    let filled = (result.confidence_fraction * METER_WIDTH as f64).round() as usize;
    writeln!(
        out,
        "Confidence: {} [{}{}] {}",
        result.confidence,
        "#".repeat(filled),
        "-".repeat(METER_WIDTH - filled.min(METER_WIDTH)),
        result.tier.label()
    )?;
    writeln!(out, "Raw score:  {:.4}", result.raw_score)?;

    if let Some(notice) = &result.validation_notice {
        writeln!(out)?;
        match &notice.confidence {
            Some(confidence) => writeln!(
                out,
                "Image check: {} (validation confidence {})",
                notice.message, confidence
            )?,
            None => writeln!(out, "Image check: {}", notice.message)?,
        }
    }

    writeln!(out)?;
    writeln!(out, "Next steps:")?;
    for line in &result.guidance {
        writeln!(out, "  - {}", line)?;
    }

    writeln!(out)?;
    writeln!(out, "{}", result.disclaimer)
}

fn render_failure(out: &mut impl Write, failure: &FailureView) -> io::Result<()> {
    writeln!(out, "{}", failure.title)?;
    writeln!(out, "  {}", failure.message)?;
    if let Some(suggestion) = &failure.suggestion {
        writeln!(out, "  {}", suggestion)?;
    }
    Ok(())
}

pub fn render_model_info(out: &mut impl Write, info: &ModelInfo) -> io::Result<()> {
    writeln!(out, "Model:     {}", info.model_type)?;
    writeln!(out, "Framework: {}", info.framework)?;
    writeln!(out, "Input:     {} × {}", info.input_size[0], info.input_size[1])?;
    writeln!(out, "Classes:   {}", info.classes.join(", "))?;
    writeln!(out, "Accuracy:  {}", info.accuracy)?;
    writeln!(out, "Threshold: {}", info.threshold)
}

pub fn render_health(out: &mut impl Write, health: &HealthStatus) -> io::Result<()> {
    writeln!(out, "Status: {}", health.status)?;
    if let Some(loaded) = health.model_loaded {
        writeln!(out, "Model loaded: {}", if loaded { "yes" } else { "no" })?;
    }
    if let Some(error) = &health.error {
        writeln!(out, "Error: {}", error)?;
    }
    Ok(())
}
