//! Error types with actionable suggestions.
//!
//! [`SolverError`] is what surfaces to the user; [`ExtractionFailure`] is the
//! pipeline's own error and carries the mask that produced the empty bounding
//! box so callers can persist it for offline inspection.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::mask::Mask;

/// Error codes for surfaced failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DeviceUnavailable,
    ExtractionFailure,
    ConnectionFailure,
    InvalidInput,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::DeviceUnavailable => write!(f, "DEVICE_UNAVAILABLE"),
            ErrorCode::ExtractionFailure => write!(f, "EXTRACTION_FAILURE"),
            ErrorCode::ConnectionFailure => write!(f, "CONNECTION_FAILURE"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// A failure with context on how to recover from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for SolverError {}

impl SolverError {
    pub fn device_unavailable() -> Self {
        Self {
            code: ErrorCode::DeviceUnavailable,
            message: "No device is connected".to_string(),
            suggestion: Some(
                "Connect the device over USB, enable USB debugging and check 'nonopaint devices'"
                    .into(),
            ),
        }
    }

    /// Create an extraction error for the given pipeline stage.
    pub fn extraction_failed(stage: Stage) -> Self {
        Self {
            code: ErrorCode::ExtractionFailure,
            message: format!("Unable to extract {}", stage),
            suggestion: Some(format!(
                "Make sure the {} is fully visible and in its default state, then inspect {}-mask.png in the work directory",
                stage.screen_hint(),
                stage.file_stem()
            )),
        }
    }

    /// Create an error for an exhausted connection policy.
    pub fn connection_failed(attempts: u32, elapsed: std::time::Duration) -> Self {
        Self {
            code: ErrorCode::ConnectionFailure,
            message: format!(
                "Companion agent did not become ready after {} attempts ({:?})",
                attempts, elapsed
            ),
            suggestion: Some(
                "Check that the agent binary matches the configured version and that the port forward is free"
                    .into(),
            ),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some("Check the command arguments and try again".into()),
        }
    }

    /// Create an invalid input error with a custom suggestion.
    pub fn invalid_input_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}

/// A geometry-extraction step of the image pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AnswerRegion,
    AnswerPicture,
    Canvas,
    Nonogram,
    Swatch,
    Grid,
    PaletteRegion,
    PaletteFrame,
    PaletteStrip,
    PaletteColors,
}

impl Stage {
    /// Base name for the diagnostic mask file of this stage.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Stage::AnswerRegion => "answer-region",
            Stage::AnswerPicture => "answer-picture",
            Stage::Canvas => "canvas",
            Stage::Nonogram => "nonogram",
            Stage::Swatch => "swatch",
            Stage::Grid => "grid",
            Stage::PaletteRegion => "palette-region",
            Stage::PaletteFrame => "palette-frame",
            Stage::PaletteStrip => "palette-strip",
            Stage::PaletteColors => "palette-colors",
        }
    }

    fn screen_hint(&self) -> &'static str {
        match self {
            Stage::AnswerRegion | Stage::AnswerPicture => "answer picture",
            Stage::Canvas | Stage::Nonogram | Stage::Swatch | Stage::Grid => "puzzle",
            Stage::PaletteRegion
            | Stage::PaletteFrame
            | Stage::PaletteStrip
            | Stage::PaletteColors => "colour palette",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AnswerRegion => "answer region",
            Stage::AnswerPicture => "answer picture",
            Stage::Canvas => "canvas",
            Stage::Nonogram => "nonogram",
            Stage::Swatch => "preview swatch",
            Stage::Grid => "grid",
            Stage::PaletteRegion => "palette region",
            Stage::PaletteFrame => "palette frame",
            Stage::PaletteStrip => "palette strip",
            Stage::PaletteColors => "palette colours",
        };
        f.write_str(name)
    }
}

/// A pipeline step produced a zero-area bounding box.
#[derive(Debug, thiserror::Error)]
#[error("unable to extract {stage}: bounding box is empty")]
pub struct ExtractionFailure {
    pub stage: Stage,
    /// The mask the empty bounding box was computed from, if any.
    pub diagnostic: Option<Mask>,
}

impl ExtractionFailure {
    pub fn new(stage: Stage, diagnostic: Mask) -> Self {
        Self {
            stage,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn without_mask(stage: Stage) -> Self {
        Self {
            stage,
            diagnostic: None,
        }
    }
}

impl From<ExtractionFailure> for SolverError {
    fn from(failure: ExtractionFailure) -> Self {
        SolverError::extraction_failed(failure.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_has_suggestion(err: &SolverError, context: &str) {
        assert!(
            err.suggestion.is_some(),
            "{} should have a suggestion, but got None",
            context
        );
    }

    #[test]
    fn test_device_unavailable_has_suggestion() {
        let err = SolverError::device_unavailable();
        assert_has_suggestion(&err, "device_unavailable");
        assert!(err.suggestion.as_ref().unwrap().contains("devices"));
    }

    #[test]
    fn test_extraction_failed_names_stage_and_mask_file() {
        let err = SolverError::extraction_failed(Stage::Swatch);
        assert_has_suggestion(&err, "extraction_failed");
        assert_eq!(err.code, ErrorCode::ExtractionFailure);
        assert!(err.message.contains("preview swatch"));
        assert!(err.suggestion.as_ref().unwrap().contains("swatch-mask.png"));
    }

    #[test]
    fn test_connection_failed_has_suggestion() {
        let err = SolverError::connection_failed(7, std::time::Duration::from_millis(700));
        assert_has_suggestion(&err, "connection_failed");
        assert!(err.message.contains("7 attempts"));
    }

    #[test]
    fn test_invalid_input_with_custom_suggestion() {
        let err = SolverError::invalid_input_with_suggestion("bitmap is 5x5", "Re-run capture");
        assert_has_suggestion(&err, "invalid_input_with_suggestion");
        assert!(err.suggestion.as_ref().unwrap().contains("capture"));
    }

    #[test]
    fn test_internal_has_suggestion() {
        assert_has_suggestion(&SolverError::internal("unexpected state"), "internal");
    }

    #[test]
    fn test_extraction_failure_converts() {
        let failure = ExtractionFailure::without_mask(Stage::Canvas);
        assert_eq!(failure.to_string(), "unable to extract canvas: bounding box is empty");
        let err: SolverError = failure.into();
        assert_eq!(err.code, ErrorCode::ExtractionFailure);
        assert!(err.message.contains("canvas"));
    }

    #[test]
    fn test_display_format_with_suggestion() {
        let display = format!("{}", SolverError::device_unavailable());
        assert!(display.contains("[DEVICE_UNAVAILABLE]"));
        assert!(display.contains("(hint:"));
    }

    #[test]
    fn test_json_round_trip() {
        let err = SolverError::extraction_failed(Stage::Grid);
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("EXTRACTION_FAILURE"));
        let back: SolverError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
