//! Environment-calibrated constants for the pipeline and the painter.
//!
//! The defaults match the puzzle application on a 1080px-wide phone. Any
//! field can be overridden from a JSON file; missing fields keep their
//! defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SolverError;
use crate::geometry::Point;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Brightness above which a pixel counts as answer-screen background.
    pub answer_threshold: u8,
    /// Side of the square kernel used by noise reduction.
    pub noise_kernel: u32,
    /// Pixels dropped on every side of the answer region.
    pub answer_inset: u32,
    /// Brightness above which a pixel counts as paper (the white bands
    /// wrapping the puzzle canvas).
    pub paper_threshold: u8,
    /// Kernel used to heal the paper mask before band detection.
    pub paper_close_kernel: u32,
    /// Brightness at or below which a pixel belongs to the nonogram rather
    /// than its white margin.
    pub margin_threshold: u8,
    /// Stricter background threshold used to find the preview swatch.
    pub grid_threshold: u8,
    /// Longest plausible swatch border, in puzzle cells.
    pub swatch_span_cells: f64,
    /// Swatch extents between the swatch's top-left and the grid's top-left.
    pub grid_lead_extents: u32,
    /// Swatch extents between the grid's bottom-right and the image edge.
    pub grid_trail_extents: u32,
    /// Brightness at or below which palette frame and divider pixels lie.
    pub divider_threshold: u8,
    /// Widest dark column run still taken for a palette divider; wider runs
    /// are dark colours.
    pub max_divider_width: u32,
    /// Half side of the square averaged when sampling a colour.
    pub sample_radius: u32,
    /// Luminance below which a monochrome bitmap cell is ink.
    pub ink_threshold: u8,
    pub timing: Timing,
    /// Swipe that reveals the answer picture before capturing it.
    pub reveal_swipe: Option<Swipe>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            answer_threshold: 240,
            noise_kernel: 7,
            answer_inset: 2,
            paper_threshold: 240,
            paper_close_kernel: 5,
            margin_threshold: 100,
            grid_threshold: 250,
            swatch_span_cells: 2.0,
            grid_lead_extents: 2,
            grid_trail_extents: 1,
            divider_threshold: 60,
            max_divider_width: 12,
            sample_radius: 2,
            ink_threshold: 230,
            timing: Timing::default(),
            reveal_swipe: None,
        }
    }
}

impl Calibration {
    /// Parse a (possibly partial) calibration from JSON.
    pub fn from_json(json: &str) -> Result<Self, SolverError> {
        serde_json::from_str(json).map_err(|e| {
            SolverError::invalid_input_with_suggestion(
                format!("Invalid calibration: {}", e),
                "Calibration files are JSON objects; omit a field to keep its default",
            )
        })
    }
}

/// Touch timings, tuned to device-side latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Hold for monochrome cells and palette selection.
    pub mono_hold_ms: u64,
    /// Hold for coloured cells; colour application settles slower.
    pub color_hold_ms: u64,
    /// Pause after selecting a palette colour.
    pub settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            mono_hold_ms: 10,
            color_hold_ms: 40,
            settle_ms: 80,
        }
    }
}

impl Timing {
    pub fn mono_hold(&self) -> Duration {
        Duration::from_millis(self.mono_hold_ms)
    }

    pub fn color_hold(&self) -> Duration {
        Duration::from_millis(self.color_hold_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// A bridge swipe gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swipe {
    pub from: Point,
    pub to: Point,
    pub duration_ms: u64,
}

impl Swipe {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let calibration =
            Calibration::from_json(r#"{"noise_kernel": 5, "timing": {"settle_ms": 120}}"#)
                .unwrap();
        assert_eq!(calibration.noise_kernel, 5);
        assert_eq!(calibration.answer_threshold, 240);
        assert_eq!(calibration.timing.settle(), Duration::from_millis(120));
        assert_eq!(calibration.timing.color_hold(), Duration::from_millis(40));
    }

    #[test]
    fn reveal_swipe_parses() {
        let calibration = Calibration::from_json(
            r#"{"reveal_swipe": {"from": {"x": 200, "y": 1800}, "to": {"x": 800, "y": 1800}, "duration_ms": 200}}"#,
        )
        .unwrap();
        let swipe = calibration.reveal_swipe.unwrap();
        assert_eq!(swipe.from, Point::new(200, 1800));
        assert_eq!(swipe.duration(), Duration::from_millis(200));
    }

    #[test]
    fn malformed_json_is_invalid_input() {
        let err = Calibration::from_json("{ nope").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
        assert!(err.message.contains("Invalid calibration"));
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(Calibration::from_json("{}").unwrap(), Calibration::default());
    }
}
