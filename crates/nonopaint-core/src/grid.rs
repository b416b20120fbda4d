//! Puzzle dimensions and the on-screen cell layout.

use serde::{Deserialize, Serialize};

use crate::error::SolverError;
use crate::geometry::{Point, Rect};

/// Caller-declared puzzle dimensions, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PuzzleSize {
    pub width: u32,
    pub height: u32,
}

impl PuzzleSize {
    pub fn new(width: u32, height: u32) -> Result<Self, SolverError> {
        if width == 0 || height == 0 {
            return Err(SolverError::invalid_input(format!(
                "Puzzle size must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for PuzzleSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where the drawing grid sits on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Grid bounding box in screen coordinates.
    pub origin: Rect,
    pub size: PuzzleSize,
    pub cell_width: f64,
    pub cell_height: f64,
}

impl GridGeometry {
    pub fn new(origin: Rect, size: PuzzleSize) -> Self {
        Self {
            origin,
            size,
            cell_width: f64::from(origin.width) / f64::from(size.width),
            cell_height: f64::from(origin.height) / f64::from(size.height),
        }
    }

    /// Centre of a cell in screen coordinates, truncated to whole pixels.
    pub fn cell_center(&self, row: u32, col: u32) -> Point {
        let x = f64::from(self.origin.x) + self.cell_width * (f64::from(col) + 0.5);
        let y = f64::from(self.origin.y) + self.cell_height * (f64::from(row) + 0.5);
        Point::new(x as u32, y as u32)
    }

    /// Screen rect covered by a cell.
    pub fn cell_rect(&self, row: u32, col: u32) -> Rect {
        let left = f64::from(self.origin.x) + self.cell_width * f64::from(col);
        let top = f64::from(self.origin.y) + self.cell_height * f64::from(row);
        Rect::new(
            left as u32,
            top as u32,
            self.cell_width as u32,
            self.cell_height as u32,
        )
    }
}
