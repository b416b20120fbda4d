//! Turning a target bitmap into taps.
//!
//! Monochrome puzzles are painted in scan order. Coloured puzzles are painted
//! one palette colour at a time: switching the active colour is slow and
//! unreliable on device, so each colour is selected once and all of its cells
//! follow.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bitmap::{AnswerBitmap, Cells};
use crate::color::Color;
use crate::error::SolverError;
use crate::geometry::Point;
use crate::grid::GridGeometry;
use crate::palette::{Palette, Resolved};

/// One cell tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellTap {
    pub row: u32,
    pub col: u32,
    /// Screen coordinates of the cell centre.
    pub point: Point,
}

/// All cells of one palette colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorBatch {
    pub color_index: usize,
    pub color: Color,
    /// Where to tap to make this colour active.
    pub select: Point,
    /// Cells in scan order.
    pub cells: Vec<CellTap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaintPlan {
    Monochrome { taps: Vec<CellTap> },
    Colored { batches: Vec<ColorBatch> },
}

impl PaintPlan {
    /// Number of cell taps, excluding palette selections.
    pub fn cell_count(&self) -> usize {
        match self {
            PaintPlan::Monochrome { taps } => taps.len(),
            PaintPlan::Colored { batches } => batches.iter().map(|b| b.cells.len()).sum(),
        }
    }

    /// Every cell tap, batch by batch.
    pub fn cells(&self) -> Box<dyn Iterator<Item = &CellTap> + '_> {
        match self {
            PaintPlan::Monochrome { taps } => Box::new(taps.iter()),
            PaintPlan::Colored { batches } => Box::new(batches.iter().flat_map(|b| b.cells.iter())),
        }
    }
}

/// Plan the taps that reproduce `bitmap` on the grid.
///
/// A coloured bitmap needs the palette; a monochrome one ignores it.
pub fn plan_paint(
    bitmap: &AnswerBitmap,
    geometry: &GridGeometry,
    palette: Option<&Palette>,
) -> Result<PaintPlan, SolverError> {
    if bitmap.size() != geometry.size {
        return Err(SolverError::invalid_input_with_suggestion(
            format!(
                "Bitmap is {} but the grid is {}",
                bitmap.size(),
                geometry.size
            ),
            "Capture and paint with the same WIDTH and HEIGHT",
        ));
    }

    let tap = |(row, col): (u32, u32)| CellTap {
        row,
        col,
        point: geometry.cell_center(row, col),
    };

    let plan = match bitmap.cells() {
        Cells::Monochrome(ink) => {
            let taps = bitmap
                .positions()
                .zip(ink)
                .filter(|(_, ink)| **ink)
                .map(|(pos, _)| tap(pos))
                .collect();
            PaintPlan::Monochrome { taps }
        }
        Cells::Colored(colors) => {
            let palette = palette.ok_or_else(|| {
                SolverError::invalid_input_with_suggestion(
                    "Coloured bitmap given without a palette",
                    "Paint coloured puzzles with --colored so the palette is read",
                )
            })?;

            let mut batches: Vec<ColorBatch> = palette
                .entries()
                .iter()
                .enumerate()
                .map(|(color_index, entry)| ColorBatch {
                    color_index,
                    color: entry.color,
                    select: entry.tap_point,
                    cells: Vec::new(),
                })
                .collect();

            for (pos, color) in bitmap.positions().zip(colors) {
                if let Resolved::Entry(index) = palette.resolve(Color::from_rgb(*color)) {
                    batches[index].cells.push(tap(pos));
                }
            }

            batches.retain(|batch| !batch.cells.is_empty());
            PaintPlan::Colored { batches }
        }
    };

    debug!("planned {} cell taps", plan.cell_count());
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::grid::PuzzleSize;
    use crate::palette::PaletteEntry;
    use image::Rgb;
    use std::collections::HashSet;

    const BG: Rgb<u8> = Rgb([250, 250, 250]);
    const RED: Rgb<u8> = Rgb([200, 40, 40]);
    const GREEN: Rgb<u8> = Rgb([40, 180, 60]);
    const BLUE: Rgb<u8> = Rgb([60, 80, 220]);

    fn geometry(size: PuzzleSize) -> GridGeometry {
        GridGeometry::new(
            Rect::new(100, 400, size.width * 20, size.height * 20),
            size,
        )
    }

    fn palette() -> Palette {
        let entry = |c: Rgb<u8>, x| PaletteEntry {
            color: Color::from_rgb(c),
            tap_point: Point::new(x, 1500),
        };
        Palette::new(
            vec![entry(RED, 100), entry(GREEN, 200), entry(BLUE, 300)],
            Color::new(255.0, 255.0, 255.0),
        )
    }

    #[test]
    fn monochrome_taps_in_scan_order() {
        let size = PuzzleSize::new(3, 2).unwrap();
        let bitmap =
            AnswerBitmap::monochrome(size, vec![true, false, true, false, true, false]).unwrap();
        let plan = plan_paint(&bitmap, &geometry(size), None).unwrap();

        let PaintPlan::Monochrome { taps } = plan else {
            panic!("expected monochrome plan");
        };
        let cells: Vec<_> = taps.iter().map(|t| (t.row, t.col)).collect();
        assert_eq!(cells, vec![(0, 0), (0, 2), (1, 1)]);
        assert_eq!(taps[0].point, Point::new(110, 410));
        assert_eq!(taps[2].point, Point::new(130, 430));
    }

    #[test]
    fn colored_taps_grouped_by_palette_order() {
        let size = PuzzleSize::new(3, 2).unwrap();
        let bitmap =
            AnswerBitmap::colored(size, vec![BLUE, RED, BG, RED, BLUE, Rgb([190, 50, 45])])
                .unwrap();
        let plan = plan_paint(&bitmap, &geometry(size), Some(&palette())).unwrap();

        let PaintPlan::Colored { batches } = plan else {
            panic!("expected coloured plan");
        };
        let summary: Vec<_> = batches
            .iter()
            .map(|b| {
                (
                    b.color_index,
                    b.select,
                    b.cells.iter().map(|c| (c.row, c.col)).collect::<Vec<_>>(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, Point::new(100, 1500), vec![(0, 1), (1, 0), (1, 2)]),
                (2, Point::new(300, 1500), vec![(0, 0), (1, 1)]),
            ]
        );
    }

    #[test]
    fn colored_batches_cover_every_non_background_cell_once() {
        let size = PuzzleSize::new(7, 5).unwrap();
        let choices = [RED, GREEN, BLUE, BG, Rgb([252, 252, 251]), Rgb([45, 170, 70])];
        let colors: Vec<_> = (0..size.cell_count())
            .map(|i| choices[(i * 7 + i / 3) % choices.len()])
            .collect();
        let bitmap = AnswerBitmap::colored(size, colors.clone()).unwrap();
        let palette = palette();
        let plan = plan_paint(&bitmap, &geometry(size), Some(&palette)).unwrap();

        let expected: HashSet<(u32, u32)> = bitmap
            .positions()
            .zip(&colors)
            .filter(|(_, c)| palette.resolve(Color::from_rgb(**c)) != Resolved::Background)
            .map(|(pos, _)| pos)
            .collect();

        let mut seen = HashSet::new();
        for cell in plan.cells() {
            assert!(seen.insert((cell.row, cell.col)), "cell tapped twice");
        }
        assert_eq!(seen, expected);
        assert_eq!(plan.cell_count(), expected.len());
    }

    #[test]
    fn colored_bitmap_without_palette_is_invalid() {
        let size = PuzzleSize::new(1, 1).unwrap();
        let bitmap = AnswerBitmap::colored(size, vec![RED]).unwrap();
        let err = plan_paint(&bitmap, &geometry(size), None).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn size_mismatch_is_invalid() {
        let bitmap =
            AnswerBitmap::monochrome(PuzzleSize::new(2, 2).unwrap(), vec![true; 4]).unwrap();
        let err = plan_paint(&bitmap, &geometry(PuzzleSize::new(3, 3).unwrap()), None).unwrap_err();
        assert!(err.message.contains("2x2"));
    }

    #[test]
    fn all_background_plans_nothing() {
        let size = PuzzleSize::new(2, 2).unwrap();
        let bitmap = AnswerBitmap::colored(size, vec![BG; 4]).unwrap();
        let plan = plan_paint(&bitmap, &geometry(size), Some(&palette())).unwrap();
        assert_eq!(plan, PaintPlan::Colored { batches: Vec::new() });
    }
}
