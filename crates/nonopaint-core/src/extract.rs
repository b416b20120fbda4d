//! Geometry extraction from raw screenshots.
//!
//! Each step locates one region with a threshold plus morphology heuristic
//! and returns a cropped [`RasterImage`] whose rect is in screen coordinates.
//! A zero-area bounding box at any step is an [`ExtractionFailure`]; the mask
//! it came from is attached for offline inspection.
//!
//! The expected screen is the puzzle in its freshly opened state:
//!
//! ```text
//! +------------------------------+
//! |  header                      |
//! |..............................|  <- white band
//! |   +---+-----------------+    |
//! |   |[ ]|   column clues  |    |  <- [ ] preview swatch
//! |   +---+-----------------+    |
//! |   |row|                 |    |
//! |   |clu|      grid       |    |
//! |   +---+-----------------+    |
//! |..............................|  <- white band
//! |   [##|##|##|##]              |  <- palette (coloured puzzles)
//! +------------------------------+
//! ```

use tracing::debug;

use crate::calibration::Calibration;
use crate::color::Color;
use crate::error::{ExtractionFailure, Stage};
use crate::geometry::{Point, Rect};
use crate::grid::{GridGeometry, PuzzleSize};
use crate::mask::{compute_mask, reduce_noise, Axis, Kernel, Mask};
use crate::palette::PaletteEntry;
use crate::raster::{sample_rect, RasterImage};

/// Result of [`extract_grid`].
#[derive(Debug, Clone)]
pub struct GridExtraction {
    pub grid: RasterImage,
    pub geometry: GridGeometry,
    /// Preview swatch bounding box in screen coordinates.
    pub swatch: Rect,
    /// Colour of unpainted cells, sampled from the swatch centre.
    pub background: Color,
}

fn non_empty(rect: Rect, stage: Stage, mask: &Mask) -> Result<Rect, ExtractionFailure> {
    if rect.is_empty() {
        debug!("{} bounding box is empty", stage);
        return Err(ExtractionFailure::new(stage, mask.clone()));
    }
    Ok(rect)
}

/// Crop the answer picture out of a full-screen answer display.
pub fn extract_answer(
    screen: &RasterImage,
    calibration: &Calibration,
) -> Result<RasterImage, ExtractionFailure> {
    let mask = reduce_noise(
        &compute_mask(screen, calibration.answer_threshold, false),
        Kernel::square(calibration.noise_kernel),
    );

    let region = non_empty(mask.bounding_box(), Stage::AnswerRegion, &mask)?;
    // The region's edge pixels are antialiased against the frame.
    let canvas_box = non_empty(
        region.shrink(calibration.answer_inset),
        Stage::AnswerRegion,
        &mask,
    )?;
    let canvas = screen.crop(canvas_box);

    let picture_mask = mask.crop(canvas_box).bitwise_not();
    let picture_box = non_empty(
        picture_mask.bounding_box(),
        Stage::AnswerPicture,
        &picture_mask,
    )?;
    let picture = canvas.crop(picture_box);

    debug!("answer picture at {}", picture.rect());
    Ok(picture)
}

/// Crop the whole nonogram (clues and grid) out of the puzzle screen.
pub fn extract_nonogram(
    screen: &RasterImage,
    calibration: &Calibration,
) -> Result<RasterImage, ExtractionFailure> {
    let paper = compute_mask(screen, calibration.paper_threshold, false)
        .close(Kernel::square(calibration.paper_close_kernel));

    // Only rows of unbroken paper survive: the bands above and below the canvas.
    // TODO: tall puzzles in landscape touch the top and bottom edges; detect
    // vertical bands when no horizontal band pair exists.
    let bands = paper.erode(Kernel::spanning_rows(paper.width()));
    let canvas_box = non_empty(bands.bounding_box(), Stage::Canvas, &paper)?;
    let canvas = screen.crop(canvas_box);
    debug!("canvas at {}", canvas.rect());

    let ink = compute_mask(&canvas, calibration.margin_threshold, true);
    let nonogram_box = non_empty(ink.bounding_box(), Stage::Nonogram, &ink)?;
    let nonogram = canvas.crop(nonogram_box);

    debug!("nonogram at {}", nonogram.rect());
    Ok(nonogram)
}

/// Locate the drawing grid and the background colour inside a nonogram.
///
/// The preview swatch is found from the longest background runs no longer
/// than `swatch_span_cells` cells; the grid is then placed by the
/// symmetric-offset rule relative to the swatch.
pub fn extract_grid(
    nonogram: &RasterImage,
    size: PuzzleSize,
    calibration: &Calibration,
) -> Result<GridExtraction, ExtractionFailure> {
    let (width, height) = (nonogram.width(), nonogram.height());
    let mask = compute_mask(nonogram, calibration.grid_threshold, false);

    let max_across = (f64::from(width) / f64::from(size.width) * calibration.swatch_span_cells) as u32;
    let max_down = (f64::from(height) / f64::from(size.height) * calibration.swatch_span_cells) as u32;
    let across = mask.longest_run(Axis::Horizontal, max_across);
    let down = mask.longest_run(Axis::Vertical, max_down);
    let swatch_box = match (across, down) {
        (Some(across), Some(down)) => Rect::new(across.start, down.start, across.len, down.len),
        _ => Rect::empty(),
    };
    let swatch_box = non_empty(swatch_box, Stage::Swatch, &mask)?;

    let center = Point::new(
        swatch_box.x + swatch_box.width / 2,
        swatch_box.y + swatch_box.height / 2,
    );
    let background = Color::from_rgb(nonogram.pixel(center));

    let left = swatch_box.x + calibration.grid_lead_extents * swatch_box.width;
    let top = swatch_box.y + calibration.grid_lead_extents * swatch_box.height;
    let right = width.saturating_sub(calibration.grid_trail_extents * swatch_box.width);
    let bottom = height.saturating_sub(calibration.grid_trail_extents * swatch_box.height);
    let grid_box = if right > left && bottom > top {
        Rect::new(left, top, right - left, bottom - top)
    } else {
        Rect::empty()
    };
    let grid_box = non_empty(grid_box, Stage::Grid, &mask)?;

    let grid = nonogram.crop(grid_box);
    let geometry = GridGeometry::new(grid.rect(), size);
    let swatch = swatch_box.offset(nonogram.origin());
    debug!(
        "swatch at {}, grid at {}, cell {:.2}x{:.2}, background {}",
        swatch,
        geometry.origin,
        geometry.cell_width,
        geometry.cell_height,
        background
    );

    Ok(GridExtraction {
        grid,
        geometry,
        swatch,
        background,
    })
}

/// Read the colour palette shown below the nonogram.
///
/// `nonogram_rect` is in screen coordinates. Entries are returned left to
/// right with absolute tap points.
pub fn extract_palette(
    screen: &RasterImage,
    nonogram_rect: Rect,
    calibration: &Calibration,
) -> Result<Vec<PaletteEntry>, ExtractionFailure> {
    let top = nonogram_rect.bottom().saturating_sub(screen.origin().y);
    if top >= screen.height() {
        return Err(ExtractionFailure::without_mask(Stage::PaletteRegion));
    }
    let below = screen.crop(Rect::new(0, top, screen.width(), screen.height() - top));

    let dark = compute_mask(&below, calibration.divider_threshold, true);
    let frame_box = non_empty(dark.bounding_box(), Stage::PaletteFrame, &dark)?;
    let frame = below.crop(frame_box);
    let frame_dark = dark.crop(frame_box);

    let borders = frame_dark.erode(Kernel::spanning_rows(frame_dark.width()));
    let strip_box = non_empty(borders.bounding_box(), Stage::PaletteStrip, &frame_dark)?;
    let strip = frame.crop(strip_box);
    let strip_dark = frame_dark.crop(strip_box);

    let dividers = strip_dark.erode(Kernel::spanning_columns(strip_dark.height()));
    let midline = strip.height() / 2;
    let cells = palette_cells(&dividers, midline, calibration.max_divider_width);
    if cells.is_empty() {
        return Err(ExtractionFailure::new(Stage::PaletteColors, dividers));
    }

    let bounds = Rect::new(0, 0, strip.width(), strip.height());
    let entries = cells
        .into_iter()
        .map(|(start, end)| {
            let center = Point::new((start + end) / 2, midline);
            let cell = Rect::new(start, 0, end - start, strip.height());
            let sample = sample_rect(center, calibration.sample_radius, cell);
            let sample = if sample.is_empty() {
                sample_rect(center, 0, bounds)
            } else {
                sample
            };
            let color = strip
                .average(sample)
                .unwrap_or_else(|| Color::from_rgb(strip.pixel(center)));
            PaletteEntry {
                color,
                tap_point: Point::new(strip.origin().x + center.x, strip.origin().y + center.y),
            }
        })
        .collect::<Vec<_>>();

    debug!("palette strip at {} with {} colours", strip.rect(), entries.len());
    Ok(entries)
}

/// Colour cells along `row` of a divider mask, as `[start, end)` spans.
///
/// Light gaps between dark runs are cells. A dark run wider than
/// `max_divider_width` is a dark colour fused with its neighbouring dividers;
/// it is split into as many cells as the light-cell pitch fits into it.
fn palette_cells(dividers: &Mask, row: u32, max_divider_width: u32) -> Vec<(u32, u32)> {
    let mut runs = Vec::new();
    let mut run_start: Option<u32> = None;
    for x in 0..dividers.width() {
        match (dividers.is_foreground(x, row), run_start) {
            (true, None) => run_start = Some(x),
            (false, Some(start)) => {
                runs.push((start, x));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push((start, dividers.width()));
    }

    let gaps: Vec<(u32, u32)> = runs.windows(2).map(|w| (w[0].1, w[1].0)).collect();
    let pitch = median(gaps.iter().map(|&(s, e)| e - s))
        .zip(median(
            runs.iter()
                .map(|&(s, e)| e - s)
                .filter(|&w| w <= max_divider_width),
        ))
        .map(|(cell, divider)| cell + divider);

    let mut cells = gaps;
    for &(start, end) in runs.iter().filter(|&&(s, e)| e - s > max_divider_width) {
        let width = end - start;
        let count = pitch.map_or(1, |p| ((width as f64 / p as f64).round() as u32).max(1));
        cells.extend((0..count).map(|i| {
            (
                start + width * i / count,
                start + width * (i + 1) / count,
            )
        }));
    }
    cells.sort_unstable();
    cells
}

fn median(values: impl Iterator<Item = u32>) -> Option<u32> {
    let mut values: Vec<u32> = values.collect();
    values.sort_unstable();
    values.get(values.len() / 2).copied()
}
