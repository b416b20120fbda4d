//! Capture, analyze and paint flows.
//!
//! Each flow runs strictly in sequence: screenshot, extraction, then (for
//! painting) planning and tap replay. Extraction failures persist their
//! diagnostic mask in the work directory before the error surfaces.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use nonopaint_core::bitmap::{to_answer_bitmap, AnswerBitmap};
use nonopaint_core::calibration::{Calibration, Timing};
use nonopaint_core::color::Color;
use nonopaint_core::error::{ExtractionFailure, SolverError};
use nonopaint_core::extract::{extract_answer, extract_grid, extract_nonogram, extract_palette};
use nonopaint_core::geometry::{Point, Rect};
use nonopaint_core::grid::{GridGeometry, PuzzleSize};
use nonopaint_core::palette::{Palette, PaletteEntry};
use nonopaint_core::plan::{plan_paint, PaintPlan};
use nonopaint_core::raster::RasterImage;
use nonopaint_core::touch::ScreenSize;
use serde::Serialize;
use tracing::{info, warn};

use crate::device::{
    AdbBridge, AgentConfig, ArtifactPaths, ConnectPolicy, ScrcpyLauncher, TouchSession,
};

/// Half side of the marker drawn on palette tap points in the debug overlay.
const MARKER_RADIUS: u32 = 6;

const GRID_OUTLINE: Rgb<u8> = Rgb([255, 0, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Load a calibration file, or the defaults when none is given.
pub fn load_calibration(path: Option<&Path>) -> Result<Calibration> {
    let Some(path) = path else {
        return Ok(Calibration::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read calibration {}", path.display()))?;
    Ok(Calibration::from_json(&json)?)
}

/// Everything located on a puzzle screenshot.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub screen: ScreenSize,
    pub nonogram: Rect,
    pub grid: GridGeometry,
    pub swatch: Rect,
    pub background: Color,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub palette: Option<Vec<PaletteEntry>>,
}

impl Analysis {
    pub fn palette(&self) -> Option<Palette> {
        self.palette
            .as_ref()
            .map(|entries| Palette::new(entries.clone(), self.background))
    }
}

pub struct Runner {
    bridge: AdbBridge,
    calibration: Calibration,
    paths: ArtifactPaths,
    agent: AgentConfig,
    policy: ConnectPolicy,
}

impl Runner {
    pub fn new(
        bridge: AdbBridge,
        calibration: Calibration,
        paths: ArtifactPaths,
        agent: AgentConfig,
    ) -> Self {
        Self {
            bridge,
            calibration,
            paths,
            agent,
            policy: ConnectPolicy::default(),
        }
    }

    pub fn bridge(&self) -> &AdbBridge {
        &self.bridge
    }

    async fn ensure_device(&self) -> Result<()> {
        if !self.bridge.has_device().await? {
            return Err(SolverError::device_unavailable().into());
        }
        Ok(())
    }

    fn prepare_work_dir(&self) -> Result<()> {
        self.paths.ensure().with_context(|| {
            format!(
                "Failed to create work directory {}",
                self.paths.root().display()
            )
        })
    }

    async fn screenshot(&self) -> Result<RasterImage> {
        let screen = self.bridge.capture_screenshot().await?;
        let path = self.paths.screenshot();
        screen
            .pixels()
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(screen)
    }

    /// Write the failing mask next to the other artifacts and surface the error.
    fn persist_failure(&self, failure: ExtractionFailure) -> anyhow::Error {
        if let Some(mask) = &failure.diagnostic {
            let path = self.paths.diagnostic_mask(failure.stage);
            match mask.pixels().save(&path) {
                Ok(()) => info!("Saved diagnostic mask to {}", path.display()),
                Err(e) => warn!("Failed to save {}: {}", path.display(), e),
            }
        }
        SolverError::from(failure).into()
    }

    /// Screenshot the answer display and store its bitmap.
    pub async fn capture(&self, size: PuzzleSize, colored: bool) -> Result<AnswerBitmap> {
        self.ensure_device().await?;
        self.prepare_work_dir()?;

        if let Some(swipe) = &self.calibration.reveal_swipe {
            info!("Revealing answer picture");
            self.bridge
                .swipe(swipe.from, swipe.to, swipe.duration())
                .await?;
            tokio::time::sleep(self.calibration.timing.settle()).await;
        }

        let screen = self.screenshot().await?;
        let answer =
            extract_answer(&screen, &self.calibration).map_err(|f| self.persist_failure(f))?;
        info!("Answer picture at {}", answer.rect());

        let bitmap = to_answer_bitmap(&answer, size, colored, &self.calibration)?;
        save_bitmap(&bitmap, &self.paths.bitmap())?;
        info!("Saved {} bitmap to {}", size, self.paths.bitmap().display());
        Ok(bitmap)
    }

    /// Locate nonogram, grid and (for coloured puzzles) the palette.
    pub fn analyze(&self, screen: &RasterImage, size: PuzzleSize, colored: bool) -> Result<Analysis> {
        let nonogram =
            extract_nonogram(screen, &self.calibration).map_err(|f| self.persist_failure(f))?;
        info!("Nonogram at {}", nonogram.rect());

        let grid = extract_grid(&nonogram, size, &self.calibration)
            .map_err(|f| self.persist_failure(f))?;
        info!("Grid at {}", grid.geometry.origin);

        let palette = if colored {
            let entries = extract_palette(screen, nonogram.rect(), &self.calibration)
                .map_err(|f| self.persist_failure(f))?;
            info!("Palette has {} colours", entries.len());
            Some(entries)
        } else {
            None
        };

        Ok(Analysis {
            screen: ScreenSize::from_pixels(screen.width(), screen.height()),
            nonogram: nonogram.rect(),
            grid: grid.geometry,
            swatch: grid.swatch,
            background: grid.background,
            palette,
        })
    }

    /// Analyze a screenshot saved on disk.
    pub fn analyze_file(&self, path: &Path, size: PuzzleSize, colored: bool) -> Result<Analysis> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let screen = RasterImage::decode(&bytes)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        self.prepare_work_dir()?;
        self.analyze(&screen, size, colored)
    }

    /// Paint the stored bitmap onto the puzzle currently on screen.
    pub async fn paint(&self, size: PuzzleSize, colored: bool) -> Result<()> {
        self.ensure_device().await?;
        self.prepare_work_dir()?;

        let screen = self.screenshot().await?;
        let analysis = self.analyze(&screen, size, colored)?;
        let nonogram = screen.crop(analysis.nonogram);
        nonogram
            .pixels()
            .save(self.paths.nonogram())
            .context("Failed to save nonogram")?;

        let bitmap = load_bitmap(&self.paths.bitmap(), size, colored, &self.calibration)?;
        let palette = analysis.palette();
        let plan = plan_paint(&bitmap, &analysis.grid, palette.as_ref())?;

        let overlay = render_overlay(&screen, &analysis.grid, &plan);
        if let Err(e) = overlay.save(self.paths.paint_debug()) {
            warn!("Failed to save paint overlay: {}", e);
        }

        info!(
            "Painting {} cells (about {:?})",
            plan.cell_count(),
            estimated_duration(&plan, &self.calibration.timing)
        );
        let launcher = ScrcpyLauncher::new(&self.bridge, &self.agent);
        let mut session = TouchSession::start(&launcher, analysis.screen, &self.policy).await?;
        execute_plan(&mut session, &plan, &self.calibration.timing).await?;
        session.close().await?;
        info!("Done");
        Ok(())
    }
}

/// Replay a plan over a ready session.
///
/// A write error aborts immediately; taps already sent stay on the device.
pub async fn execute_plan(session: &mut TouchSession, plan: &PaintPlan, timing: &Timing) -> Result<()> {
    match plan {
        PaintPlan::Monochrome { taps } => {
            for tap in taps {
                session.tap(tap.point, timing.mono_hold()).await?;
            }
        }
        PaintPlan::Colored { batches } => {
            for batch in batches {
                info!(
                    "Colour {} ({}): {} cells",
                    batch.color_index,
                    batch.color,
                    batch.cells.len()
                );
                session.tap(batch.select, timing.mono_hold()).await?;
                tokio::time::sleep(timing.settle()).await;
                for cell in &batch.cells {
                    session.tap(cell.point, timing.color_hold()).await?;
                }
            }
        }
    }
    Ok(())
}

pub fn save_bitmap(bitmap: &AnswerBitmap, path: &Path) -> Result<()> {
    bitmap
        .to_image()
        .save(path)
        .with_context(|| format!("Failed to save bitmap {}", path.display()))
}

pub fn load_bitmap(
    path: &Path,
    size: PuzzleSize,
    colored: bool,
    calibration: &Calibration,
) -> Result<AnswerBitmap> {
    let image = image::open(path).with_context(|| {
        format!(
            "Failed to open bitmap {} (run 'nonopaint capture' first)",
            path.display()
        )
    })?;
    Ok(AnswerBitmap::from_image(
        &image,
        size,
        colored,
        calibration.ink_threshold,
    )?)
}

/// Draw the planned taps over the screenshot.
///
/// Cells are filled with the colour they will be painted, palette tap points
/// get a marker, and the grid is outlined.
pub fn render_overlay(screen: &RasterImage, grid: &GridGeometry, plan: &PaintPlan) -> RgbImage {
    let mut canvas = screen.pixels().clone();

    let mut fill = |rect: Rect, color: Rgb<u8>| {
        let right = rect.right().min(canvas.width());
        let bottom = rect.bottom().min(canvas.height());
        for y in rect.y..bottom {
            for x in rect.x..right {
                canvas.put_pixel(x, y, color);
            }
        }
    };

    match plan {
        PaintPlan::Monochrome { taps } => {
            for tap in taps {
                fill(grid.cell_rect(tap.row, tap.col).shrink(1), INK);
            }
        }
        PaintPlan::Colored { batches } => {
            for batch in batches {
                let color = batch.color.to_rgb();
                for cell in &batch.cells {
                    fill(grid.cell_rect(cell.row, cell.col).shrink(1), color);
                }
                fill(marker(batch.select), GRID_OUTLINE);
                fill(marker(batch.select).shrink(2), color);
            }
        }
    }

    let outline = grid.origin;
    for edge in [
        Rect::new(outline.x, outline.y, outline.width, 1),
        Rect::new(outline.x, outline.bottom().saturating_sub(1), outline.width, 1),
        Rect::new(outline.x, outline.y, 1, outline.height),
        Rect::new(outline.right().saturating_sub(1), outline.y, 1, outline.height),
    ] {
        fill(edge, GRID_OUTLINE);
    }

    canvas
}

fn marker(center: Point) -> Rect {
    Rect::new(
        center.x.saturating_sub(MARKER_RADIUS),
        center.y.saturating_sub(MARKER_RADIUS),
        MARKER_RADIUS * 2 + 1,
        MARKER_RADIUS * 2 + 1,
    )
}

/// Time a plan takes to replay, ignoring write latency.
pub fn estimated_duration(plan: &PaintPlan, timing: &Timing) -> Duration {
    match plan {
        PaintPlan::Monochrome { taps } => timing.mono_hold() * taps.len() as u32,
        PaintPlan::Colored { batches } => batches
            .iter()
            .map(|b| timing.mono_hold() + timing.settle() + timing.color_hold() * b.cells.len() as u32)
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::session::testing::{idle_agent, SimulatedAgent};
    use nonopaint_core::plan::{CellTap, ColorBatch};
    use nonopaint_core::touch::TOUCH_EVENT_LEN;

    fn timing() -> Timing {
        Timing {
            mono_hold_ms: 1,
            color_hold_ms: 1,
            settle_ms: 1,
        }
    }

    fn colored_plan() -> PaintPlan {
        let cell = |row, col| CellTap {
            row,
            col,
            point: Point::new(col * 10 + 5, row * 10 + 5),
        };
        PaintPlan::Colored {
            batches: vec![
                ColorBatch {
                    color_index: 0,
                    color: Color::new(200.0, 40.0, 40.0),
                    select: Point::new(50, 90),
                    cells: vec![cell(0, 0), cell(1, 1)],
                },
                ColorBatch {
                    color_index: 2,
                    color: Color::new(60.0, 80.0, 220.0),
                    select: Point::new(70, 90),
                    cells: vec![cell(0, 1)],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_execute_plan_sends_selections_and_cells() {
        let agent = SimulatedAgent::start(1).await;
        let launcher = idle_agent(agent.addr);
        let policy = ConnectPolicy {
            retry_interval: Duration::from_millis(10),
            max_attempts: Some(50),
            timeout: None,
        };

        let mut session = TouchSession::start(&launcher, ScreenSize::new(100, 100), &policy)
            .await
            .unwrap();
        execute_plan(&mut session, &colored_plan(), &timing())
            .await
            .unwrap();
        session
            .with_exit_timeout(Duration::from_millis(50))
            .close()
            .await
            .unwrap();

        let bytes = agent.received.await.unwrap();
        // Two selections plus three cells, each a down and an up record.
        assert_eq!(bytes.len(), 5 * 2 * TOUCH_EVENT_LEN);
        let x_of = |record: usize| {
            let at = record * TOUCH_EVENT_LEN;
            u32::from_be_bytes([bytes[at + 10], bytes[at + 11], bytes[at + 12], bytes[at + 13]])
        };
        // Down records only: select red, red cells, select blue, blue cell.
        let xs: Vec<u32> = (0..5).map(|i| x_of(i * 2)).collect();
        assert_eq!(xs, vec![50, 5, 15, 70, 15]);
    }

    #[test]
    fn test_overlay_marks_cells_and_outline() {
        let screen = RasterImage::from_screen(RgbImage::from_pixel(100, 100, Rgb([255, 255, 255])));
        let grid = GridGeometry::new(
            Rect::new(0, 0, 20, 20),
            PuzzleSize::new(2, 2).unwrap(),
        );
        let overlay = render_overlay(&screen, &grid, &colored_plan());

        assert_eq!(*overlay.get_pixel(5, 5), Rgb([200, 40, 40]));
        assert_eq!(*overlay.get_pixel(15, 5), Rgb([60, 80, 220]));
        assert_eq!(*overlay.get_pixel(5, 15), Rgb([255, 255, 255]));
        assert_eq!(*overlay.get_pixel(0, 10), GRID_OUTLINE);
        assert_eq!(*overlay.get_pixel(50, 90), Rgb([200, 40, 40]));
        assert_eq!(*overlay.get_pixel(50, 85), GRID_OUTLINE);
    }

    #[test]
    fn test_bitmap_file_round_trip() {
        let path = std::env::temp_dir().join(format!("nonopaint-bitmap-{}.png", std::process::id()));
        let size = PuzzleSize::new(3, 2).unwrap();
        let bitmap =
            AnswerBitmap::monochrome(size, vec![true, false, false, true, true, false]).unwrap();

        save_bitmap(&bitmap, &path).unwrap();
        let back = load_bitmap(&path, size, false, &Calibration::default()).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(back, bitmap);
    }

    #[test]
    fn test_missing_bitmap_suggests_capture() {
        let path = std::env::temp_dir().join(format!("nonopaint-missing-{}.png", std::process::id()));
        let err = load_bitmap(
            &path,
            PuzzleSize::new(1, 1).unwrap(),
            false,
            &Calibration::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonopaint capture"));
    }

    #[test]
    fn test_extraction_failure_persists_mask() {
        let root = std::env::temp_dir().join(format!("nonopaint-failure-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let shot = root.join("blank.png");
        RgbImage::from_pixel(60, 120, Rgb([255, 255, 255]))
            .save(&shot)
            .unwrap();

        let paths = ArtifactPaths::new(root.join("work"));
        let agent = AgentConfig::resolve(None, paths.root());
        let runner = Runner::new(
            AdbBridge::new("adb", None),
            Calibration::default(),
            paths.clone(),
            agent,
        );
        let err = runner
            .analyze_file(&shot, PuzzleSize::new(5, 5).unwrap(), false)
            .unwrap_err();

        let solver = err
            .downcast_ref::<SolverError>()
            .expect("should be a SolverError");
        assert_eq!(solver.code, nonopaint_core::error::ErrorCode::ExtractionFailure);
        let mask = paths.diagnostic_mask(nonopaint_core::error::Stage::Nonogram);
        assert!(mask.exists(), "missing {}", mask.display());
        assert_eq!(image::image_dimensions(&mask).unwrap(), (60, 120));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_calibration_defaults_without_file() {
        assert_eq!(load_calibration(None).unwrap(), Calibration::default());
    }

    #[test]
    fn test_estimated_duration() {
        let timing = Timing {
            mono_hold_ms: 10,
            color_hold_ms: 40,
            settle_ms: 80,
        };
        assert_eq!(
            estimated_duration(&colored_plan(), &timing),
            Duration::from_millis(10 + 80 + 80 + 10 + 80 + 40)
        );
    }
}
