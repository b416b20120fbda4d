//! The downsampled target picture and its on-disk interchange form.
//!
//! Monochrome bitmaps are stored as luminance (ink = 0, blank = 255);
//! coloured bitmaps store one RGB pixel per cell.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

use crate::calibration::Calibration;
use crate::color::Color;
use crate::error::SolverError;
use crate::geometry::{Point, Rect};
use crate::grid::PuzzleSize;
use crate::mask::{compute_mask, reduce_noise, Kernel};
use crate::raster::{sample_rect, RasterImage};

const INK: u8 = 0;
const BLANK: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cells {
    Monochrome(Vec<bool>),
    Colored(Vec<Rgb<u8>>),
}

/// A W×H grid of target cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerBitmap {
    size: PuzzleSize,
    cells: Cells,
}

impl AnswerBitmap {
    pub fn monochrome(size: PuzzleSize, ink: Vec<bool>) -> Result<Self, SolverError> {
        Self::checked(size, ink.len(), Cells::Monochrome(ink))
    }

    pub fn colored(size: PuzzleSize, colors: Vec<Rgb<u8>>) -> Result<Self, SolverError> {
        Self::checked(size, colors.len(), Cells::Colored(colors))
    }

    fn checked(size: PuzzleSize, len: usize, cells: Cells) -> Result<Self, SolverError> {
        if len != size.cell_count() {
            return Err(SolverError::internal(format!(
                "{} cells supplied for a {} bitmap",
                len, size
            )));
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> PuzzleSize {
        self.size
    }

    pub fn cells(&self) -> &Cells {
        &self.cells
    }

    pub fn is_colored(&self) -> bool {
        matches!(self.cells, Cells::Colored(_))
    }

    /// Iterate `(row, col)` in scan order.
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32)> {
        let PuzzleSize { width, height } = self.size;
        (0..height).flat_map(move |row| (0..width).map(move |col| (row, col)))
    }

    /// Convert to the interchange raster.
    pub fn to_image(&self) -> DynamicImage {
        let PuzzleSize { width, height } = self.size;
        match &self.cells {
            Cells::Monochrome(ink) => DynamicImage::ImageLuma8(GrayImage::from_fn(
                width,
                height,
                |x, y| Luma([if ink[(y * width + x) as usize] { INK } else { BLANK }]),
            )),
            Cells::Colored(colors) => DynamicImage::ImageRgb8(RgbImage::from_fn(
                width,
                height,
                |x, y| colors[(y * width + x) as usize],
            )),
        }
    }

    /// Read back an interchange raster.
    ///
    /// The raster must have exactly the declared puzzle dimensions.
    pub fn from_image(
        image: &DynamicImage,
        size: PuzzleSize,
        colored: bool,
        ink_threshold: u8,
    ) -> Result<Self, SolverError> {
        if image.width() != size.width || image.height() != size.height {
            return Err(SolverError::invalid_input_with_suggestion(
                format!(
                    "Bitmap is {}x{} but the puzzle is {}",
                    image.width(),
                    image.height(),
                    size
                ),
                "Re-run 'nonopaint capture' with the same WIDTH and HEIGHT",
            ));
        }
        if colored {
            let colors = image.to_rgb8().pixels().copied().collect();
            Self::colored(size, colors)
        } else {
            let ink = image
                .to_luma8()
                .pixels()
                .map(|p| p[0] < ink_threshold)
                .collect();
            Self::monochrome(size, ink)
        }
    }
}

/// Downsample the answer picture into a bitmap of `size` cells.
///
/// Monochrome cells are ink when the noise-reduced background mask is off at
/// the cell centre. Coloured cells average a small square around the centre.
pub fn to_answer_bitmap(
    answer: &RasterImage,
    size: PuzzleSize,
    colored: bool,
    calibration: &Calibration,
) -> Result<AnswerBitmap, SolverError> {
    if answer.width() == 0 || answer.height() == 0 {
        return Err(SolverError::internal("Answer picture is empty"));
    }
    let cell_width = f64::from(answer.width()) / f64::from(size.width);
    let cell_height = f64::from(answer.height()) / f64::from(size.height);
    let center = |row: u32, col: u32| {
        let x = (cell_width * (f64::from(col) + 0.5)) as u32;
        let y = (cell_height * (f64::from(row) + 0.5)) as u32;
        Point::new(x.min(answer.width() - 1), y.min(answer.height() - 1))
    };
    let positions = (0..size.height).flat_map(|row| (0..size.width).map(move |col| (row, col)));

    if colored {
        let bounds = Rect::new(0, 0, answer.width(), answer.height());
        let colors = positions
            .map(|(row, col)| {
                let point = center(row, col);
                let sample = sample_rect(point, calibration.sample_radius, bounds);
                answer
                    .average(sample)
                    .unwrap_or_else(|| Color::from_rgb(answer.pixel(point)))
                    .to_rgb()
            })
            .collect();
        AnswerBitmap::colored(size, colors)
    } else {
        let mask = reduce_noise(
            &compute_mask(answer, calibration.answer_threshold, false),
            Kernel::square(calibration.noise_kernel),
        );
        let ink = positions
            .map(|(row, col)| {
                let point = center(row, col);
                !mask.is_foreground(point.x, point.y)
            })
            .collect();
        AnswerBitmap::monochrome(size, ink)
    }
}
