//! Binary masks and the morphology used to clean them up.
//!
//! Masks store 255 for foreground and 0 for background. Morphology uses
//! rectangular structuring elements anchored at `size / 2`; pixels outside
//! the image are ignored, so erosion never eats in from the image border and
//! dilation never grows out of it.

use image::{GrayImage, Luma, Rgb};

use crate::geometry::{Point, Rect};
use crate::raster::RasterImage;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Grayscale value of an RGB pixel (ITU-R BT.601 weights).
#[inline]
pub fn luminance(pixel: Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    ((weighted + 500) / 1000) as u8
}

/// A single-channel binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pixels: GrayImage,
    origin: Point,
    inverted: bool,
}

/// Threshold `image` into a mask.
///
/// With `inverted = false` pixels brighter than `threshold` (the light
/// background) are foreground; `inverted = true` flips the polarity.
pub fn compute_mask(image: &RasterImage, threshold: u8, inverted: bool) -> Mask {
    let source = image.pixels();
    let pixels = GrayImage::from_fn(source.width(), source.height(), |x, y| {
        let light = luminance(*source.get_pixel(x, y)) > threshold;
        Luma([if light != inverted {
            FOREGROUND
        } else {
            BACKGROUND
        }])
    });
    Mask {
        pixels,
        origin: image.origin(),
        inverted,
    }
}

/// Close then open with a square kernel, removing speckle and antialiasing.
pub fn reduce_noise(mask: &Mask, kernel: Kernel) -> Mask {
    mask.close(kernel).open(kernel)
}

/// A rectangular structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    pub width: u32,
    pub height: u32,
}

impl Kernel {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn square(size: u32) -> Self {
        Self::new(size, size)
    }

    /// A horizontal line whose window covers a whole row of a `width`-wide
    /// mask from every anchor position. Eroding with it keeps only rows that
    /// are entirely foreground.
    #[must_use]
    pub fn spanning_rows(width: u32) -> Self {
        Self::new(width.saturating_mul(2).saturating_sub(1).max(1), 1)
    }

    /// The vertical counterpart of [`Kernel::spanning_rows`].
    #[must_use]
    pub fn spanning_columns(height: u32) -> Self {
        Self::new(1, height.saturating_mul(2).saturating_sub(1).max(1))
    }
}

/// Scan direction for run detection and separable morphology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// An unbroken run of foreground pixels along one row or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Row index for horizontal runs, column index for vertical ones.
    pub line: u32,
    pub start: u32,
    pub len: u32,
}

#[derive(Clone, Copy)]
enum MorphOp {
    Erode,
    Dilate,
}

impl Mask {
    /// Build a mask from raw values; any non-zero value is foreground.
    pub fn from_gray(pixels: GrayImage, origin: Point, inverted: bool) -> Self {
        let pixels = GrayImage::from_fn(pixels.width(), pixels.height(), |x, y| {
            Luma([if pixels.get_pixel(x, y)[0] != 0 {
                FOREGROUND
            } else {
                BACKGROUND
            }])
        });
        Self {
            pixels,
            origin,
            inverted,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Whether this mask marks dark pixels rather than light ones.
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] != BACKGROUND
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.pixels.pixels().filter(|p| p[0] != BACKGROUND).count()
    }

    /// Flip every pixel and the recorded polarity.
    #[must_use]
    pub fn bitwise_not(&self) -> Mask {
        let mut pixels = self.pixels.clone();
        for p in pixels.pixels_mut() {
            p[0] = if p[0] == BACKGROUND {
                FOREGROUND
            } else {
                BACKGROUND
            };
        }
        Mask {
            pixels,
            origin: self.origin,
            inverted: !self.inverted,
        }
    }

    /// Crop to a local rect (clamped), composing the root origin.
    #[must_use]
    pub fn crop(&self, local: Rect) -> Mask {
        let pixels =
            image::imageops::crop_imm(&self.pixels, local.x, local.y, local.width, local.height)
                .to_image();
        Mask {
            pixels,
            origin: Point::new(
                self.origin.x + local.x.min(self.width()),
                self.origin.y + local.y.min(self.height()),
            ),
            inverted: self.inverted,
        }
    }

    /// Smallest local rect containing every foreground pixel.
    ///
    /// Returns the empty sentinel when there is no foreground.
    pub fn bounding_box(&self) -> Rect {
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        for (x, y, p) in self.pixels.enumerate_pixels() {
            if p[0] == BACKGROUND {
                continue;
            }
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if min_x == u32::MAX {
            return Rect::empty();
        }
        Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
    }

    #[must_use]
    pub fn erode(&self, kernel: Kernel) -> Mask {
        self.morph(kernel, MorphOp::Erode)
    }

    #[must_use]
    pub fn dilate(&self, kernel: Kernel) -> Mask {
        self.morph(kernel, MorphOp::Dilate)
    }

    /// Dilate then erode: fills holes smaller than the kernel.
    #[must_use]
    pub fn close(&self, kernel: Kernel) -> Mask {
        self.dilate(kernel).erode(kernel)
    }

    /// Erode then dilate: removes specks smaller than the kernel.
    #[must_use]
    pub fn open(&self, kernel: Kernel) -> Mask {
        self.erode(kernel).dilate(kernel)
    }

    /// The longest foreground run along `axis` no longer than `max_len`.
    ///
    /// Ties keep the first run found scanning lines in order.
    pub fn longest_run(&self, axis: Axis, max_len: u32) -> Option<Run> {
        let (lines, len) = match axis {
            Axis::Horizontal => (self.height(), self.width()),
            Axis::Vertical => (self.width(), self.height()),
        };
        let mut best: Option<Run> = None;
        for line in 0..lines {
            let mut start = 0;
            let mut i = 0;
            while i <= len {
                let on = i < len && {
                    let (x, y) = along(axis, line, i);
                    self.is_foreground(x, y)
                };
                if !on {
                    let run = i - start;
                    if run > 0
                        && run <= max_len
                        && best.map_or(true, |b| run > b.len)
                    {
                        best = Some(Run {
                            line,
                            start,
                            len: run,
                        });
                    }
                    start = i + 1;
                }
                i += 1;
            }
        }
        best
    }

    fn morph(&self, kernel: Kernel, op: MorphOp) -> Mask {
        let horizontal = morph_pass(&self.pixels, kernel.width, Axis::Horizontal, op);
        let pixels = morph_pass(&horizontal, kernel.height, Axis::Vertical, op);
        Mask {
            pixels,
            origin: self.origin,
            inverted: self.inverted,
        }
    }
}

#[inline]
fn along(axis: Axis, line: u32, i: u32) -> (u32, u32) {
    match axis {
        Axis::Horizontal => (i, line),
        Axis::Vertical => (line, i),
    }
}

/// One separable pass of binary erosion/dilation along `axis`.
///
/// Uses per-line prefix counts, so cost is independent of the kernel size.
fn morph_pass(src: &GrayImage, size: u32, axis: Axis, op: MorphOp) -> GrayImage {
    if size <= 1 {
        return src.clone();
    }
    let (lines, len) = match axis {
        Axis::Horizontal => (src.height(), src.width()),
        Axis::Vertical => (src.width(), src.height()),
    };
    let mut out = GrayImage::new(src.width(), src.height());
    if len == 0 {
        return out;
    }
    let anchor = size / 2;
    let reach = size - 1 - anchor;
    let mut prefix = vec![0u32; len as usize + 1];

    for line in 0..lines {
        for i in 0..len {
            let (x, y) = along(axis, line, i);
            let on = u32::from(src.get_pixel(x, y)[0] != BACKGROUND);
            prefix[i as usize + 1] = prefix[i as usize] + on;
        }
        for i in 0..len {
            let start = i.saturating_sub(anchor);
            let end = i.saturating_add(reach).min(len - 1);
            let count = prefix[end as usize + 1] - prefix[start as usize];
            let on = match op {
                MorphOp::Erode => count == end - start + 1,
                MorphOp::Dilate => count > 0,
            };
            if on {
                let (x, y) = along(axis, line, i);
                out.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }
    out
}
