//! Raster images that remember where they sit in the original capture.
//!
//! Every crop composes the parent's root origin with the local crop offset,
//! so a rect taken from any image in a crop chain can be used directly
//! against the full-resolution screenshot.

use image::{imageops, ImageResult, Rgb, RgbImage};

use crate::color::Color;
use crate::geometry::{Point, Rect};

/// An RGB pixel buffer plus its origin in the root frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbImage,
    origin: Point,
}

impl RasterImage {
    /// Wrap a full-screen capture. Its origin is the root origin.
    #[must_use]
    pub fn from_screen(pixels: RgbImage) -> Self {
        Self::with_origin(pixels, Point::default())
    }

    #[must_use]
    pub fn with_origin(pixels: RgbImage, origin: Point) -> Self {
        Self { pixels, origin }
    }

    /// Decode an encoded image (PNG from the device bridge, a saved file).
    pub fn decode(bytes: &[u8]) -> ImageResult<Self> {
        let pixels = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Self::from_screen(pixels))
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

    /// This image's bounding box in the root frame.
    pub fn rect(&self) -> Rect {
        Rect::new(self.origin.x, self.origin.y, self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbImage {
        self.pixels
    }

    /// Pixel at local coordinates.
    pub fn pixel(&self, point: Point) -> Rgb<u8> {
        *self.pixels.get_pixel(point.x, point.y)
    }

    /// Crop to a rect local to this image.
    ///
    /// The rect is clamped to the image bounds. The result's origin is this
    /// image's origin plus the local offset.
    #[must_use]
    pub fn crop(&self, local: Rect) -> RasterImage {
        let pixels =
            imageops::crop_imm(&self.pixels, local.x, local.y, local.width, local.height)
                .to_image();
        let origin = Point::new(
            self.origin.x + local.x.min(self.width()),
            self.origin.y + local.y.min(self.height()),
        );
        Self { pixels, origin }
    }

    /// Average colour over a local rect, clamped to the image bounds.
    ///
    /// Returns `None` when the clamped rect is empty.
    pub fn average(&self, local: Rect) -> Option<Color> {
        let right = local.right().min(self.width());
        let bottom = local.bottom().min(self.height());
        if local.x >= right || local.y >= bottom {
            return None;
        }
        let mut sum = [0u64; 3];
        for y in local.y..bottom {
            for x in local.x..right {
                let [r, g, b] = self.pixels.get_pixel(x, y).0;
                sum[0] += u64::from(r);
                sum[1] += u64::from(g);
                sum[2] += u64::from(b);
            }
        }
        let count = f64::from(right - local.x) * f64::from(bottom - local.y);
        Some(Color::new(
            sum[0] as f64 / count,
            sum[1] as f64 / count,
            sum[2] as f64 / count,
        ))
    }
}

/// A square of side `2 * radius + 1` centred on `center`, clipped to `bounds`.
pub(crate) fn sample_rect(center: Point, radius: u32, bounds: Rect) -> Rect {
    let left = center.x.saturating_sub(radius).max(bounds.x);
    let top = center.y.saturating_sub(radius).max(bounds.y);
    let right = (center.x + radius + 1).min(bounds.right());
    let bottom = (center.y + radius + 1).min(bounds.bottom());
    if left >= right || top >= bottom {
        return Rect::empty();
    }
    Rect::new(left, top, right - left, bottom - top)
}
