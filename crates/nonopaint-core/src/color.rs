//! Colour samples in floating point.

use image::Rgb;
use serde::{Deserialize, Serialize};

/// An RGB sample. Averaged samples are fractional, hence `f64` channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn from_rgb(pixel: Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Self::new(f64::from(r), f64::from(g), f64::from(b))
    }

    /// Round each channel back into a storable pixel.
    #[must_use]
    pub fn to_rgb(&self) -> Rgb<u8> {
        let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        Rgb([channel(self.r), channel(self.g), channel(self.b)])
    }

    /// Squared Euclidean distance in RGB space.
    #[must_use]
    pub fn distance_sq(&self, other: &Color) -> f64 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        dr * dr + dg * dg + db * db
    }
}

impl From<Rgb<u8>> for Color {
    fn from(pixel: Rgb<u8>) -> Self {
        Self::from_rgb(pixel)
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rgb({:.1}, {:.1}, {:.1})", self.r, self.g, self.b)
    }
}
