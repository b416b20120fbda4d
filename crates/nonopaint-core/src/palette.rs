//! Palette entries and nearest-colour resolution.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::geometry::Point;

/// A selectable colour and where to tap to select it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub color: Color,
    /// Absolute device coordinates.
    pub tap_point: Point,
}

/// The colours of a coloured puzzle plus the grid's background colour.
///
/// The background is a sentinel: cells resolving to it are never painted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    background: Color,
}

/// Outcome of resolving a sampled colour against a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Entry(usize),
    Background,
}

impl Palette {
    pub fn new(entries: Vec<PaletteEntry>, background: Color) -> Self {
        Self {
            entries,
            background,
        }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates in resolution order; the background comes last.
    fn candidates(&self) -> impl Iterator<Item = Color> + '_ {
        self.entries
            .iter()
            .map(|e| e.color)
            .chain(std::iter::once(self.background))
    }

    /// Resolve a sample to the nearest candidate.
    ///
    /// An exact match wins outright. Otherwise the minimum squared distance
    /// wins, and ties go to the lowest index, so an entry equal to the
    /// background shadows the background.
    pub fn resolve(&self, sample: Color) -> Resolved {
        let index = self
            .candidates()
            .position(|c| c == sample)
            .unwrap_or_else(|| {
                let mut best = 0;
                let mut best_distance = f64::INFINITY;
                for (i, candidate) in self.candidates().enumerate() {
                    let distance = candidate.distance_sq(&sample);
                    if distance < best_distance {
                        best = i;
                        best_distance = distance;
                    }
                }
                best
            });

        if index < self.entries.len() {
            Resolved::Entry(index)
        } else {
            Resolved::Background
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(r: f64, g: f64, b: f64, x: u32) -> PaletteEntry {
        PaletteEntry {
            color: Color::new(r, g, b),
            tap_point: Point::new(x, 500),
        }
    }

    fn palette() -> Palette {
        Palette::new(
            vec![
                entry(200.0, 40.0, 40.0, 10),
                entry(40.0, 180.0, 60.0, 20),
                entry(60.0, 80.0, 220.0, 30),
            ],
            Color::new(255.0, 255.0, 255.0),
        )
    }

    #[test]
    fn exact_match_resolves_to_its_index() {
        let palette = palette();
        assert_eq!(palette.resolve(Color::new(40.0, 180.0, 60.0)), Resolved::Entry(1));
    }

    #[test]
    fn exact_match_wins_over_earlier_near_candidate() {
        let target = Color::new(0.1 + 0.2, 0.0, 0.0);
        let palette = Palette::new(
            vec![
                entry(0.3, 0.0, 0.0, 10),
                PaletteEntry {
                    color: target,
                    tap_point: Point::new(20, 500),
                },
            ],
            Color::new(255.0, 255.0, 255.0),
        );
        assert_ne!(Color::new(0.3, 0.0, 0.0), target);
        assert_eq!(palette.resolve(target), Resolved::Entry(1));
    }

    #[test]
    fn duplicate_colors_resolve_to_lower_index() {
        let palette = Palette::new(
            vec![
                entry(10.0, 10.0, 10.0, 10),
                entry(90.0, 90.0, 90.0, 20),
                entry(90.0, 90.0, 90.0, 30),
            ],
            Color::new(255.0, 255.0, 255.0),
        );
        assert_eq!(palette.resolve(Color::new(90.0, 90.0, 90.0)), Resolved::Entry(1));
        assert_eq!(palette.resolve(Color::new(95.0, 90.0, 85.0)), Resolved::Entry(1));
    }

    #[test]
    fn equidistant_sample_takes_lowest_index() {
        let palette = Palette::new(
            vec![entry(0.0, 0.0, 0.0, 10), entry(20.0, 0.0, 0.0, 20)],
            Color::new(255.0, 255.0, 255.0),
        );
        assert_eq!(palette.resolve(Color::new(10.0, 0.0, 0.0)), Resolved::Entry(0));
    }

    #[test]
    fn nearest_color_wins() {
        let palette = palette();
        assert_eq!(palette.resolve(Color::new(190.0, 50.0, 45.0)), Resolved::Entry(0));
        assert_eq!(palette.resolve(Color::new(70.0, 90.0, 200.0)), Resolved::Entry(2));
    }

    #[test]
    fn background_sentinel_is_resolved() {
        let palette = palette();
        assert_eq!(palette.resolve(Color::new(250.0, 250.0, 248.0)), Resolved::Background);
    }

    #[test]
    fn entry_equal_to_background_shadows_it() {
        let palette = Palette::new(
            vec![entry(255.0, 255.0, 255.0, 10)],
            Color::new(255.0, 255.0, 255.0),
        );
        assert_eq!(palette.resolve(Color::new(255.0, 255.0, 255.0)), Resolved::Entry(0));
    }

    #[test]
    fn empty_palette_resolves_everything_to_background() {
        let palette = Palette::new(Vec::new(), Color::new(255.0, 255.0, 255.0));
        assert!(palette.is_empty());
        assert_eq!(palette.resolve(Color::new(0.0, 0.0, 0.0)), Resolved::Background);
    }
}
