//! Integer geometry shared by the image pipeline and the tap planner.
//!
//! All rects handed out by the pipeline are expressed in the coordinate space
//! of the original full-screen capture (the "root" frame). Local rects are
//! composed into the root frame with [`Rect::offset`].

use serde::{Deserialize, Serialize};

/// A pixel position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle. A rect with zero area means "not found".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The zero-area sentinel.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[must_use]
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Translate a rect local to some image into that image's parent frame.
    #[must_use]
    pub fn offset(&self, origin: Point) -> Self {
        Self::new(self.x + origin.x, self.y + origin.y, self.width, self.height)
    }

    /// Shrink by `inset` pixels on every side.
    ///
    /// Returns the empty sentinel when nothing is left.
    #[must_use]
    pub fn shrink(&self, inset: u32) -> Self {
        let twice = inset.saturating_mul(2);
        if self.width <= twice || self.height <= twice {
            return Self::empty();
        }
        Self::new(
            self.x + inset,
            self.y + inset,
            self.width - twice,
            self.height - twice,
        )
    }

    /// Whether `other` lies entirely inside `self`.
    #[must_use]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}
