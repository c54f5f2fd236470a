// Screen-space window rectangles and the overlap rule.

use serde::{Deserialize, Serialize};

/// Outer window rectangle in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WindowRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    // Edges are widened to i64; peer rectangles arrive unchecked off the bus.
    pub fn left(&self) -> i64 {
        i64::from(self.x)
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn top(&self) -> i64 {
        i64::from(self.y)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// AABB intersection. Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &WindowRect) -> bool {
        !(other.left() >= self.right()
            || other.right() <= self.left()
            || other.top() >= self.bottom()
            || other.bottom() <= self.top())
    }

    /// True when any coordinate moved by more than `threshold` pixels.
    pub fn differs_by_more_than(&self, other: &WindowRect, threshold: i32) -> bool {
        let limit = u64::from(threshold.unsigned_abs());
        [
            (self.x, other.x),
            (self.y, other.y),
            (self.width, other.width),
            (self.height, other.height),
        ]
        .into_iter()
        .any(|(a, b)| u64::from(a.abs_diff(b)) > limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub label: String,
    pub rect: WindowRect,
    /// Local time (epoch millis) the record was last refreshed.
    pub timestamp: u64,
}
