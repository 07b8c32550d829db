use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// A landmark position in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned extent of a landmark set, in the same float pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

/// One detected hand: the detector's ordered landmark points for a single frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandLandmarks {
    points: Vec<Point2D>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Min/max over all x and all y. `None` for an empty set.
    pub fn bounds(&self) -> Option<Bounds> {
        let first = self.points.first()?;
        let init = Bounds {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        Some(self.points[1..].iter().fold(init, |b, p| Bounds {
            min_x: b.min_x.min(p.x),
            max_x: b.max_x.max(p.x),
            min_y: b.min_y.min(p.y),
            max_y: b.max_y.max(p.y),
        }))
    }
}

impl FromIterator<Point2D> for HandLandmarks {
    fn from_iter<I: IntoIterator<Item = Point2D>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Target rectangle the hand must sit inside, as signed pixel edges.
///
/// Corners may lie outside the frame (a centered region larger than the
/// frame has negative top-left coordinates); only the extent must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self, GeometryError> {
        if right <= left || bottom <= top {
            return Err(GeometryError::EmptyRegion {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Square of `side` pixels centered on a `frame_width` x `frame_height` frame.
    pub fn centered(frame_width: u32, frame_height: u32, side: NonZeroU32) -> Self {
        let side = i64::from(side.get());
        let left = (i64::from(frame_width) - side).div_euclid(2);
        let top = (i64::from(frame_height) - side).div_euclid(2);
        Self {
            left: saturate(left),
            top: saturate(top),
            right: saturate(left + side),
            bottom: saturate(top + side),
        }
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }

    /// `left < x < right`
    pub fn strictly_spans_x(&self, x: f32) -> bool {
        (self.left as f32) < x && x < (self.right as f32)
    }

    /// `top < y < bottom`
    pub fn strictly_spans_y(&self, y: f32) -> bool {
        (self.top as f32) < y && y < (self.bottom as f32)
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Half-open pixel rectangle `[x, x + width) x [y, y + height)` inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Build from edges; `right`/`bottom` below `left`/`top` collapse to zero extent.
    pub fn from_edges(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            x: left,
            y: top,
            width: right.saturating_sub(left),
            height: bottom.saturating_sub(top),
        }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Zero width or zero height.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("region ({left},{top})-({right},{bottom}) has no extent")]
    EmptyRegion {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },
}
