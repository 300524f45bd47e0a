//! Geometric primitives for 2D placement.

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Vec2 as GlamVec2};
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            x: center.x - size.x * 0.5,
            y: center.y - size.y * 0.5,
            width: size.x,
            height: size.y,
        }
    }

    /// Minimum corner (top-left).
    #[inline]
    pub fn min(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Maximum corner (bottom-right).
    #[inline]
    pub fn max(self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub fn contains(self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Expand the rectangle by a margin on all sides.
    pub fn expand(self, margin: f32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    /// Bounding box of the four corners after `transform`.
    pub fn transformed_bounds(self, transform: Transform2D) -> Self {
        let corners = [
            self.min(),
            Vec2::new(self.x + self.width, self.y),
            Vec2::new(self.x, self.y + self.height),
            self.max(),
        ];
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for corner in corners {
            let p = transform.transform_point(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

/// How a source is scaled into a destination box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitMode {
    /// Aspect-fit: whole source visible, centered, letterboxed.
    Contain,
    /// Aspect-fill: destination fully covered, centered, source cropped.
    Cover,
}

impl FitMode {
    /// Destination rectangle for a `source` drawn into `target` (both in pixels).
    pub fn place(self, source: Vec2, target: Vec2) -> Rect {
        if source.x <= 0.0 || source.y <= 0.0 {
            return Rect::new(0.0, 0.0, 0.0, 0.0);
        }
        let sx = target.x / source.x;
        let sy = target.y / source.y;
        let scale = match self {
            Self::Contain => sx.min(sy),
            Self::Cover => sx.max(sy),
        };
        let size = source * scale;
        Rect::from_center_size(target * 0.5, size)
    }
}

/// 2D affine transformation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    inner: Affine2,
}

impl Transform2D {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        inner: Affine2::IDENTITY,
    };

    /// Create a translation transform.
    #[inline]
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            inner: Affine2::from_translation(Vec2::new(x, y)),
        }
    }

    /// Create a scale transform.
    #[inline]
    pub fn scale(x: f32, y: f32) -> Self {
        Self {
            inner: Affine2::from_scale(Vec2::new(x, y)),
        }
    }

    /// Create a rotation transform (radians).
    #[inline]
    pub fn rotate(angle: f32) -> Self {
        Self {
            inner: Affine2::from_angle(angle),
        }
    }

    /// Map the unit rectangle of a `source`-sized image onto `dest`.
    pub fn rect_to_rect(source: Vec2, dest: Rect) -> Self {
        Self::translate(dest.x, dest.y).then(Self::scale(
            dest.width / source.x.max(f32::EPSILON),
            dest.height / source.y.max(f32::EPSILON),
        ))
    }

    /// Combine two transforms (`self * other`): `other` is applied first.
    #[inline]
    pub fn then(self, other: Self) -> Self {
        Self {
            inner: self.inner * other.inner,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(self, point: Vec2) -> Vec2 {
        self.inner.transform_point2(point)
    }

    /// Get the inverse transform.
    #[inline]
    pub fn inverse(self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }

    /// Whether the transform collapses area (cannot be inverted).
    #[inline]
    pub fn is_degenerate(self) -> bool {
        self.inner.matrix2.determinant().abs() < 1e-12
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}
