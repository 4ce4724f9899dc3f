use std::io;

use serde::{Deserialize, Serialize};

use crate::common::serializer::{Deserializable, Deserializer, Serializable, Serializer};

/// A point in projected map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointD {
    pub x: f64,
    pub y: f64,
}

impl PointD {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in projected map coordinates.
///
/// The empty rectangle has min above max on both axes; it is the identity
/// for `add_rect`, so folding any sequence of rectangles into it yields
/// their union regardless of order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectD {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for RectD {
    fn default() -> Self {
        Self::empty()
    }
}

impl RectD {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub const fn empty() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a PointD>) -> Self {
        let mut rect = Self::empty();
        for p in points {
            rect.add_point(*p);
        }
        rect
    }

    /// False for the empty rectangle. A single point is valid.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn add_point(&mut self, p: PointD) {
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    /// Grows to cover `other`. Empty rectangles add nothing.
    pub fn add_rect(&mut self, other: &RectD) {
        if !other.is_valid() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn union(mut self, other: &RectD) -> RectD {
        self.add_rect(other);
        self
    }

    pub fn is_point_inside(&self, p: PointD) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn is_rect_inside(&self, other: &RectD) -> bool {
        other.is_valid()
            && self.is_point_inside(PointD::new(other.min_x, other.min_y))
            && self.is_point_inside(PointD::new(other.max_x, other.max_y))
    }

    pub fn width(&self) -> f64 {
        if self.is_valid() { self.max_x - self.min_x } else { 0.0 }
    }

    pub fn height(&self) -> f64 {
        if self.is_valid() { self.max_y - self.min_y } else { 0.0 }
    }
}

impl Serializable for RectD {
    fn serialize<S: Serializer>(&self, serializer: &mut S) -> io::Result<()> {
        serializer.write_f64(self.min_x)?;
        serializer.write_f64(self.min_y)?;
        serializer.write_f64(self.max_x)?;
        serializer.write_f64(self.max_y)
    }
}

impl Deserializable for RectD {
    fn deserialize<D: Deserializer>(deserializer: &mut D) -> io::Result<Self> {
        Ok(RectD {
            min_x: deserializer.read_f64()?,
            min_y: deserializer.read_f64()?,
            max_x: deserializer.read_f64()?,
            max_y: deserializer.read_f64()?,
        })
    }
}

impl Serializable for PointD {
    fn serialize<S: Serializer>(&self, serializer: &mut S) -> io::Result<()> {
        serializer.write_f64(self.x)?;
        serializer.write_f64(self.y)
    }
}

impl Deserializable for PointD {
    fn deserialize<D: Deserializer>(deserializer: &mut D) -> io::Result<Self> {
        Ok(PointD {
            x: deserializer.read_f64()?,
            y: deserializer.read_f64()?,
        })
    }
}
