use crate::common::serializer::Serializable;
use crate::geometry::rect::RectD;

/// Anything the collector can store: it serializes itself and reports its
/// bounding rectangle. What the bytes mean is up to the implementor.
pub trait Feature: Serializable {
    fn bounding_rect(&self) -> RectD;
}

