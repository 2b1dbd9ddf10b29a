//! Planar envelopes and coverage geometries in degrees.
//!
//! `x` is longitude and `y` is latitude throughout.

use serde::{Deserialize, Serialize};

use super::frame::GeoPoint;

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    /// Build an envelope from two opposite corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// An envelope that contains nothing and absorbs the first point or
    /// envelope it is unioned with.
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Smallest envelope holding every point; empty for no points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a GeoPoint>) -> Self {
        let mut envelope = Self::empty();
        for p in points {
            envelope.include_point(p.longitude, p.latitude);
        }
        envelope
    }

    pub fn is_empty(&self) -> bool {
        self.max_x < self.min_x || self.max_y < self.min_y
    }

    pub fn include_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        self.include_point(other.min_x, other.min_y);
        self.include_point(other.max_x, other.max_y);
    }

    /// Whether the two envelopes share at least one point (edges count).
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Closed ring tracing the envelope: UL, UR, LR, LL, UL.
    pub fn to_ring(&self) -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(self.max_y, self.min_x),
            GeoPoint::new(self.max_y, self.max_x),
            GeoPoint::new(self.min_y, self.max_x),
            GeoPoint::new(self.min_y, self.min_x),
            GeoPoint::new(self.max_y, self.min_x),
        ]
    }
}

/// Spatial filter or coverage shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Point(GeoPoint),
    Envelope(Envelope),
    /// Exterior ring; the closing point may be omitted
    Polygon { ring: Vec<GeoPoint> },
}

impl Geometry {
    pub fn envelope(&self) -> Envelope {
        match self {
            Geometry::Point(p) => Envelope::new(p.longitude, p.latitude, p.longitude, p.latitude),
            Geometry::Envelope(e) => *e,
            Geometry::Polygon { ring } => Envelope::from_points(ring),
        }
    }

    /// Coarse intersection test on bounding rectangles.
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.envelope().intersects(other)
    }
}

impl From<Envelope> for Geometry {
    fn from(envelope: Envelope) -> Self {
        Geometry::Envelope(envelope)
    }
}
