//! Frame descriptors stored in the catalog.

use serde::{Deserialize, Serialize};

use super::geometry::Envelope;

/// A point in geodetic degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One dataset in a mosaic catalog.
///
/// GSD values are in meters per pixel; `min_gsd` is the coarsest resolution
/// the frame should be displayed at and `max_gsd` the finest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    /// Source type tag (e.g. "cib", "geotiff")
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(default)]
    pub precision_imagery: bool,
    pub upper_left: GeoPoint,
    pub upper_right: GeoPoint,
    pub lower_right: GeoPoint,
    pub lower_left: GeoPoint,
    pub min_gsd: f64,
    pub max_gsd: f64,
    pub width: u64,
    pub height: u64,
    pub srid: i32,
}

impl Frame {
    /// Bounding rectangle of the four corners.
    pub fn bounds(&self) -> Envelope {
        Envelope::from_points(self.corners().iter())
    }

    pub fn corners(&self) -> [GeoPoint; 4] {
        [
            self.upper_left,
            self.upper_right,
            self.lower_right,
            self.lower_left,
        ]
    }
}
