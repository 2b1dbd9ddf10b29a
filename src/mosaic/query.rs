//! Catalog query parameters and result ordering.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::frame::Frame;
use super::geometry::Geometry;

/// Which frame GSD a resolution bound is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GsdCompare {
    MinimumGsd,
    #[default]
    MaximumGsd,
}

impl GsdCompare {
    fn select(self, frame: &Frame) -> f64 {
        match self {
            GsdCompare::MinimumGsd => frame.min_gsd,
            GsdCompare::MaximumGsd => frame.max_gsd,
        }
    }
}

impl FromStr for GsdCompare {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "min" | "minimum" => Ok(GsdCompare::MinimumGsd),
            "max" | "maximum" => Ok(GsdCompare::MaximumGsd),
            other => Err(format!("invalid GSD comparison '{other}', expected min or max")),
        }
    }
}

/// Result ordering. Ties on GSD break on the frame type name in the same
/// direction, then on frame id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Order {
    MinGsdAsc,
    MinGsdDesc,
    MaxGsdAsc,
    #[default]
    MaxGsdDesc,
}

impl Order {
    pub fn compare(self, a: &Frame, b: &Frame) -> Ordering {
        let (gsd_a, gsd_b, descending) = match self {
            Order::MinGsdAsc => (a.min_gsd, b.min_gsd, false),
            Order::MinGsdDesc => (a.min_gsd, b.min_gsd, true),
            Order::MaxGsdAsc => (a.max_gsd, b.max_gsd, false),
            Order::MaxGsdDesc => (a.max_gsd, b.max_gsd, true),
        };

        let ordering = gsd_a
            .total_cmp(&gsd_b)
            .then_with(|| a.kind.cmp(&b.kind));
        let ordering = if descending {
            ordering.reverse()
        } else {
            ordering
        };
        ordering.then_with(|| a.id.cmp(&b.id))
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "mingsdasc" => Ok(Order::MinGsdAsc),
            "mingsddesc" => Ok(Order::MinGsdDesc),
            "maxgsdasc" => Ok(Order::MaxGsdAsc),
            "maxgsddesc" => Ok(Order::MaxGsdDesc),
            _ => Err(format!(
                "invalid order '{s}', expected one of min-gsd-asc, min-gsd-desc, max-gsd-asc, max-gsd-desc"
            )),
        }
    }
}

/// Filter and ordering for a catalog query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    /// Exact frame path
    pub path: Option<String>,
    pub spatial_filter: Option<Geometry>,
    /// Frames whose selected GSD is at most this value
    pub min_gsd: Option<f64>,
    pub min_gsd_compare: GsdCompare,
    /// Frames whose selected GSD is at least this value
    pub max_gsd: Option<f64>,
    pub max_gsd_compare: GsdCompare,
    /// Restrict to these frame types
    pub types: Option<BTreeSet<String>>,
    /// Spatial reference id; values <= 0 are ignored
    pub srid: Option<i32>,
    pub precision_imagery: Option<bool>,
    pub order: Order,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_spatial_filter(mut self, geometry: impl Into<Geometry>) -> Self {
        self.spatial_filter = Some(geometry.into());
        self
    }

    pub fn with_min_gsd(mut self, gsd: f64, compare: GsdCompare) -> Self {
        self.min_gsd = Some(gsd);
        self.min_gsd_compare = compare;
        self
    }

    pub fn with_max_gsd(mut self, gsd: f64, compare: GsdCompare) -> Self {
        self.max_gsd = Some(gsd);
        self.max_gsd_compare = compare;
        self
    }

    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.types.get_or_insert_with(BTreeSet::new).insert(kind.into());
        self
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = Some(srid);
        self
    }

    pub fn with_precision_imagery(mut self, precision: bool) -> Self {
        self.precision_imagery = Some(precision);
        self
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Whether `frame` passes every filter. The type filter is applied by
    /// store selection, not here.
    pub fn matches(&self, frame: &Frame) -> bool {
        if let Some(path) = &self.path {
            if &frame.path != path {
                return false;
            }
        }
        if let Some(gsd) = self.min_gsd {
            if self.min_gsd_compare.select(frame) > gsd {
                return false;
            }
        }
        if let Some(gsd) = self.max_gsd {
            if self.max_gsd_compare.select(frame) < gsd {
                return false;
            }
        }
        if let Some(srid) = self.srid.filter(|s| *s > 0) {
            if frame.srid != srid {
                return false;
            }
        }
        if let Some(precision) = self.precision_imagery {
            if frame.precision_imagery != precision {
                return false;
            }
        }
        if let Some(filter) = &self.spatial_filter {
            if !filter.intersects(&frame.bounds()) {
                return false;
            }
        }
        true
    }
}
