//! Mosaic catalog tests against catalogs written to a temporary directory.

use tempfile::TempDir;

use tilecore::error::CatalogError;
use tilecore::mosaic::{
    Envelope, Frame, GeoPoint, Geometry, GsdCompare, MosaicBuilder, MosaicDatabase, Order,
    QueryParameters,
};

/// An axis-aligned frame covering `[lon0, lon1] x [lat0, lat1]`.
fn frame(kind: &str, path: &str, lon0: f64, lat0: f64, lon1: f64, lat1: f64, gsd: (f64, f64)) -> Frame {
    Frame {
        id: 0,
        kind: kind.to_string(),
        path: path.to_string(),
        precision_imagery: false,
        upper_left: GeoPoint::new(lat1, lon0),
        upper_right: GeoPoint::new(lat1, lon1),
        lower_right: GeoPoint::new(lat0, lon1),
        lower_left: GeoPoint::new(lat0, lon0),
        min_gsd: gsd.0,
        max_gsd: gsd.1,
        width: 1024,
        height: 1024,
        srid: 4326,
    }
}

/// Four frames in two types; ids 1 to 4 in insertion order.
fn catalog() -> (TempDir, MosaicDatabase) {
    let dir = tempfile::tempdir().unwrap();

    let mut builder = MosaicBuilder::new();
    builder.insert(frame("ortho", "a.ntf", 0.0, 0.0, 1.0, 1.0, (0.25, 0.5)));
    builder.insert(frame("ortho", "b.ntf", 1.0, 0.0, 2.0, 1.0, (1.0, 2.0)));
    let mut precise = frame("sat", "c.ntf", 10.0, 10.0, 11.0, 11.0, (0.5, 1.0));
    precise.precision_imagery = true;
    builder.insert(precise);
    let mut projected = frame("sat", "d.ntf", -5.0, -5.0, -4.0, -4.0, (2.0, 3.0));
    projected.srid = 32633;
    builder.insert(projected);
    builder.write(dir.path()).unwrap();

    let db = MosaicDatabase::open(dir.path()).unwrap();
    (dir, db)
}

fn ids(db: &MosaicDatabase, params: &QueryParameters) -> Vec<u64> {
    db.query(params).unwrap().map(|f| f.id).collect()
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn test_all_types_merged_in_order() {
    let (_dir, db) = catalog();

    assert_eq!(db.types(), vec!["ortho".to_string(), "sat".to_string()]);
    assert_eq!(ids(&db, &QueryParameters::new()), vec![4, 2, 3, 1]);
    assert_eq!(
        ids(&db, &QueryParameters::new().with_order(Order::MinGsdAsc)),
        vec![1, 3, 2, 4]
    );
}

#[test]
fn test_type_selection() {
    let (_dir, db) = catalog();

    let params = QueryParameters::new().with_type("sat");
    assert_eq!(ids(&db, &params), vec![4, 3]);

    // unknown types select nothing
    assert!(ids(&db, &QueryParameters::new().with_type("radar")).is_empty());
    let params = QueryParameters::new().with_type("radar").with_type("sat");
    assert_eq!(ids(&db, &params), vec![4, 3]);
}

#[test]
fn test_spatial_filter() {
    let (_dir, db) = catalog();

    // touches the shared edge of a and b
    let params = QueryParameters::new().with_spatial_filter(Envelope::new(0.5, 0.5, 1.0, 0.75));
    assert_eq!(ids(&db, &params), vec![2, 1]);

    let point = Geometry::Point(GeoPoint::new(10.5, 10.5));
    assert_eq!(ids(&db, &QueryParameters::new().with_spatial_filter(point)), vec![3]);

    let nowhere = QueryParameters::new().with_spatial_filter(Envelope::new(50.0, 50.0, 60.0, 60.0));
    assert!(ids(&db, &nowhere).is_empty());
}

#[test]
fn test_gsd_filters() {
    let (_dir, db) = catalog();

    let fine = QueryParameters::new().with_min_gsd(1.0, GsdCompare::MaximumGsd);
    assert_eq!(ids(&db, &fine), vec![3, 1]);

    let coarse = QueryParameters::new().with_max_gsd(1.0, GsdCompare::MinimumGsd);
    assert_eq!(ids(&db, &coarse), vec![4, 2]);

    let band = QueryParameters::new()
        .with_min_gsd(2.0, GsdCompare::MaximumGsd)
        .with_max_gsd(0.5, GsdCompare::MinimumGsd);
    assert_eq!(ids(&db, &band), vec![2, 3]);
}

#[test]
fn test_scalar_filters() {
    let (_dir, db) = catalog();

    assert_eq!(ids(&db, &QueryParameters::new().with_path("b.ntf")), vec![2]);
    assert_eq!(
        ids(&db, &QueryParameters::new().with_precision_imagery(true)),
        vec![3]
    );
    assert_eq!(ids(&db, &QueryParameters::new().with_srid(32633)), vec![4]);
    // non-positive srid is no filter
    assert_eq!(ids(&db, &QueryParameters::new().with_srid(0)).len(), 4);
}

// =============================================================================
// Coverage and Lifecycle
// =============================================================================

#[test]
fn test_coverages() {
    let (_dir, db) = catalog();

    let ortho = db.coverage_for("ortho").unwrap().unwrap();
    assert_eq!(ortho.geometry.envelope(), Envelope::new(0.0, 0.0, 2.0, 1.0));
    assert_eq!(ortho.min_gsd, 1.0);
    assert_eq!(ortho.max_gsd, 0.5);
    assert!(db.coverage_for("radar").unwrap().is_none());

    let all = db.coverage().unwrap();
    assert_eq!(all.geometry.envelope(), Envelope::new(-5.0, -5.0, 11.0, 11.0));
}

#[test]
fn test_cursor_close_stops_results() {
    let (_dir, db) = catalog();

    let mut cursor = db.query(&QueryParameters::new()).unwrap();
    assert_eq!(cursor.next().map(|f| f.id), Some(4));
    cursor.close();
    assert!(cursor.is_closed());
    assert!(cursor.next().is_none());
}

#[test]
fn test_closed_catalog_rejects_queries() {
    let (_dir, mut db) = catalog();

    db.close().unwrap();
    assert!(db.is_closed());
    assert!(matches!(
        db.query(&QueryParameters::new()),
        Err(CatalogError::Closed)
    ));
    assert!(matches!(db.coverage(), Err(CatalogError::Closed)));
    assert!(matches!(db.close(), Err(CatalogError::Closed)));
}

#[test]
fn test_frames_round_trip_through_json() {
    let (dir, db) = catalog();

    let frames: Vec<Frame> = db
        .query(&QueryParameters::new().with_type("sat"))
        .unwrap()
        .collect();
    assert_eq!(frames[0].path, "d.ntf");
    assert_eq!(frames[0].srid, 32633);
    assert_eq!(frames[1].lower_left, GeoPoint::new(10.0, 10.0));
    assert!(dir.path().join("sat.json").is_file());
}
