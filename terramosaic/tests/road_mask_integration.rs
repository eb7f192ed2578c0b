//! End-to-end road mask generation over the on-disk layout.

use std::fs::{self, File};
use std::io::Write;

use flate2::write::GzEncoder;
use ndarray::Array3;
use terramosaic::pipeline::{DataLayout, RoadPipeline};
use terramosaic::raster::{write_geotiff_u16, Raster, RasterGrid};
use terramosaic::regions::Region;

fn write_reference_image(layout: &DataLayout, region_id: u64, grid: RasterGrid) {
    let path = layout.mosaic_path(region_id, 2021, terramosaic::daterange::Season::Summer);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let data = Array3::<u16>::from_elem((3, grid.height, grid.width), 1_000);
    write_geotiff_u16(&path, &Raster::new(grid, data)).unwrap();
}

fn write_road_graph(layout: &DataLayout, region_id: u64, graph: &serde_json::Value) {
    let path = layout.road_graph_path(region_id);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, flate2::Compression::default());
    encoder
        .write_all(&serde_json::to_vec(graph).unwrap())
        .unwrap();
    encoder.finish().unwrap();
}

fn diagonal_region(id: u64) -> Region {
    let geometry = terramosaic::catalog::GeoJsonGeometry {
        geometry_type: "Polygon".to_string(),
        coordinates: serde_json::json!([[
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
            [0.0, 0.0]
        ]]),
    };
    Region {
        id,
        name: "diagonal".to_string(),
        footprint: geometry.to_multi_polygon().unwrap(),
    }
}

#[test]
fn test_primary_diagonal_produces_aligned_three_channel_mask() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let region = diagonal_region(1);

    // 100x100 reference grid over the unit square, WGS84 like the graph.
    let reference = RasterGrid::from_bounds([0.0, 0.0, 1.0, 1.0], 100, 100, 4326);
    write_reference_image(&layout, region.id, reference);

    write_road_graph(
        &layout,
        region.id,
        &serde_json::json!({
            "epsg": 4326,
            "nodes": [
                {"id": 1, "x": 0.005, "y": 0.005},
                {"id": 2, "x": 0.995, "y": 0.995}
            ],
            "edges": [
                {"u": 1, "v": 2, "highway": "motorway"}
            ]
        }),
    );

    let pipeline = RoadPipeline::new(dir.path());
    pipeline.run_region(&region).unwrap();

    let mask = terramosaic::raster::read_geotiff(layout.road_mask_path(region.id)).unwrap();
    assert_eq!(mask.data.dim(), (3, 100, 100));
    assert_eq!(mask.grid.transform, reference.transform);
    assert_eq!(mask.grid.epsg, 4326);

    // Channel 0 (primary) carries the diagonal; the other classes have no
    // matching edges.
    let primary = mask.data.index_axis(ndarray::Axis(0), 0);
    assert_eq!(primary.iter().copied().max(), Some(255));
    assert!(mask.data.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 0));
    assert!(mask.data.index_axis(ndarray::Axis(0), 2).iter().all(|&v| v == 0));

    // The diagonal must actually span the image corner to corner.
    assert_eq!(primary[[99, 0]], 255);
    assert_eq!(primary[[0, 99]], 255);

    // The written file stores one unsigned byte per channel.
    let file = File::open(layout.road_mask_path(region.id)).unwrap();
    let mut decoder = tiff::decoder::Decoder::new(std::io::BufReader::new(file)).unwrap();
    assert_eq!(
        decoder.colortype().unwrap(),
        tiff::ColorType::RGB(8),
    );
}

#[test]
fn test_missing_graph_reported_not_panicked() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let region = diagonal_region(2);

    let reference = RasterGrid::from_bounds([0.0, 0.0, 1.0, 1.0], 10, 10, 4326);
    write_reference_image(&layout, region.id, reference);

    let pipeline = RoadPipeline::new(dir.path());
    let err = pipeline.run_region(&region).unwrap_err();
    assert!(matches!(
        err,
        terramosaic::pipeline::PipelineError::MissingGraph(_)
    ));
}

#[test]
fn test_missing_reference_image_reported() {
    let dir = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(dir.path());
    let region = diagonal_region(3);

    write_road_graph(
        &layout,
        region.id,
        &serde_json::json!({
            "epsg": 4326,
            "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2, "x": 1.0, "y": 1.0}],
            "edges": [{"u": 1, "v": 2, "highway": "motorway"}]
        }),
    );

    let pipeline = RoadPipeline::new(dir.path());
    let err = pipeline.run_region(&region).unwrap_err();
    assert!(matches!(
        err,
        terramosaic::pipeline::PipelineError::MissingReferenceImage(3)
    ));
}
