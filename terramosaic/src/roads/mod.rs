//! Road-network graph loading and classification
//!
//! Loads a serialized road graph (nodes plus edges with highway tags),
//! classifies every edge into one of the functional classes, and answers
//! bounding-box intersection queries through an R-tree. Edges whose tag
//! maps to no class are excluded from all query results; a load-time
//! validation pass reports the unmapped tags it saw.
//!
//! Alignment between the graph and the imagery it will be rasterized
//! against is the caller's responsibility.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use geo::{BoundingRect, LineString, MultiLineString, Polygon};
use rstar::{RTree, RTreeObject, AABB};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bounds::BoundingBox;

/// Errors raised while loading a road graph.
#[derive(Debug, Error)]
pub enum RoadGraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed road graph: {0}")]
    Decode(String),

    /// An edge referenced a node id that does not exist.
    #[error("Edge references unknown node id {0}")]
    DanglingNode(u64),
}

/// Functional road classes, in output channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Primary,
    Secondary,
    Local,
    /// Tag matched no bucket; excluded from all query results.
    Unclassified,
}

impl RoadClass {
    /// The three rasterized classes, in fixed channel order.
    pub const CHANNELS: [RoadClass; 3] = [RoadClass::Primary, RoadClass::Secondary, RoadClass::Local];

    /// Maps a highway tag to its functional class. The table is closed:
    /// tags outside it fall through to [`RoadClass::Unclassified`].
    pub fn from_highway_tag(tag: &str) -> Self {
        match tag {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => RoadClass::Primary,
            "primary" | "primary_link" | "secondary" | "secondary_link" => RoadClass::Secondary,
            "tertiary" | "tertiary_link" | "unclassified" | "residential" | "living_street" => {
                RoadClass::Local
            }
            _ => RoadClass::Unclassified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    /// EPSG code of the graph's coordinate system.
    #[serde(default = "default_epsg")]
    epsg: u32,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

fn default_epsg() -> u32 {
    4326
}

#[derive(Debug, Deserialize)]
struct GraphNode {
    id: u64,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct GraphEdge {
    u: u64,
    v: u64,
    highway: String,
    /// Explicit edge geometry; straight line between endpoints when absent.
    #[serde(default)]
    geometry: Option<Vec<[f64; 2]>>,
}

/// One classified road edge held by the index.
#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub class: RoadClass,
    pub line: LineString<f64>,
}

struct IndexedEdge {
    edge: RoadEdge,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The three disjoint sets of clipped edge geometries intersecting one
/// query bounding box, partitioned by functional class.
#[derive(Debug, Default, Clone)]
pub struct ClassifiedRoadSet {
    pub primary: Vec<LineString<f64>>,
    pub secondary: Vec<LineString<f64>>,
    pub local: Vec<LineString<f64>>,
}

impl ClassifiedRoadSet {
    /// Geometries for one class channel.
    pub fn for_class(&self, class: RoadClass) -> &[LineString<f64>] {
        match class {
            RoadClass::Primary => &self.primary,
            RoadClass::Secondary => &self.secondary,
            RoadClass::Local => &self.local,
            RoadClass::Unclassified => &[],
        }
    }

    fn push(&mut self, class: RoadClass, line: LineString<f64>) {
        match class {
            RoadClass::Primary => self.primary.push(line),
            RoadClass::Secondary => self.secondary.push(line),
            RoadClass::Local => self.local.push(line),
            RoadClass::Unclassified => {}
        }
    }
}

/// Spatial index over a classified road network, loaded once per graph file
/// and immutable thereafter.
pub struct RoadVectorIndex {
    tree: RTree<IndexedEdge>,
    epsg: u32,
}

impl RoadVectorIndex {
    /// Loads a road graph from a JSON file, gzip-compressed when the path
    /// ends in `.gz`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RoadGraphError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading road graph");

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let graph: GraphFile = if path.extension().is_some_and(|e| e == "gz") {
            let mut decoder = GzDecoder::new(reader);
            let mut raw = Vec::new();
            decoder.read_to_end(&mut raw)?;
            serde_json::from_slice(&raw).map_err(|e| RoadGraphError::Decode(e.to_string()))?
        } else {
            serde_json::from_reader(reader).map_err(|e| RoadGraphError::Decode(e.to_string()))?
        };

        Self::from_graph(graph)
    }

    fn from_graph(graph: GraphFile) -> Result<Self, RoadGraphError> {
        let nodes: std::collections::HashMap<u64, (f64, f64)> = graph
            .nodes
            .iter()
            .map(|n| (n.id, (n.x, n.y)))
            .collect();

        let mut unmapped: HashSet<String> = HashSet::new();
        let mut indexed = Vec::with_capacity(graph.edges.len());

        for edge in graph.edges {
            let class = RoadClass::from_highway_tag(&edge.highway);
            if class == RoadClass::Unclassified {
                unmapped.insert(edge.highway);
                continue;
            }

            let line = match edge.geometry {
                Some(coords) if coords.len() >= 2 => {
                    LineString::from(coords.iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>())
                }
                _ => {
                    let &start = nodes
                        .get(&edge.u)
                        .ok_or(RoadGraphError::DanglingNode(edge.u))?;
                    let &end = nodes
                        .get(&edge.v)
                        .ok_or(RoadGraphError::DanglingNode(edge.v))?;
                    LineString::from(vec![start, end])
                }
            };

            let Some(rect) = line.bounding_rect() else {
                continue;
            };
            indexed.push(IndexedEdge {
                edge: RoadEdge { class, line },
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            });
        }

        if !unmapped.is_empty() {
            warn!(tags = ?unmapped, "Excluding edges with unmapped highway tags");
        }
        debug!(edges = indexed.len(), "Road graph indexed");

        Ok(Self {
            tree: RTree::bulk_load(indexed),
            epsg: graph.epsg,
        })
    }

    /// EPSG code of the graph's native coordinate system.
    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Returns all classified edges intersecting `bbox`, clipped to it.
    /// Edges whose clipped intersection is geometrically empty are dropped
    /// even when their envelope nominally overlaps the box.
    pub fn query(&self, bbox: &BoundingBox) -> ClassifiedRoadSet {
        use geo::BooleanOps;

        let envelope = AABB::from_corners(
            [bbox.min_lon, bbox.min_lat],
            [bbox.max_lon, bbox.max_lat],
        );
        let clip_polygon: Polygon<f64> = bbox.to_polygon();

        let mut set = ClassifiedRoadSet::default();
        for indexed in self.tree.locate_in_envelope_intersecting(&envelope) {
            let clipped = clip_polygon
                .clip(&MultiLineString(vec![indexed.edge.line.clone()]), false);
            for line in clipped.0 {
                if line.0.len() >= 2 {
                    set.push(indexed.edge.class, line);
                }
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_json() -> serde_json::Value {
        serde_json::json!({
            "epsg": 4326,
            "nodes": [
                {"id": 1, "x": 0.0, "y": 0.0},
                {"id": 2, "x": 1.0, "y": 1.0},
                {"id": 3, "x": 5.0, "y": 5.0},
                {"id": 4, "x": 6.0, "y": 5.0}
            ],
            "edges": [
                {"u": 1, "v": 2, "highway": "motorway"},
                {"u": 1, "v": 2, "highway": "residential",
                 "geometry": [[0.0, 0.5], [0.4, 0.5], [0.9, 0.6]]},
                {"u": 3, "v": 4, "highway": "secondary"},
                {"u": 1, "v": 2, "highway": "footway"}
            ]
        })
    }

    fn load_graph() -> RoadVectorIndex {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::write(&path, serde_json::to_vec(&graph_json()).unwrap()).unwrap();
        RoadVectorIndex::load(&path).unwrap()
    }

    #[test]
    fn test_highway_tag_mapping_buckets() {
        assert_eq!(RoadClass::from_highway_tag("trunk"), RoadClass::Primary);
        assert_eq!(RoadClass::from_highway_tag("primary"), RoadClass::Secondary);
        assert_eq!(
            RoadClass::from_highway_tag("living_street"),
            RoadClass::Local
        );
        assert_eq!(
            RoadClass::from_highway_tag("cycleway"),
            RoadClass::Unclassified
        );
    }

    #[test]
    fn test_query_partitions_by_class() {
        let index = load_graph();
        let set = index.query(&BoundingBox::new(-1.0, -1.0, 2.0, 2.0));
        assert_eq!(set.primary.len(), 1);
        assert_eq!(set.local.len(), 1);
        // The secondary edge lies outside this bbox.
        assert!(set.secondary.is_empty());
    }

    #[test]
    fn test_unmapped_tags_excluded_entirely() {
        let index = load_graph();
        let set = index.query(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0));
        let total = set.primary.len() + set.secondary.len() + set.local.len();
        // The footway edge never appears in any class.
        assert_eq!(total, 3);
    }

    #[test]
    fn test_edges_clipped_to_query_bbox() {
        let index = load_graph();
        // Box covering only the west half of the diagonal motorway edge.
        let set = index.query(&BoundingBox::new(-1.0, -1.0, 0.5, 0.5));
        assert_eq!(set.primary.len(), 1);
        let clipped = &set.primary[0];
        for coord in &clipped.0 {
            assert!(coord.x <= 0.5 + 1e-9);
            assert!(coord.y <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_disjoint_bbox_yields_empty_set() {
        let index = load_graph();
        let set = index.query(&BoundingBox::new(20.0, 20.0, 30.0, 30.0));
        assert!(set.primary.is_empty() && set.secondary.is_empty() && set.local.is_empty());
    }

    #[test]
    fn test_gzipped_graph_loads() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, flate2::Compression::default());
        encoder
            .write_all(&serde_json::to_vec(&graph_json()).unwrap())
            .unwrap();
        encoder.finish().unwrap();

        let index = RoadVectorIndex::load(&path).unwrap();
        assert_eq!(index.epsg(), 4326);
    }

    #[test]
    fn test_dangling_node_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let graph = serde_json::json!({
            "nodes": [{"id": 1, "x": 0.0, "y": 0.0}],
            "edges": [{"u": 1, "v": 99, "highway": "motorway"}]
        });
        std::fs::write(&path, serde_json::to_vec(&graph).unwrap()).unwrap();
        assert!(matches!(
            RoadVectorIndex::load(&path),
            Err(RoadGraphError::DanglingNode(99))
        ));
    }
}
