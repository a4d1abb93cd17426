//! Link auto-routing.
//!
//! Links drawn on the map often arrive without endpoint names. For each
//! missing endpoint the closest node within a search buffer around the
//! polyline's first or last vertex is taken. The buffer is a polygon
//! approximating a circle of radius `routing_tolerance`, with
//! `buffer_segments` segments per quarter circle, so a node exactly on the
//! tolerance radius may fall just outside it.

use std::f64::consts::FRAC_PI_2;

use hashbrown::HashMap;
use sdi_core::config::SchematizeConfig;
use sdi_core::{Diagnostics, IssueKind, Link, Network, Point, Polygon, SdiResult};
use sdi_store::Store;
use serde::Serialize;
use tracing::{debug, info};

/// Bucket index over node points
#[derive(Debug)]
pub struct NodeIndex {
    bucket_size: f64,
    points: Vec<(String, Point)>,
    buckets: HashMap<(i64, i64), Vec<usize>>,
}

impl NodeIndex {
    /// Index `points` into square buckets of side `bucket_size`
    pub fn new(points: Vec<(String, Point)>, bucket_size: f64) -> Self {
        let bucket_size = if bucket_size > 0.0 { bucket_size } else { 1.0 };
        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, (_, p)) in points.iter().enumerate() {
            buckets.entry(bucket_of(p, bucket_size)).or_default().push(idx);
        }
        Self {
            bucket_size,
            points,
            buckets,
        }
    }

    /// Every node and storage unit of `network`
    pub fn from_network(network: &Network, bucket_size: f64) -> Self {
        let points = network
            .nodes
            .iter()
            .map(|n| (n.name.clone(), n.location))
            .chain(network.storage_units.iter().map(|u| (u.name.clone(), u.location)))
            .collect();
        Self::new(points, bucket_size)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest node inside `buffer`, with its distance from `center`.
    /// Equal distances go to the node indexed first.
    pub fn nearest_in(&self, center: &Point, buffer: &Polygon) -> Option<(&str, f64)> {
        let bbox = buffer.bbox()?;
        let (c0, r0) = bucket_of(&Point::new(bbox.min_x, bbox.min_y), self.bucket_size);
        let (c1, r1) = bucket_of(&Point::new(bbox.max_x, bbox.max_y), self.bucket_size);

        let mut best: Option<(usize, f64)> = None;
        for row in r0..=r1 {
            for col in c0..=c1 {
                let Some(indices) = self.buckets.get(&(col, row)) else {
                    continue;
                };
                for &idx in indices {
                    let point = &self.points[idx].1;
                    if !buffer.contains(point) {
                        continue;
                    }
                    let d = center.distance(point);
                    let closer = match best {
                        None => true,
                        Some((b, bd)) => d < bd || (d == bd && idx < b),
                    };
                    if closer {
                        best = Some((idx, d));
                    }
                }
            }
        }
        best.map(|(idx, d)| (self.points[idx].0.as_str(), d))
    }
}

fn bucket_of(p: &Point, size: f64) -> (i64, i64) {
    ((p.x / size).floor() as i64, (p.y / size).floor() as i64)
}

/// Polygon approximating a circle, `segments` edges per quarter
pub fn buffer_polygon(center: Point, radius: f64, segments: u32) -> Polygon {
    let per_quarter = segments.max(1);
    let total = per_quarter * 4;
    let step = FRAC_PI_2 / per_quarter as f64;
    let ring = (0..total)
        .map(|i| {
            let angle = i as f64 * step;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect();
    Polygon::new(ring)
}

/// Endpoints chosen for one link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedLink {
    pub link: String,
    pub inlet_node: Option<String>,
    pub outlet_node: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingReport {
    pub routed: Vec<RoutedLink>,
    /// Missing endpoints for which no node was in range
    pub unresolved: usize,
    pub diagnostics: Diagnostics,
}

fn is_unnamed(endpoint: &Option<String>) -> bool {
    endpoint.as_deref().map_or(true, |n| n.trim().is_empty())
}

/// Whether auto-routing would touch this link
pub fn needs_routing(link: &Link) -> bool {
    is_unnamed(&link.inlet_node) || is_unnamed(&link.outlet_node)
}

/// Pick endpoints for every link with a missing endpoint name. Pure.
pub fn route_links(network: &Network, config: &SchematizeConfig) -> RoutingReport {
    let index = NodeIndex::from_network(network, config.routing_tolerance * 2.0);
    let mut report = RoutingReport::default();

    for link in network.links.iter().filter(|l| needs_routing(l)) {
        let mut resolve = |current: &Option<String>, vertex: Option<Point>, end: &str| {
            if !is_unnamed(current) {
                return current.clone();
            }
            let found = vertex.and_then(|v| {
                let buffer = buffer_polygon(v, config.routing_tolerance, config.buffer_segments);
                index.nearest_in(&v, &buffer).map(|(name, d)| (name.to_string(), d))
            });
            match found {
                Some((name, distance)) => {
                    debug!(link = %link.name, end, node = %name, distance, "endpoint routed");
                    Some(name)
                }
                None => {
                    report.unresolved += 1;
                    report.diagnostics.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("no node within {} of the {end} end", config.routing_tolerance),
                        &link.name,
                    );
                    None
                }
            }
        };
        let inlet_node = resolve(&link.inlet_node, link.geometry.first(), "upstream");
        let outlet_node = resolve(&link.outlet_node, link.geometry.last(), "downstream");

        if inlet_node != link.inlet_node || outlet_node != link.outlet_node {
            report.routed.push(RoutedLink {
                link: link.name.clone(),
                inlet_node,
                outlet_node,
            });
        }
    }
    report
}

/// Route the stored links, one endpoint update per link
pub fn auto_route_links(store: &mut Store, config: &SchematizeConfig) -> SdiResult<RoutingReport> {
    let network = store.load_network()?;
    let report = route_links(&network, config);
    for routed in &report.routed {
        store.set_link_endpoints(
            &routed.link,
            routed.inlet_node.as_deref(),
            routed.outlet_node.as_deref(),
        )?;
    }
    info!(
        routed = report.routed.len(),
        unresolved = report.unresolved,
        "links auto-routed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_polygon_shape() {
        let buffer = buffer_polygon(Point::new(0.0, 0.0), 5.0, 5);
        assert_eq!(buffer.ring.len(), 20);
        assert!(buffer.contains(&Point::new(4.5, 0.0)));
        assert!(!buffer.contains(&Point::new(5.1, 0.0)));
        assert!(!buffer.contains(&Point::new(3.6, 3.6)));
    }

    #[test]
    fn test_nearest_prefers_closest_then_first() {
        let index = NodeIndex::new(
            vec![
                ("A".into(), Point::new(2.0, 0.0)),
                ("B".into(), Point::new(1.0, 0.0)),
                ("C".into(), Point::new(-1.0, 0.0)),
            ],
            10.0,
        );
        let center = Point::new(0.0, 0.0);
        let buffer = buffer_polygon(center, 5.0, 5);
        assert_eq!(index.nearest_in(&center, &buffer).map(|(n, _)| n), Some("B"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_search_crosses_bucket_edges() {
        let index = NodeIndex::new(vec![("A".into(), Point::new(-0.5, -0.5))], 10.0);
        let center = Point::new(0.5, 0.5);
        let buffer = buffer_polygon(center, 5.0, 5);
        assert_eq!(index.nearest_in(&center, &buffer).map(|(n, _)| n), Some("A"));
    }

    #[test]
    fn test_named_endpoints_are_kept() {
        let mut link = Link::new("C1", "J1", "", sdi_core::LinkKind::Conduit(Default::default()));
        assert!(needs_routing(&link));
        link.outlet_node = Some("J2".into());
        assert!(!needs_routing(&link));
    }
}
