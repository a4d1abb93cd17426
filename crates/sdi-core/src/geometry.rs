//! Planar geometry used by the network model.
//!
//! Coordinates are assumed to be in one consistent planar unit; there is no
//! CRS handling. Geometries are persisted as WKT text, so this module also
//! carries a small WKT encoder/decoder for the three shapes the store uses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SdiError, SdiResult};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.x, self.y)
    }

    pub fn from_wkt(text: &str) -> SdiResult<Self> {
        let body = wkt_body(text, "POINT")?;
        let mut points = parse_coordinate_list(body)?;
        match (points.pop(), points.is_empty()) {
            (Some(point), true) => Ok(point),
            _ => Err(SdiError::Parse(format!("expected a single point in '{text}'"))),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }

    /// Square box of half-width `radius` around `center`
    pub fn around(center: Point, radius: f64) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        )
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bbox = Self::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bbox.min_x = bbox.min_x.min(p.x);
            bbox.min_y = bbox.min_y.min(p.y);
            bbox.max_x = bbox.max_x.max(p.x);
            bbox.max_y = bbox.max_y.max(p.y);
        }
        Some(bbox)
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Ordered vertex list of a link
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<Point>,
}

impl Polyline {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn segment(start: Point, end: Point) -> Self {
        Self {
            vertices: vec![start, end],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn first(&self) -> Option<Point> {
        self.vertices.first().copied()
    }

    pub fn last(&self) -> Option<Point> {
        self.vertices.last().copied()
    }

    pub fn length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|pair| pair[0].distance(&pair[1]))
            .sum()
    }

    /// Point at `station` (distance from the first vertex), clamped to the line
    pub fn point_at(&self, station: f64) -> Option<Point> {
        let first = self.first()?;
        if station <= 0.0 {
            return Some(first);
        }
        let mut walked = 0.0;
        for pair in self.vertices.windows(2) {
            let seg = pair[0].distance(&pair[1]);
            if seg > 0.0 && walked + seg >= station {
                let t = (station - walked) / seg;
                return Some(Point::new(
                    pair[0].x + t * (pair[1].x - pair[0].x),
                    pair[0].y + t * (pair[1].y - pair[0].y),
                ));
            }
            walked += seg;
        }
        self.last()
    }

    /// Points every `spacing` units along the line, both ends included
    pub fn stations(&self, spacing: f64) -> Vec<Point> {
        let length = self.length();
        if self.vertices.is_empty() {
            return Vec::new();
        }
        if spacing <= 0.0 || length <= spacing {
            let mut ends = vec![self.vertices[0]];
            if let Some(last) = self.last() {
                if self.vertices.len() > 1 {
                    ends.push(last);
                }
            }
            return ends;
        }
        let count = (length / spacing).floor() as usize;
        let mut points: Vec<Point> = (0..=count)
            .filter_map(|i| self.point_at(i as f64 * spacing))
            .collect();
        if (count as f64) * spacing < length {
            if let Some(last) = self.last() {
                points.push(last);
            }
        }
        points
    }

    /// Move the end vertices onto the given endpoint locations
    pub fn snap_ends(&mut self, start: Option<Point>, end: Option<Point>) {
        if self.vertices.len() < 2 {
            if let (Some(s), Some(e)) = (start, end) {
                self.vertices = vec![s, e];
            }
            return;
        }
        if let Some(s) = start {
            self.vertices[0] = s;
        }
        if let Some(e) = end {
            let last = self.vertices.len() - 1;
            self.vertices[last] = e;
        }
    }

    pub fn to_wkt(&self) -> String {
        format!("LINESTRING({})", format_coordinate_list(&self.vertices))
    }

    pub fn from_wkt(text: &str) -> SdiResult<Self> {
        let body = wkt_body(text, "LINESTRING")?;
        Ok(Self::new(parse_coordinate_list(body)?))
    }
}

/// Simple polygon (outer ring only)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub ring: Vec<Point>,
}

impl Polygon {
    pub fn new(ring: Vec<Point>) -> Self {
        Self { ring }
    }

    /// Axis-aligned square centered on `center`
    pub fn square(center: Point, size: f64) -> Self {
        let h = size / 2.0;
        Self::new(vec![
            Point::new(center.x - h, center.y - h),
            Point::new(center.x + h, center.y - h),
            Point::new(center.x + h, center.y + h),
            Point::new(center.x - h, center.y + h),
        ])
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.ring)
    }

    /// Even-odd ray casting; points on the boundary count as inside
    pub fn contains(&self, p: &Point) -> bool {
        let n = self.ring.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (self.ring[i], self.ring[j]);
            if on_segment(p, &a, &b) {
                return true;
            }
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    pub fn to_wkt(&self) -> String {
        let mut ring = self.ring.clone();
        if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
            if first != last {
                ring.push(first);
            }
        }
        format!("POLYGON(({}))", format_coordinate_list(&ring))
    }

    pub fn from_wkt(text: &str) -> SdiResult<Self> {
        let body = wkt_body(text, "POLYGON")?;
        let inner = body
            .trim()
            .strip_prefix('(')
            .and_then(|b| b.split(')').next())
            .ok_or_else(|| SdiError::Parse(format!("invalid polygon ring in '{text}'")))?;
        let mut ring = parse_coordinate_list(inner)?;
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        Ok(Self::new(ring))
    }
}

fn on_segment(p: &Point, a: &Point, b: &Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > 1e-9 {
        return false;
    }
    p.x >= a.x.min(b.x) - 1e-9
        && p.x <= a.x.max(b.x) + 1e-9
        && p.y >= a.y.min(b.y) - 1e-9
        && p.y <= a.y.max(b.y) + 1e-9
}

fn wkt_body<'a>(text: &'a str, tag: &str) -> SdiResult<&'a str> {
    let trimmed = text.trim();
    let rest = match (trimmed.get(..tag.len()), trimmed.get(tag.len()..)) {
        (Some(head), Some(rest)) if head.eq_ignore_ascii_case(tag) => rest.trim(),
        _ => {
            return Err(SdiError::Parse(format!(
                "expected {tag} geometry, got '{text}'"
            )))
        }
    };
    rest.strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| SdiError::Parse(format!("unbalanced parentheses in '{text}'")))
}

fn parse_coordinate_list(body: &str) -> SdiResult<Vec<Point>> {
    body.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let mut parts = pair.split_whitespace();
            let x = parts.next().and_then(|v| v.parse::<f64>().ok());
            let y = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (x, y) {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(SdiError::Parse(format!("invalid coordinate pair '{pair}'"))),
            }
        })
        .collect()
}

fn format_coordinate_list(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{} {}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyline_length_and_stations() {
        let line = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
        ]);
        assert_eq!(line.length(), 7.0);
        assert_eq!(line.point_at(5.0), Some(Point::new(3.0, 2.0)));
        assert_eq!(line.point_at(100.0), Some(Point::new(3.0, 4.0)));

        let stations = line.stations(2.0);
        assert_eq!(stations.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(stations.last(), Some(&Point::new(3.0, 4.0)));
        assert_eq!(stations.len(), 5);
    }

    #[test]
    fn test_polygon_contains() {
        let square = Polygon::square(Point::new(5.0, 5.0), 10.0);
        assert!(square.contains(&Point::new(5.0, 5.0)));
        assert!(square.contains(&Point::new(0.0, 3.0)));
        assert!(!square.contains(&Point::new(10.5, 5.0)));
    }

    #[test]
    fn test_wkt_roundtrip_preserves_precision() {
        let p = Point::new(1234.5678901, -0.1);
        assert_eq!(Point::from_wkt(&p.to_wkt()).unwrap(), p);

        let line = Polyline::segment(Point::new(0.0, 0.0), Point::new(50.0, 0.25));
        assert_eq!(line.to_wkt(), "LINESTRING(0 0, 50 0.25)");
        assert_eq!(Polyline::from_wkt(&line.to_wkt()).unwrap(), line);

        let poly = Polygon::square(Point::new(0.0, 0.0), 2.0);
        assert_eq!(Polygon::from_wkt(&poly.to_wkt()).unwrap(), poly);
    }

    #[test]
    fn test_wkt_rejects_wrong_tag() {
        assert!(Point::from_wkt("LINESTRING(0 0, 1 1)").is_err());
        assert!(Polyline::from_wkt("LINESTRING(0 0, 1)").is_err());
    }

    #[test]
    fn test_snap_ends() {
        let mut line = Polyline::new(vec![
            Point::new(0.1, 0.0),
            Point::new(5.0, 1.0),
            Point::new(10.2, 0.0),
        ]);
        line.snap_ends(Some(Point::new(0.0, 0.0)), Some(Point::new(10.0, 0.0)));
        assert_eq!(line.first(), Some(Point::new(0.0, 0.0)));
        assert_eq!(line.last(), Some(Point::new(10.0, 0.0)));
        assert_eq!(line.vertices.len(), 3);
    }
}
