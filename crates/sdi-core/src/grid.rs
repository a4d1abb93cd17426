//! Computational grid capability.
//!
//! The 2-D model grid is owned by the host. Schematization and import only
//! need to ask a handful of spatial questions of it, so the grid is an
//! injected [`GridService`] rather than a concrete type. [`RegularGrid`]
//! implements the trait for square-cell grids described by an origin, a
//! cell size and the set of occupied (column, row) positions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Point, Polygon};
use crate::CellId;

/// The eight compass directions, clockwise from north.
///
/// The discriminant is the bit position used in neighbour masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::South,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Column/row step; north is +row
    pub fn offset(&self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::NorthEast => (1, 1),
            Direction::East => (1, 0),
            Direction::SouthEast => (1, -1),
            Direction::South => (0, -1),
            Direction::SouthWest => (-1, -1),
            Direction::West => (-1, 0),
            Direction::NorthWest => (-1, 1),
        }
    }

    #[inline]
    pub fn bit(&self) -> u8 {
        1 << (*self as u8)
    }

    pub fn opposite(&self) -> Direction {
        Direction::ALL[(*self as usize + 4) % 8]
    }

    pub fn is_cardinal(&self) -> bool {
        (*self as u8) % 2 == 0
    }
}

/// Neighbour cell ids indexed by [`Direction`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neighbors {
    pub cells: [Option<CellId>; 8],
}

impl Neighbors {
    #[inline]
    pub fn get(&self, dir: Direction) -> Option<CellId> {
        self.cells[dir as usize]
    }

    pub fn set(&mut self, dir: Direction, cell: Option<CellId>) {
        self.cells[dir as usize] = cell;
    }

    /// Bit `d` is set when the neighbour in direction `d` exists
    pub fn mask(&self) -> u8 {
        Direction::ALL
            .iter()
            .filter(|d| self.get(**d).is_some())
            .fold(0u8, |m, d| m | d.bit())
    }

    pub fn all_present(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn all_cardinals_present(&self) -> bool {
        Direction::CARDINALS.iter().all(|d| self.get(*d).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub id: CellId,
    pub centroid: Point,
    pub elevation: f64,
    pub polygon: Polygon,
}

/// Spatial queries the interchange core needs from the host grid
pub trait GridService {
    /// Cell containing `point`, or None outside the domain
    fn cell_at(&self, point: &Point) -> Option<CellId>;

    fn cell(&self, id: CellId) -> Option<GridCell>;

    /// Cells whose footprint intersects `bbox`
    fn cells_in_bbox(&self, bbox: &BoundingBox) -> Vec<CellId>;

    fn neighbors(&self, id: CellId) -> Neighbors;

    /// Side length of a cell
    fn cell_size(&self) -> f64;

    /// A cell is on the boundary when any of its eight neighbours is missing
    fn is_boundary(&self, id: CellId) -> bool {
        !self.neighbors(id).all_present()
    }
}

/// Square-cell grid with an arbitrary footprint
#[derive(Debug, Clone)]
pub struct RegularGrid {
    origin: Point,
    cell_size: f64,
    by_position: HashMap<(i64, i64), CellId>,
    by_id: HashMap<CellId, (i64, i64)>,
    elevations: HashMap<CellId, f64>,
    next_id: i64,
}

impl RegularGrid {
    /// Empty grid whose cell (0, 0) has its lower-left corner at `origin`
    pub fn new(origin: Point, cell_size: f64) -> Self {
        Self {
            origin,
            cell_size,
            by_position: HashMap::new(),
            by_id: HashMap::new(),
            elevations: HashMap::new(),
            next_id: 1,
        }
    }

    /// Full `cols` x `rows` rectangle, ids assigned row by row from 1
    pub fn rectangle(origin: Point, cell_size: f64, cols: i64, rows: i64) -> Self {
        let mut grid = Self::new(origin, cell_size);
        for row in 0..rows {
            for col in 0..cols {
                grid.add_cell(col, row);
            }
        }
        grid
    }

    /// Add the cell at (col, row), returning its id. Adding an occupied
    /// position returns the existing id.
    pub fn add_cell(&mut self, col: i64, row: i64) -> CellId {
        if let Some(id) = self.by_position.get(&(col, row)) {
            return *id;
        }
        let id = CellId::new(self.next_id);
        self.next_id += 1;
        self.by_position.insert((col, row), id);
        self.by_id.insert(id, (col, row));
        id
    }

    pub fn remove_cell(&mut self, col: i64, row: i64) -> Option<CellId> {
        let id = self.by_position.remove(&(col, row))?;
        self.by_id.remove(&id);
        self.elevations.remove(&id);
        Some(id)
    }

    pub fn set_elevation(&mut self, id: CellId, elevation: f64) {
        self.elevations.insert(id, elevation);
    }

    pub fn cell_id(&self, col: i64, row: i64) -> Option<CellId> {
        self.by_position.get(&(col, row)).copied()
    }

    pub fn position(&self, id: CellId) -> Option<(i64, i64)> {
        self.by_id.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Cell ids in ascending order
    pub fn cell_ids(&self) -> Vec<CellId> {
        let mut ids: Vec<CellId> = self.by_id.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn centroid_of(&self, col: i64, row: i64) -> Point {
        Point::new(
            self.origin.x + (col as f64 + 0.5) * self.cell_size,
            self.origin.y + (row as f64 + 0.5) * self.cell_size,
        )
    }

    fn position_of(&self, point: &Point) -> (i64, i64) {
        (
            ((point.x - self.origin.x) / self.cell_size).floor() as i64,
            ((point.y - self.origin.y) / self.cell_size).floor() as i64,
        )
    }
}

impl GridService for RegularGrid {
    fn cell_at(&self, point: &Point) -> Option<CellId> {
        if !(point.x.is_finite() && point.y.is_finite()) || self.cell_size <= 0.0 {
            return None;
        }
        self.cell_id_at(self.position_of(point))
    }

    fn cell(&self, id: CellId) -> Option<GridCell> {
        let (col, row) = self.position(id)?;
        let centroid = self.centroid_of(col, row);
        Some(GridCell {
            id,
            centroid,
            elevation: self.elevations.get(&id).copied().unwrap_or(0.0),
            polygon: Polygon::square(centroid, self.cell_size),
        })
    }

    fn cells_in_bbox(&self, bbox: &BoundingBox) -> Vec<CellId> {
        if self.cell_size <= 0.0 {
            return Vec::new();
        }
        let (c0, r0) = self.position_of(&Point::new(bbox.min_x, bbox.min_y));
        let (c1, r1) = self.position_of(&Point::new(bbox.max_x, bbox.max_y));
        let mut ids = Vec::new();
        for row in r0..=r1 {
            for col in c0..=c1 {
                if let Some(id) = self.cell_id_at((col, row)) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        ids
    }

    fn neighbors(&self, id: CellId) -> Neighbors {
        let mut neighbors = Neighbors::default();
        if let Some((col, row)) = self.position(id) {
            for dir in Direction::ALL {
                let (dc, dr) = dir.offset();
                neighbors.set(dir, self.cell_id_at((col + dc, row + dr)));
            }
        }
        neighbors
    }

    fn cell_size(&self) -> f64 {
        self.cell_size
    }
}

impl RegularGrid {
    #[inline]
    fn cell_id_at(&self, pos: (i64, i64)) -> Option<CellId> {
        self.by_position.get(&pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_at_and_outside() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        assert_eq!(grid.cell_at(&Point::new(5.0, 5.0)), Some(CellId::new(1)));
        assert_eq!(grid.cell_at(&Point::new(15.0, 25.0)), Some(CellId::new(8)));
        assert_eq!(grid.cell_at(&Point::new(-0.1, 5.0)), None);
        assert_eq!(grid.cell_at(&Point::new(31.0, 5.0)), None);
    }

    #[test]
    fn test_centre_cell_has_all_neighbors() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        let center = grid.cell_id(1, 1).unwrap();
        let n = grid.neighbors(center);
        assert!(n.all_present());
        assert_eq!(n.mask(), 0xFF);
        assert!(!grid.is_boundary(center));
        assert_eq!(n.get(Direction::North), grid.cell_id(1, 2));
    }

    #[test]
    fn test_west_edge_mask() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        let west = grid.cell_id(0, 1).unwrap();
        let n = grid.neighbors(west);
        let expected = Direction::North.bit()
            | Direction::NorthEast.bit()
            | Direction::East.bit()
            | Direction::SouthEast.bit()
            | Direction::South.bit();
        assert_eq!(n.mask(), expected);
        assert!(grid.is_boundary(west));
    }

    #[test]
    fn test_cell_polygon_contains_point() {
        let grid = RegularGrid::rectangle(Point::new(100.0, 200.0), 5.0, 2, 2);
        let p = Point::new(107.0, 201.0);
        let id = grid.cell_at(&p).unwrap();
        let cell = grid.cell(id).unwrap();
        assert!(cell.polygon.contains(&p));
        assert_eq!(cell.centroid, Point::new(107.5, 202.5));
    }

    #[test]
    fn test_cells_in_bbox_and_direction_helpers() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 1.0, 4, 4);
        let ids = grid.cells_in_bbox(&BoundingBox::new(0.5, 0.5, 1.5, 1.5));
        assert_eq!(ids.len(), 4);
        assert_eq!(Direction::North.opposite(), Direction::South);
        assert_eq!(Direction::NorthWest.opposite(), Direction::SouthEast);
        assert!(Direction::West.is_cardinal());
        assert!(!Direction::SouthWest.is_cardinal());
    }
}
