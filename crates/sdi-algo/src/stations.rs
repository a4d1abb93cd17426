//! Link station sampling.
//!
//! Each link polyline is sampled every half cell. Stations falling outside
//! the grid mean the link leaves the surface domain somewhere along its
//! length, even when both ends are inside.

use sdi_core::{CellId, Diagnostics, GridService, IssueKind, Link};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStations {
    pub link: String,
    pub stations: usize,
    pub outside: usize,
    /// Cells crossed, in order along the link, without repeats
    pub cells: Vec<CellId>,
}

/// Station spacing for `grid`, falling back to `cell_size_hint` when the
/// grid reports no cell size
pub fn station_spacing(grid: &dyn GridService, cell_size_hint: Option<f64>) -> Option<f64> {
    let size = grid.cell_size();
    let size = if size > 0.0 { Some(size) } else { cell_size_hint.filter(|s| *s > 0.0) };
    size.map(|s| s / 2.0)
}

pub fn sample_link(link: &Link, grid: &dyn GridService, spacing: f64) -> LinkStations {
    let points = link.geometry.stations(spacing);
    let mut cells: Vec<CellId> = Vec::new();
    let mut outside = 0;
    for point in &points {
        match grid.cell_at(point) {
            Some(cell) => {
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
            None => outside += 1,
        }
    }
    LinkStations {
        link: link.name.clone(),
        stations: points.len(),
        outside,
        cells,
    }
}

/// Sample every link and add a domain warning for each one with stations
/// outside the grid
pub fn check_link_stations(
    links: &[Link],
    grid: &dyn GridService,
    spacing: f64,
    diag: &mut Diagnostics,
) -> Vec<LinkStations> {
    links
        .iter()
        .map(|link| {
            let sampled = sample_link(link, grid, spacing);
            if sampled.outside > 0 {
                diag.add_warning_with_entity(
                    IssueKind::Domain,
                    &format!(
                        "{} of {} stations lie outside the grid",
                        sampled.outside, sampled.stations
                    ),
                    &link.name,
                );
            }
            sampled
        })
        .collect()
}
