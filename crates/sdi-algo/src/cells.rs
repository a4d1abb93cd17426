//! Node-to-cell schematization.
//!
//! Every user node and storage unit is looked up in the grid by its point.
//! Inlets and outfalls get a shadow row in `swmmflo` / `swmmoutf` keyed by
//! the cell; every node gets its cell written back. Nodes outside the
//! domain are reported and left without a cell.

use hashbrown::HashMap;
use sdi_core::{CellId, Diagnostics, GridService, IssueKind, Network, NodeKind, SdiResult};
use sdi_store::{SchematizedInlet, SchematizedOutfall, Store};
use serde::Serialize;
use tracing::{debug, info};

/// Rows of one schematized layer, one per cell, latest node wins
#[derive(Debug)]
struct CellLayer<T> {
    rows: Vec<T>,
    by_cell: HashMap<CellId, usize>,
}

impl<T> CellLayer<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            by_cell: HashMap::new(),
        }
    }

    /// Place `row` on `cell`, returning the row it replaced
    fn place(&mut self, cell: CellId, row: T) -> Option<T> {
        match self.by_cell.get(&cell) {
            Some(&idx) => Some(std::mem::replace(&mut self.rows[idx], row)),
            None => {
                self.by_cell.insert(cell, self.rows.len());
                self.rows.push(row);
                None
            }
        }
    }
}

/// Where each node of a network falls on the grid
#[derive(Debug, Clone, Default, Serialize)]
pub struct NodePlacement {
    pub inlets: Vec<SchematizedInlet>,
    pub outfalls: Vec<SchematizedOutfall>,
    /// Cell of every node and storage unit, None outside the domain
    pub node_cells: Vec<(String, Option<CellId>)>,
    /// Nodes whose point lies outside the grid
    pub outside: usize,
    /// Rows displaced because a later node landed on the same cell
    pub duplicates: usize,
    pub diagnostics: Diagnostics,
}

impl NodePlacement {
    pub fn cell_of(&self, node: &str) -> Option<CellId> {
        self.node_cells
            .iter()
            .find(|(name, _)| name == node)
            .and_then(|(_, cell)| *cell)
    }
}

fn report_displaced(layer: &str, cell: CellId, displaced: &str, by: &str, diag: &mut Diagnostics) {
    debug!(layer, cell = %cell, displaced, by, "schematized row replaced");
    diag.add_warning_with_entity(
        IssueKind::Duplicate,
        &format!("{layer} cell {cell} also hosts '{displaced}', which is replaced"),
        by,
    );
}

/// Locate every node of `network` on `grid`. Pure; nothing is written.
pub fn place_nodes(network: &Network, grid: &dyn GridService) -> NodePlacement {
    let mut placement = NodePlacement::default();
    let mut inlets: CellLayer<SchematizedInlet> = CellLayer::new();
    let mut outfalls: CellLayer<SchematizedOutfall> = CellLayer::new();

    for node in &network.nodes {
        let Some(cell) = grid.cell_at(&node.location) else {
            placement.outside += 1;
            placement.diagnostics.add_warning_with_entity(
                IssueKind::Domain,
                "node lies outside the grid",
                &node.name,
            );
            placement.node_cells.push((node.name.clone(), None));
            continue;
        };
        placement.node_cells.push((node.name.clone(), Some(cell)));

        match &node.kind {
            NodeKind::Inlet { inlet, .. } => {
                let row = SchematizedInlet {
                    grid: cell,
                    name: node.name.clone(),
                    drain_type: inlet.drain_type,
                    length: inlet.length,
                    width: inlet.width,
                    height: inlet.height,
                    weir_coeff: inlet.weir_coeff,
                    feature: inlet.feature,
                    curb_height: inlet.curb_height,
                };
                if let Some(old) = inlets.place(cell, row) {
                    placement.duplicates += 1;
                    report_displaced("inlet", cell, &old.name, &node.name, &mut placement.diagnostics);
                }
            }
            NodeKind::Outfall(outfall) => {
                let row = SchematizedOutfall {
                    grid: cell,
                    name: node.name.clone(),
                    allow_discharge: outfall.allow_discharge,
                };
                if let Some(old) = outfalls.place(cell, row) {
                    placement.duplicates += 1;
                    report_displaced("outfall", cell, &old.name, &node.name, &mut placement.diagnostics);
                }
            }
            NodeKind::Junction(_) => {}
        }
    }

    for unit in &network.storage_units {
        let cell = grid.cell_at(&unit.location);
        if cell.is_none() {
            placement.outside += 1;
            placement.diagnostics.add_warning_with_entity(
                IssueKind::Domain,
                "storage unit lies outside the grid",
                &unit.name,
            );
        }
        placement.node_cells.push((unit.name.clone(), cell));
    }

    placement.inlets = inlets.rows;
    placement.outfalls = outfalls.rows;
    placement.inlets.sort_by_key(|r| r.grid);
    placement.outfalls.sort_by_key(|r| r.grid);
    placement
}

/// Schematize the stored nodes: replace the `swmmflo` / `swmmoutf` layers,
/// write each node's cell back and move rating tables and culvert
/// equations onto their inlet's cell
pub fn schematize_nodes(store: &mut Store, grid: &dyn GridService) -> SdiResult<NodePlacement> {
    let network = store.load_network()?;
    let placement = place_nodes(&network, grid);
    store.replace_schematized(&placement.inlets, &placement.outfalls, &placement.node_cells)?;

    for node in &network.nodes {
        let Some(table) = node.inlet().and_then(|i| i.rating_table.as_deref()) else {
            continue;
        };
        let cell = placement.cell_of(&node.name);
        if let Some(mut stored) = network.rating_table(table).cloned() {
            if stored.grid != cell {
                stored.grid = cell;
                store.upsert_rating_table(&stored)?;
            }
        }
    }
    for culvert in &network.culverts {
        let cell = placement.cell_of(&culvert.name);
        if culvert.grid != cell {
            let mut moved = culvert.clone();
            moved.grid = cell;
            store.upsert_culvert(&moved)?;
        }
    }

    info!(
        inlets = placement.inlets.len(),
        outfalls = placement.outfalls.len(),
        outside = placement.outside,
        duplicates = placement.duplicates,
        "nodes schematized"
    );
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdi_core::{Inlet, Junction, Node, Outfall, Point, RegularGrid};

    fn inlet(name: &str, x: f64, y: f64) -> Node {
        let mut node = Node::junction(name, Point::new(x, y), 10.0, Junction::default());
        node.promote_to_inlet();
        if let Some(i) = node.inlet_mut() {
            *i = Inlet {
                length: 2.0,
                ..Inlet::default()
            };
        }
        node
    }

    #[test]
    fn test_nodes_land_on_containing_cell() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
        let mut network = Network::new();
        network.nodes.push(inlet("I1", 5.0, 5.0));
        network
            .nodes
            .push(Node::outfall("O1", Point::new(25.0, 15.0), 5.0, Outfall::default()));
        network
            .nodes
            .push(Node::junction("J1", Point::new(15.0, 25.0), 9.0, Junction::default()));

        let placement = place_nodes(&network, &grid);
        assert_eq!(placement.inlets.len(), 1);
        assert_eq!(placement.inlets[0].grid, CellId::new(1));
        assert_eq!(placement.inlets[0].length, 2.0);
        assert_eq!(placement.outfalls[0].grid, grid.cell_id(2, 1).unwrap());
        assert_eq!(placement.cell_of("J1"), grid.cell_id(1, 2));
        assert!(placement.diagnostics.is_empty());
    }

    #[test]
    fn test_latest_node_wins_cell() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 2, 2);
        let mut network = Network::new();
        network.nodes.push(inlet("I1", 1.0, 1.0));
        network.nodes.push(inlet("I2", 9.0, 9.0));

        let placement = place_nodes(&network, &grid);
        assert_eq!(placement.inlets.len(), 1);
        assert_eq!(placement.inlets[0].name, "I2");
        assert_eq!(placement.duplicates, 1);
        assert_eq!(placement.diagnostics.count_of_kind(IssueKind::Duplicate), 1);
        // both nodes still know their cell
        assert_eq!(placement.cell_of("I1"), Some(CellId::new(1)));
    }

    #[test]
    fn test_outside_nodes_are_excluded() {
        let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 1, 1);
        let mut network = Network::new();
        network.nodes.push(inlet("I1", 50.0, 50.0));

        let placement = place_nodes(&network, &grid);
        assert!(placement.inlets.is_empty());
        assert_eq!(placement.outside, 1);
        assert_eq!(placement.node_cells, vec![("I1".to_string(), None)]);
        assert_eq!(placement.diagnostics.count_of_kind(IssueKind::Domain), 1);
    }
}
