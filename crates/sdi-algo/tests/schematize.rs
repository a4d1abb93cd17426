//! Schematization against a real store.

use sdi_algo::{
    apply_boundary_selection, assign_rating_tables, auto_route_links, route_links,
    schematize_nodes, select_boundary_cells, BoundaryOutfall, MatchedBy, OutflowKind,
    Schematizer, SelectionState,
};
use sdi_core::config::SchematizeConfig;
use sdi_core::{
    CellId, Diagnostics, GridService, ImportMode, IssueKind, Junction, Link, LinkKind, Network,
    Node, Outfall, Point, Polyline, RatingTable, RegularGrid,
};
use sdi_store::{OutflowRole, Store};

fn junction(name: &str, x: f64, y: f64) -> Node {
    Node::junction(name, Point::new(x, y), 10.0, Junction::default())
}

fn inlet(name: &str, x: f64, y: f64) -> Node {
    let mut node = junction(name, x, y);
    node.promote_to_inlet();
    node
}

fn outfall(name: &str, x: f64, y: f64) -> Node {
    Node::outfall(name, Point::new(x, y), 5.0, Outfall::default())
}

fn unrouted(name: &str, from: (f64, f64), to: (f64, f64)) -> Link {
    let mut link = Link::new(name, "", "", LinkKind::Conduit(Default::default()));
    link.inlet_node = None;
    link.outlet_node = None;
    link.geometry = Polyline::segment(Point::new(from.0, from.1), Point::new(to.0, to.1));
    link
}

fn store_with(network: &Network) -> Store {
    let mut store = Store::open_in_memory().unwrap();
    store.save_network(network, ImportMode::Replace).unwrap();
    store
}

#[test]
fn test_auto_route_picks_nodes_within_tolerance() {
    let mut network = Network::new();
    network.nodes.push(junction("N1", 0.0, 0.0));
    network.nodes.push(junction("N2", 10.0, 0.0));
    network.nodes.push(junction("N3", 20.0, 0.0));
    network.links.push(unrouted("C1", (0.1, 0.0), (10.2, 0.0)));

    let report = route_links(&network, &SchematizeConfig::default());
    assert_eq!(report.routed.len(), 1);
    assert_eq!(report.routed[0].inlet_node.as_deref(), Some("N1"));
    assert_eq!(report.routed[0].outlet_node.as_deref(), Some("N2"));
    assert_eq!(report.unresolved, 0);

    let mut store = store_with(&network);
    auto_route_links(&mut store, &SchematizeConfig::default()).unwrap();
    let c1 = store.link("C1").unwrap().unwrap();
    assert_eq!(c1.inlet_node.as_deref(), Some("N1"));
    assert_eq!(c1.outlet_node.as_deref(), Some("N2"));
    assert_eq!(store.is_link_usable("C1").unwrap(), Some(true));
}

#[test]
fn test_auto_route_reports_far_endpoints() {
    let mut network = Network::new();
    network.nodes.push(junction("N1", 0.0, 0.0));
    network.links.push(unrouted("C1", (0.0, 1.0), (40.0, 0.0)));

    let report = route_links(&network, &SchematizeConfig::default());
    assert_eq!(report.routed[0].inlet_node.as_deref(), Some("N1"));
    assert_eq!(report.routed[0].outlet_node, None);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.diagnostics.count_of_kind(IssueKind::Reference), 1);
}

#[test]
fn test_time_stage_center_cell_is_interior() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
    let center = grid.cell_id(1, 1).unwrap();
    let selection = select_boundary_cells(
        &grid,
        &[BoundaryOutfall::new("O1", center, OutflowKind::TimeStage)],
    );
    assert_eq!(selection.state_of("O1"), Some(SelectionState::Interior));
    assert_eq!(selection.dropped().collect::<Vec<_>>(), vec!["O1"]);
    assert!(selection.cells.is_empty());
    assert_eq!(selection.cells_with_role(OutflowRole::Stage1).count(), 0);
}

#[test]
fn test_time_stage_west_edge_picks_east() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
    let west = grid.cell_id(0, 1).unwrap();
    let selection = select_boundary_cells(
        &grid,
        &[BoundaryOutfall::new("O1", west, OutflowKind::TimeStage)],
    );
    let stage1: Vec<_> = selection.cells_with_role(OutflowRole::Stage1).collect();
    assert_eq!(stage1.len(), 1);
    assert_eq!(stage1[0].grid, grid.cell_id(1, 1).unwrap());
    assert_eq!(selection.cells_with_role(OutflowRole::Border).next().unwrap().grid, west);
    // every cell east of the centre is on the edge
    assert_eq!(selection.state_of("O1"), Some(SelectionState::Stage1Marked));
    assert_eq!(selection.diagnostics.count_of_kind(IssueKind::Domain), 1);
}

#[test]
fn test_time_stage_walks_east_to_interior() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 5, 3);
    let west = grid.cell_id(0, 1).unwrap();
    let selection = select_boundary_cells(
        &grid,
        &[BoundaryOutfall::new("O1", west, OutflowKind::TimeStage)],
    );
    assert_eq!(selection.state_of("O1"), Some(SelectionState::Stage2Marked));
    let stage2: Vec<_> = selection.cells_with_role(OutflowRole::Stage2).collect();
    assert_eq!(stage2.len(), 1);
    assert_eq!(stage2[0].grid, grid.cell_id(2, 1).unwrap());
    assert!(selection.diagnostics.is_empty());
}

#[test]
fn test_stage1_cells_are_not_reused_for_stage2() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 5, 3);
    let west = grid.cell_id(0, 1).unwrap();
    let east = grid.cell_id(4, 1).unwrap();
    let selection = select_boundary_cells(
        &grid,
        &[
            BoundaryOutfall::new("W", west, OutflowKind::TimeStage),
            BoundaryOutfall::new("E", east, OutflowKind::TimeStage),
        ],
    );
    // W takes (1,1) and (2,1); E gets (3,1) as stage 1 and no free interior cell
    let owner_of = |col, row| {
        let cell = grid.cell_id(col, row).unwrap();
        selection
            .cells
            .iter()
            .find(|c| c.grid == cell)
            .map(|c| (c.outfall.clone(), c.role))
    };
    assert_eq!(owner_of(2, 1), Some(("W".to_string(), OutflowRole::Stage2)));
    assert_eq!(owner_of(3, 1), Some(("E".to_string(), OutflowRole::Stage1)));
    assert_eq!(selection.state_of("E"), Some(SelectionState::Stage1Marked));
}

#[test]
fn test_rating_table_assigned_once() {
    let mut network = Network::new();
    network.nodes.push(inlet("I1", 5.0, 5.0));
    network.nodes.push(inlet("I2", 15.0, 5.0));
    let mut store = store_with(&network);
    store
        .upsert_rating_table(&RatingTable {
            rows: vec![(0.0, 0.0), (1.0, 2.0)],
            ..RatingTable::new("T")
        })
        .unwrap();

    let mut diag = Diagnostics::new();
    assert!(store.assign_rating_table("I1", "T", &mut diag).unwrap());
    assert!(!store.assign_rating_table("I2", "T", &mut diag).unwrap());
    assert_eq!(diag.count_of_kind(IssueKind::DuplicateRatingAssignment), 1);

    let i1 = store.get_node("I1").unwrap();
    assert_eq!(i1.inlet().unwrap().rating_table.as_deref(), Some("T"));
    let i2 = store.get_node("I2").unwrap();
    assert_eq!(i2.inlet().unwrap().rating_table, None);
}

#[test]
fn test_rating_tables_matched_by_name_then_cell() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 1);
    let mut network = Network::new();
    network.nodes.push(inlet("I1", 5.0, 5.0));
    network.nodes.push(inlet("I2", 15.0, 5.0));
    let mut store = store_with(&network);
    schematize_nodes(&mut store, &grid).unwrap();

    let rows = vec![(0.0, 0.0), (1.0, 1.5)];
    store
        .upsert_rating_table(&RatingTable {
            rows: rows.clone(),
            ..RatingTable::new("i1")
        })
        .unwrap();
    store
        .upsert_rating_table(&RatingTable {
            grid: Some(CellId::new(2)),
            rows: rows.clone(),
            ..RatingTable::new("RT_EAST")
        })
        .unwrap();
    store
        .upsert_rating_table(&RatingTable {
            rows,
            ..RatingTable::new("ORPHAN")
        })
        .unwrap();

    let result = assign_rating_tables(&mut store).unwrap();
    let by = |inlet: &str| {
        result
            .assigned
            .iter()
            .find(|m| m.inlet == inlet)
            .map(|m| (m.table.as_str(), m.matched_by))
    };
    assert_eq!(by("I1"), Some(("i1", MatchedBy::Name)));
    assert_eq!(by("I2"), Some(("RT_EAST", MatchedBy::Cell)));
    assert_eq!(result.unmatched, vec!["ORPHAN".to_string()]);

    // assigned tables sit on their inlet's cell
    let tables = store.rating_tables().unwrap();
    let i1_table = tables.iter().find(|t| t.name == "i1").unwrap();
    assert_eq!(i1_table.grid, Some(CellId::new(1)));
}

#[test]
fn test_schematized_rows_contain_their_node() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 4, 4);
    let mut network = Network::new();
    network.nodes.push(inlet("I1", 12.0, 33.0));
    network.nodes.push(outfall("O1", 39.0, 1.0));
    network.nodes.push(junction("J1", 100.0, 100.0));
    let mut store = store_with(&network);

    let placement = schematize_nodes(&mut store, &grid).unwrap();
    assert_eq!(placement.outside, 1);

    for row in store.schematized_inlets().unwrap() {
        let node = store.get_node(&row.name).unwrap();
        let cell = grid.cell(row.grid).unwrap();
        assert!(cell.polygon.contains(&node.location));
        assert_eq!(node.grid, Some(row.grid));
    }
    let outfalls = store.schematized_outfalls().unwrap();
    assert_eq!(outfalls.len(), 1);
    assert_eq!(outfalls[0].grid, grid.cell_id(3, 0).unwrap());
    assert_eq!(store.get_node("J1").unwrap().grid, None);
}

#[test]
fn test_interior_outfall_leaves_schematized_layer() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 3, 3);
    let mut network = Network::new();
    network.nodes.push(outfall("O_IN", 15.0, 15.0));
    network.nodes.push(outfall("O_EDGE", 5.0, 15.0));
    let mut store = store_with(&network);
    let placement = schematize_nodes(&mut store, &grid).unwrap();

    let outfalls = sdi_algo::boundary_outfalls(&placement.outfalls, |_| Some(OutflowKind::TimeStage));
    let selection = apply_boundary_selection(&mut store, &grid, &outfalls).unwrap();
    assert_eq!(selection.dropped().collect::<Vec<_>>(), vec!["O_IN"]);

    let names: Vec<_> = store
        .schematized_outfalls()
        .unwrap()
        .into_iter()
        .map(|o| o.name)
        .collect();
    assert_eq!(names, vec!["O_EDGE"]);
    assert_eq!(store.outflow_cells().unwrap().len(), 2);
}

#[test]
fn test_schematizer_is_idempotent() {
    let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 5, 3);
    let mut network = Network::new();
    network.nodes.push(inlet("I1", 15.0, 15.0));
    network.nodes.push(junction("J1", 25.0, 15.0));
    network.nodes.push(outfall("O1", 5.0, 15.0));
    network.links.push(unrouted("C1", (15.0, 15.0), (25.0, 15.0)));
    network.links.push(unrouted("C2", (25.0, 15.0), (5.5, 15.0)));
    let mut store = store_with(&network);

    let schematizer = Schematizer::new(&grid).with_outflow_kind("O1", OutflowKind::TimeStage);
    let first = schematizer.run(&mut store).unwrap();
    assert_eq!(first.routing.routed.len(), 2);
    assert_eq!(first.boundary.state_of("O1"), Some(SelectionState::Stage2Marked));
    assert!(first.diagnostics().is_empty(), "{:?}", first.diagnostics());

    let inlets = store.schematized_inlets().unwrap();
    let outfalls = store.schematized_outfalls().unwrap();
    let cells = store.outflow_cells().unwrap();
    let nodes = store.nodes().unwrap();

    let second = schematizer.run(&mut store).unwrap();
    assert!(second.routing.routed.is_empty());
    assert_eq!(store.schematized_inlets().unwrap(), inlets);
    assert_eq!(store.schematized_outfalls().unwrap(), outfalls);
    assert_eq!(store.outflow_cells().unwrap(), cells);
    assert_eq!(store.nodes().unwrap(), nodes);

    let json = serde_json::to_value(&second).unwrap();
    assert_eq!(json["boundary"]["states"][0][1], "stage2_marked");
}
