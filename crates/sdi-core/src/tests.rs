use super::*;

fn three_node_network() -> Network {
    let mut network = Network::new();
    network.nodes.push(Node::junction(
        "J1",
        Point::new(0.0, 0.0),
        100.0,
        Junction {
            max_depth: 5.0,
            ..Junction::default()
        },
    ));
    network
        .nodes
        .push(Node::outfall("O1", Point::new(50.0, 0.0), 95.0, Outfall::default()));
    network.links.push(Link::new(
        "C1",
        "J1",
        "O1",
        LinkKind::Conduit(Conduit {
            length: 50.0,
            roughness: 0.013,
            ..Conduit::default()
        }),
    ));
    network
}

#[test]
fn test_valid_network_has_no_issues() {
    let network = three_node_network();
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert!(!diag.has_issues(), "{diag}");
}

#[test]
fn test_missing_endpoint_is_reported_not_removed() {
    let mut network = three_node_network();
    network.links[0].outlet_node = Some("GHOST".into());
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert_eq!(diag.count_of_kind(IssueKind::Reference), 1);
    assert_eq!(network.links.len(), 1);
}

#[test]
fn test_outfall_curve_must_be_tidal() {
    let mut network = three_node_network();
    network.nodes.push(Node::outfall(
        "O2",
        Point::new(60.0, 0.0),
        90.0,
        Outfall {
            boundary: OutfallBoundary::TidalCurve("TC1".into()),
            ..Outfall::default()
        },
    ));
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert_eq!(diag.count_of_kind(IssueKind::Reference), 1);

    network.curves.push(Curve::new("TC1", CurveType::Tidal));
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert_eq!(diag.count_of_kind(IssueKind::Reference), 0);
}

#[test]
fn test_rating_table_shared_by_two_inlets() {
    let mut network = three_node_network();
    network.rating_tables.push(RatingTable::new("T"));
    for name in ["I1", "I2"] {
        let mut node = Node::junction(name, Point::new(1.0, 1.0), 10.0, Junction::default());
        node.promote_to_inlet();
        if let Some(inlet) = node.inlet_mut() {
            inlet.rating_table = Some("T".into());
        }
        network.nodes.push(node);
    }
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert_eq!(diag.count_of_kind(IssueKind::DuplicateRatingAssignment), 1);
}

#[test]
fn test_duplicate_inflow_and_bad_roughness() {
    let mut network = three_node_network();
    network.inflows.push(Inflow::new("J1"));
    network.inflows.push(Inflow::new("J1"));
    if let Some(conduit) = network.links[0].conduit_mut() {
        conduit.roughness = 0.0;
    }
    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    assert_eq!(diag.count_of_kind(IssueKind::Duplicate), 1);
    assert_eq!(diag.count_of_kind(IssueKind::Validation), 1);
}

#[test]
fn test_links_by_endpoint_and_upsert() {
    let mut network = three_node_network();
    assert_eq!(network.links_by_endpoint("O1").count(), 1);
    assert_eq!(network.links_by_endpoint("J9").count(), 0);

    network.upsert_node(Node::junction("J1", Point::new(5.0, 5.0), 1.0, Junction::default()));
    assert_eq!(network.nodes.len(), 2);
    assert_eq!(network.nodes[0].location, Point::new(5.0, 5.0));
    assert_eq!(network.node_location("O1"), Some(Point::new(50.0, 0.0)));
}

#[test]
fn test_cell_id_is_transparent() {
    let json = serde_json::to_string(&CellId::new(42)).unwrap();
    assert_eq!(json, "42");
}
