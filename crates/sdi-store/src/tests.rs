use sdi_core::*;

use crate::schema::{CONDUITS, INFLOWS, NODES};
use crate::{OutflowCell, OutflowRole, SchematizedInlet, Store};

fn junction(name: &str, x: f64, y: f64) -> Node {
    Node::junction(
        name,
        Point::new(x, y),
        100.0,
        Junction {
            max_depth: 5.0,
            ..Junction::default()
        },
    )
}

fn inlet(name: &str, x: f64, y: f64) -> Node {
    let mut node = junction(name, x, y);
    node.promote_to_inlet();
    if let Some(inlet) = node.inlet_mut() {
        inlet.drain_type = Some(DrainType::RatingTable);
    }
    node
}

fn conduit(name: &str, from: &str, to: &str) -> Link {
    Link::new(
        name,
        from,
        to,
        LinkKind::Conduit(Conduit {
            length: 50.0,
            roughness: 0.013,
            xsection: Some(CrossSection::new(XSectionShape::Circular, [1.5, 0.0, 0.0, 0.0])),
            ..Conduit::default()
        }),
    )
}

fn rating_table(name: &str) -> RatingTable {
    RatingTable {
        rows: vec![(0.0, 0.0), (0.5, 1.2), (1.0, 3.4)],
        ..RatingTable::new(name)
    }
}

#[test]
fn test_rating_table_is_assigned_to_one_inlet_only() {
    let mut store = Store::open_in_memory().unwrap();
    let mut i1 = inlet("I1", 0.0, 0.0);
    i1.grid = Some(CellId::new(7));
    store.upsert_node(&i1).unwrap();
    store.upsert_node(&inlet("I2", 10.0, 0.0)).unwrap();
    store.upsert_rating_table(&rating_table("T")).unwrap();

    let mut diag = Diagnostics::new();
    assert!(store.assign_rating_table("I1", "T", &mut diag).unwrap());
    assert!(diag.is_empty());

    assert!(!store.assign_rating_table("I2", "T", &mut diag).unwrap());
    assert_eq!(diag.count_of_kind(IssueKind::DuplicateRatingAssignment), 1);

    let i1 = store.get_node("I1").unwrap();
    assert_eq!(i1.inlet().and_then(|i| i.rating_table.as_deref()), Some("T"));
    let i2 = store.get_node("I2").unwrap();
    assert_eq!(i2.inlet().and_then(|i| i.rating_table.clone()), None);

    let tables = store.rating_tables().unwrap();
    assert_eq!(tables[0].grid, Some(CellId::new(7)));
    assert_eq!(tables[0].rows.len(), 3);
}

fn inlet_with_table(name: &str, x: f64, table: &str) -> Node {
    let mut node = inlet(name, x, 0.0);
    if let Some(inlet) = node.inlet_mut() {
        inlet.rating_table = Some(table.into());
    }
    node
}

#[test]
fn test_upsert_does_not_take_over_assigned_rating_table() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&inlet("I1", 0.0, 0.0)).unwrap();
    store.upsert_rating_table(&rating_table("T")).unwrap();
    let mut diag = Diagnostics::new();
    assert!(store.assign_rating_table("I1", "T", &mut diag).unwrap());

    let diag = store.upsert_node(&inlet_with_table("I2", 10.0, "T")).unwrap();
    assert_eq!(diag.count_of_kind(IssueKind::DuplicateRatingAssignment), 1);

    let holders: Vec<_> = store
        .nodes()
        .unwrap()
        .into_iter()
        .filter(|n| n.inlet().and_then(|i| i.rating_table.as_deref()) == Some("T"))
        .map(|n| n.name)
        .collect();
    assert_eq!(holders, vec!["I1".to_string()]);
    assert!(store.get_node("I2").is_ok());
}

#[test]
fn test_save_network_refuses_second_rating_table_holder() {
    let mut network = Network::new();
    network.nodes.push(inlet_with_table("I1", 0.0, "T"));
    network.nodes.push(inlet_with_table("I2", 10.0, "T"));
    network.rating_tables.push(rating_table("T"));

    let mut store = Store::open_in_memory().unwrap();
    let diag = store.save_network(&network, ImportMode::Replace).unwrap();
    assert_eq!(diag.count_of_kind(IssueKind::DuplicateRatingAssignment), 1);

    let i2 = store.get_node("I2").unwrap();
    assert_eq!(i2.inlet().and_then(|i| i.rating_table.clone()), None);
    let report = store.check_integrity().unwrap();
    assert_eq!(report.count_of_kind(IssueKind::DuplicateRatingAssignment), 0);
}

#[test]
fn test_assigning_rating_table_to_junction_is_refused() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&junction("J1", 0.0, 0.0)).unwrap();
    store.upsert_rating_table(&rating_table("T")).unwrap();

    let mut diag = Diagnostics::new();
    assert!(!store.assign_rating_table("J1", "T", &mut diag).unwrap());
    assert_eq!(diag.count_of_kind(IssueKind::Validation), 1);

    let err = store.assign_rating_table("NOPE", "T", &mut diag).unwrap_err();
    assert!(matches!(err, SdiError::NotFound { kind: EntityKind::Node, .. }));
    let err = store.assign_rating_table("J1", "MISSING", &mut diag).unwrap_err();
    assert!(matches!(err, SdiError::NotFound { kind: EntityKind::RatingTable, .. }));
}

#[test]
fn test_upsert_keeps_assigned_grid_cell() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&junction("J1", 0.0, 0.0)).unwrap();
    assert!(store.set_node_grid("J1", Some(CellId::new(42))).unwrap());

    let mut moved = junction("J1", 1.0, 1.0);
    moved.invert_elev = 99.0;
    store.upsert_node(&moved).unwrap();

    let stored = store.get_node("J1").unwrap();
    assert_eq!(stored.grid, Some(CellId::new(42)));
    assert_eq!(stored.invert_elev, 99.0);
    assert_eq!(stored.location, Point::new(1.0, 1.0));
}

#[test]
fn test_link_before_nodes_is_unusable_until_they_exist() {
    let mut store = Store::open_in_memory().unwrap();
    assert!(!store.upsert_link(&conduit("C1", "J1", "O1")).unwrap());
    assert_eq!(store.is_link_usable("C1").unwrap(), Some(false));

    store.upsert_node(&junction("J1", 0.0, 0.0)).unwrap();
    assert_eq!(store.is_link_usable("C1").unwrap(), Some(false));
    store
        .upsert_node(&Node::outfall("O1", Point::new(50.0, 0.0), 95.0, Outfall::default()))
        .unwrap();
    assert_eq!(store.is_link_usable("C1").unwrap(), Some(true));

    let links = store.get_links_by_endpoint("O1").unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].name, "C1");
    assert_eq!(store.is_link_usable("C9").unwrap(), None);
}

#[test]
fn test_link_name_moves_between_kinds() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_link(&conduit("L1", "A", "B")).unwrap();
    let pump = Link::new(
        "L1",
        "A",
        "B",
        LinkKind::Pump(Pump {
            curve: "PC1".into(),
            status: PumpStatus::On,
            ..Pump::default()
        }),
    );
    store.upsert_link(&pump).unwrap();

    let links = store.links().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].class(), LinkClass::Pump);
}

#[test]
fn test_delete_node_cascades_but_keeps_links() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&inlet("I1", 0.0, 0.0)).unwrap();
    store.upsert_node(&junction("J2", 10.0, 0.0)).unwrap();
    store.upsert_link(&conduit("C1", "I1", "J2")).unwrap();
    store.upsert_inflow(&Inflow::new("I1")).unwrap();
    store.upsert_rating_table(&rating_table("T")).unwrap();
    let mut diag = Diagnostics::new();
    store.assign_rating_table("I1", "T", &mut diag).unwrap();
    store
        .replace_schematized(
            &[SchematizedInlet {
                grid: CellId::new(1),
                name: "I1".into(),
                drain_type: Some(DrainType::RatingTable),
                length: 0.0,
                width: 0.0,
                height: 0.0,
                weir_coeff: 0.0,
                feature: 0,
                curb_height: 0.0,
            }],
            &[],
            &[],
        )
        .unwrap();

    assert!(store.delete_node("I1").unwrap());
    assert!(!store.delete_node("I1").unwrap());

    assert!(store.inflows().unwrap().is_empty());
    assert!(store.rating_tables().unwrap().is_empty());
    assert!(store.schematized_inlets().unwrap().is_empty());
    assert_eq!(store.is_link_usable("C1").unwrap(), Some(false));

    let report = store.check_integrity().unwrap();
    assert_eq!(report.count_of_kind(IssueKind::Reference), 1);
    assert_eq!(report.issues[0].entity.as_deref(), Some("C1"));
}

#[test]
fn test_rename_node_updates_every_reference() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&junction("J1", 0.0, 0.0)).unwrap();
    store.upsert_node(&junction("J2", 10.0, 0.0)).unwrap();
    store.upsert_link(&conduit("C1", "J1", "J2")).unwrap();
    store.upsert_link(&conduit("C2", "J2", "J1")).unwrap();
    store.upsert_inflow(&Inflow::new("J1")).unwrap();

    store.rename(EntityKind::Node, "J1", "J9").unwrap();

    assert!(store.node("J1").unwrap().is_none());
    assert!(store.node("J9").unwrap().is_some());
    let c1 = store.link("C1").unwrap().unwrap();
    assert_eq!(c1.inlet_node.as_deref(), Some("J9"));
    let c2 = store.link("C2").unwrap().unwrap();
    assert_eq!(c2.outlet_node.as_deref(), Some("J9"));
    assert_eq!(store.inflows().unwrap()[0].node, "J9");
    assert!(store.check_integrity().unwrap().is_empty());
}

#[test]
fn test_rename_to_existing_name_changes_nothing() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&junction("J1", 0.0, 0.0)).unwrap();
    store.upsert_node(&junction("J2", 10.0, 0.0)).unwrap();
    store.upsert_link(&conduit("C1", "J1", "J2")).unwrap();
    let before = store.version(NODES).unwrap();

    let err = store.rename(EntityKind::Node, "J1", "J2").unwrap_err();
    assert!(matches!(err, SdiError::DuplicateName { .. }));
    let err = store.rename(EntityKind::Node, "J7", "J8").unwrap_err();
    assert!(matches!(err, SdiError::NotFound { .. }));

    assert_eq!(store.version(NODES).unwrap(), before);
    let c1 = store.link("C1").unwrap().unwrap();
    assert_eq!(c1.inlet_node.as_deref(), Some("J1"));
}

#[test]
fn test_rename_curve_follows_pump_reference() {
    let mut store = Store::open_in_memory().unwrap();
    let mut curve = Curve::new("PC1", CurveType::Pump2);
    curve.points = vec![(0.0, 0.0), (1.0, 2.0)];
    store.upsert_curve(&curve).unwrap();
    let pump = Link::new(
        "P1",
        "A",
        "B",
        LinkKind::Pump(Pump {
            curve: "PC1".into(),
            ..Pump::default()
        }),
    );
    store.upsert_link(&pump).unwrap();

    store.rename(EntityKind::Curve, "PC1", "PC2").unwrap();

    let pump = store.link("P1").unwrap().unwrap();
    assert_eq!(pump.pump().map(|p| p.curve.as_str()), Some("PC2"));
    assert_eq!(store.curves().unwrap()[0].name, "PC2");
}

#[test]
fn test_versions_grow_with_writes() {
    let mut store = Store::open_in_memory().unwrap();
    assert_eq!(store.version(CONDUITS).unwrap(), 0);

    store.upsert_link(&conduit("C1", "A", "B")).unwrap();
    let v1 = store.version(CONDUITS).unwrap();
    store.set_link_endpoints("C1", Some("A"), Some("C")).unwrap();
    let v2 = store.version(CONDUITS).unwrap();
    assert!(v1 > 0);
    assert!(v2 > v1);
    assert_eq!(store.version(INFLOWS).unwrap(), 0);
}

#[test]
fn test_integrity_report_covers_references() {
    let mut store = Store::open_in_memory().unwrap();
    store
        .upsert_node(&Node::outfall(
            "O1",
            Point::new(0.0, 0.0),
            90.0,
            Outfall {
                boundary: OutfallBoundary::TidalCurve("TC1".into()),
                ..Outfall::default()
            },
        ))
        .unwrap();
    store
        .upsert_node(&Node::outfall(
            "O2",
            Point::new(5.0, 0.0),
            90.0,
            Outfall {
                boundary: OutfallBoundary::TimeSeries("TS1".into()),
                ..Outfall::default()
            },
        ))
        .unwrap();
    let pump = Link::new(
        "P1",
        "O1",
        "O2",
        LinkKind::Pump(Pump {
            curve: "PC9".into(),
            ..Pump::default()
        }),
    );
    store.upsert_link(&pump).unwrap();
    store.upsert_inflow(&Inflow::new("GHOST")).unwrap();

    let report = store.check_integrity().unwrap();
    assert_eq!(report.count_of_kind(IssueKind::Reference), 4);
    let entities: Vec<_> = report.issues.iter().filter_map(|i| i.entity.as_deref()).collect();
    assert!(entities.contains(&"O1"));
    assert!(entities.contains(&"O2"));
    assert!(entities.contains(&"P1"));
    assert!(entities.contains(&"GHOST"));

    let mut tidal = Curve::new("TC1", CurveType::Tidal);
    tidal.points = vec![(0.0, 1.0), (12.0, 2.0)];
    store.upsert_curve(&tidal).unwrap();
    store.upsert_time_series(&TimeSeries::inline("TS1")).unwrap();
    let report = store.check_integrity().unwrap();
    assert_eq!(report.count_of_kind(IssueKind::Reference), 2);
}

#[test]
fn test_save_and_load_network() {
    let mut network = Network::new();
    network.nodes.push(junction("J1", 0.0, 0.0));
    network.nodes.push(Node::outfall(
        "O1",
        Point::new(50.0, 0.0),
        95.0,
        Outfall {
            boundary: OutfallBoundary::Fixed(2.5),
            flap_gate: true,
            ..Outfall::default()
        },
    ));
    network.storage_units.push(StorageUnit {
        name: "S1".into(),
        location: Point::new(25.0, 10.0),
        invert_elev: 90.0,
        max_depth: 8.0,
        init_depth: 0.0,
        shape: StorageShape::Functional {
            a1: 1000.0,
            a2: 0.0,
            a0: 0.0,
        },
        surcharge_depth: 0.0,
        evap_factor: 0.0,
        infiltration: Some(GreenAmpt {
            suction_head: 4.0,
            conductivity: 0.5,
            initial_deficit: 0.2,
        }),
        grid: None,
    });
    let mut c1 = conduit("C1", "J1", "O1");
    c1.geometry = Polyline::segment(Point::new(0.0, 0.0), Point::new(50.0, 0.0));
    network.links.push(c1);
    let mut pattern = Pattern {
        name: "DWF".into(),
        pattern_type: PatternType::Hourly,
        description: Some("dry weather".into()),
        multipliers: vec![1.0; 24],
    };
    pattern.multipliers[3] = 0.4;
    network.patterns.push(pattern);
    network.time_series.push(TimeSeries {
        name: "TS1".into(),
        description: "TS1".into(),
        source: TimeSeriesSource::Inline(vec![TimeSeriesRow {
            date: Some("01/01/2020".into()),
            time: "00:00".into(),
            value: 1.5,
        }]),
    });
    network.sections.push(RawSection::new("TITLE", vec!["Demo".into()]));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.db");
    {
        let mut store = Store::open(&path).unwrap();
        store.upsert_node(&junction("OLD", 5.0, 5.0)).unwrap();
        store.save_network(&network, ImportMode::Replace).unwrap();
    }

    let store = Store::open(&path).unwrap();
    let loaded = store.load_network().unwrap();
    assert_eq!(loaded.nodes, network.nodes);
    assert_eq!(loaded.storage_units, network.storage_units);
    assert_eq!(loaded.links, network.links);
    assert_eq!(loaded.patterns, network.patterns);
    assert_eq!(loaded.time_series, network.time_series);
    assert_eq!(loaded.sections, network.sections);
}

#[test]
fn test_merge_keeps_rows_not_in_network() {
    let mut store = Store::open_in_memory().unwrap();
    store.upsert_node(&junction("KEEP", 0.0, 0.0)).unwrap();

    let mut network = Network::new();
    network.nodes.push(junction("NEW", 1.0, 1.0));
    store.save_network(&network, ImportMode::Merge).unwrap();

    let names: Vec<_> = store.nodes().unwrap().into_iter().map(|n| n.name).collect();
    assert_eq!(names, vec!["KEEP".to_string(), "NEW".to_string()]);
}

#[test]
fn test_outflow_cells_are_replaced() {
    let mut store = Store::open_in_memory().unwrap();
    let cells = vec![
        OutflowCell {
            grid: CellId::new(4),
            outfall: "O1".into(),
            role: OutflowRole::Border,
        },
        OutflowCell {
            grid: CellId::new(5),
            outfall: "O1".into(),
            role: OutflowRole::Stage1,
        },
    ];
    store.replace_outflow_cells(&cells).unwrap();
    store.replace_outflow_cells(&cells).unwrap();
    assert_eq!(store.outflow_cells().unwrap(), cells);
}
