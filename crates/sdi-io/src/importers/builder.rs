//! Assemble a [`Network`] from a tokenized INP document.
//!
//! Sections are consumed in dependency order rather than document order:
//! coordinates first, then nodes, subcatchment outlets (which promote
//! junctions to inlets), links, and finally the attachments and tables
//! that refer to them by name.

use std::collections::{HashMap, HashSet};

use sdi_core::config::ImportConfig;
use sdi_core::{
    find_isolated_nodes, find_islands, DiagnosticIssue, ImportDiagnostics, IssueKind, Link,
    LinkKind, Network, NodeClass, Point, RawSection,
};
use tracing::debug;

use super::records::{
    parse_conduits, parse_coordinates, parse_junctions, parse_losses, parse_orifices,
    parse_outfalls, parse_pumps, parse_storage, parse_subcatchments, parse_weirs,
    parse_xsections,
};
use super::tables::{parse_curves, parse_inflows, parse_patterns, parse_time_series};
use super::tokenizer::{InpDocument, InpSection, SectionKind};

/// Collect the records of every section of `kind`
fn collect<T>(
    doc: &InpDocument,
    kind: SectionKind,
    diag: &mut ImportDiagnostics,
    parse: impl Fn(&InpSection, &mut ImportDiagnostics) -> Vec<T>,
) -> Vec<T> {
    doc.sections_of(kind)
        .flat_map(|section| parse(section, diag))
        .collect()
}

fn duplicate(diag: &mut ImportDiagnostics, entity: &str, what: &str) {
    diag.add(
        DiagnosticIssue::warning(
            IssueKind::Duplicate,
            format!("{what} '{entity}' defined more than once, later definition kept"),
        )
        .with_entity(entity),
    );
}

pub fn build_network(
    doc: &InpDocument,
    config: &ImportConfig,
    diag: &mut ImportDiagnostics,
) -> Network {
    let mut network = Network::new();

    let coordinates: HashMap<String, Point> =
        collect(doc, SectionKind::Coordinates, diag, parse_coordinates)
            .into_iter()
            .map(|c| (c.name, c.point))
            .collect();

    add_nodes(doc, config, &coordinates, &mut network, diag);
    promote_inlets(doc, &mut network, diag);
    add_links(doc, &mut network, diag);
    attach_losses(doc, &mut network, diag);
    attach_xsections(doc, &mut network, diag);
    add_tables(doc, &mut network, diag);
    preserve_sections(doc, &mut network, diag);

    diag.stats.islands = find_islands(&network).count();
    diag.stats.isolated_nodes = find_isolated_nodes(&network).len();
    debug!(summary = %diag.summary(), "network assembled");
    network
}

fn add_nodes(
    doc: &InpDocument,
    config: &ImportConfig,
    coordinates: &HashMap<String, Point>,
    network: &mut Network,
    diag: &mut ImportDiagnostics,
) {
    let mut place = |name: &str, diag: &mut ImportDiagnostics| -> Option<Point> {
        match coordinates.get(name) {
            Some(point) => Some(*point),
            None if config.drop_nodes_without_coordinates => {
                diag.add_reference_warning(name, "node has no coordinates and was dropped");
                diag.stats.dropped_nodes += 1;
                None
            }
            None => {
                diag.add_reference_warning(name, "node has no coordinates, placed at the origin");
                Some(Point::new(0.0, 0.0))
            }
        }
    };

    let mut names = HashSet::new();
    let mut nodes = collect(doc, SectionKind::Junctions, diag, parse_junctions);
    nodes.extend(collect(doc, SectionKind::Outfalls, diag, parse_outfalls));
    for mut node in nodes {
        let Some(location) = place(&node.name, diag) else {
            continue;
        };
        node.location = location;
        if !names.insert(node.name.clone()) {
            duplicate(diag, &node.name, "node");
        }
        network.upsert_node(node);
    }

    for mut unit in collect(doc, SectionKind::Storage, diag, parse_storage) {
        let Some(location) = place(&unit.name, diag) else {
            continue;
        };
        unit.location = location;
        if !names.insert(unit.name.clone()) {
            duplicate(diag, &unit.name, "node");
            network.nodes.retain(|n| n.name != unit.name);
            network.storage_units.retain(|s| s.name != unit.name);
        }
        network.storage_units.push(unit);
    }

    diag.stats.junctions = network
        .nodes
        .iter()
        .filter(|n| n.class() == NodeClass::Junction)
        .count();
    diag.stats.outfalls = network
        .nodes
        .iter()
        .filter(|n| n.class() == NodeClass::Outfall)
        .count();
    diag.stats.storage_units = network.storage_units.len();
}

/// Junctions that receive subcatchment runoff become inlets
fn promote_inlets(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    let outlets: HashSet<String> =
        collect(doc, SectionKind::Subcatchments, diag, parse_subcatchments)
            .into_iter()
            .map(|s| s.outlet)
            .collect();

    for node in network.nodes.iter_mut() {
        if outlets.contains(&node.name) && node.class() == NodeClass::Junction {
            node.promote_to_inlet();
            diag.stats.junctions -= 1;
            diag.stats.inlets += 1;
        }
    }
}

fn add_links(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    let mut links: Vec<Link> = collect(doc, SectionKind::Conduits, diag, parse_conduits);
    links.extend(collect(doc, SectionKind::Pumps, diag, parse_pumps));
    links.extend(collect(doc, SectionKind::Orifices, diag, parse_orifices));
    links.extend(collect(doc, SectionKind::Weirs, diag, parse_weirs));

    let mut names = HashSet::new();
    for mut link in links {
        let start = link
            .inlet_node
            .as_deref()
            .and_then(|n| network.node_location(n));
        let end = link
            .outlet_node
            .as_deref()
            .and_then(|n| network.node_location(n));
        link.geometry.snap_ends(start, end);

        if !names.insert(link.name.clone()) {
            duplicate(diag, &link.name, "link");
        }
        network.upsert_link(link);
    }

    for link in &network.links {
        match link.kind {
            LinkKind::Conduit(_) => diag.stats.conduits += 1,
            LinkKind::Pump(_) => diag.stats.pumps += 1,
            LinkKind::Orifice(_) => diag.stats.orifices += 1,
            LinkKind::Weir(_) => diag.stats.weirs += 1,
        }
    }
}

fn attach_losses(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    for record in collect(doc, SectionKind::Losses, diag, parse_losses) {
        match network.link_mut(&record.link) {
            Some(link) => match link.conduit_mut() {
                Some(conduit) => conduit.losses = record.losses,
                None => diag.add_validation_warning(
                    &record.link,
                    "losses apply to conduits only, row ignored",
                ),
            },
            None => diag.add_reference_warning(&record.link, "losses name a missing conduit"),
        }
    }
}

/// Attach cross-sections by link name; pumps carry none
fn attach_xsections(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    let index = network.link_index();
    for record in collect(doc, SectionKind::XSections, diag, parse_xsections) {
        let Some(link) = index.get(&record.link).and_then(|&i| network.links.get_mut(i)) else {
            diag.add_reference_warning(&record.link, "cross-section names a missing link");
            continue;
        };
        if !link.set_xsection(record.xsection) {
            diag.add_validation_warning(&record.link, "pumps take no cross-section, row ignored");
        }
    }
}

fn add_tables(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    let mut seen = HashSet::new();
    for inflow in collect(doc, SectionKind::Inflows, diag, parse_inflows) {
        if !seen.insert(inflow.node.clone()) {
            duplicate(diag, &inflow.node, "inflow for node");
            network.inflows.retain(|i| i.node != inflow.node);
        }
        network.inflows.push(inflow);
    }

    network.patterns = collect(doc, SectionKind::Patterns, diag, parse_patterns);
    network.time_series = collect(doc, SectionKind::TimeSeries, diag, parse_time_series);
    network.curves = collect(doc, SectionKind::Curves, diag, parse_curves);

    diag.stats.inflows = network.inflows.len();
    diag.stats.patterns = network.patterns.len();
    diag.stats.time_series = network.time_series.len();
    diag.stats.curves = network.curves.len();
}

/// Keep sections the model does not interpret so the exporter can write
/// them back. TITLE, OPTIONS and REPORT are kept here too; the exporter
/// writes its own defaults only when they are absent.
fn preserve_sections(doc: &InpDocument, network: &mut Network, diag: &mut ImportDiagnostics) {
    for section in doc.sections.iter().filter(|s| !s.kind.is_modelled()) {
        network
            .sections
            .push(RawSection::new(section.name.clone(), section.trimmed_lines()));
    }
    diag.stats.preserved_sections = network.sections.len();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importers::tokenizer::tokenize;

    #[test]
    fn test_missing_coordinates_drop_or_keep() {
        let doc = tokenize("[JUNCTIONS]\nJ1 100 5\nJ2 99 5\n[COORDINATES]\nJ1 0 0\n").unwrap();

        let mut diag = ImportDiagnostics::new();
        let network = build_network(&doc, &ImportConfig::default(), &mut diag);
        assert_eq!(network.nodes.len(), 1);
        assert_eq!(diag.stats.dropped_nodes, 1);

        let keep = ImportConfig {
            drop_nodes_without_coordinates: false,
            ..ImportConfig::default()
        };
        let mut diag = ImportDiagnostics::new();
        let network = build_network(&doc, &keep, &mut diag);
        assert_eq!(network.nodes.len(), 2);
        assert_eq!(diag.stats.dropped_nodes, 0);
        assert_eq!(diag.count_of_kind(IssueKind::Reference), 1);
    }

    #[test]
    fn test_xsection_on_pump_is_refused() {
        let text = "[JUNCTIONS]\nJ1 100 5\nJ2 99 5\n\
            [PUMPS]\nP1 J1 J2 PC1 ON\n\
            [XSECTIONS]\nP1 CIRCULAR 1\nX9 CIRCULAR 1\n\
            [COORDINATES]\nJ1 0 0\nJ2 10 0\n";
        let mut diag = ImportDiagnostics::new();
        let network = build_network(&tokenize(text).unwrap(), &ImportConfig::default(), &mut diag);
        assert!(network.links[0].xsection().is_none());
        assert_eq!(diag.count_of_kind(IssueKind::Validation), 1);
        assert_eq!(diag.count_of_kind(IssueKind::Reference), 1);
        assert_eq!(network.links[0].geometry.length(), 10.0);
    }

    #[test]
    fn test_duplicate_node_keeps_later() {
        let text = "[JUNCTIONS]\nJ1 100 5\nJ1 90 5\n[COORDINATES]\nJ1 0 0\n";
        let mut diag = ImportDiagnostics::new();
        let network = build_network(&tokenize(text).unwrap(), &ImportConfig::default(), &mut diag);
        assert_eq!(network.nodes.len(), 1);
        assert_eq!(network.nodes[0].invert_elev, 90.0);
        assert_eq!(diag.count_of_kind(IssueKind::Duplicate), 1);
    }

    #[test]
    fn test_preserved_sections_keep_order() {
        let text = "[TITLE]\nDemo\n[RAINGAGES]\nRG1 VOLUME 0:15 1.0 TIMESERIES TS1\n\n[JUNCTIONS]\n\
            [SUBAREAS]\nS1 0.01 0.1\n";
        let mut diag = ImportDiagnostics::new();
        let network = build_network(&tokenize(text).unwrap(), &ImportConfig::default(), &mut diag);
        let names: Vec<_> = network.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TITLE", "RAINGAGES", "SUBAREAS"]);
        assert_eq!(network.sections[1].lines.len(), 1);
        assert_eq!(diag.stats.preserved_sections, 3);
    }
}
