//! # sdi-core: Storm Drain Network Model
//!
//! Shared data structures for the storm drain interchange crates: the
//! network model, planar geometry, the grid capability, diagnostics and
//! the error taxonomy.
//!
//! ## Design Philosophy
//!
//! A storm drain network is a set of named **nodes** (junctions, inlets,
//! outfalls and storage units) joined by named **links** (conduits, pumps,
//! orifices and weirs). Links refer to their endpoints by name, so a link
//! may exist before its nodes do; such links are reported by validation
//! rather than rejected. Tabular data (curves, patterns, time series,
//! inflows, rating tables and culvert equations) hangs off nodes and links
//! by name as well.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdi_core::*;
//!
//! let mut network = Network::new();
//! network.nodes.push(Node::junction("J1", Point::new(0.0, 0.0), 100.0, Junction {
//!     max_depth: 5.0,
//!     ..Junction::default()
//! }));
//! network.nodes.push(Node::outfall("O1", Point::new(50.0, 0.0), 95.0, Outfall::default()));
//! network.links.push(Link::new("C1", "J1", "O1", LinkKind::Conduit(Conduit {
//!     length: 50.0,
//!     roughness: 0.013,
//!     ..Conduit::default()
//! })));
//!
//! let mut diag = Diagnostics::new();
//! network.validate_into(&mut diag);
//! assert!(!diag.has_issues());
//! ```
//!
//! ## Modules
//!
//! - [`node`], [`link`], [`series`] - entity types
//! - [`geometry`] - points, polylines, polygons and WKT
//! - [`grid`] - the [`GridService`] capability and [`RegularGrid`]
//! - [`diagnostics`] - warnings collected during import, export and schematization
//! - [`graph_utils`] - connectivity checks over the link graph
//! - [`config`] - persisted user settings

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod graph_utils;
pub mod grid;
pub mod link;
pub mod node;
pub mod series;

pub use config::{DirKind, ImportMode, SdiConfig};
pub use diagnostics::{
    DiagnosticIssue, Diagnostics, ImportDiagnostics, ImportStats, IssueKind, Severity,
};
pub use error::{EntityKind, SdiError, SdiResult};
pub use geometry::{BoundingBox, Point, Polygon, Polyline};
pub use graph_utils::{find_isolated_nodes, find_islands, IslandAnalysis};
pub use grid::{Direction, GridCell, GridService, Neighbors, RegularGrid};
pub use link::{
    Conduit, CrossSection, Link, LinkClass, LinkKind, Losses, Orifice, OrificeType, Pump,
    PumpStatus, Weir, WeirType, XSectionShape,
};
pub use node::{
    DrainType, GreenAmpt, Inlet, Junction, Node, NodeClass, NodeKind, Outfall, OutfallBoundary,
    OutfallType, StorageShape, StorageUnit,
};
pub use series::{
    Culvert, Curve, CurveType, Inflow, Pattern, PatternType, RatingTable, RawSection, TimeSeries,
    TimeSeriesRow, TimeSeriesSource, HOURLY_PATTERN_LEN,
};

/// Identifier of a cell of the external computational grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(i64);

impl CellId {
    #[inline]
    pub fn new(value: i64) -> Self {
        CellId(value)
    }
    #[inline]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The complete storm drain network.
///
/// Entities are kept in arrival order; lookups are by name. Names are
/// compared exactly (INP names are case sensitive).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub storage_units: Vec<StorageUnit>,
    pub links: Vec<Link>,
    pub curves: Vec<Curve>,
    pub patterns: Vec<Pattern>,
    pub time_series: Vec<TimeSeries>,
    pub inflows: Vec<Inflow>,
    pub rating_tables: Vec<RatingTable>,
    pub culverts: Vec<Culvert>,
    /// Sections preserved verbatim, in document order
    pub sections: Vec<RawSection>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn storage_unit(&self, name: &str) -> Option<&StorageUnit> {
        self.storage_units.iter().find(|s| s.name == name)
    }

    /// True when `name` resolves to a node or a storage unit
    pub fn has_node(&self, name: &str) -> bool {
        self.node(name).is_some() || self.storage_unit(name).is_some()
    }

    /// Location of a node or storage unit
    pub fn node_location(&self, name: &str) -> Option<Point> {
        self.node(name)
            .map(|n| n.location)
            .or_else(|| self.storage_unit(name).map(|s| s.location))
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub fn link_mut(&mut self, name: &str) -> Option<&mut Link> {
        self.links.iter_mut().find(|l| l.name == name)
    }

    /// Links whose inlet or outlet is `node`
    pub fn links_by_endpoint<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.touches(node))
    }

    pub fn curve(&self, name: &str) -> Option<&Curve> {
        self.curves.iter().find(|c| c.name == name)
    }

    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn time_series(&self, name: &str) -> Option<&TimeSeries> {
        self.time_series.iter().find(|t| t.name == name)
    }

    pub fn rating_table(&self, name: &str) -> Option<&RatingTable> {
        self.rating_tables.iter().find(|r| r.name == name)
    }

    pub fn inflow_for(&self, node: &str) -> Option<&Inflow> {
        self.inflows.iter().find(|i| i.node == node)
    }

    pub fn section(&self, name: &str) -> Option<&RawSection> {
        self.sections.iter().find(|s| s.is_named(name))
    }

    /// Insert or replace a node by name, keeping the position of the old one
    pub fn upsert_node(&mut self, node: Node) {
        match self.nodes.iter_mut().find(|n| n.name == node.name) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    /// Insert or replace a link by name
    pub fn upsert_link(&mut self, link: Link) {
        match self.links.iter_mut().find(|l| l.name == link.name) {
            Some(existing) => *existing = link,
            None => self.links.push(link),
        }
    }

    /// Name-to-index map over links, built once for attachment passes
    pub fn link_index(&self) -> HashMap<String, usize> {
        self.links
            .iter()
            .enumerate()
            .map(|(i, l)| (l.name.clone(), i))
            .collect()
    }

    /// Collect referential and structural problems into `diag`.
    ///
    /// Nothing is removed; links with unresolved endpoints stay in the
    /// network and are only reported.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let mut seen = HashSet::new();
        for name in self
            .nodes
            .iter()
            .map(|n| n.name.as_str())
            .chain(self.storage_units.iter().map(|s| s.name.as_str()))
        {
            if !seen.insert(name) {
                diag.add_error_with_entity(IssueKind::Duplicate, "duplicate node name", name);
            }
        }

        let mut link_names = HashSet::new();
        for link in &self.links {
            if !link_names.insert(link.name.as_str()) {
                diag.add_error_with_entity(IssueKind::Duplicate, "duplicate link name", &link.name);
            }
            self.validate_link(link, diag);
        }

        for node in &self.nodes {
            if let Some(outfall) = node.outfall_attrs() {
                match &outfall.boundary {
                    OutfallBoundary::TidalCurve(curve) => {
                        let ok = self
                            .curve(curve)
                            .map(|c| c.curve_type == CurveType::Tidal)
                            .unwrap_or(false);
                        if !ok {
                            diag.add_warning_with_entity(
                                IssueKind::Reference,
                                &format!("tidal curve '{curve}' not found"),
                                &node.name,
                            );
                        }
                    }
                    OutfallBoundary::TimeSeries(series) => {
                        if self.time_series(series).is_none() {
                            diag.add_warning_with_entity(
                                IssueKind::Reference,
                                &format!("time series '{series}' not found"),
                                &node.name,
                            );
                        }
                    }
                    _ => {}
                }
            }
            if let Some(table) = node.inlet().and_then(|i| i.rating_table.as_deref()) {
                if self.rating_table(table).is_none() {
                    diag.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("rating table '{table}' not found"),
                        &node.name,
                    );
                }
            }
        }

        let mut rating_hosts: HashMap<&str, &str> = HashMap::new();
        for node in &self.nodes {
            if let Some(table) = node.inlet().and_then(|i| i.rating_table.as_deref()) {
                if let Some(first) = rating_hosts.insert(table, &node.name) {
                    diag.add(
                        DiagnosticIssue::warning(
                            IssueKind::DuplicateRatingAssignment,
                            format!("rating table '{table}' already assigned to inlet '{first}'"),
                        )
                        .with_entity(node.name.clone()),
                    );
                }
            }
        }

        for unit in &self.storage_units {
            if let Some(curve) = unit.curve() {
                if self.curve(curve).is_none() {
                    diag.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("storage curve '{curve}' not found"),
                        &unit.name,
                    );
                }
            }
        }

        let mut inflow_nodes = HashSet::new();
        for inflow in &self.inflows {
            if !self.has_node(&inflow.node) {
                diag.add_warning_with_entity(
                    IssueKind::Reference,
                    "inflow names a missing node",
                    &inflow.node,
                );
            }
            if !inflow_nodes.insert(inflow.node.as_str()) {
                diag.add_error_with_entity(
                    IssueKind::Duplicate,
                    "node has more than one inflow",
                    &inflow.node,
                );
            }
            if let Some(series) = inflow.time_series.as_deref() {
                if self.time_series(series).is_none() {
                    diag.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("time series '{series}' not found"),
                        &inflow.node,
                    );
                }
            }
            if let Some(pattern) = inflow.pattern.as_deref() {
                if self.pattern(pattern).is_none() {
                    diag.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("pattern '{pattern}' not found"),
                        &inflow.node,
                    );
                }
            }
        }
    }

    fn validate_link(&self, link: &Link, diag: &mut Diagnostics) {
        for (role, endpoint) in [("inlet", &link.inlet_node), ("outlet", &link.outlet_node)] {
            match endpoint {
                Some(node) if self.has_node(node) => {}
                Some(node) => diag.add_warning_with_entity(
                    IssueKind::Reference,
                    &format!("{role} node '{node}' not found"),
                    &link.name,
                ),
                None => diag.add_warning_with_entity(
                    IssueKind::Reference,
                    &format!("{role} node not set"),
                    &link.name,
                ),
            }
        }

        if let Some(xs) = link.xsection() {
            if xs.barrels < 1 {
                diag.add_warning_with_entity(
                    IssueKind::Validation,
                    "cross-section must have at least one barrel",
                    &link.name,
                );
            }
        }

        match &link.kind {
            LinkKind::Conduit(conduit) => {
                if conduit.roughness <= 0.0 {
                    diag.add_warning_with_entity(
                        IssueKind::Validation,
                        &format!("Manning n must be positive (got {})", conduit.roughness),
                        &link.name,
                    );
                }
            }
            LinkKind::Pump(pump) => {
                let ok = self
                    .curve(&pump.curve)
                    .map(|c| c.curve_type.is_pump())
                    .unwrap_or(false);
                if !ok {
                    diag.add_warning_with_entity(
                        IssueKind::Reference,
                        &format!("pump curve '{}' not found", pump.curve),
                        &link.name,
                    );
                }
            }
            LinkKind::Orifice(_) | LinkKind::Weir(_) => {}
        }
    }
}

#[cfg(test)]
mod tests;
