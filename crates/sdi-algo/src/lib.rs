//! # sdi-algo: Schematization Engine
//!
//! Projects the user-authored storm drain network onto the host's
//! computational grid.
//!
//! | Step | Module | Writes |
//! |------|--------|--------|
//! | Link auto-routing | [`routing`] | missing link endpoint names |
//! | Node-to-cell mapping | [`cells`] | `swmmflo`, `swmmoutf`, node grid cells |
//! | Rating table matching | [`rating`] | inlet rating-table assignments |
//! | Outflow boundary cells | [`boundary`] | `swmm_outflow_cells` |
//! | Link station sampling | [`stations`] | nothing, reports only |
//!
//! The grid is an injected [`GridService`]; nothing here depends on a
//! particular geometry library. Lookups that fail (a node outside the
//! domain, an endpoint with no node in range) never abort a run. They are
//! reported and the entity is left out of the output. Running twice over
//! unchanged inputs leaves identical schematized tables.
//!
//! ## Example
//!
//! ```no_run
//! use sdi_algo::{OutflowKind, Schematizer};
//! use sdi_core::{Point, RegularGrid};
//! use sdi_store::Store;
//!
//! let mut store = Store::open("project.sqlite")?;
//! let grid = RegularGrid::rectangle(Point::new(0.0, 0.0), 10.0, 100, 80);
//!
//! let report = Schematizer::new(&grid)
//!     .with_outflow_kind("O1", OutflowKind::TimeStage)
//!     .run(&mut store)?;
//! println!("{} inlets on the grid", report.placement.inlets.len());
//! for issue in &report.diagnostics().issues {
//!     println!("{issue}");
//! }
//! # Ok::<(), sdi_core::SdiError>(())
//! ```

pub mod boundary;
pub mod cells;
pub mod rating;
pub mod routing;
pub mod stations;

pub use boundary::{
    apply_boundary_selection, boundary_outfalls, select_boundary_cells, BoundaryOutfall,
    BoundarySelection, MaskAction, OutflowKind, SelectionState, NEIGHBORHOOD_ACTIONS,
};
pub use cells::{place_nodes, schematize_nodes, NodePlacement};
pub use rating::{assign_rating_tables, MatchedBy, RatingAssignment, RatingMatch};
pub use routing::{auto_route_links, route_links, NodeIndex, RoutingReport};
pub use stations::{check_link_stations, sample_link, station_spacing, LinkStations};

use sdi_core::config::SchematizeConfig;
use sdi_core::{Diagnostics, GridService, SdiResult};
use sdi_store::Store;
use serde::Serialize;
use tracing::info;

/// Everything one schematization run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchematizeReport {
    pub routing: RoutingReport,
    pub placement: NodePlacement,
    pub ratings: RatingAssignment,
    pub boundary: BoundarySelection,
    pub stations: Vec<LinkStations>,
    /// Station warnings
    pub station_diagnostics: Diagnostics,
}

impl SchematizeReport {
    /// All warnings of the run, step by step
    pub fn diagnostics(&self) -> Diagnostics {
        let mut all = Diagnostics::new();
        for part in [
            &self.routing.diagnostics,
            &self.placement.diagnostics,
            &self.ratings.diagnostics,
            &self.boundary.diagnostics,
            &self.station_diagnostics,
        ] {
            all.merge(part.clone());
        }
        all
    }
}

/// Runs the schematization steps against a store
pub struct Schematizer<'g> {
    grid: &'g dyn GridService,
    config: SchematizeConfig,
    outflow_kinds: Vec<(String, OutflowKind)>,
}

impl<'g> Schematizer<'g> {
    pub fn new(grid: &'g dyn GridService) -> Self {
        Self {
            grid,
            config: SchematizeConfig::default(),
            outflow_kinds: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SchematizeConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark an outfall as polygon-typed with the given boundary type
    pub fn with_outflow_kind(mut self, outfall: impl Into<String>, kind: OutflowKind) -> Self {
        let outfall = outfall.into();
        self.outflow_kinds.retain(|(name, _)| *name != outfall);
        self.outflow_kinds.push((outfall, kind));
        self
    }

    fn kind_of(&self, outfall: &str) -> Option<OutflowKind> {
        self.outflow_kinds
            .iter()
            .find(|(name, _)| name == outfall)
            .map(|(_, kind)| *kind)
    }

    pub fn run(&self, store: &mut Store) -> SdiResult<SchematizeReport> {
        let routing = auto_route_links(store, &self.config)?;
        let placement = schematize_nodes(store, self.grid)?;
        let ratings = assign_rating_tables(store)?;

        let outfalls = boundary_outfalls(&placement.outfalls, |name| self.kind_of(name));
        let boundary = apply_boundary_selection(store, self.grid, &outfalls)?;

        let mut station_diagnostics = Diagnostics::new();
        let stations = match station_spacing(self.grid, self.config.cell_size) {
            Some(spacing) => {
                check_link_stations(&store.links()?, self.grid, spacing, &mut station_diagnostics)
            }
            None => Vec::new(),
        };

        let report = SchematizeReport {
            routing,
            placement,
            ratings,
            boundary,
            stations,
            station_diagnostics,
        };
        info!(issues = report.diagnostics().len(), "schematization finished");
        Ok(report)
    }
}
