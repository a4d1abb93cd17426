use std::path::Path;

use rusqlite::{params, Connection};
use sdi_core::{
    CellId, Culvert, Curve, DiagnosticIssue, Diagnostics, EntityKind, ImportMode, Inflow,
    IssueKind, Link, Network, Node, NodeClass, Pattern, RatingTable, RawSection, SdiResult,
    StorageUnit, TimeSeries,
};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::schema::{self, bump_version, NODES};
use crate::schematized::{OutflowCell, SchematizedInlet, SchematizedOutfall};
use crate::{integrity, links, nodes, rename, schematized, tables};

/// The canonical network, persisted in one SQLite file.
///
/// Every public mutation runs in its own transaction and commits before
/// returning. Reads that span several tables take one read transaction so
/// they see a consistent snapshot.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> SdiResult<Self> {
        let conn = Connection::open(path.as_ref()).map_err(StoreError::from)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SdiResult<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> SdiResult<Self> {
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` in a write transaction, committing only when it succeeds
    fn write<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> SdiResult<T> {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Run `f` in a read transaction
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> SdiResult<T> {
        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Change counter of `table`; it grows with every committed write
    pub fn version(&self, table: &str) -> SdiResult<u64> {
        Ok(schema::version(&self.conn, table)?)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Insert or replace a node by name, keeping an assigned grid cell.
    ///
    /// An inlet naming a rating table that another inlet already holds is
    /// written without it; the refusal comes back as a
    /// `DuplicateRatingAssignment` warning.
    pub fn upsert_node(&mut self, node: &Node) -> SdiResult<Diagnostics> {
        let mut diag = Diagnostics::new();
        self.write(|conn| upsert_node_checked(conn, node, &mut diag))?;
        Ok(diag)
    }

    pub fn node(&self, name: &str) -> SdiResult<Option<Node>> {
        self.read(|conn| nodes::get_node(conn, name))
    }

    /// Like [`Store::node`] but a missing node is an error
    pub fn get_node(&self, name: &str) -> SdiResult<Node> {
        self.node(name)?.ok_or_else(|| {
            StoreError::NotFound {
                kind: EntityKind::Node,
                name: name.to_string(),
            }
            .into()
        })
    }

    pub fn nodes(&self) -> SdiResult<Vec<Node>> {
        self.read(nodes::list_nodes)
    }

    /// Delete a node with its inflow, its hosted rating table and its
    /// schematized rows. Links that reference it are kept and become
    /// unusable.
    pub fn delete_node(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| {
            let Some(node) = nodes::get_node(conn, name)? else {
                return Ok(false);
            };
            conn.execute("DELETE FROM user_swmm_nodes WHERE name = ?1", [name])?;
            let inflows = tables::delete_inflows_for(conn, name)?;
            if let Some(table) = node.inlet().and_then(|i| i.rating_table.as_deref()) {
                tables::delete_rating_table(conn, table)?;
            }
            schematized::delete_for_node(conn, name)?;
            nodes::refresh_usable(conn, Some(name))?;
            bump_version(conn, NODES)?;
            debug!(node = name, inflows, "deleted node");
            Ok(true)
        })
    }

    pub fn set_node_grid(&mut self, name: &str, grid: Option<CellId>) -> SdiResult<bool> {
        self.write(|conn| nodes::set_node_grid(conn, name, grid))
    }

    pub fn upsert_storage_unit(&mut self, unit: &StorageUnit) -> SdiResult<()> {
        self.write(|conn| nodes::upsert_storage_unit(conn, unit))
    }

    pub fn storage_units(&self) -> SdiResult<Vec<StorageUnit>> {
        self.read(nodes::list_storage_units)
    }

    pub fn delete_storage_unit(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| nodes::delete_storage_unit(conn, name))
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Insert or replace a link by name. The link is stored even when its
    /// endpoints do not exist yet; the return value says whether it is
    /// usable now.
    pub fn upsert_link(&mut self, link: &Link) -> SdiResult<bool> {
        self.write(|conn| links::upsert_link(conn, link))
    }

    pub fn link(&self, name: &str) -> SdiResult<Option<Link>> {
        self.read(|conn| links::get_link(conn, name))
    }

    pub fn links(&self) -> SdiResult<Vec<Link>> {
        self.read(links::list_links)
    }

    pub fn get_links_by_endpoint(&self, node: &str) -> SdiResult<Vec<Link>> {
        self.read(|conn| links::links_by_endpoint(conn, node))
    }

    /// Whether both endpoints of the link resolved at its last update
    pub fn is_link_usable(&self, name: &str) -> SdiResult<Option<bool>> {
        self.read(|conn| links::is_usable(conn, name))
    }

    /// Assign both endpoints of a link in one update
    pub fn set_link_endpoints(
        &mut self,
        name: &str,
        inlet: Option<&str>,
        outlet: Option<&str>,
    ) -> SdiResult<bool> {
        self.write(|conn| links::set_endpoints(conn, name, inlet, outlet))
    }

    pub fn set_link_outside_domain(&mut self, name: &str, outside: bool) -> SdiResult<bool> {
        self.write(|conn| links::set_outside_domain(conn, name, outside))
    }

    pub fn delete_link(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| links::delete_link(conn, name))
    }

    // ------------------------------------------------------------------
    // Tabular data
    // ------------------------------------------------------------------

    pub fn upsert_curve(&mut self, curve: &Curve) -> SdiResult<()> {
        self.write(|conn| tables::upsert_curve(conn, curve))
    }

    pub fn curves(&self) -> SdiResult<Vec<Curve>> {
        self.read(tables::list_curves)
    }

    pub fn delete_curve(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| tables::delete_curve(conn, name))
    }

    pub fn upsert_pattern(&mut self, pattern: &Pattern) -> SdiResult<()> {
        self.write(|conn| tables::upsert_pattern(conn, pattern))
    }

    pub fn patterns(&self) -> SdiResult<Vec<Pattern>> {
        self.read(tables::list_patterns)
    }

    pub fn delete_pattern(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| tables::delete_pattern(conn, name))
    }

    pub fn upsert_time_series(&mut self, series: &TimeSeries) -> SdiResult<()> {
        self.write(|conn| tables::upsert_time_series(conn, series))
    }

    pub fn time_series(&self) -> SdiResult<Vec<TimeSeries>> {
        self.read(tables::list_time_series)
    }

    pub fn delete_time_series(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| tables::delete_time_series(conn, name))
    }

    pub fn upsert_inflow(&mut self, inflow: &Inflow) -> SdiResult<()> {
        self.write(|conn| tables::upsert_inflow(conn, inflow))
    }

    pub fn inflows(&self) -> SdiResult<Vec<Inflow>> {
        self.read(tables::list_inflows)
    }

    pub fn delete_inflow(&mut self, node: &str) -> SdiResult<bool> {
        self.write(|conn| Ok(tables::delete_inflows_for(conn, node)? > 0))
    }

    pub fn upsert_rating_table(&mut self, table: &RatingTable) -> SdiResult<()> {
        self.write(|conn| tables::upsert_rating_table(conn, table))
    }

    pub fn rating_tables(&self) -> SdiResult<Vec<RatingTable>> {
        self.read(tables::list_rating_tables)
    }

    /// Delete a rating table and clear it from the inlet that used it
    pub fn delete_rating_table(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| tables::delete_rating_table(conn, name))
    }

    pub fn upsert_culvert(&mut self, culvert: &Culvert) -> SdiResult<()> {
        self.write(|conn| tables::upsert_culvert(conn, culvert))
    }

    pub fn culverts(&self) -> SdiResult<Vec<Culvert>> {
        self.read(tables::list_culverts)
    }

    pub fn delete_culvert(&mut self, name: &str) -> SdiResult<bool> {
        self.write(|conn| tables::delete_culvert(conn, name))
    }

    pub fn upsert_section(&mut self, section: &RawSection) -> SdiResult<()> {
        self.write(|conn| tables::upsert_section(conn, section))
    }

    pub fn sections(&self) -> SdiResult<Vec<RawSection>> {
        self.read(tables::list_sections)
    }

    // ------------------------------------------------------------------
    // Cross-entity operations
    // ------------------------------------------------------------------

    /// The inlet other than `except` that holds rating table `table`
    pub fn rating_table_holder(&self, table: &str, except: &str) -> SdiResult<Option<String>> {
        self.read(|conn| nodes::rating_table_holder(conn, table, except))
    }

    /// Link a rating table to an inlet and point the table at the inlet's
    /// grid cell.
    ///
    /// A table serves at most one inlet. When another inlet already uses
    /// `table`, a `DuplicateRatingAssignment` warning is added to `diag`,
    /// nothing changes and `Ok(false)` is returned.
    pub fn assign_rating_table(
        &mut self,
        inlet: &str,
        table: &str,
        diag: &mut Diagnostics,
    ) -> SdiResult<bool> {
        self.write(|conn| {
            let node = nodes::get_node(conn, inlet)?.ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Node,
                name: inlet.to_string(),
            })?;
            if !tables::rating_table_exists(conn, table)? {
                return Err(StoreError::NotFound {
                    kind: EntityKind::RatingTable,
                    name: table.to_string(),
                });
            }
            if node.class() != NodeClass::Inlet {
                diag.add_warning_with_entity(
                    IssueKind::Validation,
                    &format!("only inlets take rating tables, '{table}' not assigned"),
                    inlet,
                );
                return Ok(false);
            }
            if let Some(holder) = nodes::rating_table_holder(conn, table, inlet)? {
                refuse_rating_table(inlet, table, &holder, diag);
                return Ok(false);
            }
            conn.execute(
                "UPDATE user_swmm_nodes SET rt_name = ?2 WHERE name = ?1",
                [inlet, table],
            )?;
            bump_version(conn, NODES)?;
            tables::set_rating_table_grid(conn, table, node.grid)?;
            Ok(true)
        })
    }

    /// Rename an entity and every reference to it, atomically.
    ///
    /// Fails with `DuplicateName` when `new` is taken within the kind's
    /// name space and with `NotFound` when `old` does not exist; in both
    /// cases nothing changes.
    pub fn rename(&mut self, kind: EntityKind, old: &str, new: &str) -> SdiResult<()> {
        self.write(|conn| rename::rename(conn, kind, old, new))?;
        info!(%kind, old, new, "renamed");
        Ok(())
    }

    /// Referential report over the whole store; refreshes link usability
    pub fn check_integrity(&mut self) -> SdiResult<Diagnostics> {
        self.write(integrity::check_integrity)
    }

    // ------------------------------------------------------------------
    // Schematized layers
    // ------------------------------------------------------------------

    /// Replace the schematized inlets and outfalls and write each node's
    /// grid cell back, in one transaction
    pub fn replace_schematized(
        &mut self,
        inlets: &[SchematizedInlet],
        outfalls: &[SchematizedOutfall],
        node_cells: &[(String, Option<CellId>)],
    ) -> SdiResult<()> {
        self.write(|conn| {
            schematized::replace_inlets(conn, inlets)?;
            schematized::replace_outfalls(conn, outfalls)?;
            for (name, cell) in node_cells {
                conn.execute(
                    "UPDATE user_swmm_nodes SET grid_fid = ?2 WHERE name = ?1",
                    params![name, cell.map(|c| c.value())],
                )?;
                conn.execute(
                    "UPDATE user_swmm_storage_units SET grid_fid = ?2 WHERE name = ?1",
                    params![name, cell.map(|c| c.value())],
                )?;
            }
            bump_version(conn, NODES)?;
            bump_version(conn, schema::STORAGE_UNITS)?;
            Ok(())
        })
    }

    pub fn schematized_inlets(&self) -> SdiResult<Vec<SchematizedInlet>> {
        self.read(schematized::list_inlets)
    }

    pub fn schematized_outfalls(&self) -> SdiResult<Vec<SchematizedOutfall>> {
        self.read(schematized::list_outfalls)
    }

    pub fn replace_outflow_cells(&mut self, cells: &[OutflowCell]) -> SdiResult<()> {
        self.write(|conn| schematized::replace_outflow_cells(conn, cells))
    }

    pub fn outflow_cells(&self) -> SdiResult<Vec<OutflowCell>> {
        self.read(schematized::list_outflow_cells)
    }

    // ------------------------------------------------------------------
    // Whole network
    // ------------------------------------------------------------------

    /// Snapshot of the whole network, read in one transaction
    pub fn load_network(&self) -> SdiResult<Network> {
        self.read(|conn| {
            Ok(Network {
                nodes: nodes::list_nodes(conn)?,
                storage_units: nodes::list_storage_units(conn)?,
                links: links::list_links(conn)?,
                curves: tables::list_curves(conn)?,
                patterns: tables::list_patterns(conn)?,
                time_series: tables::list_time_series(conn)?,
                inflows: tables::list_inflows(conn)?,
                rating_tables: tables::list_rating_tables(conn)?,
                culverts: tables::list_culverts(conn)?,
                sections: tables::list_sections(conn)?,
            })
        })
    }

    /// Write a whole network in one transaction.
    ///
    /// `Replace` empties every user table first; `Merge` updates rows by
    /// name and inserts the rest. Rating tables claimed by a second inlet
    /// are refused as in [`Store::upsert_node`] and reported in the returned
    /// diagnostics.
    pub fn save_network(
        &mut self,
        network: &Network,
        mode: ImportMode,
    ) -> SdiResult<Diagnostics> {
        let mut diag = Diagnostics::new();
        self.write(|conn| {
            if mode == ImportMode::Replace {
                schema::truncate_user_tables(conn)?;
            }
            for node in &network.nodes {
                upsert_node_checked(conn, node, &mut diag)?;
            }
            for unit in &network.storage_units {
                nodes::upsert_storage_unit(conn, unit)?;
            }
            for link in &network.links {
                links::upsert_link(conn, link)?;
            }
            for curve in &network.curves {
                tables::upsert_curve(conn, curve)?;
            }
            for pattern in &network.patterns {
                tables::upsert_pattern(conn, pattern)?;
            }
            for series in &network.time_series {
                tables::upsert_time_series(conn, series)?;
            }
            for inflow in &network.inflows {
                tables::upsert_inflow(conn, inflow)?;
            }
            for table in &network.rating_tables {
                tables::upsert_rating_table(conn, table)?;
            }
            for culvert in &network.culverts {
                tables::upsert_culvert(conn, culvert)?;
            }
            for section in &network.sections {
                tables::upsert_section(conn, section)?;
            }
            nodes::refresh_usable(conn, None)?;
            Ok(())
        })?;
        info!(
            ?mode,
            nodes = network.nodes.len() + network.storage_units.len(),
            links = network.links.len(),
            "saved network"
        );
        Ok(diag)
    }
}

fn upsert_node_checked(
    conn: &Connection,
    node: &Node,
    diag: &mut Diagnostics,
) -> Result<(), StoreError> {
    if let Some(holder) = nodes::upsert_node(conn, node)? {
        if let Some(table) = node.inlet().and_then(|i| i.rating_table.as_deref()) {
            refuse_rating_table(&node.name, table, &holder, diag);
        }
    }
    Ok(())
}

fn refuse_rating_table(inlet: &str, table: &str, holder: &str, diag: &mut Diagnostics) {
    warn!(inlet, table, holder, "rating table already assigned");
    diag.add(
        DiagnosticIssue::warning(
            IssueKind::DuplicateRatingAssignment,
            format!("rating table '{table}' is already assigned to inlet '{holder}'"),
        )
        .with_entity(inlet),
    );
}
