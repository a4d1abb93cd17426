//! Renaming entities together with every row that refers to them.

use rusqlite::Connection;
use sdi_core::EntityKind;

use crate::error::{StoreError, StoreResult};
use crate::schema::bump_version;

/// (table, column) pairs holding an entity's own name. Every pair is
/// searched when checking for collisions, so kinds sharing a name space
/// list all of its tables.
fn owners(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::Node | EntityKind::StorageUnit => &[
            ("user_swmm_nodes", "name"),
            ("user_swmm_storage_units", "name"),
        ],
        EntityKind::Conduit | EntityKind::Pump | EntityKind::Orifice | EntityKind::Weir => &[
            ("user_swmm_conduits", "name"),
            ("user_swmm_pumps", "name"),
            ("user_swmm_orifices", "name"),
            ("user_swmm_weirs", "name"),
        ],
        EntityKind::Curve => &[
            ("swmm_pumps_curve_data", "pump_curve_name"),
            ("swmm_other_curves", "name"),
        ],
        EntityKind::Pattern => &[("swmm_inflow_patterns", "pattern_name")],
        EntityKind::TimeSeries => &[("swmm_time_series", "time_series_name")],
        EntityKind::RatingTable => &[("swmmflort", "name")],
        EntityKind::Culvert => &[("swmmflo_culvert", "name")],
    }
}

/// (table, column) pairs holding rows of exactly this kind
fn own(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::Node => &[("user_swmm_nodes", "name")],
        EntityKind::StorageUnit => &[("user_swmm_storage_units", "name")],
        EntityKind::Conduit => &[("user_swmm_conduits", "name")],
        EntityKind::Pump => &[("user_swmm_pumps", "name")],
        EntityKind::Orifice => &[("user_swmm_orifices", "name")],
        EntityKind::Weir => &[("user_swmm_weirs", "name")],
        other => owners(other),
    }
}

/// Columns elsewhere that store this kind's name
fn references(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::Node | EntityKind::StorageUnit => &[
            ("user_swmm_conduits", "inlet_node"),
            ("user_swmm_conduits", "outlet_node"),
            ("user_swmm_pumps", "inlet_node"),
            ("user_swmm_pumps", "outlet_node"),
            ("user_swmm_orifices", "inlet_node"),
            ("user_swmm_orifices", "outlet_node"),
            ("user_swmm_weirs", "inlet_node"),
            ("user_swmm_weirs", "outlet_node"),
            ("swmm_inflows", "node_name"),
            ("swmmflo", "swflo_name"),
            ("swmmoutf", "name"),
            ("swmm_outflow_cells", "outfall"),
        ],
        EntityKind::Curve => &[
            ("user_swmm_pumps", "pump_curve"),
            ("user_swmm_nodes", "tidal_curve"),
            ("user_swmm_storage_units", "curve_name"),
        ],
        EntityKind::Pattern => &[("swmm_inflows", "pattern_name")],
        EntityKind::TimeSeries => &[
            ("swmm_time_series_data", "time_series_name"),
            ("swmm_inflows", "time_series_name"),
            ("user_swmm_nodes", "time_series"),
        ],
        EntityKind::RatingTable => &[
            ("swmmflort_data", "rt_name"),
            ("user_swmm_nodes", "rt_name"),
        ],
        EntityKind::Conduit
        | EntityKind::Pump
        | EntityKind::Orifice
        | EntityKind::Weir
        | EntityKind::Culvert => &[],
    }
}

fn exists_in(conn: &Connection, table: &str, column: &str, name: &str) -> StoreResult<bool> {
    let found: bool = conn.query_row(
        &format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = ?1)"),
        [name],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Rename `old` to `new` within `kind`. Must run inside a transaction; the
/// caller commits only on success.
pub fn rename(conn: &Connection, kind: EntityKind, old: &str, new: &str) -> StoreResult<()> {
    let mut present = false;
    for (table, column) in own(kind) {
        present |= exists_in(conn, table, column, old)?;
    }
    if !present {
        return Err(StoreError::NotFound {
            kind,
            name: old.to_string(),
        });
    }
    if old == new {
        return Ok(());
    }
    for (table, column) in owners(kind) {
        if exists_in(conn, table, column, new)? {
            return Err(StoreError::DuplicateName {
                kind,
                name: new.to_string(),
            });
        }
    }

    for (table, column) in own(kind).iter().chain(references(kind)) {
        let changed = conn.execute(
            &format!("UPDATE {table} SET {column} = ?2 WHERE {column} = ?1"),
            [old, new],
        )?;
        if changed > 0 {
            bump_version(conn, table)?;
        }
    }
    Ok(())
}
