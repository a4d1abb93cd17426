//! Schematized mirrors of the user layers, keyed by grid cell.
//!
//! These rows own no data of their own: they are regenerated from the user
//! nodes whenever schematization runs, one row per grid cell.

use rusqlite::{params, Connection};
use sdi_core::{CellId, DrainType};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::schema::{bump_version, OUTFLOW_CELLS, SCHEMATIZED_INLETS, SCHEMATIZED_OUTFALLS};

/// Inlet placed on a grid cell (`swmmflo`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchematizedInlet {
    pub grid: CellId,
    pub name: String,
    pub drain_type: Option<DrainType>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weir_coeff: f64,
    pub feature: i64,
    pub curb_height: f64,
}

/// Outfall placed on a grid cell (`swmmoutf`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchematizedOutfall {
    pub grid: CellId,
    pub name: String,
    pub allow_discharge: bool,
}

/// Role of a cell selected for an outflow boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutflowRole {
    Border,
    Stage1,
    Stage2,
}

impl OutflowRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutflowRole::Border => "border",
            OutflowRole::Stage1 => "stage1",
            OutflowRole::Stage2 => "stage2",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "border" => Some(OutflowRole::Border),
            "stage1" => Some(OutflowRole::Stage1),
            "stage2" => Some(OutflowRole::Stage2),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutflowCell {
    pub grid: CellId,
    pub outfall: String,
    pub role: OutflowRole,
}

pub fn replace_inlets(conn: &Connection, rows: &[SchematizedInlet]) -> StoreResult<()> {
    conn.execute("DELETE FROM swmmflo", [])?;
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO swmmflo (grid_fid, swflo_name, intype, swmm_length, swmm_width,
             swmm_height, swmm_coeff, swmm_feature, curbheight)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.grid.value(),
            row.name,
            row.drain_type.map(|d| d.code()),
            row.length,
            row.width,
            row.height,
            row.weir_coeff,
            row.feature,
            row.curb_height
        ])?;
    }
    bump_version(conn, SCHEMATIZED_INLETS)?;
    Ok(())
}

pub fn list_inlets(conn: &Connection) -> StoreResult<Vec<SchematizedInlet>> {
    let mut stmt = conn.prepare(
        "SELECT grid_fid, swflo_name, intype, swmm_length, swmm_width, swmm_height, swmm_coeff,
                swmm_feature, curbheight
         FROM swmmflo ORDER BY grid_fid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SchematizedInlet {
            grid: CellId::new(row.get(0)?),
            name: row.get(1)?,
            drain_type: row.get::<_, Option<i64>>(2)?.and_then(DrainType::from_code),
            length: row.get(3)?,
            width: row.get(4)?,
            height: row.get(5)?,
            weir_coeff: row.get(6)?,
            feature: row.get(7)?,
            curb_height: row.get(8)?,
        })
    })?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn replace_outfalls(conn: &Connection, rows: &[SchematizedOutfall]) -> StoreResult<()> {
    conn.execute("DELETE FROM swmmoutf", [])?;
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO swmmoutf (grid_fid, name, outf_flo) VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.grid.value(), row.name, row.allow_discharge])?;
    }
    bump_version(conn, SCHEMATIZED_OUTFALLS)?;
    Ok(())
}

pub fn list_outfalls(conn: &Connection) -> StoreResult<Vec<SchematizedOutfall>> {
    let mut stmt =
        conn.prepare("SELECT grid_fid, name, outf_flo FROM swmmoutf ORDER BY grid_fid")?;
    let rows = stmt.query_map([], |row| {
        Ok(SchematizedOutfall {
            grid: CellId::new(row.get(0)?),
            name: row.get(1)?,
            allow_discharge: row.get(2)?,
        })
    })?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn replace_outflow_cells(conn: &Connection, rows: &[OutflowCell]) -> StoreResult<()> {
    conn.execute("DELETE FROM swmm_outflow_cells", [])?;
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO swmm_outflow_cells (grid_fid, outfall, role) VALUES (?1, ?2, ?3)",
    )?;
    for row in rows {
        stmt.execute(params![row.grid.value(), row.outfall, row.role.as_str()])?;
    }
    bump_version(conn, OUTFLOW_CELLS)?;
    Ok(())
}

pub fn list_outflow_cells(conn: &Connection) -> StoreResult<Vec<OutflowCell>> {
    let mut stmt = conn
        .prepare("SELECT grid_fid, outfall, role FROM swmm_outflow_cells ORDER BY grid_fid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut results = Vec::new();
    for row in rows {
        let (grid, outfall, role) = row?;
        let role = OutflowRole::parse(&role)
            .ok_or_else(|| StoreError::corrupt(OUTFLOW_CELLS, format!("unknown role '{role}'")))?;
        results.push(OutflowCell {
            grid: CellId::new(grid),
            outfall,
            role,
        });
    }
    Ok(results)
}

/// Drop the schematized rows that mirror `node`
pub fn delete_for_node(conn: &Connection, node: &str) -> StoreResult<()> {
    if conn.execute("DELETE FROM swmmflo WHERE swflo_name = ?1", [node])? > 0 {
        bump_version(conn, SCHEMATIZED_INLETS)?;
    }
    if conn.execute("DELETE FROM swmmoutf WHERE name = ?1", [node])? > 0 {
        bump_version(conn, SCHEMATIZED_OUTFALLS)?;
    }
    if conn.execute("DELETE FROM swmm_outflow_cells WHERE outfall = ?1", [node])? > 0 {
        bump_version(conn, OUTFLOW_CELLS)?;
    }
    Ok(())
}
