//! Node and storage unit rows.

use rusqlite::{params, Connection, OptionalExtension, Row};
use sdi_core::{
    CellId, DrainType, GreenAmpt, Inlet, Junction, Node, NodeClass, NodeKind, Outfall,
    OutfallBoundary, OutfallType, Point, StorageShape, StorageUnit,
};

use crate::error::{StoreError, StoreResult};
use crate::schema::{bump_version, LINK_TABLES, NODES, STORAGE_UNITS};

const NODE_COLUMNS: &str = "name, sd_type, geom, grid_fid, invert_elev, max_depth, init_depth, \
     surcharge_depth, ponded_area, outfall_type, water_depth, tidal_curve, time_series, flapgate, \
     swmm_allow_discharge, intype, swmm_length, swmm_width, swmm_height, swmm_coeff, swmm_feature, \
     curbheight, rt_name";

/// Raw column values, decoded into a [`Node`] outside the row closure
struct NodeRow {
    name: String,
    sd_type: String,
    geom: String,
    grid_fid: Option<i64>,
    invert_elev: f64,
    junction: Junction,
    outfall_type: Option<String>,
    water_depth: Option<f64>,
    tidal_curve: Option<String>,
    time_series: Option<String>,
    flapgate: bool,
    allow_discharge: bool,
    inlet: Inlet,
    intype: Option<i64>,
}

impl NodeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            sd_type: row.get(1)?,
            geom: row.get(2)?,
            grid_fid: row.get(3)?,
            invert_elev: row.get(4)?,
            junction: Junction {
                max_depth: row.get(5)?,
                init_depth: row.get(6)?,
                surcharge_depth: row.get(7)?,
                ponded_area: row.get(8)?,
            },
            outfall_type: row.get(9)?,
            water_depth: row.get(10)?,
            tidal_curve: row.get(11)?,
            time_series: row.get(12)?,
            flapgate: row.get(13)?,
            allow_discharge: row.get(14)?,
            intype: row.get(15)?,
            inlet: Inlet {
                drain_type: None,
                length: row.get(16)?,
                width: row.get(17)?,
                height: row.get(18)?,
                weir_coeff: row.get(19)?,
                feature: row.get(20)?,
                curb_height: row.get(21)?,
                rating_table: row.get(22)?,
            },
        })
    }

    fn into_node(self) -> StoreResult<Node> {
        let class = NodeClass::from_code(&self.sd_type)
            .ok_or_else(|| StoreError::corrupt(NODES, format!("unknown sd_type '{}'", self.sd_type)))?;
        let kind = match class {
            NodeClass::Junction => NodeKind::Junction(self.junction),
            NodeClass::Inlet => {
                let mut inlet = self.inlet;
                inlet.drain_type = self.intype.and_then(DrainType::from_code);
                NodeKind::Inlet {
                    junction: self.junction,
                    inlet,
                }
            }
            NodeClass::Outfall => {
                let outfall_type = self
                    .outfall_type
                    .as_deref()
                    .and_then(OutfallType::from_inp)
                    .unwrap_or(OutfallType::Free);
                let reference = match outfall_type {
                    OutfallType::TidalCurve => self.tidal_curve,
                    OutfallType::TimeSeries => self.time_series,
                    _ => None,
                };
                NodeKind::Outfall(Outfall {
                    boundary: OutfallBoundary::from_parts(outfall_type, self.water_depth, reference),
                    flap_gate: self.flapgate,
                    allow_discharge: self.allow_discharge,
                })
            }
        };
        Ok(Node {
            location: Point::from_wkt(&self.geom)?,
            name: self.name,
            invert_elev: self.invert_elev,
            grid: self.grid_fid.map(CellId::new),
            kind,
        })
    }
}

/// The inlet other than `except` that holds rating table `table`
pub fn rating_table_holder(
    conn: &Connection,
    table: &str,
    except: &str,
) -> StoreResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT name FROM user_swmm_nodes WHERE rt_name = ?1 AND name <> ?2 LIMIT 1",
            [table, except],
            |row| row.get(0),
        )
        .optional()?)
}

/// Insert or update a node by name. An existing grid cell id, and for
/// inlets an existing rating table, is kept when the incoming node carries
/// none.
///
/// A rating table already held by another inlet is not taken over: the
/// node is written without it and the holder's name is returned.
pub fn upsert_node(conn: &Connection, node: &Node) -> StoreResult<Option<String>> {
    let default_junction = Junction::default();
    let junction = node.junction_attrs().unwrap_or(&default_junction);
    let default_inlet = Inlet::default();
    let inlet = node.inlet().unwrap_or(&default_inlet);
    let outfall = node.outfall_attrs();
    let boundary = outfall.map(|o| &o.boundary);
    let tidal_curve = match boundary {
        Some(OutfallBoundary::TidalCurve(name)) => Some(name.as_str()),
        _ => None,
    };
    let time_series = match boundary {
        Some(OutfallBoundary::TimeSeries(name)) => Some(name.as_str()),
        _ => None,
    };
    let mut rating_table = inlet.rating_table.as_deref();
    let mut refused_by = None;
    if let Some(table) = rating_table {
        if let Some(holder) = rating_table_holder(conn, table, &node.name)? {
            rating_table = None;
            refused_by = Some(holder);
        }
    }

    conn.execute(
        "DELETE FROM user_swmm_storage_units WHERE name = ?1",
        [&node.name],
    )?;
    conn.execute(
        &format!(
            "INSERT INTO user_swmm_nodes ({NODE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22, ?23)
             ON CONFLICT(name) DO UPDATE SET
                sd_type = excluded.sd_type,
                geom = excluded.geom,
                grid_fid = COALESCE(excluded.grid_fid, user_swmm_nodes.grid_fid),
                invert_elev = excluded.invert_elev,
                max_depth = excluded.max_depth,
                init_depth = excluded.init_depth,
                surcharge_depth = excluded.surcharge_depth,
                ponded_area = excluded.ponded_area,
                outfall_type = excluded.outfall_type,
                water_depth = excluded.water_depth,
                tidal_curve = excluded.tidal_curve,
                time_series = excluded.time_series,
                flapgate = excluded.flapgate,
                swmm_allow_discharge = excluded.swmm_allow_discharge,
                intype = excluded.intype,
                swmm_length = excluded.swmm_length,
                swmm_width = excluded.swmm_width,
                swmm_height = excluded.swmm_height,
                swmm_coeff = excluded.swmm_coeff,
                swmm_feature = excluded.swmm_feature,
                curbheight = excluded.curbheight,
                rt_name = CASE WHEN excluded.sd_type = 'I'
                    THEN COALESCE(excluded.rt_name, user_swmm_nodes.rt_name) END"
        ),
        params![
            node.name,
            node.class().code(),
            node.location.to_wkt(),
            node.grid.map(|c| c.value()),
            node.invert_elev,
            junction.max_depth,
            junction.init_depth,
            junction.surcharge_depth,
            junction.ponded_area,
            boundary.map(|b| b.outfall_type().as_str()),
            boundary.and_then(|b| b.fixed_stage()),
            tidal_curve,
            time_series,
            outfall.map(|o| o.flap_gate).unwrap_or(false),
            outfall.map(|o| o.allow_discharge).unwrap_or(true),
            inlet.drain_type.map(|d| d.code()),
            inlet.length,
            inlet.width,
            inlet.height,
            inlet.weir_coeff,
            inlet.feature,
            inlet.curb_height,
            rating_table,
        ],
    )?;
    refresh_usable(conn, Some(&node.name))?;
    bump_version(conn, NODES)?;
    Ok(refused_by)
}

pub fn get_node(conn: &Connection, name: &str) -> StoreResult<Option<Node>> {
    let row = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM user_swmm_nodes WHERE name = ?1"),
            [name],
            NodeRow::from_row,
        )
        .optional()?;
    row.map(NodeRow::into_node).transpose()
}

pub fn list_nodes(conn: &Connection) -> StoreResult<Vec<Node>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS} FROM user_swmm_nodes ORDER BY fid"
    ))?;
    let rows = stmt.query_map([], NodeRow::from_row)?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?.into_node()?);
    }
    Ok(results)
}

pub fn set_node_grid(conn: &Connection, name: &str, grid: Option<CellId>) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE user_swmm_nodes SET grid_fid = ?2 WHERE name = ?1",
        params![name, grid.map(|c| c.value())],
    )?;
    if changed > 0 {
        bump_version(conn, NODES)?;
    }
    Ok(changed > 0)
}

/// Names of every node and storage unit
pub fn node_names(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM user_swmm_nodes UNION ALL SELECT name FROM user_swmm_storage_units",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn node_exists(conn: &Connection, name: &str) -> StoreResult<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM user_swmm_nodes WHERE name = ?1)
             OR EXISTS (SELECT 1 FROM user_swmm_storage_units WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(found)
}

/// Recompute the `usable` flag of links, either all of them or those
/// touching `node`.
pub fn refresh_usable(conn: &Connection, node: Option<&str>) -> StoreResult<()> {
    let resolved = "inlet_node IS NOT NULL AND outlet_node IS NOT NULL
        AND (inlet_node IN (SELECT name FROM user_swmm_nodes)
             OR inlet_node IN (SELECT name FROM user_swmm_storage_units))
        AND (outlet_node IN (SELECT name FROM user_swmm_nodes)
             OR outlet_node IN (SELECT name FROM user_swmm_storage_units))";
    for table in LINK_TABLES {
        match node {
            Some(name) => conn.execute(
                &format!(
                    "UPDATE {table} SET usable = ({resolved})
                     WHERE inlet_node = ?1 OR outlet_node = ?1"
                ),
                [name],
            )?,
            None => conn.execute(&format!("UPDATE {table} SET usable = ({resolved})"), [])?,
        };
    }
    Ok(())
}

// ============================================================================
// Storage units
// ============================================================================

const STORAGE_COLUMNS: &str = "name, geom, grid_fid, invert_elev, max_depth, init_depth, \
     storage_curve, coefficient, exponent, constant, curve_name, surcharge_depth, evap_factor, \
     infiltration, suction_head, conductivity, initial_deficit";

struct StorageRow {
    name: String,
    geom: String,
    grid_fid: Option<i64>,
    invert_elev: f64,
    max_depth: f64,
    init_depth: f64,
    storage_curve: String,
    coefficient: Option<f64>,
    exponent: Option<f64>,
    constant: Option<f64>,
    curve_name: Option<String>,
    surcharge_depth: f64,
    evap_factor: f64,
    infiltration: bool,
    suction_head: Option<f64>,
    conductivity: Option<f64>,
    initial_deficit: Option<f64>,
}

impl StorageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            geom: row.get(1)?,
            grid_fid: row.get(2)?,
            invert_elev: row.get(3)?,
            max_depth: row.get(4)?,
            init_depth: row.get(5)?,
            storage_curve: row.get(6)?,
            coefficient: row.get(7)?,
            exponent: row.get(8)?,
            constant: row.get(9)?,
            curve_name: row.get(10)?,
            surcharge_depth: row.get(11)?,
            evap_factor: row.get(12)?,
            infiltration: row.get(13)?,
            suction_head: row.get(14)?,
            conductivity: row.get(15)?,
            initial_deficit: row.get(16)?,
        })
    }

    fn into_unit(self) -> StoreResult<StorageUnit> {
        let shape = match self.storage_curve.as_str() {
            "TABULAR" => StorageShape::Tabular {
                curve: self.curve_name.unwrap_or_default(),
            },
            _ => StorageShape::Functional {
                a1: self.coefficient.unwrap_or(0.0),
                a2: self.exponent.unwrap_or(0.0),
                a0: self.constant.unwrap_or(0.0),
            },
        };
        let infiltration = self.infiltration.then(|| GreenAmpt {
            suction_head: self.suction_head.unwrap_or(0.0),
            conductivity: self.conductivity.unwrap_or(0.0),
            initial_deficit: self.initial_deficit.unwrap_or(0.0),
        });
        Ok(StorageUnit {
            location: Point::from_wkt(&self.geom)?,
            name: self.name,
            invert_elev: self.invert_elev,
            max_depth: self.max_depth,
            init_depth: self.init_depth,
            shape,
            surcharge_depth: self.surcharge_depth,
            evap_factor: self.evap_factor,
            infiltration,
            grid: self.grid_fid.map(CellId::new),
        })
    }
}

pub fn upsert_storage_unit(conn: &Connection, unit: &StorageUnit) -> StoreResult<()> {
    let (kind, a1, a2, a0, curve) = match &unit.shape {
        StorageShape::Functional { a1, a2, a0 } => ("FUNCTIONAL", Some(*a1), Some(*a2), Some(*a0), None),
        StorageShape::Tabular { curve } => ("TABULAR", None, None, None, Some(curve.as_str())),
    };
    let infil = unit.infiltration.as_ref();
    conn.execute("DELETE FROM user_swmm_nodes WHERE name = ?1", [&unit.name])?;
    conn.execute(
        &format!(
            "INSERT INTO user_swmm_storage_units ({STORAGE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(name) DO UPDATE SET
                geom = excluded.geom,
                grid_fid = COALESCE(excluded.grid_fid, user_swmm_storage_units.grid_fid),
                invert_elev = excluded.invert_elev,
                max_depth = excluded.max_depth,
                init_depth = excluded.init_depth,
                storage_curve = excluded.storage_curve,
                coefficient = excluded.coefficient,
                exponent = excluded.exponent,
                constant = excluded.constant,
                curve_name = excluded.curve_name,
                surcharge_depth = excluded.surcharge_depth,
                evap_factor = excluded.evap_factor,
                infiltration = excluded.infiltration,
                suction_head = excluded.suction_head,
                conductivity = excluded.conductivity,
                initial_deficit = excluded.initial_deficit"
        ),
        params![
            unit.name,
            unit.location.to_wkt(),
            unit.grid.map(|c| c.value()),
            unit.invert_elev,
            unit.max_depth,
            unit.init_depth,
            kind,
            a1,
            a2,
            a0,
            curve,
            unit.surcharge_depth,
            unit.evap_factor,
            infil.is_some(),
            infil.map(|g| g.suction_head),
            infil.map(|g| g.conductivity),
            infil.map(|g| g.initial_deficit),
        ],
    )?;
    refresh_usable(conn, Some(&unit.name))?;
    bump_version(conn, STORAGE_UNITS)?;
    Ok(())
}

pub fn list_storage_units(conn: &Connection) -> StoreResult<Vec<StorageUnit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STORAGE_COLUMNS} FROM user_swmm_storage_units ORDER BY fid"
    ))?;
    let rows = stmt.query_map([], StorageRow::from_row)?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?.into_unit()?);
    }
    Ok(results)
}

pub fn delete_storage_unit(conn: &Connection, name: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM user_swmm_storage_units WHERE name = ?1", [name])?;
    if removed > 0 {
        conn.execute("DELETE FROM swmm_inflows WHERE node_name = ?1", [name])?;
        refresh_usable(conn, Some(name))?;
        bump_version(conn, STORAGE_UNITS)?;
    }
    Ok(removed > 0)
}
