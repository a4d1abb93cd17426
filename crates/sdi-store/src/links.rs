//! Conduit, pump, orifice and weir rows.
//!
//! Each link kind has its own table. Link names are unique across all four,
//! so writing a link removes any same-named row from the other tables.

use rusqlite::{params, Connection, OptionalExtension, Row};
use sdi_core::{
    Conduit, CrossSection, Link, LinkClass, LinkKind, Losses, Orifice, OrificeType, Polyline, Pump,
    PumpStatus, Weir, WeirType, XSectionShape,
};

use crate::error::{StoreError, StoreResult};
use crate::nodes::node_exists;
use crate::schema::{bump_version, CONDUITS, LINK_TABLES, ORIFICES, PUMPS, WEIRS};

pub fn table_for(class: LinkClass) -> &'static str {
    match class {
        LinkClass::Conduit => CONDUITS,
        LinkClass::Pump => PUMPS,
        LinkClass::Orifice => ORIFICES,
        LinkClass::Weir => WEIRS,
    }
}

const COMMON: &str = "name, inlet_node, outlet_node, geom, outside_domain";
const XSECTION: &str = "xsections_shape, xsections_geom1, xsections_geom2, xsections_geom3, \
     xsections_geom4, xsections_barrels, xsections_culvert, xsections_ref";

fn columns(class: LinkClass) -> String {
    match class {
        LinkClass::Conduit => format!(
            "{COMMON}, conduit_length, conduit_manning, conduit_inlet_offset, \
             conduit_outlet_offset, conduit_init_flow, conduit_max_flow, losses_inlet, \
             losses_outlet, losses_average, losses_flapgate, {XSECTION}"
        ),
        LinkClass::Pump => format!(
            "{COMMON}, pump_curve, pump_init_status, pump_startup_depth, pump_shutoff_depth"
        ),
        LinkClass::Orifice => format!(
            "{COMMON}, orifice_type, orifice_crest_height, orifice_disch_coeff, \
             orifice_flap_gate, orifice_open_close_time, {XSECTION}"
        ),
        LinkClass::Weir => format!(
            "{COMMON}, weir_type, weir_crest_height, weir_disch_coeff, weir_flap_gate, \
             weir_end_contrac, weir_end_coeff, weir_surcharge, weir_side_slope, {XSECTION}"
        ),
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

type XsParams = (
    Option<String>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<u32>,
    Option<u32>,
    Option<String>,
);

fn xsection_params(xs: Option<&CrossSection>) -> XsParams {
    match xs {
        Some(xs) => (
            Some(xs.shape.as_inp().to_string()),
            Some(xs.geom[0]),
            Some(xs.geom[1]),
            Some(xs.geom[2]),
            Some(xs.geom[3]),
            Some(xs.barrels),
            Some(xs.culvert_code),
            xs.reference.clone(),
        ),
        None => (None, None, None, None, None, None, None, None),
    }
}

fn read_xsection(row: &Row<'_>, start: usize) -> rusqlite::Result<Option<CrossSection>> {
    let shape: Option<String> = row.get(start)?;
    let Some(shape) = shape else {
        return Ok(None);
    };
    let geom = [
        row.get::<_, Option<f64>>(start + 1)?.unwrap_or(0.0),
        row.get::<_, Option<f64>>(start + 2)?.unwrap_or(0.0),
        row.get::<_, Option<f64>>(start + 3)?.unwrap_or(0.0),
        row.get::<_, Option<f64>>(start + 4)?.unwrap_or(0.0),
    ];
    Ok(Some(CrossSection {
        shape: XSectionShape::from_inp(&shape),
        geom,
        barrels: row.get::<_, Option<u32>>(start + 5)?.unwrap_or(1),
        culvert_code: row.get::<_, Option<u32>>(start + 6)?.unwrap_or(0),
        reference: row.get(start + 7)?,
    }))
}

/// Link with its geometry still in WKT form
struct LinkRow {
    name: String,
    inlet_node: Option<String>,
    outlet_node: Option<String>,
    geom: String,
    outside_domain: bool,
    kind: LinkKind,
}

impl LinkRow {
    fn read(class: LinkClass, row: &Row<'_>) -> rusqlite::Result<Self> {
        let kind = match class {
            LinkClass::Conduit => LinkKind::Conduit(Conduit {
                length: row.get(5)?,
                roughness: row.get(6)?,
                inlet_offset: row.get(7)?,
                outlet_offset: row.get(8)?,
                init_flow: row.get(9)?,
                max_flow: row.get(10)?,
                losses: Losses {
                    inlet: row.get(11)?,
                    outlet: row.get(12)?,
                    average: row.get(13)?,
                    flap_gate: row.get(14)?,
                },
                xsection: read_xsection(row, 15)?,
            }),
            LinkClass::Pump => LinkKind::Pump(Pump {
                curve: row.get(5)?,
                status: PumpStatus::from_inp(&row.get::<_, String>(6)?),
                startup_depth: row.get(7)?,
                shutoff_depth: row.get(8)?,
            }),
            LinkClass::Orifice => LinkKind::Orifice(Orifice {
                orifice_type: OrificeType::from_inp(&row.get::<_, String>(5)?)
                    .unwrap_or(OrificeType::Side),
                crest_height: row.get(6)?,
                discharge_coeff: row.get(7)?,
                flap_gate: row.get(8)?,
                open_close_time: row.get(9)?,
                xsection: read_xsection(row, 10)?,
            }),
            LinkClass::Weir => LinkKind::Weir(Weir {
                weir_type: WeirType::from_inp(&row.get::<_, String>(5)?)
                    .unwrap_or(WeirType::Transverse),
                crest_height: row.get(6)?,
                discharge_coeff: row.get(7)?,
                flap_gate: row.get(8)?,
                end_contractions: row.get(9)?,
                end_coeff: row.get(10)?,
                surcharge: row.get(11)?,
                // column 12 is the derived side slope
                xsection: read_xsection(row, 13)?,
            }),
        };
        Ok(Self {
            name: row.get(0)?,
            inlet_node: row.get(1)?,
            outlet_node: row.get(2)?,
            geom: row.get(3)?,
            outside_domain: row.get(4)?,
            kind,
        })
    }

    fn into_link(self, table: &'static str) -> StoreResult<Link> {
        let geometry = Polyline::from_wkt(&self.geom)
            .map_err(|e| StoreError::corrupt(table, format!("link '{}': {e}", self.name)))?;
        Ok(Link {
            name: self.name,
            inlet_node: self.inlet_node,
            outlet_node: self.outlet_node,
            geometry,
            outside_domain: self.outside_domain,
            kind: self.kind,
        })
    }
}

/// Insert or update a link by name. Returns whether both endpoints
/// currently resolve to nodes.
pub fn upsert_link(conn: &Connection, link: &Link) -> StoreResult<bool> {
    let class = link.class();
    let table = table_for(class);
    for other in LINK_TABLES.iter().filter(|t| **t != table) {
        let removed = conn.execute(&format!("DELETE FROM {other} WHERE name = ?1"), [&link.name])?;
        if removed > 0 {
            bump_version(conn, other)?;
        }
    }

    let usable = endpoint_resolves(conn, link.inlet_node.as_deref())?
        && endpoint_resolves(conn, link.outlet_node.as_deref())?;
    let cols = columns(class);
    let count = cols.split(',').count();
    let updates = cols
        .split(',')
        .map(str::trim)
        .filter(|c| *c != "name")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} ({cols}) VALUES ({})
         ON CONFLICT(name) DO UPDATE SET {updates}",
        placeholders(count)
    );

    let geom = link.geometry.to_wkt();
    let common = (
        &link.name,
        &link.inlet_node,
        &link.outlet_node,
        &geom,
        link.outside_domain,
    );
    match &link.kind {
        LinkKind::Conduit(c) => {
            let xs = xsection_params(c.xsection.as_ref());
            conn.execute(
                &sql,
                params![
                    common.0,
                    common.1,
                    common.2,
                    common.3,
                    common.4,
                    c.length,
                    c.roughness,
                    c.inlet_offset,
                    c.outlet_offset,
                    c.init_flow,
                    c.max_flow,
                    c.losses.inlet,
                    c.losses.outlet,
                    c.losses.average,
                    c.losses.flap_gate,
                    xs.0,
                    xs.1,
                    xs.2,
                    xs.3,
                    xs.4,
                    xs.5,
                    xs.6,
                    xs.7,
                ],
            )?;
        }
        LinkKind::Pump(p) => {
            conn.execute(
                &sql,
                params![
                    common.0,
                    common.1,
                    common.2,
                    common.3,
                    common.4,
                    p.curve,
                    p.status.as_stored(),
                    p.startup_depth,
                    p.shutoff_depth,
                ],
            )?;
        }
        LinkKind::Orifice(o) => {
            let xs = xsection_params(o.xsection.as_ref());
            conn.execute(
                &sql,
                params![
                    common.0,
                    common.1,
                    common.2,
                    common.3,
                    common.4,
                    o.orifice_type.as_inp(),
                    o.crest_height,
                    o.discharge_coeff,
                    o.flap_gate,
                    o.open_close_time,
                    xs.0,
                    xs.1,
                    xs.2,
                    xs.3,
                    xs.4,
                    xs.5,
                    xs.6,
                    xs.7,
                ],
            )?;
        }
        LinkKind::Weir(w) => {
            let xs = xsection_params(w.xsection.as_ref());
            conn.execute(
                &sql,
                params![
                    common.0,
                    common.1,
                    common.2,
                    common.3,
                    common.4,
                    w.weir_type.as_inp(),
                    w.crest_height,
                    w.discharge_coeff,
                    w.flap_gate,
                    w.end_contractions,
                    w.end_coeff,
                    w.surcharge,
                    w.side_slope(),
                    xs.0,
                    xs.1,
                    xs.2,
                    xs.3,
                    xs.4,
                    xs.5,
                    xs.6,
                    xs.7,
                ],
            )?;
        }
    }
    conn.execute(
        &format!("UPDATE {table} SET usable = ?2 WHERE name = ?1"),
        params![link.name, usable],
    )?;
    bump_version(conn, table)?;
    Ok(usable)
}

fn endpoint_resolves(conn: &Connection, name: Option<&str>) -> StoreResult<bool> {
    match name {
        Some(name) => node_exists(conn, name),
        None => Ok(false),
    }
}

fn query_links(
    conn: &Connection,
    class: LinkClass,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> StoreResult<Vec<Link>> {
    let table = table_for(class);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {table} {filter} ORDER BY fid",
        columns(class)
    ))?;
    let rows = stmt.query_map(args, |row| LinkRow::read(class, row))?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?.into_link(table)?);
    }
    Ok(results)
}

/// All links, conduits first, each kind in insertion order
pub fn list_links(conn: &Connection) -> StoreResult<Vec<Link>> {
    let mut links = Vec::new();
    for class in LinkClass::ALL {
        links.extend(query_links(conn, class, "", params![])?);
    }
    Ok(links)
}

pub fn get_link(conn: &Connection, name: &str) -> StoreResult<Option<Link>> {
    for class in LinkClass::ALL {
        let mut found = query_links(conn, class, "WHERE name = ?1", params![name])?;
        if let Some(link) = found.pop() {
            return Ok(Some(link));
        }
    }
    Ok(None)
}

pub fn links_by_endpoint(conn: &Connection, node: &str) -> StoreResult<Vec<Link>> {
    let mut links = Vec::new();
    for class in LinkClass::ALL {
        links.extend(query_links(
            conn,
            class,
            "WHERE inlet_node = ?1 OR outlet_node = ?1",
            params![node],
        )?);
    }
    Ok(links)
}

pub fn is_usable(conn: &Connection, name: &str) -> StoreResult<Option<bool>> {
    for table in LINK_TABLES {
        let usable = conn
            .query_row(
                &format!("SELECT usable FROM {table} WHERE name = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional()?;
        if usable.is_some() {
            return Ok(usable);
        }
    }
    Ok(None)
}

/// Set both endpoint names of a link in one statement
pub fn set_endpoints(
    conn: &Connection,
    name: &str,
    inlet: Option<&str>,
    outlet: Option<&str>,
) -> StoreResult<bool> {
    for table in LINK_TABLES {
        let changed = conn.execute(
            &format!("UPDATE {table} SET inlet_node = ?2, outlet_node = ?3 WHERE name = ?1"),
            params![name, inlet, outlet],
        )?;
        if changed > 0 {
            let usable = endpoint_resolves(conn, inlet)? && endpoint_resolves(conn, outlet)?;
            conn.execute(
                &format!("UPDATE {table} SET usable = ?2 WHERE name = ?1"),
                params![name, usable],
            )?;
            bump_version(conn, table)?;
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn set_outside_domain(conn: &Connection, name: &str, outside: bool) -> StoreResult<bool> {
    for table in LINK_TABLES {
        let changed = conn.execute(
            &format!("UPDATE {table} SET outside_domain = ?2 WHERE name = ?1"),
            params![name, outside],
        )?;
        if changed > 0 {
            bump_version(conn, table)?;
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn delete_link(conn: &Connection, name: &str) -> StoreResult<bool> {
    for table in LINK_TABLES {
        let removed = conn.execute(&format!("DELETE FROM {table} WHERE name = ?1"), [name])?;
        if removed > 0 {
            bump_version(conn, table)?;
            return Ok(true);
        }
    }
    Ok(false)
}
