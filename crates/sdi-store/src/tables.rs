//! Curves, patterns, time series, inflows, rating tables, culvert equations
//! and preserved sections.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension};
use sdi_core::{
    CellId, Culvert, Curve, CurveType, Inflow, Pattern, PatternType, RatingTable, RawSection,
    TimeSeries, TimeSeriesRow, TimeSeriesSource,
};

use crate::error::{StoreError, StoreResult};
use crate::schema::{
    bump_version, CULVERTS, INFLOWS, OTHER_CURVES, PATTERNS, PUMP_CURVES, RATING_DATA,
    RATING_TABLES, SECTIONS, TIME_SERIES, TIME_SERIES_DATA,
};

// ============================================================================
// Curves
// ============================================================================

/// Replace every point of a curve. Pump curves live in their own table.
pub fn upsert_curve(conn: &Connection, curve: &Curve) -> StoreResult<()> {
    delete_curve(conn, &curve.name)?;
    let (table, sql) = if curve.curve_type.is_pump() {
        (
            PUMP_CURVES,
            "INSERT INTO swmm_pumps_curve_data
                (pump_curve_name, pump_curve_type, description, seq, x_value, y_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
    } else {
        (
            OTHER_CURVES,
            "INSERT INTO swmm_other_curves (name, type, description, seq, x_value, y_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
    };
    let mut stmt = conn.prepare(sql)?;
    for (seq, (x, y)) in curve.points.iter().enumerate() {
        stmt.execute(params![
            curve.name,
            curve.curve_type.as_inp(),
            curve.description,
            seq as i64,
            x,
            y
        ])?;
    }
    bump_version(conn, table)?;
    Ok(())
}

pub fn delete_curve(conn: &Connection, name: &str) -> StoreResult<bool> {
    let mut removed = 0;
    for (table, sql) in [
        (PUMP_CURVES, "DELETE FROM swmm_pumps_curve_data WHERE pump_curve_name = ?1"),
        (OTHER_CURVES, "DELETE FROM swmm_other_curves WHERE name = ?1"),
    ] {
        let n = conn.execute(sql, [name])?;
        if n > 0 {
            bump_version(conn, table)?;
        }
        removed += n;
    }
    Ok(removed > 0)
}

/// Curves in first-insertion order, points in stored order
pub fn list_curves(conn: &Connection) -> StoreResult<Vec<Curve>> {
    let mut curves: Vec<Curve> = Vec::new();
    for sql in [
        "SELECT pump_curve_name, pump_curve_type, description, x_value, y_value
         FROM swmm_pumps_curve_data ORDER BY fid",
        "SELECT name, type, description, x_value, y_value FROM swmm_other_curves ORDER BY fid",
    ] {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;
        for row in rows {
            let (name, kind, description, x, y) = row?;
            match curves.iter_mut().find(|c| c.name == name) {
                Some(curve) => curve.points.push((x, y)),
                None => {
                    let curve_type = CurveType::from_inp(&kind).ok_or_else(|| {
                        StoreError::corrupt(OTHER_CURVES, format!("unknown curve type '{kind}'"))
                    })?;
                    let mut curve = Curve::new(name, curve_type);
                    curve.description = description;
                    curve.points.push((x, y));
                    curves.push(curve);
                }
            }
        }
    }
    Ok(curves)
}

// ============================================================================
// Patterns
// ============================================================================

/// Store a pattern as 24 hourly rows
pub fn upsert_pattern(conn: &Connection, pattern: &Pattern) -> StoreResult<()> {
    let mut pattern = pattern.clone();
    pattern.canonicalize();
    conn.execute(
        "DELETE FROM swmm_inflow_patterns WHERE pattern_name = ?1",
        [&pattern.name],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO swmm_inflow_patterns (pattern_name, pattern_description, hour, multiplier)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (hour, value) in pattern.multipliers.iter().enumerate() {
        stmt.execute(params![pattern.name, pattern.description, hour as i64, value])?;
    }
    bump_version(conn, PATTERNS)?;
    Ok(())
}

pub fn list_patterns(conn: &Connection) -> StoreResult<Vec<Pattern>> {
    let mut stmt = conn.prepare(
        "SELECT pattern_name, pattern_description, multiplier FROM swmm_inflow_patterns
         ORDER BY fid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;
    let mut patterns: Vec<Pattern> = Vec::new();
    for row in rows {
        let (name, description, value) = row?;
        match patterns.iter_mut().find(|p| p.name == name) {
            Some(p) => p.multipliers.push(value),
            None => patterns.push(Pattern {
                name,
                pattern_type: PatternType::Hourly,
                description,
                multipliers: vec![value],
            }),
        }
    }
    Ok(patterns)
}

pub fn delete_pattern(conn: &Connection, name: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM swmm_inflow_patterns WHERE pattern_name = ?1", [name])?;
    if removed > 0 {
        bump_version(conn, PATTERNS)?;
    }
    Ok(removed > 0)
}

// ============================================================================
// Time series
// ============================================================================

pub fn upsert_time_series(conn: &Connection, series: &TimeSeries) -> StoreResult<()> {
    delete_time_series(conn, &series.name)?;
    conn.execute(
        "INSERT INTO swmm_time_series
            (time_series_name, time_series_description, time_series_file, time_series_data)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            series.name,
            series.description,
            series.file_path(),
            series.file_path().is_none()
        ],
    )?;
    let mut stmt = conn.prepare(
        "INSERT INTO swmm_time_series_data (time_series_name, seq, date, time, value)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (seq, row) in series.rows().iter().enumerate() {
        stmt.execute(params![series.name, seq as i64, row.date, row.time, row.value])?;
    }
    bump_version(conn, TIME_SERIES)?;
    bump_version(conn, TIME_SERIES_DATA)?;
    Ok(())
}

pub fn delete_time_series(conn: &Connection, name: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM swmm_time_series WHERE time_series_name = ?1", [name])?;
    conn.execute(
        "DELETE FROM swmm_time_series_data WHERE time_series_name = ?1",
        [name],
    )?;
    if removed > 0 {
        bump_version(conn, TIME_SERIES)?;
    }
    Ok(removed > 0)
}

pub fn list_time_series(conn: &Connection) -> StoreResult<Vec<TimeSeries>> {
    let mut rows_by_name: BTreeMap<String, Vec<TimeSeriesRow>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT time_series_name, date, time, value FROM swmm_time_series_data
             ORDER BY time_series_name, seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                TimeSeriesRow {
                    date: row.get(1)?,
                    time: row.get(2)?,
                    value: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (name, data) = row?;
            rows_by_name.entry(name).or_default().push(data);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT time_series_name, time_series_description, time_series_file, time_series_data
         FROM swmm_time_series ORDER BY fid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, bool>(3)?,
        ))
    })?;
    let mut results = Vec::new();
    for row in rows {
        let (name, description, file, inline) = row?;
        let source = match (inline, file) {
            (false, Some(path)) => TimeSeriesSource::File(path),
            _ => TimeSeriesSource::Inline(rows_by_name.remove(&name).unwrap_or_default()),
        };
        results.push(TimeSeries {
            name,
            description,
            source,
        });
    }
    Ok(results)
}

// ============================================================================
// Inflows
// ============================================================================

/// One inflow per node; a second write replaces the first
pub fn upsert_inflow(conn: &Connection, inflow: &Inflow) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO swmm_inflows (node_name, constituent, baseline, pattern_name,
             time_series_name, scale_factor, units_factor, inflow_type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(node_name) DO UPDATE SET
             constituent = excluded.constituent,
             baseline = excluded.baseline,
             pattern_name = excluded.pattern_name,
             time_series_name = excluded.time_series_name,
             scale_factor = excluded.scale_factor,
             units_factor = excluded.units_factor,
             inflow_type = excluded.inflow_type",
        params![
            inflow.node,
            inflow.constituent,
            inflow.baseline,
            inflow.pattern,
            inflow.time_series,
            inflow.sfactor,
            inflow.mfactor,
            inflow.inflow_type
        ],
    )?;
    bump_version(conn, INFLOWS)?;
    Ok(())
}

pub fn list_inflows(conn: &Connection) -> StoreResult<Vec<Inflow>> {
    let mut stmt = conn.prepare(
        "SELECT node_name, constituent, baseline, pattern_name, time_series_name, scale_factor,
                units_factor, inflow_type
         FROM swmm_inflows ORDER BY fid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Inflow {
            node: row.get(0)?,
            constituent: row.get(1)?,
            baseline: row.get(2)?,
            pattern: row.get(3)?,
            time_series: row.get(4)?,
            sfactor: row.get(5)?,
            mfactor: row.get(6)?,
            inflow_type: row.get(7)?,
        })
    })?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn delete_inflows_for(conn: &Connection, node: &str) -> StoreResult<usize> {
    let removed = conn.execute("DELETE FROM swmm_inflows WHERE node_name = ?1", [node])?;
    if removed > 0 {
        bump_version(conn, INFLOWS)?;
    }
    Ok(removed)
}

// ============================================================================
// Rating tables and culvert equations
// ============================================================================

pub fn upsert_rating_table(conn: &Connection, table: &RatingTable) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO swmmflort (grid_fid, name) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET
             grid_fid = COALESCE(excluded.grid_fid, swmmflort.grid_fid)",
        params![table.grid.map(|c| c.value()), table.name],
    )?;
    conn.execute("DELETE FROM swmmflort_data WHERE rt_name = ?1", [&table.name])?;
    let mut stmt = conn.prepare(
        "INSERT INTO swmmflort_data (rt_name, seq, depth, q) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (seq, (depth, q)) in table.rows.iter().enumerate() {
        stmt.execute(params![table.name, seq as i64, depth, q])?;
    }
    bump_version(conn, RATING_TABLES)?;
    bump_version(conn, RATING_DATA)?;
    Ok(())
}

pub fn rating_table_exists(conn: &Connection, name: &str) -> StoreResult<bool> {
    let found: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM swmmflort WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?;
    Ok(found)
}

pub fn set_rating_table_grid(
    conn: &Connection,
    name: &str,
    grid: Option<CellId>,
) -> StoreResult<bool> {
    let changed = conn.execute(
        "UPDATE swmmflort SET grid_fid = ?2 WHERE name = ?1",
        params![name, grid.map(|c| c.value())],
    )?;
    if changed > 0 {
        bump_version(conn, RATING_TABLES)?;
    }
    Ok(changed > 0)
}

pub fn list_rating_tables(conn: &Connection) -> StoreResult<Vec<RatingTable>> {
    let mut data: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    {
        let mut stmt =
            conn.prepare("SELECT rt_name, depth, q FROM swmmflort_data ORDER BY rt_name, seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?))
        })?;
        for row in rows {
            let (name, depth, q) = row?;
            data.entry(name).or_default().push((depth, q));
        }
    }
    let mut stmt = conn.prepare("SELECT name, grid_fid FROM swmmflort ORDER BY fid")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
    })?;
    let mut results = Vec::new();
    for row in rows {
        let (name, grid) = row?;
        results.push(RatingTable {
            rows: data.remove(&name).unwrap_or_default(),
            name,
            grid: grid.map(CellId::new),
        });
    }
    Ok(results)
}

pub fn delete_rating_table(conn: &Connection, name: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM swmmflort WHERE name = ?1", [name])?;
    conn.execute("DELETE FROM swmmflort_data WHERE rt_name = ?1", [name])?;
    if removed > 0 {
        conn.execute(
            "UPDATE user_swmm_nodes SET rt_name = NULL WHERE rt_name = ?1",
            [name],
        )?;
        bump_version(conn, RATING_TABLES)?;
        bump_version(conn, RATING_DATA)?;
    }
    Ok(removed > 0)
}

pub fn upsert_culvert(conn: &Connection, culvert: &Culvert) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO swmmflo_culvert (grid_fid, name, cdiameter, typec, typeen, cubase,
             multbarrels, culvert_n, entrance_loss)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(name) DO UPDATE SET
             grid_fid = COALESCE(excluded.grid_fid, swmmflo_culvert.grid_fid),
             cdiameter = excluded.cdiameter,
             typec = excluded.typec,
             typeen = excluded.typeen,
             cubase = excluded.cubase,
             multbarrels = excluded.multbarrels,
             culvert_n = excluded.culvert_n,
             entrance_loss = excluded.entrance_loss",
        params![
            culvert.grid.map(|c| c.value()),
            culvert.name,
            culvert.diameter,
            culvert.typec,
            culvert.typeen,
            culvert.base_width,
            culvert.barrels,
            culvert.manning_n,
            culvert.entrance_loss
        ],
    )?;
    bump_version(conn, CULVERTS)?;
    Ok(())
}

pub fn list_culverts(conn: &Connection) -> StoreResult<Vec<Culvert>> {
    let mut stmt = conn.prepare(
        "SELECT name, grid_fid, cdiameter, typec, typeen, cubase, multbarrels, culvert_n,
                entrance_loss
         FROM swmmflo_culvert ORDER BY fid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Culvert {
            name: row.get(0)?,
            grid: row.get::<_, Option<i64>>(1)?.map(CellId::new),
            diameter: row.get(2)?,
            typec: row.get(3)?,
            typeen: row.get(4)?,
            base_width: row.get(5)?,
            barrels: row.get(6)?,
            manning_n: row.get(7)?,
            entrance_loss: row.get(8)?,
        })
    })?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

pub fn delete_culvert(conn: &Connection, name: &str) -> StoreResult<bool> {
    let removed = conn.execute("DELETE FROM swmmflo_culvert WHERE name = ?1", [name])?;
    if removed > 0 {
        bump_version(conn, CULVERTS)?;
    }
    Ok(removed > 0)
}

// ============================================================================
// Preserved sections
// ============================================================================

/// Insert or replace a section body, keeping the original position
pub fn upsert_section(conn: &Connection, section: &RawSection) -> StoreResult<()> {
    let body = section.lines.join("\n");
    let existing: Option<i64> = conn
        .query_row(
            "SELECT seq FROM swmm_inp_sections WHERE name = ?1",
            [&section.name],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(seq) => conn.execute(
            "UPDATE swmm_inp_sections SET body = ?2 WHERE seq = ?1",
            params![seq, body],
        )?,
        None => conn.execute(
            "INSERT INTO swmm_inp_sections (name, body) VALUES (?1, ?2)",
            params![section.name, body],
        )?,
    };
    bump_version(conn, SECTIONS)?;
    Ok(())
}

pub fn list_sections(conn: &Connection) -> StoreResult<Vec<RawSection>> {
    let mut stmt = conn.prepare("SELECT name, body FROM swmm_inp_sections ORDER BY seq")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut results = Vec::new();
    for row in rows {
        let (name, body) = row?;
        let lines = if body.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(String::from).collect()
        };
        results.push(RawSection::new(name, lines));
    }
    Ok(results)
}
