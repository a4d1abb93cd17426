//! Database schema.
//!
//! Table and column names are shared with the host application and the
//! simulator export, so they are part of the storage contract. Geometries
//! are stored as WKT text in the `geom` column of each user layer.

use rusqlite::Connection;

use crate::error::StoreResult;

pub const NODES: &str = "user_swmm_nodes";
pub const CONDUITS: &str = "user_swmm_conduits";
pub const PUMPS: &str = "user_swmm_pumps";
pub const ORIFICES: &str = "user_swmm_orifices";
pub const WEIRS: &str = "user_swmm_weirs";
pub const STORAGE_UNITS: &str = "user_swmm_storage_units";
pub const INFLOWS: &str = "swmm_inflows";
pub const PATTERNS: &str = "swmm_inflow_patterns";
pub const TIME_SERIES: &str = "swmm_time_series";
pub const TIME_SERIES_DATA: &str = "swmm_time_series_data";
pub const PUMP_CURVES: &str = "swmm_pumps_curve_data";
pub const OTHER_CURVES: &str = "swmm_other_curves";
pub const RATING_TABLES: &str = "swmmflort";
pub const RATING_DATA: &str = "swmmflort_data";
pub const CULVERTS: &str = "swmmflo_culvert";
pub const SCHEMATIZED_INLETS: &str = "swmmflo";
pub const SCHEMATIZED_OUTFALLS: &str = "swmmoutf";
pub const OUTFLOW_CELLS: &str = "swmm_outflow_cells";
pub const SECTIONS: &str = "swmm_inp_sections";

/// Link tables, in cross-section attachment order
pub const LINK_TABLES: [&str; 4] = [CONDUITS, PUMPS, ORIFICES, WEIRS];

/// Tables cleared by a replace-mode import
pub const USER_TABLES: [&str; 19] = [
    NODES,
    CONDUITS,
    PUMPS,
    ORIFICES,
    WEIRS,
    STORAGE_UNITS,
    INFLOWS,
    PATTERNS,
    TIME_SERIES,
    TIME_SERIES_DATA,
    PUMP_CURVES,
    OTHER_CURVES,
    RATING_TABLES,
    RATING_DATA,
    CULVERTS,
    SCHEMATIZED_INLETS,
    SCHEMATIZED_OUTFALLS,
    OUTFLOW_CELLS,
    SECTIONS,
];

pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS table_versions (
            table_name TEXT PRIMARY KEY,
            version INTEGER NOT NULL DEFAULT 0
        );

        -- Junctions, inlets and outfalls
        CREATE TABLE IF NOT EXISTS user_swmm_nodes (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            sd_type TEXT NOT NULL CHECK (sd_type IN ('J', 'I', 'O')),
            geom TEXT NOT NULL,
            grid_fid INTEGER,
            invert_elev REAL NOT NULL DEFAULT 0,
            max_depth REAL NOT NULL DEFAULT 0,
            init_depth REAL NOT NULL DEFAULT 0,
            surcharge_depth REAL NOT NULL DEFAULT 0,
            ponded_area REAL NOT NULL DEFAULT 0,
            outfall_type TEXT,
            water_depth REAL,
            tidal_curve TEXT,
            time_series TEXT,
            flapgate INTEGER NOT NULL DEFAULT 0,
            swmm_allow_discharge INTEGER NOT NULL DEFAULT 1,
            intype INTEGER,
            swmm_length REAL NOT NULL DEFAULT 0,
            swmm_width REAL NOT NULL DEFAULT 0,
            swmm_height REAL NOT NULL DEFAULT 0,
            swmm_coeff REAL NOT NULL DEFAULT 0,
            swmm_feature INTEGER NOT NULL DEFAULT 0,
            curbheight REAL NOT NULL DEFAULT 0,
            rt_name TEXT
        );

        CREATE TABLE IF NOT EXISTS user_swmm_storage_units (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            geom TEXT NOT NULL,
            grid_fid INTEGER,
            invert_elev REAL NOT NULL DEFAULT 0,
            max_depth REAL NOT NULL DEFAULT 0,
            init_depth REAL NOT NULL DEFAULT 0,
            storage_curve TEXT NOT NULL CHECK (storage_curve IN ('FUNCTIONAL', 'TABULAR')),
            coefficient REAL,
            exponent REAL,
            constant REAL,
            curve_name TEXT,
            surcharge_depth REAL NOT NULL DEFAULT 0,
            evap_factor REAL NOT NULL DEFAULT 0,
            infiltration INTEGER NOT NULL DEFAULT 0,
            suction_head REAL,
            conductivity REAL,
            initial_deficit REAL
        );

        CREATE TABLE IF NOT EXISTS user_swmm_conduits (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            inlet_node TEXT,
            outlet_node TEXT,
            geom TEXT NOT NULL,
            outside_domain INTEGER NOT NULL DEFAULT 0,
            usable INTEGER NOT NULL DEFAULT 0,
            conduit_length REAL NOT NULL DEFAULT 0,
            conduit_manning REAL NOT NULL DEFAULT 0.01,
            conduit_inlet_offset REAL NOT NULL DEFAULT 0,
            conduit_outlet_offset REAL NOT NULL DEFAULT 0,
            conduit_init_flow REAL NOT NULL DEFAULT 0,
            conduit_max_flow REAL NOT NULL DEFAULT 0,
            losses_inlet REAL NOT NULL DEFAULT 0,
            losses_outlet REAL NOT NULL DEFAULT 0,
            losses_average REAL NOT NULL DEFAULT 0,
            losses_flapgate INTEGER NOT NULL DEFAULT 0,
            xsections_shape TEXT,
            xsections_geom1 REAL,
            xsections_geom2 REAL,
            xsections_geom3 REAL,
            xsections_geom4 REAL,
            xsections_barrels INTEGER,
            xsections_culvert INTEGER,
            xsections_ref TEXT
        );

        CREATE TABLE IF NOT EXISTS user_swmm_pumps (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            inlet_node TEXT,
            outlet_node TEXT,
            geom TEXT NOT NULL,
            outside_domain INTEGER NOT NULL DEFAULT 0,
            usable INTEGER NOT NULL DEFAULT 0,
            pump_curve TEXT NOT NULL DEFAULT '',
            pump_init_status TEXT NOT NULL DEFAULT 'OFF',
            pump_startup_depth REAL NOT NULL DEFAULT 0,
            pump_shutoff_depth REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS user_swmm_orifices (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            inlet_node TEXT,
            outlet_node TEXT,
            geom TEXT NOT NULL,
            outside_domain INTEGER NOT NULL DEFAULT 0,
            usable INTEGER NOT NULL DEFAULT 0,
            orifice_type TEXT NOT NULL DEFAULT 'SIDE',
            orifice_crest_height REAL NOT NULL DEFAULT 0,
            orifice_disch_coeff REAL NOT NULL DEFAULT 0,
            orifice_flap_gate INTEGER NOT NULL DEFAULT 0,
            orifice_open_close_time REAL NOT NULL DEFAULT 0,
            xsections_shape TEXT,
            xsections_geom1 REAL,
            xsections_geom2 REAL,
            xsections_geom3 REAL,
            xsections_geom4 REAL,
            xsections_barrels INTEGER,
            xsections_culvert INTEGER,
            xsections_ref TEXT
        );

        CREATE TABLE IF NOT EXISTS user_swmm_weirs (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            inlet_node TEXT,
            outlet_node TEXT,
            geom TEXT NOT NULL,
            outside_domain INTEGER NOT NULL DEFAULT 0,
            usable INTEGER NOT NULL DEFAULT 0,
            weir_type TEXT NOT NULL DEFAULT 'TRANSVERSE',
            weir_crest_height REAL NOT NULL DEFAULT 0,
            weir_disch_coeff REAL NOT NULL DEFAULT 0,
            weir_flap_gate INTEGER NOT NULL DEFAULT 0,
            weir_end_contrac INTEGER NOT NULL DEFAULT 0,
            weir_end_coeff REAL NOT NULL DEFAULT 0,
            weir_surcharge INTEGER NOT NULL DEFAULT 1,
            weir_side_slope REAL NOT NULL DEFAULT 0,
            xsections_shape TEXT,
            xsections_geom1 REAL,
            xsections_geom2 REAL,
            xsections_geom3 REAL,
            xsections_geom4 REAL,
            xsections_barrels INTEGER,
            xsections_culvert INTEGER,
            xsections_ref TEXT
        );

        CREATE TABLE IF NOT EXISTS swmm_inflows (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            node_name TEXT NOT NULL UNIQUE,
            constituent TEXT NOT NULL DEFAULT 'FLOW',
            baseline REAL NOT NULL DEFAULT 0,
            pattern_name TEXT,
            time_series_name TEXT,
            scale_factor REAL NOT NULL DEFAULT 1,
            units_factor REAL NOT NULL DEFAULT 1,
            inflow_type TEXT NOT NULL DEFAULT 'FLOW'
        );

        CREATE TABLE IF NOT EXISTS swmm_inflow_patterns (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern_name TEXT NOT NULL,
            pattern_description TEXT,
            hour INTEGER NOT NULL,
            multiplier REAL NOT NULL,
            UNIQUE (pattern_name, hour)
        );

        CREATE TABLE IF NOT EXISTS swmm_time_series (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            time_series_name TEXT NOT NULL UNIQUE,
            time_series_description TEXT NOT NULL,
            time_series_file TEXT,
            time_series_data INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS swmm_time_series_data (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            time_series_name TEXT NOT NULL,
            seq INTEGER NOT NULL,
            date TEXT,
            time TEXT NOT NULL,
            value REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS swmm_pumps_curve_data (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            pump_curve_name TEXT NOT NULL,
            pump_curve_type TEXT NOT NULL,
            description TEXT,
            seq INTEGER NOT NULL,
            x_value REAL NOT NULL,
            y_value REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS swmm_other_curves (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            description TEXT,
            seq INTEGER NOT NULL,
            x_value REAL NOT NULL,
            y_value REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS swmmflort (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            grid_fid INTEGER,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS swmmflort_data (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            rt_name TEXT NOT NULL,
            seq INTEGER NOT NULL,
            depth REAL NOT NULL,
            q REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS swmmflo_culvert (
            fid INTEGER PRIMARY KEY AUTOINCREMENT,
            grid_fid INTEGER,
            name TEXT NOT NULL UNIQUE,
            cdiameter REAL NOT NULL DEFAULT 0,
            typec INTEGER NOT NULL DEFAULT 1,
            typeen INTEGER NOT NULL DEFAULT 1,
            cubase REAL NOT NULL DEFAULT 0,
            multbarrels INTEGER NOT NULL DEFAULT 1,
            culvert_n REAL NOT NULL DEFAULT 0,
            entrance_loss REAL NOT NULL DEFAULT 0
        );

        -- Schematized mirrors, one row per grid cell
        CREATE TABLE IF NOT EXISTS swmmflo (
            grid_fid INTEGER PRIMARY KEY,
            swflo_name TEXT NOT NULL,
            intype INTEGER,
            swmm_length REAL NOT NULL DEFAULT 0,
            swmm_width REAL NOT NULL DEFAULT 0,
            swmm_height REAL NOT NULL DEFAULT 0,
            swmm_coeff REAL NOT NULL DEFAULT 0,
            swmm_feature INTEGER NOT NULL DEFAULT 0,
            curbheight REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS swmmoutf (
            grid_fid INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            outf_flo INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS swmm_outflow_cells (
            grid_fid INTEGER PRIMARY KEY,
            outfall TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('border', 'stage1', 'stage2'))
        );

        -- Sections passed through on export
        CREATE TABLE IF NOT EXISTS swmm_inp_sections (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            body TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conduits_inlet ON user_swmm_conduits(inlet_node);
        CREATE INDEX IF NOT EXISTS idx_conduits_outlet ON user_swmm_conduits(outlet_node);
        CREATE INDEX IF NOT EXISTS idx_ts_data_name ON swmm_time_series_data(time_series_name);
        CREATE INDEX IF NOT EXISTS idx_rt_data_name ON swmmflort_data(rt_name);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_rt_name
            ON user_swmm_nodes(rt_name) WHERE rt_name IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_pump_curve_name ON swmm_pumps_curve_data(pump_curve_name);
        CREATE INDEX IF NOT EXISTS idx_other_curve_name ON swmm_other_curves(name);
        "#,
    )?;
    Ok(())
}

/// Increment the change counter of `table`
pub fn bump_version(conn: &Connection, table: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO table_versions (table_name, version) VALUES (?1, 1)
         ON CONFLICT(table_name) DO UPDATE SET version = version + 1",
        [table],
    )?;
    Ok(())
}

pub fn version(conn: &Connection, table: &str) -> StoreResult<u64> {
    let mut stmt = conn.prepare("SELECT version FROM table_versions WHERE table_name = ?1")?;
    let mut rows = stmt.query([table])?;
    match rows.next()? {
        Some(row) => Ok(row.get::<_, i64>(0)? as u64),
        None => Ok(0),
    }
}

/// Delete every row of the user and schematized tables
pub fn truncate_user_tables(conn: &Connection) -> StoreResult<()> {
    for table in USER_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
        bump_version(conn, table)?;
    }
    Ok(())
}
