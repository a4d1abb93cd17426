//! Referential checks run at commit time.
//!
//! Violations are reported, never raised: the store keeps invalid rows so
//! the user can repair them.

use rusqlite::Connection;
use sdi_core::{DiagnosticIssue, Diagnostics, IssueKind};

use crate::error::StoreResult;
use crate::nodes::refresh_usable;
use crate::schema::LINK_TABLES;

fn collect_pairs(conn: &Connection, sql: &str) -> StoreResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

const NODE_SET: &str =
    "(SELECT name FROM user_swmm_nodes UNION SELECT name FROM user_swmm_storage_units)";

pub fn check_integrity(conn: &Connection) -> StoreResult<Diagnostics> {
    let mut diag = Diagnostics::new();
    refresh_usable(conn, None)?;

    for table in LINK_TABLES {
        for role in ["inlet_node", "outlet_node"] {
            let missing = collect_pairs(
                conn,
                &format!(
                    "SELECT name, COALESCE({role}, '') FROM {table}
                     WHERE {role} IS NULL OR {role} NOT IN {NODE_SET} ORDER BY fid"
                ),
            )?;
            for (link, node) in missing {
                let message = if node.is_empty() {
                    format!("{} not set", role.replace('_', " "))
                } else {
                    format!("{} '{node}' not found", role.replace('_', " "))
                };
                diag.add_warning_with_entity(IssueKind::Reference, &message, &link);
            }
        }
    }

    for (node, _) in collect_pairs(
        conn,
        &format!("SELECT node_name, '' FROM swmm_inflows WHERE node_name NOT IN {NODE_SET}"),
    )? {
        diag.add_warning_with_entity(IssueKind::Reference, "inflow names a missing node", &node);
    }

    for (node, curve) in collect_pairs(
        conn,
        "SELECT name, COALESCE(tidal_curve, '') FROM user_swmm_nodes
         WHERE sd_type = 'O' AND outfall_type = 'TIDAL_CURVE'
           AND (tidal_curve IS NULL OR tidal_curve NOT IN
                (SELECT name FROM swmm_other_curves WHERE type = 'Tidal'))",
    )? {
        diag.add_warning_with_entity(
            IssueKind::Reference,
            &format!("tidal curve '{curve}' not found"),
            &node,
        );
    }

    for (node, series) in collect_pairs(
        conn,
        "SELECT name, COALESCE(time_series, '') FROM user_swmm_nodes
         WHERE sd_type = 'O' AND outfall_type = 'TIME_SERIES'
           AND (time_series IS NULL OR time_series NOT IN
                (SELECT time_series_name FROM swmm_time_series))",
    )? {
        diag.add_warning_with_entity(
            IssueKind::Reference,
            &format!("time series '{series}' not found"),
            &node,
        );
    }

    for (pump, curve) in collect_pairs(
        conn,
        "SELECT name, pump_curve FROM user_swmm_pumps
         WHERE pump_curve NOT IN (SELECT pump_curve_name FROM swmm_pumps_curve_data)",
    )? {
        diag.add_warning_with_entity(
            IssueKind::Reference,
            &format!("pump curve '{curve}' not found"),
            &pump,
        );
    }

    for (node, table) in collect_pairs(
        conn,
        "SELECT name, rt_name FROM user_swmm_nodes
         WHERE rt_name IS NOT NULL AND rt_name NOT IN (SELECT name FROM swmmflort)",
    )? {
        diag.add_warning_with_entity(
            IssueKind::Reference,
            &format!("rating table '{table}' not found"),
            &node,
        );
    }

    for (table, hosts) in collect_pairs(
        conn,
        "SELECT rt_name, GROUP_CONCAT(name, ', ') FROM user_swmm_nodes
         WHERE rt_name IS NOT NULL GROUP BY rt_name HAVING COUNT(*) > 1",
    )? {
        diag.add(
            DiagnosticIssue::warning(
                IssueKind::DuplicateRatingAssignment,
                format!("rating table assigned to more than one inlet ({hosts})"),
            )
            .with_entity(table),
        );
    }

    // A cross-section lives on its link row, so the only way to attach one
    // to two hosts is two links sharing a name.
    let union = LINK_TABLES
        .iter()
        .map(|t| format!("SELECT name FROM {t}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    for (link, count) in collect_pairs(
        conn,
        &format!(
            "SELECT name, CAST(COUNT(*) AS TEXT) FROM ({union}) GROUP BY name HAVING COUNT(*) > 1"
        ),
    )? {
        diag.add_error_with_entity(
            IssueKind::Duplicate,
            &format!("link name used by {count} links"),
            &link,
        );
    }

    Ok(diag)
}
