//! Matching rating tables to inlets after schematization.
//!
//! A table is matched to an inlet by name first (ignoring case), then by
//! sharing the inlet's grid cell. Inlets that already have a table are not
//! matched again, and every assignment goes through
//! [`Store::assign_rating_table`] so the one-table-per-inlet rule holds.

use hashbrown::HashSet;
use sdi_core::{CellId, Diagnostics, IssueKind, NodeClass, SdiResult};
use sdi_store::Store;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Name,
    Cell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingMatch {
    pub table: String,
    pub inlet: String,
    pub matched_by: MatchedBy,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RatingAssignment {
    pub assigned: Vec<RatingMatch>,
    /// Tables no inlet could be found for
    pub unmatched: Vec<String>,
    pub diagnostics: Diagnostics,
}

struct Candidate {
    name: String,
    cell: Option<CellId>,
}

/// Assign every unassigned rating table to an inlet
pub fn assign_rating_tables(store: &mut Store) -> SdiResult<RatingAssignment> {
    let nodes = store.nodes()?;
    let taken: HashSet<String> = nodes
        .iter()
        .filter_map(|n| n.inlet().and_then(|i| i.rating_table.clone()))
        .collect();
    let mut free: Vec<Candidate> = nodes
        .iter()
        .filter(|n| n.class() == NodeClass::Inlet)
        .filter(|n| n.inlet().is_some_and(|i| i.rating_table.is_none()))
        .map(|n| Candidate {
            name: n.name.clone(),
            cell: n.grid,
        })
        .collect();

    let mut result = RatingAssignment::default();
    for table in store.rating_tables()? {
        if taken.contains(&table.name) {
            continue;
        }
        let by_name = free
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(&table.name))
            .map(|idx| (idx, MatchedBy::Name));
        let by_cell = || {
            let cell = table.grid?;
            free.iter()
                .position(|c| c.cell == Some(cell))
                .map(|idx| (idx, MatchedBy::Cell))
        };
        let Some((idx, matched_by)) = by_name.or_else(by_cell) else {
            result.diagnostics.add_warning_with_entity(
                IssueKind::Reference,
                "no inlet matches this rating table by name or cell",
                &table.name,
            );
            result.unmatched.push(table.name.clone());
            continue;
        };

        let inlet = free.remove(idx).name;
        if store.assign_rating_table(&inlet, &table.name, &mut result.diagnostics)? {
            result.assigned.push(RatingMatch {
                table: table.name.clone(),
                inlet,
                matched_by,
            });
        }
    }

    info!(
        assigned = result.assigned.len(),
        unmatched = result.unmatched.len(),
        "rating tables matched to inlets"
    );
    Ok(result)
}
