//! Storm-drain `.DAT` files read by the 2-D simulator.
//!
//! - `SWMMFLO.DAT`: one `D` line per inlet placed on a grid cell
//! - `SWMMOUTF.DAT`: one line per outfall placed on a grid cell
//! - `SWMMFLORT.DAT`: rating tables (`D` header, `N` rows) and culvert
//!   equations (`S` header, `F` row)
//!
//! Only entities that have been schematized (carry a grid cell) are written.

use std::fmt::Write as _;
use std::path::Path;

use sdi_core::{Culvert, DiagnosticIssue, Diagnostics, IssueKind, RatingTable, SdiResult};
use sdi_store::{SchematizedInlet, SchematizedOutfall, Store};
use tracing::info;

use super::{write_atomically, ExportReport};

pub const SWMMFLO: &str = "SWMMFLO.DAT";
pub const SWMMOUTF: &str = "SWMMOUTF.DAT";
pub const SWMMFLORT: &str = "SWMMFLORT.DAT";

pub fn write_swmmflo(inlets: &[SchematizedInlet]) -> String {
    let mut out = String::new();
    for inlet in inlets {
        let _ = writeln!(
            out,
            "D {:>8} {:<16} {:>2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>2} {:>10.2}",
            inlet.grid.value(),
            inlet.name,
            inlet.drain_type.map(|d| d.code()).unwrap_or(0),
            inlet.length,
            inlet.width,
            inlet.height,
            inlet.weir_coeff,
            inlet.feature,
            inlet.curb_height,
        );
    }
    out
}

pub fn write_swmmoutf(outfalls: &[SchematizedOutfall]) -> String {
    let mut out = String::new();
    for outfall in outfalls {
        let _ = writeln!(
            out,
            "{:<16} {:>8} {}",
            outfall.name,
            outfall.grid.value(),
            u8::from(outfall.allow_discharge)
        );
    }
    out
}

/// Rating tables and culvert equations; entries without a grid cell are
/// skipped and reported in `diag`
pub fn write_swmmflort(
    tables: &[RatingTable],
    culverts: &[Culvert],
    diag: &mut Diagnostics,
) -> String {
    fn unplaced(name: &str, diag: &mut Diagnostics) {
        diag.add(
            DiagnosticIssue::warning(IssueKind::Export, "not on a grid cell, left out of SWMMFLORT.DAT")
                .with_entity(name),
        );
    }

    let mut out = String::new();

    for table in tables {
        let Some(grid) = table.grid else {
            unplaced(&table.name, diag);
            continue;
        };
        let _ = writeln!(out, "D {:>8} {}", grid.value(), table.name);
        for (depth, discharge) in &table.rows {
            let _ = writeln!(out, "N {:>10.3} {:>10.3}", depth, discharge);
        }
    }

    for culvert in culverts {
        let Some(grid) = culvert.grid else {
            unplaced(&culvert.name, diag);
            continue;
        };
        let _ = writeln!(out, "S {:>8} {} {:.2}", grid.value(), culvert.name, culvert.diameter);
        let _ = writeln!(
            out,
            "F {} {} {:.3} {:.2} {:.2} {}",
            culvert.typec,
            culvert.typeen,
            culvert.manning_n,
            culvert.entrance_loss,
            culvert.base_width,
            culvert.barrels,
        );
    }
    out
}

/// Write the three storm-drain files into `dir`
pub fn export_dat_files(store: &Store, dir: impl AsRef<Path>) -> SdiResult<ExportReport> {
    let dir = dir.as_ref();
    let mut report = ExportReport::default();

    let inlets = store.schematized_inlets()?;
    write_atomically(dir.join(SWMMFLO), &write_swmmflo(&inlets))?;
    report.count(SWMMFLO, inlets.len());

    let outfalls = store.schematized_outfalls()?;
    write_atomically(dir.join(SWMMOUTF), &write_swmmoutf(&outfalls))?;
    report.count(SWMMOUTF, outfalls.len());

    let tables = store.rating_tables()?;
    let culverts = store.culverts()?;
    let text = write_swmmflort(&tables, &culverts, &mut report.diagnostics);
    write_atomically(dir.join(SWMMFLORT), &text)?;
    let placed = tables.iter().filter(|t| t.grid.is_some()).count()
        + culverts.iter().filter(|c| c.grid.is_some()).count();
    report.count(SWMMFLORT, placed);

    info!(dir = %dir.display(), inlets = inlets.len(), outfalls = outfalls.len(), "storm drain files exported");
    Ok(report)
}
