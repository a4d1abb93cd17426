//! Companion files that travel next to an INP: rating tables, culvert
//! equations and pump curves.
//!
//! Each reader returns the entities it could read together with a
//! per-file [`Diagnostics`]; unreadable rows are skipped and reported, an
//! unreadable file is an error with the path in its context chain.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sdi_core::{
    CellId, Culvert, Curve, CurveType, DiagnosticIssue, Diagnostics, DrainType, IssueKind,
    NodeClass, RatingTable, SdiResult,
};
use sdi_store::Store;
use tracing::{debug, info, warn};

use super::tokenizer::split_fields;

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("no file name in {}", path.display()))
}

fn skip_row(diag: &mut Diagnostics, file: &str, line: usize, raw: &str, message: &str) {
    debug!(file, line, message, "skipped companion row");
    diag.add(
        DiagnosticIssue::warning(IssueKind::RecordParse, message)
            .with_section(file)
            .with_line(line)
            .with_raw(raw),
    );
}

/// Read `x y` pairs, skipping comments, blank lines and rows that are not
/// two numbers (a header row, typically)
fn read_pairs(path: &Path, diag: &mut Diagnostics) -> Result<Vec<(f64, f64)>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file = file_label(path);
    let mut pairs = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        let fields = split_fields(trimmed);
        let parsed = match fields.as_slice() {
            [x, y, ..] => x.parse::<f64>().ok().zip(y.parse::<f64>().ok()),
            _ => None,
        };
        match parsed {
            Some(pair) => pairs.push(pair),
            None => skip_row(diag, &file, idx + 1, line, "expected two numeric columns"),
        }
    }
    Ok(pairs)
}

/// Read a depth/discharge rating table; the table is named after the file
pub fn read_rating_table(path: impl AsRef<Path>) -> Result<(RatingTable, Diagnostics)> {
    let path = path.as_ref();
    let mut diag = Diagnostics::new();
    let mut table = RatingTable::new(stem(path)?);
    table.rows = read_pairs(path, &mut diag)?;
    table.rows.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok((table, diag))
}

/// Read a pump curve file; the curve is named after the file
pub fn read_pump_curve(
    path: impl AsRef<Path>,
    curve_type: CurveType,
) -> Result<(Curve, Diagnostics)> {
    let path = path.as_ref();
    anyhow::ensure!(
        curve_type.is_pump(),
        "{} is not a pump curve type",
        curve_type.as_inp()
    );
    let mut diag = Diagnostics::new();
    let mut curve = Curve::new(stem(path)?, curve_type);
    curve.points = read_pairs(path, &mut diag)?;
    Ok((curve, diag))
}

/// Read culvert equations, one per row:
/// `cell name diameter typec typeen base barrels [manning_n entrance_loss]`
pub fn read_culvert_file(path: impl AsRef<Path>) -> Result<(Vec<Culvert>, Diagnostics)> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file = file_label(path);
    let mut diag = Diagnostics::new();
    let mut culverts = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        match parse_culvert(&split_fields(trimmed)) {
            Ok(culvert) => culverts.push(culvert),
            Err(message) => skip_row(&mut diag, &file, idx + 1, line, &message),
        }
    }
    Ok((culverts, diag))
}

fn parse_culvert(fields: &[String]) -> std::result::Result<Culvert, String> {
    if fields.len() < 7 {
        return Err(format!("expected at least 7 columns, found {}", fields.len()));
    }
    let number = |idx: usize, what: &str| {
        fields[idx]
            .parse::<f64>()
            .map_err(|_| format!("invalid {what} '{}'", fields[idx]))
    };
    let integer = |idx: usize, what: &str| {
        fields[idx]
            .parse::<i64>()
            .map_err(|_| format!("invalid {what} '{}'", fields[idx]))
    };
    let cell = integer(0, "grid cell")?;
    let barrels = integer(6, "barrel count")?;
    let defaults = Culvert::default();
    Ok(Culvert {
        name: fields[1].clone(),
        grid: (cell > 0).then(|| CellId::new(cell)),
        diameter: number(2, "diameter")?,
        typec: integer(3, "typec")?,
        typeen: integer(4, "typeen")?,
        base_width: number(5, "base width")?,
        barrels: u32::try_from(barrels).map_err(|_| format!("invalid barrel count {barrels}"))?,
        manning_n: if fields.len() > 7 { number(7, "Manning n")? } else { defaults.manning_n },
        entrance_loss: if fields.len() > 8 {
            number(8, "entrance loss")?
        } else {
            defaults.entrance_loss
        },
    })
}

/// Rating table files (`*.txt`) in `dir`, sorted by name
pub fn rating_table_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_txt = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("txt"))
            .unwrap_or(false);
        if path.is_file() && is_txt {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Import rating-table files and assign each to the inlet it is named
/// after.
///
/// A file whose name matches no inlet is reported and not stored. A table
/// already serving another inlet is refused before any of its rows are
/// written.
pub fn import_rating_tables(store: &mut Store, paths: &[PathBuf]) -> SdiResult<Diagnostics> {
    let mut diag = Diagnostics::new();
    let inlets: Vec<String> = store
        .nodes()?
        .into_iter()
        .filter(|n| n.class() == NodeClass::Inlet)
        .map(|n| n.name)
        .collect();

    let mut assigned = 0;
    for path in paths {
        let (mut table, file_diag) = read_rating_table(path)?;
        diag.merge(file_diag);

        let Some(inlet) = inlets.iter().find(|n| n.eq_ignore_ascii_case(&table.name)) else {
            diag.add_warning_with_entity(
                IssueKind::Reference,
                &format!("no inlet named after {}", file_label(path)),
                &table.name,
            );
            continue;
        };
        if table.rows.is_empty() {
            diag.add_warning_with_entity(IssueKind::Validation, "rating table has no rows", &table.name);
            continue;
        }
        table.name = inlet.clone();
        if let Some(holder) = store.rating_table_holder(&table.name, inlet)? {
            warn!(inlet = %inlet, holder = %holder, "rating table file skipped");
            diag.add(
                DiagnosticIssue::warning(
                    IssueKind::DuplicateRatingAssignment,
                    format!("rating table '{}' is already assigned to inlet '{holder}'", table.name),
                )
                .with_entity(inlet.as_str()),
            );
            continue;
        }
        store.upsert_rating_table(&table)?;
        if store.assign_rating_table(inlet, &table.name, &mut diag)? {
            assigned += 1;
        }
    }
    info!(files = paths.len(), assigned, "rating tables imported");
    Ok(diag)
}

/// Import a culvert-equation file. Equations naming no type-4 inlet are
/// stored but reported.
pub fn import_culverts(store: &mut Store, path: impl AsRef<Path>) -> SdiResult<Diagnostics> {
    let (culverts, mut diag) = read_culvert_file(path)?;
    for culvert in &culverts {
        let host = store.node(&culvert.name)?;
        let is_type4 = host
            .as_ref()
            .and_then(|n| n.inlet())
            .map(|i| i.drain_type == Some(DrainType::RatingTable))
            .unwrap_or(false);
        if !is_type4 {
            diag.add_warning_with_entity(
                IssueKind::Reference,
                "culvert equation names no type 4 inlet",
                &culvert.name,
            );
        }
        store.upsert_culvert(culvert)?;
    }
    info!(count = culverts.len(), "culvert equations imported");
    Ok(diag)
}

/// Import pump curve files as curves of `curve_type`
pub fn import_pump_curves(
    store: &mut Store,
    paths: &[PathBuf],
    curve_type: CurveType,
) -> SdiResult<Diagnostics> {
    let mut diag = Diagnostics::new();
    for path in paths {
        let (curve, file_diag) = read_pump_curve(path, curve_type)?;
        diag.merge(file_diag);
        if curve.points.is_empty() {
            diag.add_warning_with_entity(IssueKind::Validation, "pump curve has no rows", &curve.name);
            continue;
        }
        store.upsert_curve(&curve)?;
    }
    Ok(diag)
}
