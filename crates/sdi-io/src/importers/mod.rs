//! INP and companion-file importers.
//!
//! An import runs in three stages:
//!
//! 1. **Tokenize** - split the text into `[SECTION]` blocks ([`tokenizer`])
//! 2. **Build** - parse each known section into typed records and assemble a
//!    [`Network`] in dependency order
//! 3. **Validate and persist** - flag links outside the grid, check
//!    references and write everything to the [`Store`]
//!
//! Row-level problems never abort the import. They are collected in
//! [`ImportDiagnostics`] and returned with the result, so a partly broken
//! file still loads everything that could be read. The only fatal document
//! error is text with no section headers at all.
//!
//! ## Quick Import Example
//!
//! ```no_run
//! use sdi_core::config::ImportConfig;
//! use sdi_io::importers::import_inp_file;
//! use sdi_store::Store;
//!
//! let mut store = Store::open("project.sqlite")?;
//! let report = import_inp_file("network.inp", &mut store, None, &ImportConfig::default())?;
//! println!("{}", report.diagnostics.summary());
//! # Ok::<(), sdi_core::SdiError>(())
//! ```

use std::collections::HashMap;
use std::path::Path;

use sdi_core::config::ImportConfig;
use sdi_core::{
    Diagnostics, GridService, ImportDiagnostics, ImportMode, Network, Point, SdiError,
    SdiResult,
};
use sdi_store::Store;
use tracing::{info, warn};

mod builder;
pub mod companion;
pub mod records;
pub mod tables;
pub mod tokenizer;

pub use builder::build_network;
pub use companion::{
    import_culverts, import_pump_curves, import_rating_tables, rating_table_files,
    read_culvert_file, read_pump_curve, read_rating_table,
};
pub use tokenizer::{split_fields, tokenize, InpDocument, InpSection, RawLine, SectionKind};

/// A parsed network together with what the parser had to say about it
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub network: Network,
    pub diagnostics: ImportDiagnostics,
}

/// Outcome of an import into the store
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub diagnostics: ImportDiagnostics,
}

/// Parse INP text with the default import settings
pub fn parse_inp(text: &str) -> SdiResult<ImportResult> {
    parse_inp_with(text, &ImportConfig::default())
}

/// Parse INP text into a [`Network`] without touching a store.
///
/// References are checked against the parsed network itself and reported
/// in the returned diagnostics.
pub fn parse_inp_with(text: &str, config: &ImportConfig) -> SdiResult<ImportResult> {
    let doc = tokenize(text)?;
    let mut diagnostics = ImportDiagnostics::new();
    let network = build_network(&doc, config, &mut diagnostics);

    let mut validation = Diagnostics::new();
    network.validate_into(&mut validation);
    diagnostics.merge(validation);

    Ok(ImportResult {
        network,
        diagnostics,
    })
}

fn read_text(path: &Path) -> SdiResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| SdiError::MalformedDocument(format!("cannot read {}: {e}", path.display())))
}

/// Parse an INP file from disk
pub fn read_inp(path: impl AsRef<Path>, config: &ImportConfig) -> SdiResult<ImportResult> {
    parse_inp_with(&read_text(path.as_ref())?, config)
}

/// Mark links with an endpoint outside the grid.
///
/// Such links are kept; they are only flagged and reported. Returns the
/// number of links flagged.
pub fn flag_links_outside_domain(
    network: &mut Network,
    grid: &dyn GridService,
    diag: &mut ImportDiagnostics,
) -> usize {
    flag_links_against(network, &HashMap::new(), grid, diag)
}

/// Like [`flag_links_outside_domain`], locating endpoints missing from
/// `network` in `stored`
fn flag_links_against(
    network: &mut Network,
    stored: &HashMap<String, Point>,
    grid: &dyn GridService,
    diag: &mut ImportDiagnostics,
) -> usize {
    let mut flagged = 0;
    for idx in 0..network.links.len() {
        let link = &network.links[idx];
        // unresolved endpoints are a reference problem, not a domain one
        let inside = |node: Option<&str>| {
            node.and_then(|n| network.node_location(n).or_else(|| stored.get(n).copied()))
                .map(|p| grid.cell_at(&p).is_some())
                .unwrap_or(true)
        };
        let outside =
            !(inside(link.inlet_node.as_deref()) && inside(link.outlet_node.as_deref()));
        if outside {
            diag.add_domain_warning(&link.name, "link has an endpoint outside the grid");
            flagged += 1;
        }
        network.links[idx].outside_domain = outside;
    }
    diag.stats.links_outside_domain = flagged;
    flagged
}

/// Parse INP text and persist it.
///
/// In [`ImportMode::Replace`] the user tables are truncated first and the
/// parsed network is validated on its own. In [`ImportMode::Merge`] rows are
/// upserted by name and references are checked against the merged store
/// contents, since a link may now resolve to a node imported earlier.
pub fn import_inp(
    text: &str,
    store: &mut Store,
    grid: Option<&dyn GridService>,
    config: &ImportConfig,
) -> SdiResult<ImportReport> {
    let doc = tokenize(text)?;
    let mut diagnostics = ImportDiagnostics::new();
    let mut network = build_network(&doc, config, &mut diagnostics);

    let mode = config.mode;
    let stored = match mode {
        ImportMode::Merge => stored_locations(store)?,
        ImportMode::Replace => HashMap::new(),
    };
    if mode == ImportMode::Replace {
        let mut validation = Diagnostics::new();
        network.validate_into(&mut validation);
        diagnostics.merge(validation);
    } else {
        snap_to_stored_nodes(&mut network, &stored);
    }

    if let Some(grid) = grid {
        flag_links_against(&mut network, &stored, grid, &mut diagnostics);
    }

    diagnostics.merge(store.save_network(&network, mode)?);

    if mode == ImportMode::Merge {
        diagnostics.merge(store.check_integrity()?);
    }

    if diagnostics.has_errors() {
        warn!(summary = %diagnostics.summary(), "INP imported with errors");
    } else {
        info!(summary = %diagnostics.summary(), ?mode, "INP imported");
    }
    Ok(ImportReport { mode, diagnostics })
}

/// Locations of every node and storage unit already in the store
fn stored_locations(store: &Store) -> SdiResult<HashMap<String, Point>> {
    let mut stored: HashMap<String, Point> = store
        .nodes()?
        .into_iter()
        .map(|n| (n.name, n.location))
        .collect();
    stored.extend(store.storage_units()?.into_iter().map(|s| (s.name, s.location)));
    Ok(stored)
}

/// Give links whose endpoints were imported earlier a geometry from the
/// stored node locations
fn snap_to_stored_nodes(network: &mut Network, stored: &HashMap<String, Point>) {
    for idx in 0..network.links.len() {
        if network.links[idx].geometry.vertices.len() >= 2 {
            continue;
        }
        let locate = |node: Option<&str>| {
            node.and_then(|n| network.node_location(n).or_else(|| stored.get(n).copied()))
        };
        let link = &network.links[idx];
        let start = locate(link.inlet_node.as_deref());
        let end = locate(link.outlet_node.as_deref());
        network.links[idx].geometry.snap_ends(start, end);
    }
}

/// Read an INP file and persist it; unreadable files are malformed documents
pub fn import_inp_file(
    path: impl AsRef<Path>,
    store: &mut Store,
    grid: Option<&dyn GridService>,
    config: &ImportConfig,
) -> SdiResult<ImportReport> {
    let path = path.as_ref();
    let text = read_text(path)?;
    info!(path = %path.display(), "importing INP");
    import_inp(&text, store, grid, config)
}
