//! # sdi-io: INP Interchange and Storm Drain Files
//!
//! Translation between the section-oriented INP text format and the
//! relational network kept by [`sdi_store::Store`], plus the companion files
//! and `.DAT` outputs of the storm-drain workflow.
//!
//! ## Design Philosophy
//!
//! **Error Recovery**: a row that cannot be read is reported and skipped; the
//! rest of the document still imports. Only text with no section headers at
//! all is rejected.
//!
//! **Faithful Roundtrips**: sections the model does not interpret are kept
//! verbatim and written back, and exported rows use the column layout of
//! canonical INP files, so `import(export(N))` reproduces `N`.
//!
//! **Atomic Exports**: output is rendered in memory and renamed into place,
//! so a failed export leaves no file.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdi_io::importers::parse_inp;
//!
//! let text = std::fs::read_to_string("network.inp")?;
//! let result = parse_inp(&text)?;
//! println!("{} nodes, {} links", result.network.nodes.len(), result.network.links.len());
//! for issue in &result.diagnostics.issues {
//!     println!("{issue}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module Overview
//!
//! ### Importers ([`importers`])
//! - [`importers::tokenize`] - split INP text into sections
//! - [`importers::parse_inp`] - build a network without a store
//! - [`importers::import_inp`] - parse, validate and persist
//! - [`importers::companion`] - rating tables, culvert equations, pump curves
//!
//! ### Exporters ([`exporters`])
//! - [`exporters::export_inp`] - write the store's network as INP
//! - [`exporters::export_dat_files`] - `SWMMFLO.DAT`, `SWMMOUTF.DAT`, `SWMMFLORT.DAT`

pub mod exporters;
pub mod importers;

pub use exporters::{export_dat_files, export_inp, write_inp, ExportReport};
pub use importers::{
    import_inp, import_inp_file, parse_inp, parse_inp_with, ImportReport, ImportResult,
};
