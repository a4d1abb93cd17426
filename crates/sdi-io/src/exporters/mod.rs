//! Exporters: the INP writer and the storm-drain `.DAT` files consumed by
//! the 2-D simulator.
//!
//! Every exporter renders its output fully in memory and then writes it
//! through [`write_atomically`], so a failed export never leaves a partial
//! file behind.
//!
//! ## Usage
//!
//! ```no_run
//! use sdi_core::config::ExportConfig;
//! use sdi_io::exporters::export_inp;
//! use sdi_store::Store;
//!
//! let store = Store::open("project.sqlite")?;
//! let report = export_inp(&store, "network.inp", &ExportConfig::default())?;
//! println!("{} rows written", report.total_rows());
//! # Ok::<(), sdi_core::SdiError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use sdi_core::{Diagnostics, SdiResult};
use serde::Serialize;
use tracing::debug;

pub mod dat;
pub mod inp;

pub use dat::{export_dat_files, write_swmmflo, write_swmmflort, write_swmmoutf};
pub use inp::{export_inp, write_inp};

/// Rows written for one section or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCount {
    pub name: String,
    pub rows: usize,
}

/// What an export wrote. Exports never fail on data problems; those are
/// counted here instead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub sections: Vec<SectionCount>,
    /// Link endpoints written as `?`
    pub missing_endpoints: usize,
    pub diagnostics: Diagnostics,
}

impl ExportReport {
    pub(crate) fn count(&mut self, name: &str, rows: usize) {
        self.sections.push(SectionCount {
            name: name.to_string(),
            rows,
        });
    }

    pub fn rows_in(&self, name: &str) -> Option<usize> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| s.rows)
    }

    pub fn total_rows(&self) -> usize {
        self.sections.iter().map(|s| s.rows).sum()
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `contents` to a temporary sibling of `path`, then rename it into
/// place
pub fn write_atomically(path: impl AsRef<Path>, contents: &str) -> SdiResult<()> {
    let path = path.as_ref();
    let tmp = temp_sibling(path);
    let result = fs::write(&tmp, contents).and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = result {
        // the temporary may not exist if the first write failed
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    debug!(path = %path.display(), bytes = contents.len(), "export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.inp");
        write_atomically(&path, "first").unwrap();
        write_atomically(&path, "second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.inp");
        assert!(write_atomically(&path, "text").is_err());
        assert!(!path.exists());
        assert!(!temp_sibling(&path).exists());
    }
}
