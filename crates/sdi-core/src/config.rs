//! Persisted settings for the storm drain interchange.
//!
//! [`SdiConfig`] groups import, export and schematization defaults together
//! with the last-used directories the host's file dialogs start in. It is
//! stored as `config.toml` under the platform configuration directory and
//! supports partial files where unspecified values use defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SdiError, SdiResult};

/// How an import treats rows already in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Truncate every user storm drain table first
    Replace,
    /// Update rows by name and insert the rest
    #[default]
    Merge,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SdiConfig {
    pub import: ImportConfig,
    pub export: ExportConfig,
    pub schematize: SchematizeConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub mode: ImportMode,

    /// Drop nodes that have no `[COORDINATES]` row.
    pub drop_nodes_without_coordinates: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            mode: ImportMode::Merge,
            drop_nodes_without_coordinates: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Width of name columns.
    pub name_width: usize,

    /// Width of numeric columns.
    pub number_width: usize,

    /// Width of enumerated-value columns.
    pub enum_width: usize,

    /// Write a default `[OPTIONS]`/`[REPORT]` block when none was imported.
    pub write_default_options: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            name_width: 16,
            number_width: 10,
            enum_width: 16,
            write_default_options: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchematizeConfig {
    /// Search radius when snapping link ends to nodes.
    pub routing_tolerance: f64,

    /// Segments per quarter circle of the search buffer.
    pub buffer_segments: u32,

    /// Grid cell size hint, used when the grid does not report one.
    pub cell_size: Option<f64>,
}

impl Default for SchematizeConfig {
    fn default() -> Self {
        Self {
            routing_tolerance: 5.0,
            buffer_segments: 5,
            cell_size: None,
        }
    }
}

/// Which file dialog a remembered directory belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirKind {
    Inp,
    RatingTables,
    Culverts,
    PumpCurves,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub last_inp_dir: Option<PathBuf>,
    pub last_rating_dir: Option<PathBuf>,
    pub last_culvert_dir: Option<PathBuf>,
    pub last_pump_curve_dir: Option<PathBuf>,

    /// Recently opened INP files, newest first.
    pub recent_files: Vec<PathBuf>,

    /// Maximum entries in recent files list.
    pub max_recent: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            last_inp_dir: None,
            last_rating_dir: None,
            last_culvert_dir: None,
            last_pump_curve_dir: None,
            recent_files: Vec::new(),
            max_recent: 10,
        }
    }
}

impl SdiConfig {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sdi"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load from the default location, or defaults when there is no file.
    pub fn load_or_default() -> SdiResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> SdiResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> SdiResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Save to the default location.
    pub fn save_default(&self) -> SdiResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| SdiError::Config("could not determine config directory".to_string()))?;
        self.save(&path)
    }

    pub fn remember_dir(&mut self, kind: DirKind, dir: impl Into<PathBuf>) {
        let dir = Some(dir.into());
        match kind {
            DirKind::Inp => self.paths.last_inp_dir = dir,
            DirKind::RatingTables => self.paths.last_rating_dir = dir,
            DirKind::Culverts => self.paths.last_culvert_dir = dir,
            DirKind::PumpCurves => self.paths.last_pump_curve_dir = dir,
        }
    }

    pub fn last_dir(&self, kind: DirKind) -> Option<&Path> {
        match kind {
            DirKind::Inp => self.paths.last_inp_dir.as_deref(),
            DirKind::RatingTables => self.paths.last_rating_dir.as_deref(),
            DirKind::Culverts => self.paths.last_culvert_dir.as_deref(),
            DirKind::PumpCurves => self.paths.last_pump_curve_dir.as_deref(),
        }
    }

    /// Add an INP file to the recent list and remember its directory.
    pub fn add_recent_file(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            self.paths.last_inp_dir = Some(parent.to_path_buf());
        }
        self.paths.recent_files.retain(|p| p != &path);
        self.paths.recent_files.insert(0, path);
        self.paths.recent_files.truncate(self.paths.max_recent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = SdiConfig::default();
        assert_eq!(config.import.mode, ImportMode::Merge);
        assert_eq!(config.export.name_width, 16);
        assert_eq!(config.schematize.routing_tolerance, 5.0);
        assert_eq!(config.schematize.buffer_segments, 5);
        assert_eq!(config.paths.max_recent, 10);
    }

    #[test]
    fn test_partial_config_parsing() {
        let toml = r#"
            [import]
            mode = "replace"

            [schematize]
            routing_tolerance = 2.5
        "#;

        let config: SdiConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.import.mode, ImportMode::Replace);
        assert_eq!(config.schematize.routing_tolerance, 2.5);
        assert!(config.import.drop_nodes_without_coordinates);
        assert_eq!(config.export.number_width, 10);
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();

        let mut config = SdiConfig::default();
        config.remember_dir(DirKind::RatingTables, "/data/rt");
        config.save(file.path()).unwrap();

        let loaded = SdiConfig::load(file.path()).unwrap();
        assert_eq!(loaded.last_dir(DirKind::RatingTables), Some(Path::new("/data/rt")));
    }

    #[test]
    fn test_recent_files_dedup_and_trim() {
        let mut config = SdiConfig::default();
        config.paths.max_recent = 2;

        config.add_recent_file(PathBuf::from("/a/one.inp"));
        config.add_recent_file(PathBuf::from("/a/two.inp"));
        config.add_recent_file(PathBuf::from("/b/one.inp"));
        config.add_recent_file(PathBuf::from("/a/two.inp"));

        assert_eq!(config.paths.recent_files.len(), 2);
        assert_eq!(config.paths.recent_files[0], PathBuf::from("/a/two.inp"));
        assert_eq!(config.last_dir(DirKind::Inp), Some(Path::new("/a")));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err: SdiError = toml::from_str::<SdiConfig>("[import]\nmode = 3")
            .unwrap_err()
            .into();
        assert!(matches!(err, SdiError::Config(_)));
    }
}
