//! Tabular entities: curves, patterns, time series, inflows, rating tables
//! and culvert equations, plus preserved INP sections.

use serde::{Deserialize, Serialize};

use crate::CellId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    Pump1,
    Pump2,
    Pump3,
    Pump4,
    Tidal,
    Storage,
    Rating,
    Diversion,
    Shape,
    Control,
}

impl CurveType {
    pub fn from_inp(token: &str) -> Option<Self> {
        let t = match token.trim().to_ascii_uppercase().as_str() {
            "PUMP1" => CurveType::Pump1,
            "PUMP2" => CurveType::Pump2,
            "PUMP3" => CurveType::Pump3,
            "PUMP4" => CurveType::Pump4,
            "TIDAL" => CurveType::Tidal,
            "STORAGE" => CurveType::Storage,
            "RATING" => CurveType::Rating,
            "DIVERSION" => CurveType::Diversion,
            "SHAPE" => CurveType::Shape,
            "CONTROL" => CurveType::Control,
            _ => return None,
        };
        Some(t)
    }

    pub fn as_inp(&self) -> &'static str {
        match self {
            CurveType::Pump1 => "Pump1",
            CurveType::Pump2 => "Pump2",
            CurveType::Pump3 => "Pump3",
            CurveType::Pump4 => "Pump4",
            CurveType::Tidal => "Tidal",
            CurveType::Storage => "Storage",
            CurveType::Rating => "Rating",
            CurveType::Diversion => "Diversion",
            CurveType::Shape => "Shape",
            CurveType::Control => "Control",
        }
    }

    pub fn is_pump(&self) -> bool {
        matches!(
            self,
            CurveType::Pump1 | CurveType::Pump2 | CurveType::Pump3 | CurveType::Pump4
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub name: String,
    pub curve_type: CurveType,
    pub description: Option<String>,
    pub points: Vec<(f64, f64)>,
}

impl Curve {
    pub fn new(name: impl Into<String>, curve_type: CurveType) -> Self {
        Self {
            name: name.into(),
            curve_type,
            description: None,
            points: Vec::new(),
        }
    }

    /// Points ordered by x, the order they are written in
    pub fn sorted_points(&self) -> Vec<(f64, f64)> {
        let mut points = self.points.clone();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternType {
    Hourly,
    Monthly,
    Daily,
    Weekend,
}

impl PatternType {
    pub fn from_inp(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "HOURLY" => Some(PatternType::Hourly),
            "MONTHLY" => Some(PatternType::Monthly),
            "DAILY" => Some(PatternType::Daily),
            "WEEKEND" => Some(PatternType::Weekend),
            _ => None,
        }
    }

    pub fn as_inp(&self) -> &'static str {
        match self {
            PatternType::Hourly => "HOURLY",
            PatternType::Monthly => "MONTHLY",
            PatternType::Daily => "DAILY",
            PatternType::Weekend => "WEEKEND",
        }
    }
}

/// Number of multipliers in a canonical hourly pattern
pub const HOURLY_PATTERN_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub pattern_type: PatternType,
    pub description: Option<String>,
    pub multipliers: Vec<f64>,
}

impl Pattern {
    /// Rewrite the pattern as HOURLY with exactly 24 multipliers.
    ///
    /// Short patterns are padded with 1.0 and long ones truncated. Returns
    /// true when anything had to change.
    pub fn canonicalize(&mut self) -> bool {
        let changed =
            self.pattern_type != PatternType::Hourly || self.multipliers.len() != HOURLY_PATTERN_LEN;
        self.pattern_type = PatternType::Hourly;
        self.multipliers.resize(HOURLY_PATTERN_LEN, 1.0);
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    /// Calendar date text as written in the file; None when the row has none
    pub date: Option<String>,
    pub time: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeSeriesSource {
    /// External data file; its contents are not read
    File(String),
    Inline(Vec<TimeSeriesRow>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub description: String,
    pub source: TimeSeriesSource,
}

impl TimeSeries {
    pub fn inline(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            source: TimeSeriesSource::Inline(Vec::new()),
        }
    }

    pub fn file_path(&self) -> Option<&str> {
        match &self.source {
            TimeSeriesSource::File(path) => Some(path),
            TimeSeriesSource::Inline(_) => None,
        }
    }

    pub fn rows(&self) -> &[TimeSeriesRow] {
        match &self.source {
            TimeSeriesSource::Inline(rows) => rows,
            TimeSeriesSource::File(_) => &[],
        }
    }
}

/// External inflow assigned to a node (at most one per node)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inflow {
    pub node: String,
    pub constituent: String,
    pub time_series: Option<String>,
    pub inflow_type: String,
    pub mfactor: f64,
    pub sfactor: f64,
    pub baseline: f64,
    pub pattern: Option<String>,
}

impl Inflow {
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            constituent: "FLOW".to_string(),
            time_series: None,
            inflow_type: "FLOW".to_string(),
            mfactor: 1.0,
            sfactor: 1.0,
            baseline: 0.0,
            pattern: None,
        }
    }
}

/// Depth/discharge table driving a type-4 inlet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTable {
    pub name: String,
    pub grid: Option<CellId>,
    pub rows: Vec<(f64, f64)>,
}

impl RatingTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grid: None,
            rows: Vec::new(),
        }
    }
}

/// Culvert equation for a type-4 inlet that does not use a rating table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Culvert {
    pub name: String,
    pub grid: Option<CellId>,
    pub diameter: f64,
    /// Culvert control type code
    pub typec: i64,
    /// Entrance type code
    pub typeen: i64,
    pub base_width: f64,
    pub barrels: u32,
    pub manning_n: f64,
    pub entrance_loss: f64,
}

impl Default for Culvert {
    fn default() -> Self {
        Self {
            name: String::new(),
            grid: None,
            diameter: 0.0,
            typec: 1,
            typeen: 1,
            base_width: 0.0,
            barrels: 1,
            manning_n: 0.0,
            entrance_loss: 0.0,
        }
    }
}

/// An INP section the core does not interpret, kept for pass-through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSection {
    pub name: String,
    pub lines: Vec<String>,
}

impl RawSection {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
