//! Node entities: junctions, inlets, outfalls and storage units.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::CellId;

/// Hydraulic attributes shared by junctions and inlets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Junction {
    pub max_depth: f64,
    pub init_depth: f64,
    pub surcharge_depth: f64,
    pub ponded_area: f64,
}

/// Inlet drain types understood by the simulator.
///
/// Type 4 inlets are driven by a rating table (or, failing that, a culvert
/// equation); the others use the geometric parameters on [`Inlet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrainType {
    CurbOpeningAtGrade = 1,
    CurbOpeningSag = 2,
    GratingSag = 3,
    RatingTable = 4,
    Manhole = 5,
}

impl DrainType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DrainType::CurbOpeningAtGrade),
            2 => Some(DrainType::CurbOpeningSag),
            3 => Some(DrainType::GratingSag),
            4 => Some(DrainType::RatingTable),
            5 => Some(DrainType::Manhole),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        *self as i64
    }
}

/// Surface-inlet parameters carried on top of the junction attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inlet {
    pub drain_type: Option<DrainType>,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weir_coeff: f64,
    pub feature: i64,
    pub curb_height: f64,
    /// Name of the rating table assigned to this inlet
    pub rating_table: Option<String>,
}

/// Outfall boundary condition, with the data each type requires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutfallBoundary {
    Free,
    Normal,
    /// Fixed water stage
    Fixed(f64),
    /// Stage follows a tidal curve
    TidalCurve(String),
    /// Stage follows a time series
    TimeSeries(String),
}

impl Default for OutfallBoundary {
    fn default() -> Self {
        OutfallBoundary::Free
    }
}

/// Outfall type tag without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutfallType {
    Free,
    Normal,
    Fixed,
    TidalCurve,
    TimeSeries,
}

impl OutfallType {
    /// Normalize the INP type token.
    ///
    /// Matching is by prefix so that both `TIDAL` and `TIDAL_CURVE`, and both
    /// `TIMESERIES` and `TIME_SERIES`, are accepted.
    pub fn from_inp(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        if upper.starts_with("TIDAL") {
            Some(OutfallType::TidalCurve)
        } else if upper.starts_with("TIME") {
            Some(OutfallType::TimeSeries)
        } else if upper == "FIXED" {
            Some(OutfallType::Fixed)
        } else if upper == "FREE" {
            Some(OutfallType::Free)
        } else if upper == "NORMAL" {
            Some(OutfallType::Normal)
        } else {
            None
        }
    }

    /// Token written back to INP files
    pub fn as_inp(&self) -> &'static str {
        match self {
            OutfallType::Free => "FREE",
            OutfallType::Normal => "NORMAL",
            OutfallType::Fixed => "FIXED",
            OutfallType::TidalCurve => "TIDAL",
            OutfallType::TimeSeries => "TIMESERIES",
        }
    }

    /// Canonical stored name
    pub fn as_str(&self) -> &'static str {
        match self {
            OutfallType::Free => "FREE",
            OutfallType::Normal => "NORMAL",
            OutfallType::Fixed => "FIXED",
            OutfallType::TidalCurve => "TIDAL_CURVE",
            OutfallType::TimeSeries => "TIME_SERIES",
        }
    }
}

impl OutfallBoundary {
    pub fn outfall_type(&self) -> OutfallType {
        match self {
            OutfallBoundary::Free => OutfallType::Free,
            OutfallBoundary::Normal => OutfallType::Normal,
            OutfallBoundary::Fixed(_) => OutfallType::Fixed,
            OutfallBoundary::TidalCurve(_) => OutfallType::TidalCurve,
            OutfallBoundary::TimeSeries(_) => OutfallType::TimeSeries,
        }
    }

    /// Curve or series referenced by the boundary, if any
    pub fn reference(&self) -> Option<&str> {
        match self {
            OutfallBoundary::TidalCurve(name) | OutfallBoundary::TimeSeries(name) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    pub fn fixed_stage(&self) -> Option<f64> {
        match self {
            OutfallBoundary::Fixed(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Rebuild a boundary from its stored parts
    pub fn from_parts(kind: OutfallType, stage: Option<f64>, reference: Option<String>) -> Self {
        match kind {
            OutfallType::Free => OutfallBoundary::Free,
            OutfallType::Normal => OutfallBoundary::Normal,
            OutfallType::Fixed => OutfallBoundary::Fixed(stage.unwrap_or(0.0)),
            OutfallType::TidalCurve => OutfallBoundary::TidalCurve(reference.unwrap_or_default()),
            OutfallType::TimeSeries => OutfallBoundary::TimeSeries(reference.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outfall {
    pub boundary: OutfallBoundary,
    pub flap_gate: bool,
    /// Whether the outfall may discharge back to the surface grid
    pub allow_discharge: bool,
}

impl Default for Outfall {
    fn default() -> Self {
        Self {
            boundary: OutfallBoundary::Free,
            flap_gate: false,
            allow_discharge: true,
        }
    }
}

/// Node classification with the attributes each class carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Junction(Junction),
    Inlet { junction: Junction, inlet: Inlet },
    Outfall(Outfall),
}

/// Stored discriminator for [`NodeKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    Junction,
    Inlet,
    Outfall,
}

impl NodeClass {
    pub fn code(&self) -> &'static str {
        match self {
            NodeClass::Junction => "J",
            NodeClass::Inlet => "I",
            NodeClass::Outfall => "O",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "J" => Some(NodeClass::Junction),
            "I" => Some(NodeClass::Inlet),
            "O" => Some(NodeClass::Outfall),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub location: Point,
    pub invert_elev: f64,
    /// Grid cell containing the node, None when outside the domain or not yet schematized
    pub grid: Option<CellId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn junction(name: impl Into<String>, location: Point, invert_elev: f64, junction: Junction) -> Self {
        Self {
            name: name.into(),
            location,
            invert_elev,
            grid: None,
            kind: NodeKind::Junction(junction),
        }
    }

    pub fn outfall(name: impl Into<String>, location: Point, invert_elev: f64, outfall: Outfall) -> Self {
        Self {
            name: name.into(),
            location,
            invert_elev,
            grid: None,
            kind: NodeKind::Outfall(outfall),
        }
    }

    pub fn class(&self) -> NodeClass {
        match self.kind {
            NodeKind::Junction(_) => NodeClass::Junction,
            NodeKind::Inlet { .. } => NodeClass::Inlet,
            NodeKind::Outfall(_) => NodeClass::Outfall,
        }
    }

    /// Junction attributes for junctions and inlets
    pub fn junction_attrs(&self) -> Option<&Junction> {
        match &self.kind {
            NodeKind::Junction(j) | NodeKind::Inlet { junction: j, .. } => Some(j),
            NodeKind::Outfall(_) => None,
        }
    }

    pub fn inlet(&self) -> Option<&Inlet> {
        match &self.kind {
            NodeKind::Inlet { inlet, .. } => Some(inlet),
            _ => None,
        }
    }

    pub fn inlet_mut(&mut self) -> Option<&mut Inlet> {
        match &mut self.kind {
            NodeKind::Inlet { inlet, .. } => Some(inlet),
            _ => None,
        }
    }

    pub fn outfall_attrs(&self) -> Option<&Outfall> {
        match &self.kind {
            NodeKind::Outfall(o) => Some(o),
            _ => None,
        }
    }

    /// Rim elevation = invert + max depth (junctions and inlets only)
    pub fn rim_elev(&self) -> Option<f64> {
        self.junction_attrs().map(|j| self.invert_elev + j.max_depth)
    }

    /// Turn a junction into an inlet, keeping its hydraulic attributes.
    /// Nodes of other classes are left unchanged.
    pub fn promote_to_inlet(&mut self) {
        if let NodeKind::Junction(junction) = &self.kind {
            self.kind = NodeKind::Inlet {
                junction: junction.clone(),
                inlet: Inlet::default(),
            };
        }
    }
}

/// Storage unit geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StorageShape {
    /// Area = a1 * depth^a2 + a0
    Functional { a1: f64, a2: f64, a0: f64 },
    /// Area taken from a storage curve
    Tabular { curve: String },
}

/// Green-Ampt seepage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreenAmpt {
    pub suction_head: f64,
    pub conductivity: f64,
    pub initial_deficit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub name: String,
    pub location: Point,
    pub invert_elev: f64,
    pub max_depth: f64,
    pub init_depth: f64,
    pub shape: StorageShape,
    pub surcharge_depth: f64,
    pub evap_factor: f64,
    pub infiltration: Option<GreenAmpt>,
    pub grid: Option<CellId>,
}

impl StorageUnit {
    pub fn curve(&self) -> Option<&str> {
        match &self.shape {
            StorageShape::Tabular { curve } => Some(curve),
            StorageShape::Functional { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outfall_type_normalization() {
        assert_eq!(OutfallType::from_inp("TIDAL"), Some(OutfallType::TidalCurve));
        assert_eq!(OutfallType::from_inp("tidal_curve"), Some(OutfallType::TidalCurve));
        assert_eq!(OutfallType::from_inp("TIME"), Some(OutfallType::TimeSeries));
        assert_eq!(OutfallType::from_inp("TIMESERIES"), Some(OutfallType::TimeSeries));
        assert_eq!(OutfallType::from_inp("FIXED"), Some(OutfallType::Fixed));
        assert_eq!(OutfallType::from_inp("free"), Some(OutfallType::Free));
        assert_eq!(OutfallType::from_inp("DRY"), None);

        assert_eq!(OutfallType::TidalCurve.as_inp(), "TIDAL");
        assert_eq!(OutfallType::TimeSeries.as_inp(), "TIMESERIES");
    }

    #[test]
    fn test_rim_elevation() {
        let node = Node::junction(
            "J1",
            Point::new(0.0, 0.0),
            100.0,
            Junction {
                max_depth: 5.0,
                ..Junction::default()
            },
        );
        assert_eq!(node.rim_elev(), Some(105.0));

        let outfall = Node::outfall("O1", Point::new(0.0, 0.0), 95.0, Outfall::default());
        assert_eq!(outfall.rim_elev(), None);
    }

    #[test]
    fn test_promote_to_inlet_keeps_depths() {
        let mut node = Node::junction(
            "J1",
            Point::new(1.0, 2.0),
            10.0,
            Junction {
                max_depth: 3.0,
                init_depth: 0.5,
                ..Junction::default()
            },
        );
        node.promote_to_inlet();
        assert_eq!(node.class(), NodeClass::Inlet);
        assert_eq!(node.junction_attrs().map(|j| j.max_depth), Some(3.0));
        assert!(node.inlet().is_some());
    }

    #[test]
    fn test_boundary_parts_roundtrip() {
        let b = OutfallBoundary::TidalCurve("TC1".into());
        let rebuilt = OutfallBoundary::from_parts(
            b.outfall_type(),
            b.fixed_stage(),
            b.reference().map(String::from),
        );
        assert_eq!(rebuilt, b);
        assert_eq!(DrainType::from_code(4), Some(DrainType::RatingTable));
        assert_eq!(DrainType::from_code(6), None);
    }
}
