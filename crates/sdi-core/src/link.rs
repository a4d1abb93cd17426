//! Link entities: conduits, pumps, orifices and weirs, plus cross-sections.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Polyline;

/// Cross-section shapes of the INP vocabulary.
///
/// Shapes not in the list are carried verbatim in [`XSectionShape::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XSectionShape {
    Circular,
    ForceMain,
    FilledCircular,
    RectClosed,
    RectOpen,
    Trapezoidal,
    Triangular,
    HorizEllipse,
    VertEllipse,
    Arch,
    Parabolic,
    Power,
    RectTriangular,
    RectRound,
    ModBasketHandle,
    Egg,
    Horseshoe,
    Gothic,
    Catenary,
    SemiElliptical,
    BasketHandle,
    SemiCircular,
    Dummy,
    Custom,
    Irregular,
    Other(String),
}

impl XSectionShape {
    const TABLE: &'static [(&'static str, XSectionShape)] = &[
        ("CIRCULAR", XSectionShape::Circular),
        ("FORCE_MAIN", XSectionShape::ForceMain),
        ("FILLED_CIRCULAR", XSectionShape::FilledCircular),
        ("RECT_CLOSED", XSectionShape::RectClosed),
        ("RECT_OPEN", XSectionShape::RectOpen),
        ("TRAPEZOIDAL", XSectionShape::Trapezoidal),
        ("TRIANGULAR", XSectionShape::Triangular),
        ("HORIZ_ELLIPSE", XSectionShape::HorizEllipse),
        ("VERT_ELLIPSE", XSectionShape::VertEllipse),
        ("ARCH", XSectionShape::Arch),
        ("PARABOLIC", XSectionShape::Parabolic),
        ("POWER", XSectionShape::Power),
        ("RECT_TRIANGULAR", XSectionShape::RectTriangular),
        ("RECT_ROUND", XSectionShape::RectRound),
        ("MODBASKETHANDLE", XSectionShape::ModBasketHandle),
        ("EGG", XSectionShape::Egg),
        ("HORSESHOE", XSectionShape::Horseshoe),
        ("GOTHIC", XSectionShape::Gothic),
        ("CATENARY", XSectionShape::Catenary),
        ("SEMIELLIPTICAL", XSectionShape::SemiElliptical),
        ("BASKETHANDLE", XSectionShape::BasketHandle),
        ("SEMICIRCULAR", XSectionShape::SemiCircular),
        ("DUMMY", XSectionShape::Dummy),
        ("CUSTOM", XSectionShape::Custom),
        ("IRREGULAR", XSectionShape::Irregular),
    ];

    pub fn from_inp(token: &str) -> Self {
        let upper = token.trim().to_ascii_uppercase();
        Self::TABLE
            .iter()
            .find(|(tag, _)| *tag == upper)
            .map(|(_, shape)| shape.clone())
            .unwrap_or(XSectionShape::Other(token.trim().to_string()))
    }

    pub fn as_inp(&self) -> &str {
        if let XSectionShape::Other(text) = self {
            return text;
        }
        Self::TABLE
            .iter()
            .find(|(_, shape)| shape == self)
            .map(|(tag, _)| *tag)
            .unwrap_or("DUMMY")
    }

    /// Shapes whose second token is a curve or transect name instead of a depth
    pub fn takes_reference(&self) -> bool {
        matches!(self, XSectionShape::Custom | XSectionShape::Irregular)
    }
}

impl fmt::Display for XSectionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_inp())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossSection {
    pub shape: XSectionShape,
    /// geom1..geom4; geom1 is the full depth
    pub geom: [f64; 4],
    pub barrels: u32,
    /// Culvert inlet geometry code, zero when not a culvert
    pub culvert_code: u32,
    /// Shape curve (CUSTOM) or transect (IRREGULAR) name
    pub reference: Option<String>,
}

impl CrossSection {
    pub fn new(shape: XSectionShape, geom: [f64; 4]) -> Self {
        Self {
            shape,
            geom,
            barrels: 1,
            culvert_code: 0,
            reference: None,
        }
    }

    pub fn depth(&self) -> f64 {
        self.geom[0]
    }
}

impl Default for CrossSection {
    fn default() -> Self {
        Self::new(XSectionShape::Circular, [0.0; 4])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Losses {
    pub inlet: f64,
    pub outlet: f64,
    pub average: f64,
    pub flap_gate: bool,
}

impl Losses {
    pub fn is_zero(&self) -> bool {
        self.inlet == 0.0 && self.outlet == 0.0 && self.average == 0.0 && !self.flap_gate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conduit {
    pub length: f64,
    pub roughness: f64,
    pub inlet_offset: f64,
    pub outlet_offset: f64,
    pub init_flow: f64,
    pub max_flow: f64,
    pub losses: Losses,
    pub xsection: Option<CrossSection>,
}

impl Default for Conduit {
    fn default() -> Self {
        Self {
            length: 0.0,
            roughness: 0.01,
            inlet_offset: 0.0,
            outlet_offset: 0.0,
            init_flow: 0.0,
            max_flow: 0.0,
            losses: Losses::default(),
            xsection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PumpStatus {
    On,
    Off,
    /// Unrecognized status text, kept until export
    Unknown(String),
}

impl PumpStatus {
    pub fn from_inp(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "ON" => PumpStatus::On,
            "OFF" => PumpStatus::Off,
            _ => PumpStatus::Unknown(token.trim().to_string()),
        }
    }

    /// Text stored in the database
    pub fn as_stored(&self) -> &str {
        match self {
            PumpStatus::On => "ON",
            PumpStatus::Off => "OFF",
            PumpStatus::Unknown(text) => text,
        }
    }
}

impl Default for PumpStatus {
    fn default() -> Self {
        PumpStatus::Off
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pump {
    pub curve: String,
    pub status: PumpStatus,
    pub startup_depth: f64,
    pub shutoff_depth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrificeType {
    Side,
    Bottom,
}

impl OrificeType {
    pub fn from_inp(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "SIDE" => Some(OrificeType::Side),
            "BOTTOM" => Some(OrificeType::Bottom),
            _ => None,
        }
    }

    pub fn as_inp(&self) -> &'static str {
        match self {
            OrificeType::Side => "SIDE",
            OrificeType::Bottom => "BOTTOM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orifice {
    pub orifice_type: OrificeType,
    pub crest_height: f64,
    pub discharge_coeff: f64,
    pub flap_gate: bool,
    pub open_close_time: f64,
    pub xsection: Option<CrossSection>,
}

impl Default for Orifice {
    fn default() -> Self {
        Self {
            orifice_type: OrificeType::Side,
            crest_height: 0.0,
            discharge_coeff: 0.0,
            flap_gate: false,
            open_close_time: 0.0,
            xsection: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeirType {
    Transverse,
    Sideflow,
    VNotch,
    Trapezoidal,
}

impl WeirType {
    pub fn from_inp(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "TRANSVERSE" => Some(WeirType::Transverse),
            "SIDEFLOW" => Some(WeirType::Sideflow),
            "V-NOTCH" | "V_NOTCH" | "VNOTCH" => Some(WeirType::VNotch),
            "TRAPEZOIDAL" => Some(WeirType::Trapezoidal),
            _ => None,
        }
    }

    pub fn as_inp(&self) -> &'static str {
        match self {
            WeirType::Transverse => "TRANSVERSE",
            WeirType::Sideflow => "SIDEFLOW",
            WeirType::VNotch => "V-NOTCH",
            WeirType::Trapezoidal => "TRAPEZOIDAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weir {
    pub weir_type: WeirType,
    pub crest_height: f64,
    pub discharge_coeff: f64,
    pub flap_gate: bool,
    pub end_contractions: u8,
    pub end_coeff: f64,
    pub surcharge: bool,
    pub xsection: Option<CrossSection>,
}

impl Weir {
    /// Side slope of a trapezoidal weir, read from cross-section geom3
    pub fn side_slope(&self) -> f64 {
        match (&self.weir_type, &self.xsection) {
            (WeirType::Trapezoidal, Some(xs)) => xs.geom[2],
            _ => 0.0,
        }
    }
}

impl Default for Weir {
    fn default() -> Self {
        Self {
            weir_type: WeirType::Transverse,
            crest_height: 0.0,
            discharge_coeff: 0.0,
            flap_gate: false,
            end_contractions: 0,
            end_coeff: 0.0,
            surcharge: true,
            xsection: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkKind {
    Conduit(Conduit),
    Pump(Pump),
    Orifice(Orifice),
    Weir(Weir),
}

/// Stored discriminator for [`LinkKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkClass {
    Conduit,
    Pump,
    Orifice,
    Weir,
}

impl LinkClass {
    pub const ALL: [LinkClass; 4] = [
        LinkClass::Conduit,
        LinkClass::Pump,
        LinkClass::Orifice,
        LinkClass::Weir,
    ];

    pub fn entity_kind(&self) -> crate::EntityKind {
        match self {
            LinkClass::Conduit => crate::EntityKind::Conduit,
            LinkClass::Pump => crate::EntityKind::Pump,
            LinkClass::Orifice => crate::EntityKind::Orifice,
            LinkClass::Weir => crate::EntityKind::Weir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub inlet_node: Option<String>,
    pub outlet_node: Option<String>,
    pub geometry: Polyline,
    /// Set by import validation when an endpoint lies outside the grid
    pub outside_domain: bool,
    pub kind: LinkKind,
}

impl Link {
    pub fn new(
        name: impl Into<String>,
        inlet_node: impl Into<String>,
        outlet_node: impl Into<String>,
        kind: LinkKind,
    ) -> Self {
        Self {
            name: name.into(),
            inlet_node: Some(inlet_node.into()),
            outlet_node: Some(outlet_node.into()),
            geometry: Polyline::default(),
            outside_domain: false,
            kind,
        }
    }

    pub fn class(&self) -> LinkClass {
        match self.kind {
            LinkKind::Conduit(_) => LinkClass::Conduit,
            LinkKind::Pump(_) => LinkClass::Pump,
            LinkKind::Orifice(_) => LinkClass::Orifice,
            LinkKind::Weir(_) => LinkClass::Weir,
        }
    }

    pub fn touches(&self, node: &str) -> bool {
        self.inlet_node.as_deref() == Some(node) || self.outlet_node.as_deref() == Some(node)
    }

    pub fn has_endpoints(&self) -> bool {
        self.inlet_node.is_some() && self.outlet_node.is_some()
    }

    pub fn xsection(&self) -> Option<&CrossSection> {
        match &self.kind {
            LinkKind::Conduit(c) => c.xsection.as_ref(),
            LinkKind::Orifice(o) => o.xsection.as_ref(),
            LinkKind::Weir(w) => w.xsection.as_ref(),
            LinkKind::Pump(_) => None,
        }
    }

    /// Attach a cross-section; returns false for pumps, which carry none
    pub fn set_xsection(&mut self, xsection: CrossSection) -> bool {
        match &mut self.kind {
            LinkKind::Conduit(c) => c.xsection = Some(xsection),
            LinkKind::Orifice(o) => o.xsection = Some(xsection),
            LinkKind::Weir(w) => w.xsection = Some(xsection),
            LinkKind::Pump(_) => return false,
        }
        true
    }

    pub fn conduit(&self) -> Option<&Conduit> {
        match &self.kind {
            LinkKind::Conduit(c) => Some(c),
            _ => None,
        }
    }

    pub fn conduit_mut(&mut self) -> Option<&mut Conduit> {
        match &mut self.kind {
            LinkKind::Conduit(c) => Some(c),
            _ => None,
        }
    }

    pub fn pump(&self) -> Option<&Pump> {
        match &self.kind {
            LinkKind::Pump(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_vocabulary() {
        assert_eq!(XSectionShape::from_inp("circular"), XSectionShape::Circular);
        assert_eq!(XSectionShape::from_inp("RECT_CLOSED").as_inp(), "RECT_CLOSED");
        let other = XSectionShape::from_inp("STREET");
        assert_eq!(other, XSectionShape::Other("STREET".into()));
        assert_eq!(other.as_inp(), "STREET");
        assert!(XSectionShape::Irregular.takes_reference());
    }

    #[test]
    fn test_pump_status_keeps_unknown_text() {
        assert_eq!(PumpStatus::from_inp("on"), PumpStatus::On);
        assert_eq!(PumpStatus::from_inp("IDLE").as_stored(), "IDLE");
    }

    #[test]
    fn test_weir_side_slope_only_for_trapezoidal() {
        let mut weir = Weir {
            xsection: Some(CrossSection::new(XSectionShape::Trapezoidal, [1.0, 2.0, 0.5, 0.5])),
            ..Weir::default()
        };
        assert_eq!(weir.side_slope(), 0.0);
        weir.weir_type = WeirType::Trapezoidal;
        assert_eq!(weir.side_slope(), 0.5);
        assert_eq!(WeirType::from_inp("v-notch"), Some(WeirType::VNotch));
    }

    #[test]
    fn test_pump_refuses_xsection() {
        let mut link = Link::new("P1", "A", "B", LinkKind::Pump(Pump::default()));
        assert!(!link.set_xsection(CrossSection::default()));
        assert!(link.xsection().is_none());

        let mut conduit = Link::new("C1", "A", "B", LinkKind::Conduit(Conduit::default()));
        assert!(conduit.set_xsection(CrossSection::default()));
        assert_eq!(conduit.xsection().map(|x| x.barrels), Some(1));
        assert!(conduit.touches("B"));
    }
}
