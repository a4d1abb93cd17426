//! Record parsers for the node and link sections.
//!
//! Each parser walks the data lines of one section and returns typed
//! records. A row whose mandatory fields cannot be coerced is reported as a
//! skipped row and dropped; missing optional fields default to zero (or the
//! INP default) and never abort the section.

use sdi_core::{
    Conduit, CrossSection, GreenAmpt, ImportDiagnostics, Junction, Link, LinkKind, Losses, Node,
    Orifice, OrificeType, Outfall, OutfallBoundary, OutfallType, Point, Pump, PumpStatus,
    StorageShape, StorageUnit, Weir, WeirType, XSectionShape,
};
use tracing::debug;

use super::tokenizer::{split_fields, InpSection, RawLine};

/// One data line split into fields, with enough context to report on it
pub(crate) struct Row<'a> {
    pub section: &'a str,
    pub line: &'a RawLine,
    pub fields: Vec<String>,
}

impl<'a> Row<'a> {
    pub fn new(section: &'a InpSection, line: &'a RawLine) -> Self {
        Self {
            section: &section.name,
            line,
            fields: split_fields(&line.text),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn text(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    pub fn name(&self) -> Result<&str, String> {
        match self.text(0) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err("missing name".to_string()),
        }
    }

    pub fn required(&self, idx: usize, what: &str) -> Result<&str, String> {
        match self.text(idx) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(format!("missing {what}")),
        }
    }

    pub fn number(&self, idx: usize, what: &str) -> Result<f64, String> {
        let text = self.required(idx, what)?;
        text.parse::<f64>()
            .map_err(|_| format!("invalid {what} '{text}'"))
    }

    /// Optional numeric field; a present but unreadable value is reported
    /// and replaced by `default`
    pub fn number_or(&self, idx: usize, default: f64, diag: &mut ImportDiagnostics) -> f64 {
        match self.text(idx) {
            None | Some("") => default,
            Some(text) => match text.parse::<f64>() {
                Ok(value) => value,
                Err(_) => {
                    self.warn(diag, &format!("field {} '{text}' is not a number, using {default}", idx + 1));
                    default
                }
            },
        }
    }

    /// True when the field reads `YES`
    pub fn yes(&self, idx: usize) -> bool {
        self.text(idx)
            .map(|t| t.eq_ignore_ascii_case("YES"))
            .unwrap_or(false)
    }

    pub fn warn(&self, diag: &mut ImportDiagnostics, message: &str) {
        diag.add_row_warning(self.section, self.line.number, &self.line.text, message);
    }
}

/// Run `parse` over every data line, reporting and dropping rejected rows
pub(crate) fn parse_rows<T>(
    section: &InpSection,
    diag: &mut ImportDiagnostics,
    mut parse: impl FnMut(&Row, &mut ImportDiagnostics) -> Result<T, String>,
) -> Vec<T> {
    let mut records = Vec::new();
    for line in section.data_lines() {
        let row = Row::new(section, line);
        match parse(&row, diag) {
            Ok(record) => records.push(record),
            Err(message) => {
                debug!(section = %section.name, line = line.number, %message, "skipped row");
                diag.add_skipped_row(&section.name, line.number, &line.text, &message);
            }
        }
    }
    records
}

// ============================================================================
// Geometry-only records
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRecord {
    pub name: String,
    pub point: Point,
}

pub fn parse_coordinates(
    section: &InpSection,
    diag: &mut ImportDiagnostics,
) -> Vec<CoordinateRecord> {
    parse_rows(section, diag, |row, _| {
        Ok(CoordinateRecord {
            name: row.name()?.to_string(),
            point: Point::new(row.number(1, "x coordinate")?, row.number(2, "y coordinate")?),
        })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcatchmentRecord {
    pub name: String,
    pub outlet: String,
}

/// Only the outlet is read; it marks the receiving node as an inlet
pub fn parse_subcatchments(
    section: &InpSection,
    diag: &mut ImportDiagnostics,
) -> Vec<SubcatchmentRecord> {
    parse_rows(section, diag, |row, _| {
        Ok(SubcatchmentRecord {
            name: row.name()?.to_string(),
            outlet: row.required(2, "outlet")?.to_string(),
        })
    })
}

// ============================================================================
// Nodes
// ============================================================================

fn unplaced() -> Point {
    Point::new(0.0, 0.0)
}

/// `Name Elev [MaxDepth InitDepth SurDepth Aponded]`
pub fn parse_junctions(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Node> {
    parse_rows(section, diag, |row, diag| {
        let name = row.name()?;
        let invert = row.number(1, "invert elevation")?;
        let junction = Junction {
            max_depth: row.number_or(2, 0.0, diag),
            init_depth: row.number_or(3, 0.0, diag),
            surcharge_depth: row.number_or(4, 0.0, diag),
            ponded_area: row.number_or(5, 0.0, diag),
        };
        Ok(Node::junction(name, unplaced(), invert, junction))
    })
}

/// `Name Elev Type [Stage | Curve | Series] [Gated] [RouteTo]`
///
/// The type token is normalized by prefix and a `YES` anywhere in the row
/// sets the flap gate.
pub fn parse_outfalls(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Node> {
    parse_rows(section, diag, |row, diag| {
        let name = row.name()?;
        let invert = row.number(1, "invert elevation")?;
        let token = row.required(2, "outfall type")?;
        let kind =
            OutfallType::from_inp(token).ok_or_else(|| format!("unknown outfall type '{token}'"))?;
        let boundary = match kind {
            OutfallType::Free => OutfallBoundary::Free,
            OutfallType::Normal => OutfallBoundary::Normal,
            OutfallType::Fixed => OutfallBoundary::Fixed(row.number_or(3, 0.0, diag)),
            OutfallType::TidalCurve => {
                OutfallBoundary::TidalCurve(row.required(3, "tidal curve name")?.to_string())
            }
            OutfallType::TimeSeries => {
                OutfallBoundary::TimeSeries(row.required(3, "time series name")?.to_string())
            }
        };
        let flap_gate = row.fields[2..]
            .iter()
            .any(|f| f.eq_ignore_ascii_case("YES"));
        let outfall = Outfall {
            boundary,
            flap_gate,
            ..Outfall::default()
        };
        Ok(Node::outfall(name, unplaced(), invert, outfall))
    })
}

/// `[STORAGE]` rows, told apart by field count:
///
/// | fields | shape |
/// |--------|-------|
/// | 8  | `TABULAR Curve SurDepth Fevap` |
/// | 10 | `FUNCTIONAL A1 A2 A0 SurDepth Fevap` |
/// | 11 | tabular plus `Psi Ksat IMD` |
/// | 13 | functional plus `Psi Ksat IMD` |
pub fn parse_storage(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<StorageUnit> {
    parse_rows(section, diag, |row, diag| {
        let name = row.name()?;
        let invert = row.number(1, "invert elevation")?;
        let max_depth = row.number_or(2, 0.0, diag);
        let init_depth = row.number_or(3, 0.0, diag);
        let shape_token = row.required(4, "storage shape")?.to_ascii_uppercase();

        let (shape, rest) = match shape_token.as_str() {
            "TABULAR" => {
                let curve = row.required(5, "storage curve")?.to_string();
                if !matches!(row.len(), 8 | 11) {
                    row.warn(diag, &format!("unexpected field count {} for TABULAR storage", row.len()));
                }
                (StorageShape::Tabular { curve }, 6)
            }
            "FUNCTIONAL" => {
                let shape = StorageShape::Functional {
                    a1: row.number(5, "coefficient")?,
                    a2: row.number_or(6, 0.0, diag),
                    a0: row.number_or(7, 0.0, diag),
                };
                if !matches!(row.len(), 10 | 13) {
                    row.warn(diag, &format!("unexpected field count {} for FUNCTIONAL storage", row.len()));
                }
                (shape, 8)
            }
            other => return Err(format!("unknown storage shape '{other}'")),
        };

        let infiltration = if row.len() >= rest + 5 {
            Some(GreenAmpt {
                suction_head: row.number_or(rest + 2, 0.0, diag),
                conductivity: row.number_or(rest + 3, 0.0, diag),
                initial_deficit: row.number_or(rest + 4, 0.0, diag),
            })
        } else {
            None
        };

        Ok(StorageUnit {
            name: name.to_string(),
            location: unplaced(),
            invert_elev: invert,
            max_depth,
            init_depth,
            shape,
            surcharge_depth: row.number_or(rest, 0.0, diag),
            evap_factor: row.number_or(rest + 1, 0.0, diag),
            infiltration,
            grid: None,
        })
    })
}

// ============================================================================
// Links
// ============================================================================

fn endpoints<'r>(row: &'r Row) -> Result<(&'r str, &'r str, &'r str), String> {
    Ok((
        row.name()?,
        row.required(1, "inlet node")?,
        row.required(2, "outlet node")?,
    ))
}

/// `Name From To Length Roughness [InOffset OutOffset InitFlow MaxFlow]`
pub fn parse_conduits(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Link> {
    parse_rows(section, diag, |row, diag| {
        let (name, from, to) = endpoints(row)?;
        let conduit = Conduit {
            length: row.number(3, "length")?,
            roughness: row.number(4, "roughness")?,
            inlet_offset: row.number_or(5, 0.0, diag),
            outlet_offset: row.number_or(6, 0.0, diag),
            init_flow: row.number_or(7, 0.0, diag),
            max_flow: row.number_or(8, 0.0, diag),
            ..Conduit::default()
        };
        Ok(Link::new(name, from, to, LinkKind::Conduit(conduit)))
    })
}

/// `Name From To Curve [Status Startup Shutoff]`
///
/// A status other than ON/OFF is kept and reported; the exporter writes it
/// as OFF.
pub fn parse_pumps(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Link> {
    parse_rows(section, diag, |row, diag| {
        let (name, from, to) = endpoints(row)?;
        let curve = row.required(3, "pump curve")?.to_string();
        let status = match row.text(4) {
            None | Some("") => PumpStatus::On,
            Some(token) => PumpStatus::from_inp(token),
        };
        if let PumpStatus::Unknown(text) = &status {
            row.warn(diag, &format!("unknown pump status '{text}'"));
        }
        let pump = Pump {
            curve,
            status,
            startup_depth: row.number_or(5, 0.0, diag),
            shutoff_depth: row.number_or(6, 0.0, diag),
        };
        Ok(Link::new(name, from, to, LinkKind::Pump(pump)))
    })
}

/// `Name From To Type Offset Qcoeff [Gated CloseTime]`
pub fn parse_orifices(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Link> {
    parse_rows(section, diag, |row, diag| {
        let (name, from, to) = endpoints(row)?;
        let token = row.required(3, "orifice type")?;
        let orifice_type =
            OrificeType::from_inp(token).ok_or_else(|| format!("unknown orifice type '{token}'"))?;
        let orifice = Orifice {
            orifice_type,
            crest_height: row.number_or(4, 0.0, diag),
            discharge_coeff: row.number_or(5, 0.0, diag),
            flap_gate: row.yes(6),
            open_close_time: row.number_or(7, 0.0, diag),
            xsection: None,
        };
        Ok(Link::new(name, from, to, LinkKind::Orifice(orifice)))
    })
}

/// `Name From To Type CrestHt Qcoeff [Gated EndCon EndCoeff Surcharge]`
pub fn parse_weirs(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Link> {
    parse_rows(section, diag, |row, diag| {
        let (name, from, to) = endpoints(row)?;
        let token = row.required(3, "weir type")?;
        let weir_type =
            WeirType::from_inp(token).ok_or_else(|| format!("unknown weir type '{token}'"))?;
        let contractions = row.number_or(7, 0.0, diag);
        let end_contractions = if (0.0..=2.0).contains(&contractions) {
            contractions as u8
        } else {
            row.warn(diag, &format!("end contractions {contractions} outside 0-2, using 0"));
            0
        };
        let weir = Weir {
            weir_type,
            crest_height: row.number_or(4, 0.0, diag),
            discharge_coeff: row.number_or(5, 0.0, diag),
            flap_gate: row.yes(6),
            end_contractions,
            end_coeff: row.number_or(8, 0.0, diag),
            surcharge: !row
                .text(9)
                .map(|t| t.eq_ignore_ascii_case("NO"))
                .unwrap_or(false),
            xsection: None,
        };
        Ok(Link::new(name, from, to, LinkKind::Weir(weir)))
    })
}

// ============================================================================
// Attachments
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct XSectionRecord {
    pub link: String,
    pub xsection: CrossSection,
}

fn barrels(row: &Row, idx: usize, diag: &mut ImportDiagnostics) -> u32 {
    let value = row.number_or(idx, 1.0, diag);
    if value >= 1.0 && value.fract() == 0.0 {
        value as u32
    } else {
        row.warn(diag, &format!("invalid barrel count {value}, using 1"));
        1
    }
}

/// `Link Shape Geom1 [Geom2 Geom3 Geom4 Barrels Culvert]`, or
/// `Link CUSTOM Geom1 Curve [Barrels]`, or `Link IRREGULAR Transect`
pub fn parse_xsections(
    section: &InpSection,
    diag: &mut ImportDiagnostics,
) -> Vec<XSectionRecord> {
    parse_rows(section, diag, |row, diag| {
        let link = row.name()?.to_string();
        let shape = XSectionShape::from_inp(row.required(1, "shape")?);
        let xsection = match shape {
            XSectionShape::Irregular => CrossSection {
                reference: Some(row.required(2, "transect name")?.to_string()),
                ..CrossSection::new(shape, [0.0; 4])
            },
            XSectionShape::Custom => CrossSection {
                reference: Some(row.required(3, "shape curve")?.to_string()),
                barrels: barrels(row, 4, diag),
                ..CrossSection::new(shape, [row.number(2, "depth")?, 0.0, 0.0, 0.0])
            },
            shape => {
                let geom = [
                    row.number(2, "depth")?,
                    row.number_or(3, 0.0, diag),
                    row.number_or(4, 0.0, diag),
                    row.number_or(5, 0.0, diag),
                ];
                CrossSection {
                    barrels: barrels(row, 6, diag),
                    culvert_code: row.number_or(7, 0.0, diag).max(0.0) as u32,
                    ..CrossSection::new(shape, geom)
                }
            }
        };
        Ok(XSectionRecord { link, xsection })
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct LossRecord {
    pub link: String,
    pub losses: Losses,
}

/// `Link Kentry Kexit Kavg [Flap Seepage]`
pub fn parse_losses(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<LossRecord> {
    parse_rows(section, diag, |row, diag| {
        Ok(LossRecord {
            link: row.name()?.to_string(),
            losses: Losses {
                inlet: row.number_or(1, 0.0, diag),
                outlet: row.number_or(2, 0.0, diag),
                average: row.number_or(3, 0.0, diag),
                flap_gate: row.yes(4),
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importers::tokenizer::tokenize;
    use sdi_core::{IssueKind, NodeClass};

    fn section(text: &str) -> InpSection {
        tokenize(text).unwrap().sections.remove(0)
    }

    #[test]
    fn test_junction_defaults_missing_fields() {
        let mut diag = ImportDiagnostics::new();
        let nodes = parse_junctions(&section("[JUNCTIONS]\nJ1 100 5\nJ2 abc\n"), &mut diag);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].rim_elev(), Some(105.0));
        assert_eq!(nodes[0].junction_attrs().map(|j| j.ponded_area), Some(0.0));
        assert_eq!(diag.stats.skipped_rows, 1);
        assert_eq!(diag.issues[0].line, Some(3));
        assert_eq!(diag.issues[0].section.as_deref(), Some("JUNCTIONS"));
    }

    #[test]
    fn test_outfall_normalization_and_flap_gate() {
        let mut diag = ImportDiagnostics::new();
        let nodes = parse_outfalls(
            &section("[OUTFALLS]\nO1 95 FREE NO\nO2 90 TIDAL TC1 YES\nO3 80 FIXED 2.5\nO4 70 TIME TS1\n"),
            &mut diag,
        );
        assert!(diag.issues.is_empty());
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].class(), NodeClass::Outfall);

        let o2 = nodes[1].outfall_attrs().unwrap();
        assert_eq!(o2.boundary, OutfallBoundary::TidalCurve("TC1".into()));
        assert!(o2.flap_gate);
        assert!(!nodes[0].outfall_attrs().unwrap().flap_gate);
        assert_eq!(nodes[2].outfall_attrs().unwrap().boundary.fixed_stage(), Some(2.5));
        assert_eq!(
            nodes[3].outfall_attrs().unwrap().boundary,
            OutfallBoundary::TimeSeries("TS1".into())
        );
    }

    #[test]
    fn test_storage_field_count_variants() {
        let text = "[STORAGE]\n\
            S1 90 8 0 TABULAR SC1 0 0\n\
            S2 90 8 0 FUNCTIONAL 1000 0 0 0 0\n\
            S3 90 8 0 TABULAR SC1 0 0 4 0.5 0.2\n\
            S4 90 8 0 FUNCTIONAL 1000 0.5 10 1 0.3 4 0.5 0.2\n";
        let mut diag = ImportDiagnostics::new();
        let units = parse_storage(&section(text), &mut diag);
        assert!(diag.issues.is_empty());
        assert_eq!(units.len(), 4);
        assert_eq!(units[0].curve(), Some("SC1"));
        assert!(units[0].infiltration.is_none());
        assert!(matches!(units[1].shape, StorageShape::Functional { a1, .. } if a1 == 1000.0));
        assert_eq!(units[2].infiltration.map(|g| g.conductivity), Some(0.5));
        assert_eq!(units[3].surcharge_depth, 1.0);
        assert_eq!(units[3].evap_factor, 0.3);
        assert_eq!(units[3].infiltration.map(|g| g.initial_deficit), Some(0.2));
    }

    #[test]
    fn test_pump_unknown_status_is_kept_and_reported() {
        let mut diag = ImportDiagnostics::new();
        let links = parse_pumps(&section("[PUMPS]\nP1 J1 J2 PC1 IDLE 1 0.5\n"), &mut diag);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links[0].pump().map(|p| p.status.clone()),
            Some(PumpStatus::Unknown("IDLE".into()))
        );
        assert_eq!(diag.count_of_kind(IssueKind::RecordParse), 1);
        assert_eq!(diag.stats.skipped_rows, 0);
    }

    #[test]
    fn test_conduit_requires_length_and_roughness() {
        let mut diag = ImportDiagnostics::new();
        let links = parse_conduits(
            &section("[CONDUITS]\nC1 J1 O1 50 0.013 0 0 0 0\nC2 J1\nC3 J1 O1 50\n"),
            &mut diag,
        );
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].conduit().map(|c| c.roughness), Some(0.013));
        assert_eq!(diag.stats.skipped_rows, 2);
    }

    #[test]
    fn test_xsection_variants() {
        let text = "[XSECTIONS]\n\
            C1 CIRCULAR 1.5 0 0 0 2\n\
            C2 CUSTOM 3 SHAPE1 1\n\
            C3 IRREGULAR T1\n\
            C4 RECT_OPEN abc\n";
        let mut diag = ImportDiagnostics::new();
        let records = parse_xsections(&section(text), &mut diag);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].xsection.barrels, 2);
        assert_eq!(records[1].xsection.reference.as_deref(), Some("SHAPE1"));
        assert_eq!(records[1].xsection.depth(), 3.0);
        assert_eq!(records[2].xsection.shape, XSectionShape::Irregular);
        assert_eq!(diag.stats.skipped_rows, 1);
    }

    #[test]
    fn test_zero_barrels_fall_back_to_one() {
        let mut diag = ImportDiagnostics::new();
        let records = parse_xsections(
            &section("[XSECTIONS]\nC1 CIRCULAR 1 0 0 0 0\nC2 CUSTOM 3 SHAPE1 0\n"),
            &mut diag,
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].xsection.barrels, 1);
        assert_eq!(records[1].xsection.barrels, 1);
        assert_eq!(diag.issues.len(), 2);
        assert_eq!(diag.stats.skipped_rows, 0);
    }

    #[test]
    fn test_weir_surcharge_and_contractions() {
        let mut diag = ImportDiagnostics::new();
        let links = parse_weirs(
            &section("[WEIRS]\nW1 J1 J2 V-NOTCH 1.0 3.3 NO 2 0 NO\nW2 J1 J2 TRANSVERSE 1 3.3\n"),
            &mut diag,
        );
        let LinkKind::Weir(w1) = &links[0].kind else {
            panic!("expected weir");
        };
        assert_eq!(w1.weir_type, WeirType::VNotch);
        assert_eq!(w1.end_contractions, 2);
        assert!(!w1.surcharge);
        let LinkKind::Weir(w2) = &links[1].kind else {
            panic!("expected weir");
        };
        assert!(w2.surcharge);
    }
}
