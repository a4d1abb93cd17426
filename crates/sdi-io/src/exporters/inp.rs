//! INP writer.
//!
//! Sections come out in a fixed order, each with a `;;` column header, and
//! every row is column-aligned using the widths in [`ExportConfig`]. Depths,
//! elevations and offsets carry 2 decimals, Manning n and coefficients 3.
//! Sections kept verbatim at import (TITLE, OPTIONS, REPORT, CONTROLS and
//! anything unknown) are written back unchanged; unknown ones follow the
//! known sections in their original order.

use std::fmt::Write as _;
use std::path::Path;

use sdi_core::config::ExportConfig;
use sdi_core::{
    DiagnosticIssue, IssueKind, Link, LinkKind, Network, NodeClass, OutfallBoundary, PumpStatus,
    RawSection, SdiResult, StorageShape, TimeSeriesSource, XSectionShape,
};
use sdi_store::Store;
use tracing::{info, warn};

use super::{write_atomically, ExportReport};

/// Preserved sections with a fixed slot in the output
const PLACED_SECTIONS: [&str; 4] = ["TITLE", "OPTIONS", "REPORT", "CONTROLS"];

const DEFAULT_OPTIONS: &[&str] = &[
    "FLOW_UNITS           CFS",
    "INFILTRATION         HORTON",
    "FLOW_ROUTING         DYNWAVE",
    "LINK_OFFSETS         DEPTH",
    "FORCE_MAIN_EQUATION  H-W",
    "ROUTING_STEP         0:00:30",
    "MIN_SURFAREA         12.557",
];

const DEFAULT_REPORT: &[&str] = &[
    "INPUT      NO",
    "CONTROLS   NO",
    "SUBCATCHMENTS NONE",
    "NODES      ALL",
    "LINKS      ALL",
];

/// Multipliers per pattern row
const PATTERN_ROW_LEN: usize = 6;

/// Header column kinds, which decide the column width
#[derive(Clone, Copy)]
enum Col {
    Name(&'static str),
    Num(&'static str),
    Word(&'static str),
}

/// One output row under construction
struct Row<'c> {
    line: String,
    config: &'c ExportConfig,
}

impl<'c> Row<'c> {
    fn new(config: &'c ExportConfig) -> Self {
        Self {
            line: String::new(),
            config,
        }
    }

    fn pad(mut self, text: &str, width: usize) -> Self {
        let _ = write!(self.line, "{text:<width$} ");
        self
    }

    fn name(self, text: &str) -> Self {
        let width = self.config.name_width;
        self.pad(text, width)
    }

    fn word(self, text: &str) -> Self {
        let width = self.config.enum_width;
        self.pad(text, width)
    }

    fn num(mut self, value: f64, decimals: usize) -> Self {
        let width = self.config.number_width;
        let _ = write!(self.line, "{value:<width$.decimals$} ");
        self
    }

    fn int(self, value: i64) -> Self {
        let width = self.config.number_width;
        self.pad(&value.to_string(), width)
    }

    fn flag(self, on: bool) -> Self {
        self.word(if on { "YES" } else { "NO" })
    }

    fn finish(self) -> String {
        self.line.trim_end().to_string()
    }
}

struct InpWriter<'c> {
    out: String,
    config: &'c ExportConfig,
    report: ExportReport,
}

impl<'c> InpWriter<'c> {
    fn row(&self) -> Row<'c> {
        Row::new(self.config)
    }

    /// Write one section if it has rows
    fn section(&mut self, name: &str, columns: &[Col], rows: Vec<String>) {
        let count = rows.iter().filter(|r| is_data(r)).count();
        if count == 0 {
            return;
        }
        let mut labels = String::from(";;");
        let mut rule = String::from(";;");
        for (i, col) in columns.iter().enumerate() {
            let (label, width) = match *col {
                Col::Name(l) => (l, self.config.name_width),
                Col::Num(l) => (l, self.config.number_width),
                Col::Word(l) => (l, self.config.enum_width),
            };
            // the ";;" prefix eats into the first column
            let width = if i == 0 { width.saturating_sub(2) } else { width };
            let _ = write!(labels, "{label:<width$} ");
            let _ = write!(rule, "{:-<width$} ", "");
        }
        let _ = writeln!(self.out, "[{name}]");
        let _ = writeln!(self.out, "{}", labels.trim_end());
        let _ = writeln!(self.out, "{}", rule.trim_end());
        for row in rows {
            let _ = writeln!(self.out, "{row}");
        }
        self.out.push('\n');
        self.report.count(name, count);
    }

    fn raw_section(&mut self, section: &RawSection) {
        let _ = writeln!(self.out, "[{}]", section.name);
        for line in &section.lines {
            let _ = writeln!(self.out, "{line}");
        }
        self.out.push('\n');
        let rows = section.lines.iter().filter(|l| is_data(l)).count();
        self.report.count(&section.name, rows);
    }

    fn placed_or_default(&mut self, network: &Network, name: &str, default: &[&str]) {
        match network.section(name) {
            Some(section) => self.raw_section(section),
            None if self.config.write_default_options && !default.is_empty() => {
                let section = RawSection::new(name, default.iter().map(|s| s.to_string()).collect());
                self.raw_section(&section);
            }
            None => {}
        }
    }

    fn endpoint<'n>(&mut self, node: Option<&'n str>, network: &Network) -> &'n str {
        match node {
            Some(name) if network.has_node(name) => name,
            _ => {
                self.report.missing_endpoints += 1;
                "?"
            }
        }
    }
}

fn is_data(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with(';')
}

/// Render a network as INP text
pub fn write_inp(network: &Network, config: &ExportConfig) -> (String, ExportReport) {
    let mut w = InpWriter {
        out: String::new(),
        config,
        report: ExportReport::default(),
    };

    w.placed_or_default(network, "TITLE", &[]);
    w.placed_or_default(network, "OPTIONS", DEFAULT_OPTIONS);
    w.placed_or_default(network, "REPORT", DEFAULT_REPORT);

    write_nodes(&mut w, network);
    write_links(&mut w, network);
    write_xsections(&mut w, network);
    write_losses(&mut w, network);
    write_curves(&mut w, network);
    write_coordinates(&mut w, network);
    write_inflows(&mut w, network);
    write_time_series(&mut w, network);
    write_patterns(&mut w, network);

    if let Some(controls) = network.section("CONTROLS") {
        w.raw_section(controls);
    }
    for section in network
        .sections
        .iter()
        .filter(|s| !PLACED_SECTIONS.iter().any(|p| s.is_named(p)))
    {
        w.raw_section(section);
    }

    (w.out, w.report)
}

fn write_nodes(w: &mut InpWriter, network: &Network) {
    let junctions = network
        .nodes
        .iter()
        .filter_map(|n| n.junction_attrs().map(|j| (n, j)))
        .map(|(n, j)| {
            w.row()
                .name(&n.name)
                .num(n.invert_elev, 2)
                .num(j.max_depth, 2)
                .num(j.init_depth, 2)
                .num(j.surcharge_depth, 2)
                .num(j.ponded_area, 2)
                .finish()
        })
        .collect();
    w.section(
        "JUNCTIONS",
        &[
            Col::Name("Name"),
            Col::Num("Elevation"),
            Col::Num("MaxDepth"),
            Col::Num("InitDepth"),
            Col::Num("SurDepth"),
            Col::Num("Aponded"),
        ],
        junctions,
    );

    let outfalls = network
        .nodes
        .iter()
        .filter(|n| n.class() == NodeClass::Outfall)
        .filter_map(|n| n.outfall_attrs().map(|o| (n, o)))
        .map(|(n, o)| {
            let row = w
                .row()
                .name(&n.name)
                .num(n.invert_elev, 2)
                .word(o.boundary.outfall_type().as_inp());
            let row = match &o.boundary {
                OutfallBoundary::Fixed(stage) => row.num(*stage, 2),
                OutfallBoundary::TidalCurve(name) | OutfallBoundary::TimeSeries(name) => {
                    row.name(name)
                }
                OutfallBoundary::Free | OutfallBoundary::Normal => row.name(""),
            };
            row.flag(o.flap_gate).finish()
        })
        .collect();
    w.section(
        "OUTFALLS",
        &[
            Col::Name("Name"),
            Col::Num("Elevation"),
            Col::Word("Type"),
            Col::Name("Stage Data"),
            Col::Word("Gated"),
        ],
        outfalls,
    );

    let storage = network
        .storage_units
        .iter()
        .map(|s| {
            let row = w
                .row()
                .name(&s.name)
                .num(s.invert_elev, 2)
                .num(s.max_depth, 2)
                .num(s.init_depth, 2);
            let row = match &s.shape {
                StorageShape::Tabular { curve } => row.word("TABULAR").name(curve),
                StorageShape::Functional { a1, a2, a0 } => {
                    row.word("FUNCTIONAL").num(*a1, 3).num(*a2, 3).num(*a0, 3)
                }
            };
            let row = row.num(s.surcharge_depth, 2).num(s.evap_factor, 2);
            match &s.infiltration {
                Some(ga) => row
                    .num(ga.suction_head, 2)
                    .num(ga.conductivity, 3)
                    .num(ga.initial_deficit, 3)
                    .finish(),
                None => row.finish(),
            }
        })
        .collect();
    w.section(
        "STORAGE",
        &[
            Col::Name("Name"),
            Col::Num("Elev."),
            Col::Num("MaxDepth"),
            Col::Num("InitDepth"),
            Col::Word("Shape"),
            Col::Name("Curve/Params"),
            Col::Num("SurDepth"),
            Col::Num("Fevap"),
            Col::Num("Psi"),
            Col::Num("Ksat"),
            Col::Num("IMD"),
        ],
        storage,
    );
}

fn link_start<'c>(w: &mut InpWriter<'c>, network: &Network, link: &Link) -> Row<'c> {
    let from = w.endpoint(link.inlet_node.as_deref(), network);
    let to = w.endpoint(link.outlet_node.as_deref(), network);
    w.row().name(&link.name).name(from).name(to)
}

fn write_links(w: &mut InpWriter, network: &Network) {
    let mut conduits = Vec::new();
    let mut pumps = Vec::new();
    let mut orifices = Vec::new();
    let mut weirs = Vec::new();

    for link in &network.links {
        let row = link_start(w, network, link);
        match &link.kind {
            LinkKind::Conduit(c) => conduits.push(
                row.num(c.length, 2)
                    .num(c.roughness, 3)
                    .num(c.inlet_offset, 2)
                    .num(c.outlet_offset, 2)
                    .num(c.init_flow, 2)
                    .num(c.max_flow, 2)
                    .finish(),
            ),
            LinkKind::Pump(p) => {
                let status = match &p.status {
                    PumpStatus::Unknown(text) => {
                        warn!(pump = %link.name, status = %text, "unknown pump status written as OFF");
                        w.report.diagnostics.add(
                            DiagnosticIssue::warning(
                                IssueKind::Export,
                                format!("unknown pump status '{text}' written as OFF"),
                            )
                            .with_entity(link.name.clone()),
                        );
                        "OFF"
                    }
                    status => status.as_stored(),
                };
                pumps.push(
                    row.name(&p.curve)
                        .word(status)
                        .num(p.startup_depth, 2)
                        .num(p.shutoff_depth, 2)
                        .finish(),
                );
            }
            LinkKind::Orifice(o) => orifices.push(
                row.word(o.orifice_type.as_inp())
                    .num(o.crest_height, 2)
                    .num(o.discharge_coeff, 3)
                    .flag(o.flap_gate)
                    .num(o.open_close_time, 2)
                    .finish(),
            ),
            LinkKind::Weir(wr) => weirs.push(
                row.word(wr.weir_type.as_inp())
                    .num(wr.crest_height, 2)
                    .num(wr.discharge_coeff, 3)
                    .flag(wr.flap_gate)
                    .int(i64::from(wr.end_contractions))
                    .num(wr.end_coeff, 2)
                    .flag(wr.surcharge)
                    .finish(),
            ),
        }
    }

    let ends = [Col::Name("Name"), Col::Name("From Node"), Col::Name("To Node")];
    let with = |extra: &[Col]| -> Vec<Col> { ends.iter().chain(extra).copied().collect() };

    w.section(
        "CONDUITS",
        &with(&[
            Col::Num("Length"),
            Col::Num("Roughness"),
            Col::Num("InOffset"),
            Col::Num("OutOffset"),
            Col::Num("InitFlow"),
            Col::Num("MaxFlow"),
        ]),
        conduits,
    );
    w.section(
        "PUMPS",
        &with(&[
            Col::Name("Pump Curve"),
            Col::Word("Status"),
            Col::Num("Startup"),
            Col::Num("Shutoff"),
        ]),
        pumps,
    );
    w.section(
        "ORIFICES",
        &with(&[
            Col::Word("Type"),
            Col::Num("Offset"),
            Col::Num("Qcoeff"),
            Col::Word("Gated"),
            Col::Num("CloseTime"),
        ]),
        orifices,
    );
    w.section(
        "WEIRS",
        &with(&[
            Col::Word("Type"),
            Col::Num("CrestHt"),
            Col::Num("Qcoeff"),
            Col::Word("Gated"),
            Col::Num("EndCon"),
            Col::Num("EndCoeff"),
            Col::Word("Surcharge"),
        ]),
        weirs,
    );
}

fn write_xsections(w: &mut InpWriter, network: &Network) {
    let rows = network
        .links
        .iter()
        .filter_map(|l| l.xsection().map(|xs| (l, xs)))
        .map(|(link, xs)| {
            let row = w.row().name(&link.name).word(xs.shape.as_inp());
            let reference = xs.reference.as_deref().unwrap_or("");
            match xs.shape {
                XSectionShape::Irregular => row.name(reference).finish(),
                XSectionShape::Custom => row
                    .num(xs.geom[0], 2)
                    .name(reference)
                    .int(i64::from(xs.barrels))
                    .finish(),
                _ => row
                    .num(xs.geom[0], 2)
                    .num(xs.geom[1], 2)
                    .num(xs.geom[2], 2)
                    .num(xs.geom[3], 2)
                    .int(i64::from(xs.barrels))
                    .int(i64::from(xs.culvert_code))
                    .finish(),
            }
        })
        .collect();
    w.section(
        "XSECTIONS",
        &[
            Col::Name("Link"),
            Col::Word("Shape"),
            Col::Num("Geom1"),
            Col::Num("Geom2"),
            Col::Num("Geom3"),
            Col::Num("Geom4"),
            Col::Num("Barrels"),
            Col::Num("Culvert"),
        ],
        rows,
    );
}

fn write_losses(w: &mut InpWriter, network: &Network) {
    let rows = network
        .links
        .iter()
        .filter_map(|l| l.conduit().map(|c| (l, c)))
        .filter(|(_, c)| !c.losses.is_zero())
        .map(|(link, c)| {
            w.row()
                .name(&link.name)
                .num(c.losses.inlet, 2)
                .num(c.losses.outlet, 2)
                .num(c.losses.average, 2)
                .flag(c.losses.flap_gate)
                .num(0.0, 2)
                .finish()
        })
        .collect();
    w.section(
        "LOSSES",
        &[
            Col::Name("Link"),
            Col::Num("Kentry"),
            Col::Num("Kexit"),
            Col::Num("Kavg"),
            Col::Word("Flap Gate"),
            Col::Num("Seepage"),
        ],
        rows,
    );
}

fn description_line(text: Option<&str>) -> Option<String> {
    text.filter(|t| !t.is_empty()).map(|t| format!(";{t}"))
}

fn write_curves(w: &mut InpWriter, network: &Network) {
    let mut rows = Vec::new();
    for (i, curve) in network.curves.iter().enumerate() {
        if i > 0 {
            rows.push(String::new());
        }
        rows.extend(description_line(curve.description.as_deref()));
        for (j, (x, y)) in curve.sorted_points().into_iter().enumerate() {
            let kind = if j == 0 { curve.curve_type.as_inp() } else { "" };
            rows.push(w.row().name(&curve.name).word(kind).num(x, 3).num(y, 3).finish());
        }
    }
    w.section(
        "CURVES",
        &[
            Col::Name("Name"),
            Col::Word("Type"),
            Col::Num("X-Value"),
            Col::Num("Y-Value"),
        ],
        rows,
    );
}

fn write_coordinates(w: &mut InpWriter, network: &Network) {
    let points = network
        .nodes
        .iter()
        .map(|n| (&n.name, n.location))
        .chain(network.storage_units.iter().map(|s| (&s.name, s.location)));
    let rows = points
        .map(|(name, p)| w.row().name(name).num(p.x, 3).num(p.y, 3).finish())
        .collect();
    w.section(
        "COORDINATES",
        &[Col::Name("Node"), Col::Num("X-Coord"), Col::Num("Y-Coord")],
        rows,
    );
}

fn write_inflows(w: &mut InpWriter, network: &Network) {
    let rows = network
        .inflows
        .iter()
        .map(|inflow| {
            let series = inflow.time_series.as_deref().unwrap_or("\"\"");
            let row = w
                .row()
                .name(&inflow.node)
                .word(&inflow.constituent)
                .name(series)
                .word(&inflow.inflow_type)
                .num(inflow.mfactor, 2)
                .num(inflow.sfactor, 2)
                .num(inflow.baseline, 2);
            match inflow.pattern.as_deref() {
                Some(pattern) => row.name(pattern).finish(),
                None => row.finish(),
            }
        })
        .collect();
    w.section(
        "INFLOWS",
        &[
            Col::Name("Node"),
            Col::Word("Constituent"),
            Col::Name("Time Series"),
            Col::Word("Type"),
            Col::Num("Mfactor"),
            Col::Num("Sfactor"),
            Col::Num("Baseline"),
            Col::Name("Pattern"),
        ],
        rows,
    );
}

fn write_time_series(w: &mut InpWriter, network: &Network) {
    let mut rows = Vec::new();
    for (i, series) in network.time_series.iter().enumerate() {
        if i > 0 {
            rows.push(String::new());
        }
        if series.description != series.name {
            rows.extend(description_line(Some(&series.description)));
        }
        match &series.source {
            TimeSeriesSource::File(path) => {
                rows.push(
                    w.row()
                        .name(&series.name)
                        .word("FILE")
                        .finish()
                        + &format!(" \"{path}\""),
                );
            }
            TimeSeriesSource::Inline(points) => {
                for point in points {
                    let row = w.row().name(&series.name);
                    let row = match point.date.as_deref() {
                        Some(date) => row.word(date),
                        None => row,
                    };
                    rows.push(row.word(&point.time).num(point.value, 3).finish());
                }
            }
        }
    }
    w.section(
        "TIMESERIES",
        &[
            Col::Name("Name"),
            Col::Word("Date"),
            Col::Word("Time"),
            Col::Num("Value"),
        ],
        rows,
    );
}

fn write_patterns(w: &mut InpWriter, network: &Network) {
    let mut rows = Vec::new();
    for (i, pattern) in network.patterns.iter().enumerate() {
        if i > 0 {
            rows.push(String::new());
        }
        rows.extend(description_line(pattern.description.as_deref()));
        for (j, chunk) in pattern.multipliers.chunks(PATTERN_ROW_LEN).enumerate() {
            let kind = if j == 0 { pattern.pattern_type.as_inp() } else { "" };
            let row = chunk
                .iter()
                .fold(w.row().name(&pattern.name).word(kind), |row, m| row.num(*m, 3));
            rows.push(row.finish());
        }
    }
    w.section(
        "PATTERNS",
        &[
            Col::Name("Name"),
            Col::Word("Type"),
            Col::Num("Multipliers"),
        ],
        rows,
    );
}

/// Export the store's network to an INP file.
///
/// The network is read in one snapshot; the file appears only once it has
/// been written completely.
pub fn export_inp(
    store: &Store,
    path: impl AsRef<Path>,
    config: &ExportConfig,
) -> SdiResult<ExportReport> {
    let path = path.as_ref();
    let network = store.load_network()?;
    let (text, report) = write_inp(&network, config);
    write_atomically(path, &text)?;
    info!(
        path = %path.display(),
        rows = report.total_rows(),
        missing_endpoints = report.missing_endpoints,
        "INP exported"
    );
    Ok(report)
}
