//! Parsers for the tabular sections: inflows, patterns, time series and
//! curves.
//!
//! Patterns, time series and curves spread one entity over several rows
//! keyed by name. A single-`;` comment directly above an entity's first row
//! becomes its description.

use std::collections::HashMap;

use sdi_core::{
    Curve, CurveType, ImportDiagnostics, Inflow, Pattern, PatternType, TimeSeries, TimeSeriesRow,
    TimeSeriesSource,
};

use super::records::{parse_rows, Row};
use super::tokenizer::InpSection;

/// `Node Constituent TimeSeries [Type Mfactor Sfactor Baseline Pattern]`
pub fn parse_inflows(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Inflow> {
    parse_rows(section, diag, |row, diag| {
        let defaults = Inflow::new(row.name()?);
        let optional_name = |idx: usize| {
            row.text(idx)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        Ok(Inflow {
            constituent: row.required(1, "constituent")?.to_string(),
            time_series: optional_name(2),
            inflow_type: optional_name(3).unwrap_or(defaults.inflow_type.clone()),
            mfactor: row.number_or(4, 1.0, diag),
            sfactor: row.number_or(5, 1.0, diag),
            baseline: row.number_or(6, 0.0, diag),
            pattern: optional_name(7),
            ..defaults
        })
    })
}

/// Walk every line of a multi-row section, handing data rows to `visit`
/// together with the description comment that preceded them, if any.
fn walk_rows(
    section: &InpSection,
    diag: &mut ImportDiagnostics,
    mut visit: impl FnMut(&Row, Option<String>, &mut ImportDiagnostics) -> Result<(), String>,
) {
    let mut description: Option<String> = None;
    for line in &section.lines {
        if line.is_blank() {
            continue;
        }
        if line.is_comment() {
            description = line
                .description()
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            continue;
        }
        let row = Row::new(section, line);
        if let Err(message) = visit(&row, description.take(), diag) {
            diag.add_skipped_row(&section.name, line.number, &line.text, &message);
        }
    }
}

/// Name-keyed accumulator that keeps first-seen order
struct Collected<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Collected<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn push(&mut self, name: &str, item: T) -> usize {
        let idx = self.items.len();
        self.index.insert(name.to_string(), idx);
        self.items.push(item);
        idx
    }
}

fn numbers(row: &Row, from: usize) -> Result<Vec<f64>, String> {
    row.fields[from..]
        .iter()
        .map(|f| {
            f.parse::<f64>()
                .map_err(|_| format!("invalid multiplier '{f}'"))
        })
        .collect()
}

/// `Name Type m1 m2 ...` on the first row, `Name m1 m2 ...` afterwards.
///
/// Every pattern is canonicalized to 24 hourly multipliers; a pattern that
/// had to change is reported.
pub fn parse_patterns(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Pattern> {
    let mut patterns: Collected<Pattern> = Collected::new();

    walk_rows(section, diag, |row, description, diag| {
        let name = row.name()?;
        let typed = row.text(1).and_then(PatternType::from_inp);
        let multipliers = numbers(row, if typed.is_some() { 2 } else { 1 })?;

        let idx = match patterns.position(name) {
            Some(idx) => idx,
            None => {
                if typed.is_none() {
                    row.warn(diag, "pattern has no type, assuming HOURLY");
                }
                patterns.push(
                    name,
                    Pattern {
                        name: name.to_string(),
                        pattern_type: typed.unwrap_or(PatternType::Hourly),
                        description,
                        multipliers: Vec::new(),
                    },
                )
            }
        };
        patterns.items[idx].multipliers.extend(multipliers);
        Ok(())
    });

    let mut out = patterns.items;
    for pattern in &mut out {
        let original = (pattern.pattern_type, pattern.multipliers.len());
        if pattern.canonicalize() {
            diag.add_validation_warning(
                &pattern.name,
                &format!(
                    "{} pattern with {} multipliers stored as {} hourly multipliers",
                    original.0.as_inp(),
                    original.1,
                    pattern.multipliers.len()
                ),
            );
        }
    }
    out
}

/// `Name [Date] Time Value`, or `Name FILE Path`.
///
/// A row without a date reuses the date of the series' previous row.
pub fn parse_time_series(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<TimeSeries> {
    let mut series: Collected<TimeSeries> = Collected::new();

    walk_rows(section, diag, |row, description, diag| {
        let name = row.name()?;
        let is_file = row
            .text(1)
            .map(|t| t.eq_ignore_ascii_case("FILE"))
            .unwrap_or(false);

        let idx = match series.position(name) {
            Some(idx) => idx,
            None => {
                let mut fresh = TimeSeries::inline(name);
                if let Some(text) = description {
                    fresh.description = text;
                }
                series.push(name, fresh)
            }
        };
        let entry = &mut series.items[idx];

        if is_file {
            let path = row.required(2, "file path")?.to_string();
            if !entry.rows().is_empty() {
                row.warn(diag, "FILE directive replaces earlier inline rows");
            }
            entry.source = TimeSeriesSource::File(path);
            return Ok(());
        }

        let (date, time, value) = match row.len() {
            n if n >= 4 => (
                Some(row.required(1, "date")?.to_string()),
                row.required(2, "time")?.to_string(),
                row.number(3, "value")?,
            ),
            3 => (
                entry.rows().last().and_then(|r| r.date.clone()),
                row.required(1, "time")?.to_string(),
                row.number(2, "value")?,
            ),
            _ => return Err("time series row needs a time and a value".to_string()),
        };

        match &mut entry.source {
            TimeSeriesSource::Inline(rows) => rows.push(TimeSeriesRow { date, time, value }),
            TimeSeriesSource::File(_) => {
                row.warn(diag, "inline row ignored for file-backed time series");
            }
        }
        Ok(())
    });

    series.items
}

/// `Name Type X Y` on the first row of a curve, `Name X Y` afterwards.
///
/// Rows without a type inherit the last type seen in the section.
pub fn parse_curves(section: &InpSection, diag: &mut ImportDiagnostics) -> Vec<Curve> {
    let mut curves: Collected<Curve> = Collected::new();
    let mut last_type: Option<CurveType> = None;

    walk_rows(section, diag, |row, description, _| {
        let name = row.name()?;
        let typed = if row.len() >= 4 {
            row.text(1).and_then(CurveType::from_inp)
        } else {
            None
        };
        let (x, y) = if typed.is_some() {
            (row.number(2, "x value")?, row.number(3, "y value")?)
        } else {
            (row.number(1, "x value")?, row.number(2, "y value")?)
        };
        if typed.is_some() {
            last_type = typed;
        }

        let idx = match curves.position(name) {
            Some(idx) => idx,
            None => {
                let curve_type = typed
                    .or(last_type)
                    .ok_or_else(|| "curve type missing".to_string())?;
                let mut fresh = Curve::new(name, curve_type);
                fresh.description = description;
                curves.push(name, fresh)
            }
        };
        curves.items[idx].points.push((x, y));
        Ok(())
    });

    curves.items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importers::tokenizer::tokenize;
    use sdi_core::{IssueKind, HOURLY_PATTERN_LEN};

    fn section(text: &str) -> InpSection {
        tokenize(text).unwrap().sections.remove(0)
    }

    #[test]
    fn test_inflow_defaults_and_empty_series() {
        let mut diag = ImportDiagnostics::new();
        let inflows = parse_inflows(
            &section("[INFLOWS]\nJ1 FLOW \"\" FLOW 1.0 1.0 0.5 DWF1\nJ2 FLOW TS1\n"),
            &mut diag,
        );
        assert!(diag.issues.is_empty());
        assert_eq!(inflows[0].time_series, None);
        assert_eq!(inflows[0].baseline, 0.5);
        assert_eq!(inflows[0].pattern.as_deref(), Some("DWF1"));
        assert_eq!(inflows[1].time_series.as_deref(), Some("TS1"));
        assert_eq!(inflows[1].mfactor, 1.0);
        assert_eq!(inflows[1].inflow_type, "FLOW");
    }

    #[test]
    fn test_monthly_pattern_is_canonicalized() {
        let text = "[PATTERNS]\n;Monthly demand\nP1 MONTHLY 1 2 3 4 5 6\nP1 7 8 9 10 11 12\n";
        let mut diag = ImportDiagnostics::new();
        let patterns = parse_patterns(&section(text), &mut diag);
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern_type, PatternType::Hourly);
        assert_eq!(p.multipliers.len(), HOURLY_PATTERN_LEN);
        assert_eq!(p.multipliers[11], 12.0);
        assert_eq!(p.multipliers[12], 1.0);
        assert_eq!(p.description.as_deref(), Some("Monthly demand"));
        assert_eq!(diag.count_of_kind(IssueKind::Validation), 1);
    }

    #[test]
    fn test_hourly_pattern_of_24_is_unchanged() {
        let values = vec!["1.0"; 24].join(" ");
        let text = format!("[PATTERNS]\nP1 HOURLY {values}\n");
        let mut diag = ImportDiagnostics::new();
        let patterns = parse_patterns(&section(&text), &mut diag);
        assert_eq!(patterns[0].multipliers.len(), 24);
        assert!(diag.issues.is_empty());
    }

    #[test]
    fn test_time_series_dates_and_file() {
        let text = "[TIMESERIES]\n\
            ;;Name Date Time Value\n\
            TS1 01/01/2020 00:00 0.0\n\
            TS1 01:00 2.5\n\
            TS2 0:00 1.0\n\
            TS3 FILE \"C:\\rain data\\ts3.dat\"\n";
        let mut diag = ImportDiagnostics::new();
        let series = parse_time_series(&section(text), &mut diag);
        assert!(diag.issues.is_empty());
        assert_eq!(series.len(), 3);

        let ts1 = series[0].rows();
        assert_eq!(ts1.len(), 2);
        assert_eq!(ts1[1].date.as_deref(), Some("01/01/2020"));
        assert_eq!(ts1[1].value, 2.5);
        assert_eq!(series[0].description, "TS1");

        assert_eq!(series[1].rows()[0].date, None);
        assert_eq!(series[2].file_path(), Some(r"C:\rain data\ts3.dat"));
    }

    #[test]
    fn test_curves_inherit_type() {
        let text = "[CURVES]\n\
            ;Lift station\n\
            PC1 Pump4 0 0\n\
            PC1 5 10\n\
            PC1 10 12\n\
            TC1 Tidal 0 1.0\n\
            TC1 12 2.0\n\
            SC1 3 4\n";
        let mut diag = ImportDiagnostics::new();
        let curves = parse_curves(&section(text), &mut diag);
        assert!(diag.issues.is_empty());
        assert_eq!(curves.len(), 3);
        assert_eq!(curves[0].curve_type, CurveType::Pump4);
        assert_eq!(curves[0].points.len(), 3);
        assert_eq!(curves[0].description.as_deref(), Some("Lift station"));
        assert_eq!(curves[1].curve_type, CurveType::Tidal);
        assert_eq!(curves[2].curve_type, CurveType::Tidal);
    }

    #[test]
    fn test_curve_without_any_type_is_skipped() {
        let mut diag = ImportDiagnostics::new();
        let curves = parse_curves(&section("[CURVES]\nC1 0 0\n"), &mut diag);
        assert!(curves.is_empty());
        assert_eq!(diag.stats.skipped_rows, 1);
    }
}
