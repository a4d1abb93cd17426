//! Diagnostics collected while importing, validating, exporting and
//! schematizing a storm drain network.
//!
//! Nothing in this module aborts an operation. Parsers, validators and the
//! schematizer push [`DiagnosticIssue`]s into a [`Diagnostics`] (or the
//! import flavoured [`ImportDiagnostics`]) and the caller decides how to
//! surface them, typically as one scrollable report.
//!
//! Each issue records:
//!
//! - Severity (Warning, Error)
//! - Kind ([`IssueKind`]) used to group the report
//! - Optional INP section and line number
//! - Optional entity reference (e.g. "conduit C1")
//! - Optional raw text of the offending row
//!
//! # Example
//!
//! ```
//! use sdi_core::diagnostics::{Diagnostics, IssueKind};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning(IssueKind::Reference, "outlet node O9 does not exist");
//! diag.add_error_with_entity(IssueKind::Domain, "node lies outside the grid", "J4");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use std::fmt;

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but operation continued (e.g., defaulted value)
    Warning,
    /// Element was skipped or excluded from the result
    Error,
}

/// Classes of non-fatal issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A row in a recognized section failed coercion
    RecordParse,
    /// A name refers to a missing node, curve, series or link
    Reference,
    /// A node or link lies outside the computational domain
    Domain,
    /// A rating table is already referenced by another inlet
    DuplicateRatingAssignment,
    /// Two entities compete for the same name or cell
    Duplicate,
    /// A value was normalized while writing an export
    Export,
    /// Structural checks on the assembled network
    Validation,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::RecordParse => "parse",
            IssueKind::Reference => "reference",
            IssueKind::Domain => "domain",
            IssueKind::DuplicateRatingAssignment => "rating",
            IssueKind::Duplicate => "duplicate",
            IssueKind::Export => "export",
            IssueKind::Validation => "validation",
        }
    }
}

/// A single diagnostic issue encountered during an operation
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    /// Human-readable description of the issue
    pub message: String,
    /// INP section the issue was raised in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// 1-based line number in the source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Entity reference (e.g. "conduit C1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Raw text of the rejected row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(severity: Severity, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            section: None,
            line: None,
            entity: None,
            raw: None,
        }
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, kind, message)
    }

    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, kind, message)
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}]", severity, self.kind.label())?;
        if let Some(section) = &self.section {
            write!(f, " [{}]", section)?;
        }
        write!(f, " {}", self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }
        if let Some(line) = self.line {
            write!(f, " at line {}", line)?;
        }
        if let Some(raw) = &self.raw {
            write!(f, ": `{}`", raw.trim())?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for an operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw issue directly
    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    // =========================================================================
    // Warning Methods
    // =========================================================================

    pub fn add_warning(&mut self, kind: IssueKind, message: &str) {
        self.issues.push(DiagnosticIssue::warning(kind, message));
    }

    pub fn add_warning_at_line(&mut self, kind: IssueKind, message: &str, line: usize) {
        self.issues
            .push(DiagnosticIssue::warning(kind, message).with_line(line));
    }

    pub fn add_warning_with_entity(&mut self, kind: IssueKind, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::warning(kind, message).with_entity(entity));
    }

    // =========================================================================
    // Error Methods
    // =========================================================================

    pub fn add_error(&mut self, kind: IssueKind, message: &str) {
        self.issues.push(DiagnosticIssue::error(kind, message));
    }

    pub fn add_error_with_entity(&mut self, kind: IssueKind, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::error(kind, message).with_entity(entity));
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of one kind, in the order they were raised
    pub fn issues_of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn count_of_kind(&self, kind: IssueKind) -> usize {
        self.issues_of_kind(kind).count()
    }

    // =========================================================================
    // Utility Methods
    // =========================================================================

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        issue_summary(self.warning_count(), self.error_count())
    }
}

impl Extend<DiagnosticIssue> for Diagnostics {
    fn extend<T: IntoIterator<Item = DiagnosticIssue>>(&mut self, iter: T) {
        self.issues.extend(iter);
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

fn issue_summary(warnings: usize, errors: usize) -> String {
    let plural = |n: usize| if n == 1 { "" } else { "s" };
    match (warnings, errors) {
        (0, 0) => "No issues".to_string(),
        (w, 0) => format!("{} warning{}", w, plural(w)),
        (0, e) => format!("{} error{}", e, plural(e)),
        (w, e) => format!("{} warning{}, {} error{}", w, plural(w), e, plural(e)),
    }
}

// ============================================================================
// Import-Specific Extensions
// ============================================================================

/// Element counts for an import operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub junctions: usize,
    pub inlets: usize,
    pub outfalls: usize,
    pub storage_units: usize,
    pub conduits: usize,
    pub pumps: usize,
    pub orifices: usize,
    pub weirs: usize,
    pub curves: usize,
    pub patterns: usize,
    pub time_series: usize,
    pub inflows: usize,
    pub preserved_sections: usize,
    pub skipped_rows: usize,
    pub dropped_nodes: usize,
    pub links_outside_domain: usize,
    /// Connected groups of nodes
    pub islands: usize,
    /// Nodes no resolved link touches
    pub isolated_nodes: usize,
}

impl ImportStats {
    pub fn node_count(&self) -> usize {
        self.junctions + self.inlets + self.outfalls + self.storage_units
    }

    pub fn link_count(&self) -> usize {
        self.conduits + self.pumps + self.orifices + self.weirs
    }
}

/// Import statistics together with the accumulated status report.
///
/// This is the report handed back to the caller after an import; it is
/// returned even when rows were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportDiagnostics {
    pub stats: ImportStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl ImportDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Record a rejected row (increments skipped_rows counter)
    pub fn add_skipped_row(&mut self, section: &str, line: usize, raw: &str, message: &str) {
        self.issues.push(
            DiagnosticIssue::error(IssueKind::RecordParse, message)
                .with_section(section)
                .with_line(line)
                .with_raw(raw),
        );
        self.stats.skipped_rows += 1;
    }

    /// Record a row that was accepted with a defaulted or normalized value
    pub fn add_row_warning(&mut self, section: &str, line: usize, raw: &str, message: &str) {
        self.issues.push(
            DiagnosticIssue::warning(IssueKind::RecordParse, message)
                .with_section(section)
                .with_line(line)
                .with_raw(raw),
        );
    }

    pub fn add_reference_warning(&mut self, entity: &str, message: &str) {
        self.issues.push(
            DiagnosticIssue::warning(IssueKind::Reference, message).with_entity(entity),
        );
    }

    pub fn add_domain_warning(&mut self, entity: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::warning(IssueKind::Domain, message).with_entity(entity));
    }

    pub fn add_validation_warning(&mut self, entity: &str, message: &str) {
        self.issues.push(
            DiagnosticIssue::warning(IssueKind::Validation, message).with_entity(entity),
        );
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues_of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn count_of_kind(&self, kind: IssueKind) -> usize {
        self.issues_of_kind(kind).count()
    }

    /// Merge validation output (stats are owned by the parser and not merged)
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} nodes, {} links, {} curves, {} series | {}",
            self.stats.node_count(),
            self.stats.link_count(),
            self.stats.curves,
            self.stats.time_series,
            issue_summary(self.warning_count(), self.error_count())
        )
    }
}

impl fmt::Display for ImportDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Import: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_warning(IssueKind::Reference, "missing curve");
        diag.add_error(IssueKind::Domain, "outside grid");
        diag.add_warning_at_line(IssueKind::RecordParse, "defaulted", 42);

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_issues());
        assert!(diag.has_errors());
        assert_eq!(diag.count_of_kind(IssueKind::Reference), 1);
    }

    #[test]
    fn test_issue_display_carries_section_and_raw() {
        let issue = DiagnosticIssue::error(IssueKind::RecordParse, "invalid elevation")
            .with_section("JUNCTIONS")
            .with_line(7)
            .with_raw("J1 abc 5");

        let display = issue.to_string();
        assert!(display.starts_with("[error:parse] [JUNCTIONS] invalid elevation"));
        assert!(display.contains("line 7"));
        assert!(display.contains("`J1 abc 5`"));
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_warning_at_line(IssueKind::RecordParse, "Defaulted MaxDepth", 47);
        diag.add_error_with_entity(IssueKind::Reference, "Unknown node", "conduit C1");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"record_parse\""));
        assert!(json.contains("\"line\": 47"));
        assert!(json.contains("\"entity\": \"conduit C1\""));
        assert!(!json.contains("\"raw\""));
    }

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.add_warning(IssueKind::Export, "warning");
        assert_eq!(diag.summary(), "1 warning");

        diag.add_error(IssueKind::Export, "error");
        assert_eq!(diag.summary(), "1 warning, 1 error");

        diag.add_warning(IssueKind::Export, "another warning");
        assert_eq!(diag.summary(), "2 warnings, 1 error");
    }

    #[test]
    fn test_import_diagnostics_skipped_rows() {
        let mut diag = ImportDiagnostics::new();
        diag.stats.junctions = 3;
        diag.stats.conduits = 2;

        diag.add_skipped_row("CONDUITS", 12, "C9 J1", "missing outlet node");
        diag.add_row_warning("PUMPS", 20, "P1 J1 J2 PC1 MAYBE", "unknown status");

        assert_eq!(diag.stats.skipped_rows, 1);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.summary().starts_with("3 nodes, 2 links"));
    }

    #[test]
    fn test_import_diagnostics_merge_keeps_stats() {
        let mut diag = ImportDiagnostics::new();
        diag.stats.outfalls = 1;

        let mut validation = Diagnostics::new();
        validation.add_warning(IssueKind::Validation, "isolated node");
        diag.merge(validation);

        assert_eq!(diag.stats.outfalls, 1);
        assert_eq!(diag.count_of_kind(IssueKind::Validation), 1);
    }
}
