//! Section tokenizer for INP documents.
//!
//! An INP document is a sequence of `[NAME]` headers, each followed by raw
//! lines up to the next header. Lines are kept verbatim (comments and blank
//! lines included) so that sections the core does not interpret can be
//! written back unchanged.

use sdi_core::{SdiError, SdiResult};

/// Sections the record parsers know about.
///
/// Dispatch is by lower-cased prefix of the header name, so `[JUNCTION]`,
/// `[Junctions]` and `[JUNCTIONS]` all land in the same parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Title,
    Options,
    Report,
    Junctions,
    Outfalls,
    Storage,
    Conduits,
    Pumps,
    Orifices,
    Weirs,
    XSections,
    Losses,
    Coordinates,
    Vertices,
    Subcatchments,
    Inflows,
    Patterns,
    TimeSeries,
    Curves,
    Controls,
    /// Anything else; preserved as opaque lines
    Other,
}

const PREFIXES: &[(&str, SectionKind)] = &[
    ("junc", SectionKind::Junctions),
    ("outf", SectionKind::Outfalls),
    ("cond", SectionKind::Conduits),
    ("pump", SectionKind::Pumps),
    ("orif", SectionKind::Orifices),
    ("weir", SectionKind::Weirs),
    ("loss", SectionKind::Losses),
    ("xsec", SectionKind::XSections),
    ("coor", SectionKind::Coordinates),
    ("inflow", SectionKind::Inflows),
    ("pattern", SectionKind::Patterns),
    ("timeseries", SectionKind::TimeSeries),
    ("curves", SectionKind::Curves),
    ("subc", SectionKind::Subcatchments),
    ("stora", SectionKind::Storage),
    ("titl", SectionKind::Title),
    ("opti", SectionKind::Options),
    ("repo", SectionKind::Report),
    ("vert", SectionKind::Vertices),
    ("cont", SectionKind::Controls),
];

impl SectionKind {
    pub fn from_name(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        PREFIXES
            .iter()
            .find(|(prefix, _)| lower.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .unwrap_or(SectionKind::Other)
    }

    /// Sections rebuilt from the model on export rather than passed through
    pub fn is_modelled(&self) -> bool {
        !matches!(
            self,
            SectionKind::Title
                | SectionKind::Options
                | SectionKind::Report
                | SectionKind::Vertices
                | SectionKind::Subcatchments
                | SectionKind::Controls
                | SectionKind::Other
        )
    }
}

/// One line of a section body, with its 1-based line number in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub number: usize,
    pub text: String,
}

impl RawLine {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn is_comment(&self) -> bool {
        self.text.trim_start().starts_with(';')
    }

    /// True for lines the record parsers should look at
    pub fn is_data(&self) -> bool {
        !self.is_blank() && !self.is_comment()
    }

    /// Text of a single-`;` description comment; `;;` column headers are not
    /// descriptions.
    pub fn description(&self) -> Option<&str> {
        let trimmed = self.text.trim_start();
        let rest = trimmed.strip_prefix(';')?;
        if rest.starts_with(';') {
            return None;
        }
        Some(rest.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InpSection {
    /// Header name as written, without brackets
    pub name: String,
    pub kind: SectionKind,
    pub header_line: usize,
    pub lines: Vec<RawLine>,
}

impl InpSection {
    pub fn data_lines(&self) -> impl Iterator<Item = &RawLine> {
        self.lines.iter().filter(|l| l.is_data())
    }

    /// Body lines with trailing blank lines removed
    pub fn trimmed_lines(&self) -> Vec<String> {
        let end = self
            .lines
            .iter()
            .rposition(|l| !l.is_blank())
            .map(|i| i + 1)
            .unwrap_or(0);
        self.lines[..end].iter().map(|l| l.text.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InpDocument {
    pub sections: Vec<InpSection>,
}

impl InpDocument {
    /// Every section of one kind, in document order
    pub fn sections_of(&self, kind: SectionKind) -> impl Iterator<Item = &InpSection> {
        self.sections.iter().filter(move |s| s.kind == kind)
    }

    pub fn has(&self, kind: SectionKind) -> bool {
        self.sections_of(kind).next().is_some()
    }
}

/// Split an INP document into sections.
///
/// Text before the first header is ignored. Fails with
/// [`SdiError::MalformedDocument`] only when the text holds no section
/// header at all.
pub fn tokenize(text: &str) -> SdiResult<InpDocument> {
    let mut doc = InpDocument::default();
    let mut current: Option<InpSection> = None;

    for (idx, line) in text.lines().enumerate() {
        let number = idx + 1;
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('[') {
            let name = match rest.find(']') {
                Some(end) => &rest[..end],
                None => rest,
            }
            .trim()
            .to_string();
            if let Some(done) = current.take() {
                doc.sections.push(done);
            }
            current = Some(InpSection {
                kind: SectionKind::from_name(&name),
                name,
                header_line: number,
                lines: Vec::new(),
            });
            continue;
        }
        if let Some(section) = current.as_mut() {
            section.lines.push(RawLine {
                number,
                text: line.trim_end_matches('\r').to_string(),
            });
        }
    }
    if let Some(done) = current.take() {
        doc.sections.push(done);
    }

    if doc.sections.is_empty() {
        return Err(SdiError::MalformedDocument(
            "no [SECTION] headers found".to_string(),
        ));
    }
    Ok(doc)
}

/// Split a data line into fields.
///
/// Fields are separated by whitespace; a double-quoted run is one field
/// (quotes removed, so `""` yields an empty field). Text after an unquoted
/// `;` is an inline comment and dropped.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            ';' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    fields.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() || quoted {
        fields.push(current);
    }
    fields
}
