//! Decoder for the simulator's end-of-run report.
//!
//! The report layout is described by a [`ReportSchema`]: an ordered list of
//! named segments whose patterns, concatenated, must match the report text.
//! When the full pattern fails, progressively longer prefixes are tried to
//! find the first segment that does not match, so the error names it.

use crate::error::MalformedReportError;
use noc_sweep_common::SimulationReport;
use regex::{Captures, Regex};

/// Width of the asterisk lines framing each report block.
pub const DELIMITER_WIDTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unsigned integer count.
    Count,
    /// Real number, plain or scientific notation.
    Real,
}

/// A named numeric field captured by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    /// Capture group name, identical to the `SimulationReport` field.
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: &'static str,
    pub pattern: String,
    pub field: Option<SchemaField>,
}

/// Ordered description of the report layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSchema {
    segments: Vec<Segment>,
}

impl ReportSchema {
    /// Layout printed by the mesh simulator: an incoming packet count, a
    /// delimited free-form body, then a delimited summary of seven labelled
    /// values.
    pub fn popnet() -> Self {
        let delimiter = format!(r"\*{{{}}}", DELIMITER_WIDTH);
        let plain = |name: &'static str, pattern: String| Segment { name, pattern, field: None };
        let labelled = |label: &'static str, name: &'static str, kind: FieldKind| {
            let value = match kind {
                FieldKind::Count => r"\d+",
                FieldKind::Real => r"[\d.e+-]+",
            };
            Segment {
                name: label,
                pattern: format!(r"{}:\s*(?P<{}>{})\s*", regex::escape(label), name, value),
                field: Some(SchemaField { name, kind }),
            }
        };

        let segments = vec![
            Segment {
                name: "incoming packets",
                pattern: r"Incoming packets\s*(?P<total_packets>\d+).*\n".to_string(),
                field: Some(SchemaField { name: "total_packets", kind: FieldKind::Count }),
            },
            plain("opening delimiter", format!(r"{}\n", delimiter)),
            plain("report body", r"[^*]+?".to_string()),
            plain("body delimiter", format!(r"{}\n", delimiter)),
            plain("summary delimiter", format!(r"{}\n", delimiter)),
            labelled("total finished", "finished_packets", FieldKind::Count),
            labelled("average Delay", "avg_delay", FieldKind::Real),
            labelled("total mem power", "mem_power", FieldKind::Real),
            labelled("total crossbar power", "crossbar_power", FieldKind::Real),
            labelled("total arbiter power", "arbiter_power", FieldKind::Real),
            labelled("total link power", "link_power", FieldKind::Real),
            labelled("total power", "total_power", FieldKind::Real),
            plain("closing delimiter", delimiter),
        ];
        ReportSchema { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn fields(&self) -> impl Iterator<Item = SchemaField> + '_ {
        self.segments.iter().filter_map(|segment| segment.field)
    }
}

impl Default for ReportSchema {
    fn default() -> Self {
        ReportSchema::popnet()
    }
}

/// Compiled form of a [`ReportSchema`].
#[derive(Debug, Clone)]
pub struct ReportDecoder {
    full: Regex,
    /// `prefixes[i]` matches segments `0..=i`.
    prefixes: Vec<(&'static str, Regex)>,
}

impl ReportDecoder {
    pub fn new(schema: &ReportSchema) -> Result<Self, regex::Error> {
        let mut pattern = String::new();
        let mut prefixes = Vec::with_capacity(schema.segments().len());
        for segment in schema.segments() {
            pattern.push_str(&segment.pattern);
            prefixes.push((segment.name, Regex::new(&pattern)?));
        }
        Ok(ReportDecoder { full: Regex::new(&pattern)?, prefixes })
    }

    /// Decodes `text` completely or not at all.
    pub fn decode(&self, text: &str) -> Result<SimulationReport, MalformedReportError> {
        let caps = match self.full.captures(text) {
            Some(caps) => caps,
            None => return Err(self.diagnose(text)),
        };

        let report = SimulationReport {
            total_packets: count(&caps, "total_packets")?,
            finished_packets: count(&caps, "finished_packets")?,
            avg_delay: real(&caps, "avg_delay")?,
            mem_power: real(&caps, "mem_power")?,
            crossbar_power: real(&caps, "crossbar_power")?,
            arbiter_power: real(&caps, "arbiter_power")?,
            link_power: real(&caps, "link_power")?,
            total_power: real(&caps, "total_power")?,
        };
        if report.total_packets == 0 {
            return Err(MalformedReportError::ZeroTotalPackets);
        }
        Ok(report)
    }

    fn diagnose(&self, text: &str) -> MalformedReportError {
        let segment = self
            .prefixes
            .iter()
            .find(|(_, prefix)| !prefix.is_match(text))
            .or_else(|| self.prefixes.last())
            .map_or("report", |(name, _)| *name);
        MalformedReportError::MissingSegment { segment }
    }
}

impl Default for ReportDecoder {
    fn default() -> Self {
        ReportDecoder::new(&ReportSchema::popnet()).expect("built-in report schema is a valid regex")
    }
}

fn field_text<'t>(caps: &Captures<'t>, name: &'static str) -> &'t str {
    caps.name(name).map_or("", |m| m.as_str())
}

fn count(caps: &Captures<'_>, name: &'static str) -> Result<u64, MalformedReportError> {
    let text = field_text(caps, name);
    text.parse()
        .map_err(|_| MalformedReportError::InvalidNumber { field: name, text: text.to_string() })
}

fn real(caps: &Captures<'_>, name: &'static str) -> Result<f64, MalformedReportError> {
    let text = field_text(caps, name);
    text.parse()
        .map_err(|_| MalformedReportError::InvalidNumber { field: name, text: text.to_string() })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A report in the simulator's layout with the given summary values.
    pub(crate) fn sample_report(total: u64, finished: u64) -> String {
        let stars = "*".repeat(DELIMITER_WIDTH);
        format!(
            "reading trace file\n\
             Incoming packets {total}\n\
             {stars}\n\
             total cycles: 20000\n\
             routers: 81\n\
             {stars}\n\
             {stars}\n\
             total finished:       {finished}\n\
             average Delay:        23.4567\n\
             total mem power:      1.2345e-03\n\
             total crossbar power: 4.5e-04\n\
             total arbiter power:  2.1e-05\n\
             total link power:     3.3e-02\n\
             total power:          3.5e-02\n\
             {stars}\n"
        )
    }

    #[test]
    fn decodes_every_field() {
        let report = ReportDecoder::default().decode(&sample_report(100, 95)).expect("well-formed");
        assert_eq!(report.total_packets, 100);
        assert_eq!(report.finished_packets, 95);
        assert_relative_eq!(report.avg_delay, 23.4567);
        assert_relative_eq!(report.mem_power, 1.2345e-3);
        assert_relative_eq!(report.crossbar_power, 4.5e-4);
        assert_relative_eq!(report.arbiter_power, 2.1e-5);
        assert_relative_eq!(report.link_power, 3.3e-2);
        assert_relative_eq!(report.total_power, 3.5e-2);
        assert_relative_eq!(report.completion_rate(), 95.0);
    }

    #[test]
    fn missing_final_delimiter_is_rejected() {
        let text = sample_report(100, 95);
        let truncated = text.trim_end().trim_end_matches('*');
        assert_eq!(
            ReportDecoder::default().decode(truncated),
            Err(MalformedReportError::MissingSegment { segment: "closing delimiter" })
        );
    }

    #[test]
    fn names_the_first_missing_field() {
        let text = sample_report(100, 95).replace("total link power", "total lnk power");
        assert_eq!(
            ReportDecoder::default().decode(&text),
            Err(MalformedReportError::MissingSegment { segment: "total link power" })
        );
    }

    #[test]
    fn empty_output_is_rejected() {
        assert_eq!(
            ReportDecoder::default().decode(""),
            Err(MalformedReportError::MissingSegment { segment: "incoming packets" })
        );
    }

    #[test]
    fn short_delimiter_is_rejected() {
        let stars = "*".repeat(DELIMITER_WIDTH);
        let text = sample_report(100, 95).replacen(&stars, &"*".repeat(DELIMITER_WIDTH - 1), 1);
        assert_eq!(
            ReportDecoder::default().decode(&text),
            Err(MalformedReportError::MissingSegment { segment: "opening delimiter" })
        );
    }

    #[test]
    fn garbled_number_is_rejected() {
        let text = sample_report(100, 95).replace("23.4567", "23.45.67");
        assert_eq!(
            ReportDecoder::default().decode(&text),
            Err(MalformedReportError::InvalidNumber { field: "avg_delay", text: "23.45.67".to_string() })
        );
    }

    #[test]
    fn zero_incoming_packets_is_rejected() {
        assert_eq!(
            ReportDecoder::default().decode(&sample_report(0, 0)),
            Err(MalformedReportError::ZeroTotalPackets)
        );
    }

    #[test]
    fn schema_lists_report_fields() {
        let names: Vec<&str> = ReportSchema::popnet().fields().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "total_packets",
                "finished_packets",
                "avg_delay",
                "mem_power",
                "crossbar_power",
                "arbiter_power",
                "link_power",
                "total_power",
            ]
        );
    }
}
