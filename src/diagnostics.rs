//! Mapping of haml-lint JSON reports to editor diagnostics.
//!
//! haml-lint only reports line numbers, so each finding is widened to the
//! trimmed extent of its line.

use serde::Deserialize;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString, Position, Range};

/// Diagnostic source shown in the editor.
pub const DIAGNOSTIC_SOURCE: &str = "haml-lint";

#[derive(Debug, Default, Deserialize)]
struct Report {
    #[serde(default)]
    files: Vec<FileReport>,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    #[serde(default)]
    offenses: Vec<Offense>,
}

#[derive(Debug, Deserialize)]
struct Offense {
    linter_name: Option<String>,
    location: Location,
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
}

#[derive(Debug, Deserialize)]
struct Location {
    line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingSeverity {
    Error,
    Warning,
    Info,
}

impl FindingSeverity {
    fn from_report(severity: &str) -> Self {
        match severity {
            "error" | "fatal" => Self::Error,
            "warning" => Self::Warning,
            _ => Self::Info,
        }
    }
}

/// One offense, positioned on a 0-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub rule: String,
    pub line: u32,
    pub severity: FindingSeverity,
    pub message: String,
}

/// Parse a single-file haml-lint report. Malformed output yields no findings.
pub fn parse_report(output: &str) -> Vec<Finding> {
    let report: Report = match serde_json::from_str(output) {
        Ok(report) => report,
        Err(e) => {
            log::warn!("Could not parse haml-lint output: {e}");
            return Vec::new();
        }
    };

    report
        .files
        .into_iter()
        .flat_map(|file| file.offenses)
        .map(|offense| Finding {
            rule: offense.linter_name.unwrap_or_default(),
            line: offense.location.line.saturating_sub(1) as u32,
            severity: FindingSeverity::from_report(&offense.severity),
            message: offense.message,
        })
        .collect()
}

/// Convert a finding to an LSP diagnostic spanning its trimmed line in `text`.
pub fn finding_to_diagnostic(finding: &Finding, text: &str) -> Diagnostic {
    let range = match text.lines().nth(finding.line as usize) {
        Some(line) => {
            let line = line.trim_end_matches('\r');
            let start = utf16_len(&line[..line.len() - line.trim_start().len()]);
            let end = utf16_len(line);
            Range {
                start: Position::new(finding.line, start),
                end: Position::new(finding.line, end),
            }
        }
        None => Range {
            start: Position::new(finding.line, 0),
            end: Position::new(finding.line, 0),
        },
    };

    let severity = match finding.severity {
        FindingSeverity::Error => DiagnosticSeverity::ERROR,
        FindingSeverity::Warning => DiagnosticSeverity::WARNING,
        FindingSeverity::Info => DiagnosticSeverity::INFORMATION,
    };

    Diagnostic {
        range,
        severity: Some(severity),
        code: (!finding.rule.is_empty()).then(|| NumberOrString::String(finding.rule.clone())),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: finding.message.clone(),
        ..Default::default()
    }
}

/// Length of `s` in UTF-16 code units, the LSP default position encoding.
pub fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}
