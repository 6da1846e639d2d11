//! Parse errors and diagnostics
//!
//! Both file parsers share one error taxonomy. File-level problems abort the
//! parse with a [`ParseError`]; line-level problems are recorded as
//! [`Diagnostic`]s next to the partial result in a [`ParseOutcome`].

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur while parsing result or cycle files
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum ParseError {
    /// Line 1 or the column header line is unusable
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// No column header line follows the metadata line
    #[error("Missing column headers")]
    MissingColumnHeaders,

    /// Data row before the first calculation marker
    #[error("Data line appears before any calculation marker")]
    OrphanDataLine,

    /// A field that is not a number
    #[error("Invalid numeric value '{value}' in column '{column}'")]
    InvalidNumericField { column: String, value: String },

    /// Row field count differs from the column layout
    #[error("Expected {expected} fields, found {found}")]
    ColumnCountMismatch { expected: usize, found: usize },

    /// Per-cylinder data does not match the cylinder count
    #[error("Expected {expected} cylinders, found {found}")]
    CylinderCountMismatch { expected: usize, found: usize },

    /// Marker with no valid rows
    #[error("Calculation '{id}' has no data points and was dropped")]
    EmptyCalculation { id: String },

    /// Two calculations share one marker id
    #[error("Calculation id '{id}' appears more than once")]
    DuplicateCalculation { id: String },
}

/// A recoverable problem found on a single line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// 1-based line number in the source text
    pub line: usize,
    /// What went wrong
    pub error: ParseError,
}

impl Diagnostic {
    /// Diagnostic for 1-based `line`
    pub fn new(line: usize, error: ParseError) -> Self {
        Self { line, error }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Best-effort parse result together with everything that was skipped
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    /// The parsed value
    pub value: T,
    /// Skipped lines and dropped items, in file order
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> ParseOutcome<T> {
    /// True when nothing was skipped or dropped
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Discard diagnostics and keep the value
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Strip a leading `N→` row-number prefix left by some text viewers.
///
/// Returns the remaining text and whether a prefix was removed.
pub(crate) fn clean_line(line: &str) -> (&str, bool) {
    let trimmed = line.trim();
    if let Some((prefix, rest)) = trimmed.split_once('→') {
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
            return (rest.trim(), true);
        }
    }
    (trimmed, false)
}

/// Parse a locale-independent decimal field
pub(crate) fn parse_number(column: &str, token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::InvalidNumericField {
            column: column.to_string(),
            value: token.to_string(),
        })
}
