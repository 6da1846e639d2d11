//! Column layout of result files
//!
//! Turns the header line into an ordered list of scalar and per-cylinder
//! columns, then uses that layout to split data rows into [`DataPoint`]s.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use super::types::{channel, ChannelValue, CylinderValues, DataPoint};
use crate::diagnostics::{parse_number, ParseError};

/// Legacy column names mapped onto canonical ones
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("TC-Av", channel::MAX_CYLINDER_TEMPERATURE),
    ("Purc", channel::VOLUMETRIC_EFFICIENCY),
    ("Convergence", channel::CONVERGENCE),
];

fn cylinder_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // "PurCyl( 1)" -> "PurCyl(1)", "PurCyl[ 4 ]" -> "PurCyl[4]"
    PATTERN.get_or_init(|| {
        Regex::new(r"\(\s*(\d+)\s*\)|\[\s*(\d+)\s*\]").expect("static regex is valid")
    })
}

/// Column name resolution with built-in and user-supplied aliases
#[derive(Debug, Clone)]
pub(crate) struct ChannelAliases {
    aliases: BTreeMap<String, String>,
}

impl ChannelAliases {
    pub(crate) fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut aliases: BTreeMap<String, String> = BUILTIN_ALIASES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        aliases.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self { aliases }
    }

    pub(crate) fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Scalar,
    PerCylinder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    /// Header text for this column, e.g. `PCylMax[4]`
    fn header(&self, cylinders: usize) -> String {
        match self.kind {
            ColumnKind::Scalar => self.name.clone(),
            ColumnKind::PerCylinder => format!("{}[{}]", self.name, cylinders),
        }
    }
}

/// Header token after normalization
enum HeaderToken<'a> {
    Plain(&'a str),
    /// `Name[N]`: a whole per-cylinder group declared at once
    Group(&'a str, usize),
    /// `Name(k)`: cylinder k of a spelled-out group
    Member(&'a str, usize),
}

fn split_suffix(token: &str, open: char, close: char) -> Option<(&str, usize)> {
    let body = token.strip_suffix(close)?;
    let (name, index) = body.rsplit_once(open)?;
    let index = index.parse().ok()?;
    (!name.is_empty()).then_some((name, index))
}

fn classify(token: &str) -> HeaderToken<'_> {
    if let Some((name, count)) = split_suffix(token, '[', ']') {
        HeaderToken::Group(name, count)
    } else if let Some((name, index)) = split_suffix(token, '(', ')') {
        HeaderToken::Member(name, index)
    } else {
        HeaderToken::Plain(token)
    }
}

/// Ordered columns of a result file
#[derive(Debug, Clone)]
pub(crate) struct ColumnLayout {
    columns: Vec<Column>,
    cylinders: usize,
    /// Whether the first header (and row) token is a row index
    has_index_column: bool,
}

impl ColumnLayout {
    /// Build the layout from the header line
    pub(crate) fn from_header(
        line: &str,
        cylinders: usize,
        aliases: &ChannelAliases,
    ) -> Result<Self, ParseError> {
        let normalized = cylinder_index_pattern().replace_all(line, |caps: &regex::Captures| {
            match (caps.get(1), caps.get(2)) {
                (Some(index), _) => format!("({})", index.as_str()),
                (_, Some(count)) => format!("[{}]", count.as_str()),
                _ => String::new(),
            }
        });
        let mut tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(ParseError::MissingColumnHeaders);
        }

        // The first column is a row index unless the export already starts at RPM
        let has_index_column = aliases.canonical(tokens[0]) != channel::RPM;
        if has_index_column {
            tokens.remove(0);
        }
        if tokens.is_empty() {
            return Err(ParseError::MissingColumnHeaders);
        }

        let mut columns: Vec<Column> = Vec::new();
        // (name, highest member index seen) of the spelled-out group being read
        let mut open_group: Option<(String, usize)> = None;

        for token in tokens {
            let classified = classify(token);
            if let Some((name, seen)) = open_group.take() {
                match &classified {
                    HeaderToken::Member(next, index)
                        if aliases.canonical(next) == name && *index == seen + 1 =>
                    {
                        open_group = Some((name, *index));
                        continue;
                    }
                    _ => close_group(&mut columns, name, seen, cylinders)?,
                }
            }
            match classified {
                HeaderToken::Plain(name) => columns.push(Column {
                    name: aliases.canonical(name).to_string(),
                    kind: ColumnKind::Scalar,
                }),
                HeaderToken::Group(name, count) => {
                    if count != cylinders {
                        return Err(ParseError::MalformedHeader(format!(
                            "column '{}' declares {} cylinders, engine has {}",
                            name, count, cylinders
                        )));
                    }
                    columns.push(Column {
                        name: aliases.canonical(name).to_string(),
                        kind: ColumnKind::PerCylinder,
                    });
                }
                HeaderToken::Member(name, 1) => {
                    open_group = Some((aliases.canonical(name).to_string(), 1));
                }
                HeaderToken::Member(name, index) => {
                    return Err(ParseError::MalformedHeader(format!(
                        "column '{}({})' does not start at cylinder 1",
                        name, index
                    )));
                }
            }
        }
        if let Some((name, seen)) = open_group {
            close_group(&mut columns, name, seen, cylinders)?;
        }

        let rpm_column = columns.iter().find(|c| c.name == channel::RPM);
        match rpm_column {
            Some(column) if column.kind == ColumnKind::Scalar => {}
            _ => {
                return Err(ParseError::MalformedHeader(
                    "column headers have no RPM column".to_string(),
                ))
            }
        }

        Ok(Self {
            columns,
            cylinders,
            has_index_column,
        })
    }

    /// Canonical header text of every column, index column excluded
    pub(crate) fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header(self.cylinders)).collect()
    }

    /// Number of numeric fields a row carries after the index column
    pub(crate) fn field_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| match c.kind {
                ColumnKind::Scalar => 1,
                ColumnKind::PerCylinder => self.cylinders,
            })
            .sum()
    }

    /// Split a data row into a [`DataPoint`].
    ///
    /// `index_stripped` is set when the row number was already removed as a
    /// `N→` prefix.
    pub(crate) fn parse_row(&self, line: &str, index_stripped: bool) -> Result<DataPoint, ParseError> {
        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        let expected = self.field_count();
        let expect_index = self.has_index_column && !index_stripped;
        let found = tokens.len().saturating_sub(expect_index as usize);
        if tokens.len() != expected + expect_index as usize {
            return Err(ParseError::ColumnCountMismatch { expected, found });
        }
        if expect_index {
            tokens.remove(0);
        }

        let mut fields = tokens.into_iter();
        let mut rpm = None;
        let mut channels = BTreeMap::new();
        for column in &self.columns {
            match column.kind {
                ColumnKind::Scalar => {
                    // Field count was checked above
                    let token = fields.next().unwrap_or_default();
                    let value = parse_number(&column.name, token)?;
                    if column.name == channel::RPM {
                        rpm = Some(value);
                    } else {
                        channels.insert(column.name.clone(), ChannelValue::Scalar(value));
                    }
                }
                ColumnKind::PerCylinder => {
                    let values = fields
                        .by_ref()
                        .take(self.cylinders)
                        .map(|token| parse_number(&column.name, token))
                        .collect::<Result<Vec<f64>, ParseError>>()?;
                    let values = CylinderValues::new(values, self.cylinders)?;
                    channels.insert(column.name.clone(), ChannelValue::PerCylinder(values));
                }
            }
        }

        let rpm = rpm.ok_or_else(|| {
            ParseError::MalformedHeader("column headers have no RPM column".to_string())
        })?;
        Ok(DataPoint { rpm, channels })
    }
}

fn close_group(
    columns: &mut Vec<Column>,
    name: String,
    seen: usize,
    cylinders: usize,
) -> Result<(), ParseError> {
    if seen != cylinders {
        return Err(ParseError::MalformedHeader(format!(
            "column '{}' lists {} cylinders, engine has {}",
            name, seen, cylinders
        )));
    }
    columns.push(Column {
        name,
        kind: ColumnKind::PerCylinder,
    });
    Ok(())
}
