//! Result file parser
//!
//! Reads the metadata and column header lines, then walks the remaining
//! lines as a two-state machine: before the first marker every data line is
//! an orphan; after a marker, data lines belong to that calculation.

use std::collections::HashMap;

use super::columns::{ChannelAliases, ColumnLayout};
use super::types::{Calculation, EngineMetadata, EngineProject, EngineType};
use crate::config::IngestConfig;
use crate::diagnostics::{clean_line, Diagnostic, ParseError, ParseOutcome};

/// Marker line split into its id and display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Full marker text including the sentinel
    pub id: String,
    /// Label shown to users (see [`parse_marker`])
    pub display_name: String,
}

/// Parse a marker line such as `$3.1 R 0.86`.
///
/// The id is the whole marker. The display name is the text after the
/// sentinel, minus a leading integer run number when a label follows it:
/// `$1 baseline` is shown as `baseline`, while `$1` and `$3.1 R 0.86` keep
/// their full text.
///
/// Returns `None` if the line does not start with `sentinel`.
pub fn parse_marker(line: &str, sentinel: char) -> Option<Marker> {
    let (cleaned, _) = clean_line(line);
    let rest = cleaned.strip_prefix(sentinel)?.trim();
    Some(Marker {
        id: cleaned.to_string(),
        display_name: display_name(rest).to_string(),
    })
}

fn display_name(text: &str) -> &str {
    match text.split_once(char::is_whitespace) {
        Some((number, label)) if number.chars().all(|c| c.is_ascii_digit()) => {
            let label = label.trim();
            if label.is_empty() {
                text
            } else {
                label
            }
        }
        _ => text,
    }
}

enum State {
    AwaitingMarker,
    InCalculation(usize),
}

/// Parse a result file with the default configuration
pub fn parse_result_file(
    text: &str,
    file_identifier: &str,
) -> Result<ParseOutcome<EngineProject>, ParseError> {
    ResultParser::new(&IngestConfig::default()).parse(text, file_identifier)
}

/// Result file parser bound to one configuration
#[derive(Debug, Clone)]
pub struct ResultParser {
    sentinel: char,
    aliases: ChannelAliases,
}

impl ResultParser {
    /// Parser using the marker sentinel and aliases from `config`
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            sentinel: config.marker_sentinel,
            aliases: ChannelAliases::new(&config.channel_aliases),
        }
    }

    /// Parse raw result file text.
    ///
    /// Fails only when the metadata or header line is unusable; bad data
    /// lines are skipped and reported in the outcome's diagnostics.
    pub fn parse(
        &self,
        text: &str,
        file_identifier: &str,
    ) -> Result<ParseOutcome<EngineProject>, ParseError> {
        let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

        let metadata = match lines.next() {
            Some((_, line)) => parse_metadata(line)?,
            None => return Err(ParseError::MalformedHeader("file is empty".to_string())),
        };
        let layout = match lines.next() {
            Some((_, line)) => {
                ColumnLayout::from_header(clean_line(line).0, metadata.num_cylinders, &self.aliases)?
            }
            None => return Err(ParseError::MissingColumnHeaders),
        };

        let mut diagnostics = Vec::new();
        let mut calculations: Vec<Calculation> = Vec::new();
        let mut marker_lines: Vec<usize> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut state = State::AwaitingMarker;

        for (line_no, raw) in lines {
            let (line, index_stripped) = clean_line(raw);
            if line.is_empty() {
                continue;
            }

            if let Some(marker) = parse_marker(line, self.sentinel) {
                let index = match by_id.get(&marker.id) {
                    Some(&index) => {
                        tracing::debug!(
                            file = file_identifier,
                            line = line_no,
                            id = %marker.id,
                            "repeated marker continues existing calculation"
                        );
                        calculations[index].display_name = marker.display_name;
                        index
                    }
                    None => {
                        by_id.insert(marker.id.clone(), calculations.len());
                        marker_lines.push(line_no);
                        calculations.push(Calculation {
                            id: marker.id,
                            display_name: marker.display_name,
                            data_points: Vec::new(),
                        });
                        calculations.len() - 1
                    }
                };
                state = State::InCalculation(index);
                continue;
            }

            let result = match state {
                State::AwaitingMarker => Err(ParseError::OrphanDataLine),
                State::InCalculation(index) => layout
                    .parse_row(line, index_stripped)
                    .map(|point| calculations[index].data_points.push(point)),
            };
            if let Err(error) = result {
                tracing::warn!(
                    file = file_identifier,
                    line = line_no,
                    %error,
                    "skipping result line"
                );
                diagnostics.push(Diagnostic::new(line_no, error));
            }
        }

        let mut kept = Vec::with_capacity(calculations.len());
        for (calculation, line_no) in calculations.into_iter().zip(marker_lines) {
            if calculation.data_points.is_empty() {
                tracing::warn!(
                    file = file_identifier,
                    line = line_no,
                    id = %calculation.id,
                    "dropping calculation without data points"
                );
                diagnostics.push(Diagnostic::new(
                    line_no,
                    ParseError::EmptyCalculation { id: calculation.id },
                ));
            } else {
                kept.push(calculation);
            }
        }

        tracing::debug!(
            file = file_identifier,
            calculations = kept.len(),
            diagnostics = diagnostics.len(),
            "parsed result file"
        );

        Ok(ParseOutcome {
            value: EngineProject {
                file_identifier: file_identifier.to_string(),
                metadata,
                column_headers: layout.headers(),
                calculations: kept,
            },
            diagnostics,
        })
    }
}

/// Parse line 1: `<cylinders> <type> [breath numTurbo numWasteGate] [labels...]`
fn parse_metadata(line: &str) -> Result<EngineMetadata, ParseError> {
    let (cleaned, _) = clean_line(line);
    let mut parts = cleaned.split_whitespace();

    let cylinders = parts
        .next()
        .ok_or_else(|| ParseError::MalformedHeader("metadata line is empty".to_string()))?;
    let num_cylinders = match cylinders.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            return Err(ParseError::MalformedHeader(format!(
                "cylinder count '{}' is not a positive integer",
                cylinders
            )))
        }
    };

    let tag = parts
        .next()
        .ok_or_else(|| ParseError::MalformedHeader("engine type tag is missing".to_string()))?;
    let mut metadata = EngineMetadata::new(num_cylinders, EngineType::from_tag(tag));

    // Extended exports append numeric fields; anything else is a trailing label
    let extra: Vec<i64> = parts.map_while(|p| p.parse().ok()).collect();
    metadata.breath = extra.first().copied();
    metadata.num_turbo = extra.get(1).copied();
    metadata.num_wastegate = extra.get(2).copied();

    Ok(metadata)
}
