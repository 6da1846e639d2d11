//! Cycle file parser

use std::path::Path;

use super::types::{CycleSample, CycleTrace, CylinderState};
use crate::diagnostics::{clean_line, parse_number, Diagnostic, ParseError, ParseOutcome};

/// Parse a cycle file.
///
/// `rpm` normally comes from the file name (see [`rpm_from_file_name`]).
/// Samples are kept in stored order; lines with the wrong number of
/// pressure/volume pairs or non-numeric fields are skipped and reported.
pub fn parse_cycle_file(text: &str, rpm: f64) -> Result<ParseOutcome<CycleTrace>, ParseError> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line));

    let cylinder_count = match lines.next() {
        Some((_, line)) => parse_cylinder_count(line)?,
        None => return Err(ParseError::MalformedHeader("file is empty".to_string())),
    };

    let mut samples = Vec::new();
    let mut diagnostics = Vec::new();
    let mut lines = lines.peekable();

    // Optional column header line ("Deg  Cylinder(1) ...")
    if let Some((_, line)) = lines.peek() {
        let first = clean_line(line).0.split_whitespace().next();
        if first.is_some_and(|token| token.eq_ignore_ascii_case("deg")) {
            lines.next();
        }
    }

    for (line_no, raw) in lines {
        let (line, _) = clean_line(raw);
        if line.is_empty() {
            continue;
        }
        match parse_sample(line, cylinder_count) {
            Ok(sample) => samples.push(sample),
            Err(error) => {
                tracing::warn!(rpm, line = line_no, %error, "skipping cycle line");
                diagnostics.push(Diagnostic::new(line_no, error));
            }
        }
    }

    tracing::debug!(
        rpm,
        cylinders = cylinder_count,
        samples = samples.len(),
        diagnostics = diagnostics.len(),
        "parsed cycle file"
    );

    Ok(ParseOutcome {
        value: CycleTrace::new(rpm, cylinder_count, samples),
        diagnostics,
    })
}

/// Extract the RPM from a `<project>_<rpm>.<ext>` file name, e.g. `V8_2000.pvd`
pub fn rpm_from_file_name<P: AsRef<Path>>(path: P) -> Option<f64> {
    let stem = path.as_ref().file_stem()?.to_str()?;
    let (_, rpm) = stem.rsplit_once('_')?;
    rpm.parse::<f64>().ok().filter(|rpm| rpm.is_finite() && *rpm > 0.0)
}

fn parse_cylinder_count(line: &str) -> Result<usize, ParseError> {
    let token = clean_line(line)
        .0
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::MalformedHeader("cylinder count line is empty".to_string()))?;
    match token.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ParseError::MalformedHeader(format!(
            "cylinder count '{}' is not a positive integer",
            token
        ))),
    }
}

fn parse_sample(line: &str, cylinder_count: usize) -> Result<CycleSample, ParseError> {
    let mut tokens = line.split_whitespace();
    // Line is non-empty, so there is at least one token
    let angle = parse_number("Deg", tokens.next().unwrap_or_default())?;

    let fields: Vec<&str> = tokens.collect();
    if fields.len() != cylinder_count * 2 {
        return Err(ParseError::CylinderCountMismatch {
            expected: cylinder_count,
            found: fields.len() / 2,
        });
    }

    let per_cylinder = fields
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| -> Result<CylinderState, ParseError> {
            Ok(CylinderState {
                pressure_bar: parse_number(&format!("Pressure({})", i + 1), pair[0])?,
                volume_cm3: parse_number(&format!("Volume({})", i + 1), pair[1])?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CycleSample {
        angle_degrees: angle,
        per_cylinder,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_file() {
        let text = "2\n0 1.0 500 1.1 500\n10 2.5 450 2.4 452\n";
        let outcome = parse_cycle_file(text, 2000.0).unwrap();
        assert!(outcome.is_clean());
        let trace = outcome.value;
        assert_eq!(trace.rpm(), 2000.0);
        assert_eq!(trace.cylinder_count(), 2);
        assert_eq!(trace.samples().len(), 2);
        assert_eq!(
            trace.samples()[1].per_cylinder[1],
            CylinderState {
                pressure_bar: 2.4,
                volume_cm3: 452.0
            }
        );
    }

    #[test]
    fn test_column_header_line_skipped() {
        let text = "1\n   Deg   Cylinder(1)\n0 1.0 500\n";
        let outcome = parse_cycle_file(text, 3000.0).unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.value.samples().len(), 1);
    }

    #[test]
    fn test_unrecognised_second_line_is_data() {
        let text = "1\n0x5 1 500\n10 2 450\n";
        let outcome = parse_cycle_file(text, 2000.0).unwrap();
        assert_eq!(outcome.value.samples().len(), 1);
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::new(
                2,
                ParseError::InvalidNumericField {
                    column: "Deg".to_string(),
                    value: "0x5".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_cylinder_count_mismatch_skipped() {
        let text = "2\n0 1.0 500 1.1 500\n10 2.5 450\n20 3.0 400 3.1 401\n";
        let outcome = parse_cycle_file(text, 2000.0).unwrap();
        assert_eq!(outcome.value.samples().len(), 2);
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::new(
                3,
                ParseError::CylinderCountMismatch {
                    expected: 2,
                    found: 1
                }
            )]
        );
    }

    #[test]
    fn test_invalid_number_skipped() {
        let text = "1\n0 1.0 500\n10 x 450\n";
        let outcome = parse_cycle_file(text, 2000.0).unwrap();
        assert_eq!(outcome.value.samples().len(), 1);
        assert!(matches!(
            outcome.diagnostics[0].error,
            ParseError::InvalidNumericField { .. }
        ));
    }

    #[test]
    fn test_stored_order_kept() {
        let text = "1\n360 40 100\n0 1 500\n180 2 300\n";
        let trace = parse_cycle_file(text, 2000.0).unwrap().value;
        let angles: Vec<f64> = trace.samples().iter().map(|s| s.angle_degrees).collect();
        assert_eq!(angles, vec![360.0, 0.0, 180.0]);
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            parse_cycle_file("", 2000.0),
            Err(ParseError::MalformedHeader(_))
        ));
        assert!(matches!(
            parse_cycle_file("zero\n0 1 2\n", 2000.0),
            Err(ParseError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_rpm_from_file_name() {
        assert_eq!(rpm_from_file_name("V8_2000.pvd"), Some(2000.0));
        assert_eq!(rpm_from_file_name("/data/my_engine_7800.pvd"), Some(7800.0));
        assert_eq!(rpm_from_file_name("engine.pvd"), None);
        assert_eq!(rpm_from_file_name("engine_max.pvd"), None);
    }
}
