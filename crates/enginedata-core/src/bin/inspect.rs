//! Parse one result or cycle file and print a JSON summary.
//!
//! Usage: enginedata-inspect <file> [config.json]
//!
//! Files ending in `.pvd` are read as cycle files, with the RPM taken from
//! the file name; everything else is read as a result file.

use anyhow::{bail, Context, Result};
use serde_json::json;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use enginedata_core::config::IngestConfig;
use enginedata_core::cycle::{parse_cycle_file, rpm_from_file_name};
use enginedata_core::results::ResultParser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("Usage: enginedata-inspect <file> [config.json]");
    }

    let path = Path::new(&args[1]);
    let config = match args.get(2) {
        Some(config_path) => IngestConfig::from_file(config_path)
            .with_context(|| format!("loading config {}", config_path))?,
        None => IngestConfig::default(),
    };

    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let is_cycle = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pvd"));

    let summary = if is_cycle {
        let rpm = rpm_from_file_name(path).unwrap_or(0.0);
        let outcome = parse_cycle_file(&text, rpm)
            .with_context(|| format!("parsing cycle file {}", file_name))?;
        let trace = &outcome.value;
        let peak = trace.peak_pressure().map(|(cylinder, stats)| {
            json!({
                "cylinder": cylinder,
                "pressure": stats.peak_pressure,
                "angle": stats.peak_pressure_angle,
            })
        });
        json!({
            "file": file_name,
            "kind": "cycle",
            "rpm": trace.rpm(),
            "cylinders": trace.cylinder_count(),
            "samples": trace.samples().len(),
            "angular_step": trace.angular_step(),
            "peak_pressure": peak,
            "coverage_gaps": trace.coverage_gaps(),
            "diagnostics": outcome.diagnostics,
        })
    } else {
        let outcome = ResultParser::new(&config)
            .parse(&text, &file_name)
            .with_context(|| format!("parsing result file {}", file_name))?;
        let project = &outcome.value;
        let calculations: Vec<_> = project
            .calculations
            .iter()
            .map(|calc| {
                json!({
                    "id": calc.id,
                    "name": calc.display_name,
                    "points": calc.data_points.len(),
                    "rpm_range": calc.rpm_range(),
                    "rpm_step": calc.average_rpm_step(),
                })
            })
            .collect();
        json!({
            "file": file_name,
            "kind": "result",
            "metadata": project.metadata,
            "columns": project.column_headers,
            "calculations": calculations,
            "diagnostics": outcome.diagnostics,
        })
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
