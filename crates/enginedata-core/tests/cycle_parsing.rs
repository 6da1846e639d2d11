//! Tests for cycle file parsing

use enginedata_core::cycle::{rpm_from_file_name, CycleTrace};
use enginedata_core::diagnostics::ParseError;
use enginedata_core::parse_cycle_file;
use pretty_assertions::assert_eq;
use std::f64::consts::PI;

/// Two cylinders, 360 degrees apart, pressure peaking near TDC of each
fn synthetic_cycle(step: usize) -> String {
    let mut text = String::from("2\nDeg  Pressure(1) Volume(1) Pressure(2) Volume(2)\n");
    for angle in (0..720).step_by(step) {
        let a = angle as f64;
        let p1 = 30.0 + 25.0 * ((a - 360.0) * PI / 720.0).cos();
        let p2 = 28.0 + 24.0 * (a * PI / 720.0).cos();
        let v1 = 275.0 - 225.0 * ((a - 360.0) * PI / 360.0).cos();
        let v2 = 275.0 - 225.0 * (a * PI / 360.0).cos();
        text.push_str(&format!("{} {} {} {} {}\n", a, p1, v1, p2, v2));
    }
    text
}

fn brute_force_peak(trace: &CycleTrace, cylinder: usize) -> (f64, f64) {
    let mut best = (f64::NEG_INFINITY, 0.0);
    for sample in trace.samples() {
        let pressure = sample.per_cylinder[cylinder].pressure_bar;
        if pressure > best.0 {
            best = (pressure, sample.angle_degrees);
        }
    }
    best
}

#[test]
fn test_peak_matches_brute_force_scan() {
    let outcome = parse_cycle_file(&synthetic_cycle(2), 3000.0).unwrap();
    assert!(outcome.is_clean());

    let trace = outcome.value;
    assert_eq!(trace.samples().len(), 360);
    for cylinder in 0..2 {
        let stats = trace.statistics(cylinder).unwrap();
        assert_eq!(
            (stats.peak_pressure, stats.peak_pressure_angle),
            brute_force_peak(&trace, cylinder)
        );
    }

    // Cylinder 1 peaks at 360 degrees, cylinder 2 at 0
    assert_eq!(trace.statistics(0).unwrap().peak_pressure_angle, 360.0);
    assert_eq!(trace.statistics(1).unwrap().peak_pressure_angle, 0.0);
    let (cylinder, stats) = trace.peak_pressure().unwrap();
    assert_eq!(cylinder, 0);
    assert_eq!(stats.peak_pressure, 55.0);
}

#[test]
fn test_volume_extremes() {
    let trace = parse_cycle_file(&synthetic_cycle(10), 3000.0).unwrap().value;
    let stats = trace.statistics(1).unwrap();
    assert_eq!(stats.min_volume, 50.0);
    assert_eq!(stats.max_volume, 500.0);
    assert_eq!(stats.volume_range(), 450.0);
}

#[test]
fn test_step_and_coverage() {
    let trace = parse_cycle_file(&synthetic_cycle(10), 2000.0).unwrap().value;
    assert_eq!(trace.angular_step(), Some(10.0));
    assert!(trace.coverage_gaps().is_empty());

    let text = "1\n0 1 500\n10 2 450\n20 3 400\n60 4 350\n";
    let trace = parse_cycle_file(text, 2000.0).unwrap().value;
    assert_eq!(trace.angular_step(), Some(10.0));
    assert_eq!(trace.coverage_gaps(), vec![(20.0, 60.0), (60.0, 720.0)]);
}

#[test]
fn test_crank_angles_from_negative_start() {
    let text = "1\n-20 5 300\n-10 6 250\n0 7 200\n10 6 250\n";
    let trace = parse_cycle_file(text, 2000.0).unwrap().value;

    // Stored order is kept as-is
    let angles: Vec<f64> = trace.samples().iter().map(|s| s.angle_degrees).collect();
    assert_eq!(angles, vec![-20.0, -10.0, 0.0, 10.0]);

    let normalized = trace.normalized();
    let angles: Vec<f64> = normalized
        .samples()
        .iter()
        .map(|s| s.angle_degrees)
        .collect();
    assert_eq!(angles, vec![0.0, 10.0, 700.0, 710.0]);
    assert_eq!(
        normalized.statistics(0).unwrap().peak_pressure,
        trace.statistics(0).unwrap().peak_pressure
    );
}

#[test]
fn test_bad_lines_are_reported() {
    let text = "2\n0 1 500 1 500\n10 2 450\n20 x 400 3 400\n30 4 350 4 350\n";
    let outcome = parse_cycle_file(text, 2000.0).unwrap();
    assert_eq!(outcome.value.samples().len(), 2);

    let lines: Vec<usize> = outcome.diagnostics.iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![3, 4]);
    assert_eq!(
        outcome.diagnostics[0].error,
        ParseError::CylinderCountMismatch {
            expected: 2,
            found: 1
        }
    );
}

#[test]
fn test_rpm_from_file_name() {
    assert_eq!(rpm_from_file_name("V8_2000.pvd"), Some(2000.0));
    assert_eq!(rpm_from_file_name("/data/Vesta_1.6_5500.pvd"), Some(5500.0));
    assert_eq!(rpm_from_file_name("cycle.pvd"), None);
}
