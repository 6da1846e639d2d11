//! Cycle File Parsing
//!
//! Parses crank-angle-resolved pressure/volume traces (PV diagrams). One
//! cycle file covers one RPM point of one calculation:
//! - Line 1: cylinder count
//! - Then one line per crank angle: `angle p1 v1 p2 v2 ...`

mod parser;
mod types;

pub use parser::{parse_cycle_file, rpm_from_file_name};
pub use types::{wrap_angle, CycleSample, CycleTrace, CylinderState, CylinderStats};
