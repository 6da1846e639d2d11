//! Result File Parsing
//!
//! Parses tabular result exports (`.det`, `.pou`) of the engine simulation
//! tool. A result file holds:
//! - A metadata line (cylinder count, engine type)
//! - A column header line
//! - Any number of calculations, each opened by a `$`-marker line and
//!   followed by one data row per RPM point

mod columns;
mod parser;
mod types;

pub use parser::{parse_marker, parse_result_file, Marker, ResultParser};
pub use types::{
    channel, Calculation, ChannelValue, CylinderValues, DataPoint, EngineMetadata, EngineProject,
    EngineType, Peak,
};
pub(crate) use types::sorted_by_rpm;
