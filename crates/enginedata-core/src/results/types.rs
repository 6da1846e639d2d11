//! Result file data model

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::diagnostics::ParseError;

/// Canonical channel names used as keys in [`DataPoint::channels`]
pub mod channel {
    /// Engine speed
    pub const RPM: &str = "RPM";
    /// Average power
    pub const AVERAGE_POWER: &str = "P-Av";
    /// Brake torque
    pub const TORQUE: &str = "Torque";
    /// Solver convergence
    pub const CONVERGENCE: &str = "Conv";
    /// Volumetric efficiency coefficient, per cylinder
    pub const VOLUMETRIC_EFFICIENCY: &str = "PurCyl";
    /// Max exhaust temperature, per cylinder
    pub const MAX_EXHAUST_TEMPERATURE: &str = "TUbMax";
    /// Max in-cylinder temperature, per cylinder
    pub const MAX_CYLINDER_TEMPERATURE: &str = "TCylMax";
    /// Max in-cylinder pressure, per cylinder
    pub const MAX_CYLINDER_PRESSURE: &str = "PCylMax";
    /// Detonation index, per cylinder
    pub const DETONATION: &str = "Deto";
}

/// Engine aspiration tag from the metadata line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineType {
    /// `NATUR`
    NaturallyAspirated,
    /// `TURBO`
    Turbocharged,
    /// Any other tag the calculation tool wrote
    Other(String),
}

impl EngineType {
    /// Interpret a metadata tag (`NATUR`, `TURBO`, ...)
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "NATUR" => EngineType::NaturallyAspirated,
            "TURBO" => EngineType::Turbocharged,
            _ => EngineType::Other(tag.to_string()),
        }
    }

    /// The tag as written in result files
    pub fn tag(&self) -> &str {
        match self {
            EngineType::NaturallyAspirated => "NATUR",
            EngineType::Turbocharged => "TURBO",
            EngineType::Other(tag) => tag,
        }
    }
}

/// Engine description parsed from line 1 of a result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineMetadata {
    /// Number of cylinders (always > 0)
    pub num_cylinders: usize,

    /// Aspiration type
    pub engine_type: EngineType,

    /// Breath flag of extended exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breath: Option<i64>,

    /// Turbocharger count of extended exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turbo: Option<i64>,

    /// Wastegate count of extended exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_wastegate: Option<i64>,
}

impl EngineMetadata {
    /// Metadata without turbo or extra header fields
    pub fn new(num_cylinders: usize, engine_type: EngineType) -> Self {
        Self {
            num_cylinders,
            engine_type,
            breath: None,
            num_turbo: None,
            num_wastegate: None,
        }
    }
}

/// One value per cylinder, ordered cylinder 1..N.
///
/// Only constructed through [`CylinderValues::new`], which checks the length
/// against the engine's cylinder count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CylinderValues {
    values: Vec<f64>,
}

impl CylinderValues {
    /// Build a per-cylinder array, rejecting a length other than `cylinders`
    pub fn new(values: Vec<f64>, cylinders: usize) -> Result<Self, ParseError> {
        if values.len() != cylinders {
            return Err(ParseError::CylinderCountMismatch {
                expected: cylinders,
                found: values.len(),
            });
        }
        Ok(Self { values })
    }

    /// Number of cylinders covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True for a zero-cylinder set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for a 0-based cylinder index
    pub fn get(&self, cylinder: usize) -> Option<f64> {
        self.values.get(cylinder).copied()
    }

    /// Values in cylinder order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Mean across cylinders
    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Largest value across cylinders
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}

/// Value of one column in a data row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    /// One value for the whole engine
    Scalar(f64),
    /// One value per cylinder
    PerCylinder(CylinderValues),
}

impl ChannelValue {
    /// The value, if this is a scalar channel
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ChannelValue::Scalar(v) => Some(*v),
            ChannelValue::PerCylinder(_) => None,
        }
    }

    /// The values, if this is a per-cylinder channel
    pub fn as_cylinders(&self) -> Option<&CylinderValues> {
        match self {
            ChannelValue::Scalar(_) => None,
            ChannelValue::PerCylinder(values) => Some(values),
        }
    }
}

/// One RPM sample of a calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Engine speed of this sample
    pub rpm: f64,

    /// Every other column, keyed by canonical channel name
    pub channels: BTreeMap<String, ChannelValue>,
}

impl DataPoint {
    /// Point at `rpm` with no channels
    pub fn new(rpm: f64) -> Self {
        Self {
            rpm,
            channels: BTreeMap::new(),
        }
    }

    /// Look up any channel by canonical name
    pub fn channel(&self, name: &str) -> Option<&ChannelValue> {
        self.channels.get(name)
    }

    /// Scalar channel by name; `RPM` resolves to [`DataPoint::rpm`]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        if name == channel::RPM {
            return Some(self.rpm);
        }
        self.channel(name).and_then(ChannelValue::as_scalar)
    }

    /// Per-cylinder channel by name
    pub fn cylinders(&self, name: &str) -> Option<&CylinderValues> {
        self.channel(name).and_then(ChannelValue::as_cylinders)
    }

    /// Average power (`P-Av`)
    pub fn average_power(&self) -> Option<f64> {
        self.scalar(channel::AVERAGE_POWER)
    }

    /// Brake torque
    pub fn torque(&self) -> Option<f64> {
        self.scalar(channel::TORQUE)
    }

    /// Solver convergence
    pub fn convergence(&self) -> Option<f64> {
        self.scalar(channel::CONVERGENCE)
    }

    /// Per-cylinder volumetric efficiency
    pub fn volumetric_efficiency(&self) -> Option<&CylinderValues> {
        self.cylinders(channel::VOLUMETRIC_EFFICIENCY)
    }

    /// Per-cylinder max exhaust temperature
    pub fn max_exhaust_temperature(&self) -> Option<&CylinderValues> {
        self.cylinders(channel::MAX_EXHAUST_TEMPERATURE)
    }

    /// Per-cylinder max in-cylinder temperature
    pub fn max_cylinder_temperature(&self) -> Option<&CylinderValues> {
        self.cylinders(channel::MAX_CYLINDER_TEMPERATURE)
    }

    /// Per-cylinder max in-cylinder pressure
    pub fn max_cylinder_pressure(&self) -> Option<&CylinderValues> {
        self.cylinders(channel::MAX_CYLINDER_PRESSURE)
    }

    /// Per-cylinder detonation indicator
    pub fn detonation(&self) -> Option<&CylinderValues> {
        self.cylinders(channel::DETONATION)
    }
}

/// Highest value of a channel and the RPM where it occurs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Highest value seen
    pub value: f64,
    /// Engine speed of that value
    pub rpm: f64,
}

/// One named calculation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    /// Marker text including the sentinel, e.g. `$3.1 R 0.86`
    pub id: String,

    /// Label shown to users, e.g. `3.1 R 0.86` or `baseline` for `$1 baseline`
    pub display_name: String,

    /// Samples in file order
    pub data_points: Vec<DataPoint>,
}

impl Calculation {
    /// Lowest and highest RPM
    pub fn rpm_range(&self) -> Option<(f64, f64)> {
        let mut rpms = self.data_points.iter().map(|p| p.rpm);
        let first = rpms.next()?;
        Some(rpms.fold((first, first), |(lo, hi), rpm| (lo.min(rpm), hi.max(rpm))))
    }

    /// Mean step between sorted RPM points, rounded to the nearest 50.
    ///
    /// Needs at least two points.
    pub fn average_rpm_step(&self) -> Option<f64> {
        average_rpm_step(&self.data_points)
    }

    /// Copy of the data points ordered by ascending RPM
    pub fn sorted_by_rpm(&self) -> Vec<DataPoint> {
        sorted_by_rpm(&self.data_points)
    }

    /// Maximum of a scalar channel
    pub fn peak(&self, name: &str) -> Option<Peak> {
        peak_by(&self.data_points, |p| p.scalar(name))
    }

    /// Maximum of one cylinder (0-based) of a per-cylinder channel
    pub fn peak_for_cylinder(&self, name: &str, cylinder: usize) -> Option<Peak> {
        peak_by(&self.data_points, |p| p.cylinders(name)?.get(cylinder))
    }
}

/// A parsed result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineProject {
    /// Name of the file this project was parsed from
    pub file_identifier: String,

    /// Engine description from line 1
    pub metadata: EngineMetadata,

    /// Canonical column names, row index column excluded
    pub column_headers: Vec<String>,

    /// Calculations in order of first appearance, unique ids
    pub calculations: Vec<Calculation>,
}

impl EngineProject {
    /// Find a calculation by its marker id
    pub fn calculation(&self, id: &str) -> Option<&Calculation> {
        self.calculations.iter().find(|c| c.id == id)
    }

    /// Ids of all calculations in file order
    pub fn calculation_ids(&self) -> Vec<&str> {
        self.calculations.iter().map(|c| c.id.as_str()).collect()
    }

    /// Check the shape invariants of a project that did not come straight
    /// from the parser (e.g. deserialized from a transport).
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.metadata.num_cylinders == 0 {
            return Err(ParseError::MalformedHeader(
                "cylinder count must be positive".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for calculation in &self.calculations {
            if !seen.insert(calculation.id.as_str()) {
                return Err(ParseError::DuplicateCalculation {
                    id: calculation.id.clone(),
                });
            }
            if calculation.data_points.is_empty() {
                return Err(ParseError::EmptyCalculation {
                    id: calculation.id.clone(),
                });
            }
            for point in &calculation.data_points {
                for value in point.channels.values() {
                    if let ChannelValue::PerCylinder(cylinders) = value {
                        if cylinders.len() != self.metadata.num_cylinders {
                            return Err(ParseError::CylinderCountMismatch {
                                expected: self.metadata.num_cylinders,
                                found: cylinders.len(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn sorted_by_rpm(points: &[DataPoint]) -> Vec<DataPoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.rpm.total_cmp(&b.rpm));
    sorted
}

pub(crate) fn average_rpm_step(points: &[DataPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let mut rpms: Vec<f64> = points.iter().map(|p| p.rpm).collect();
    rpms.sort_by(f64::total_cmp);
    let total: f64 = rpms.windows(2).map(|w| w[1] - w[0]).sum();
    let average = total / (rpms.len() - 1) as f64;
    Some((average / 50.0).round() * 50.0)
}

fn peak_by<F>(points: &[DataPoint], value_of: F) -> Option<Peak>
where
    F: Fn(&DataPoint) -> Option<f64>,
{
    points
        .iter()
        .filter_map(|p| value_of(p).map(|value| Peak { value, rpm: p.rpm }))
        .fold(None, |best: Option<Peak>, candidate| match best {
            Some(b) if b.value >= candidate.value => Some(b),
            _ => Some(candidate),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(rpm: f64, torque: f64, pressures: [f64; 2]) -> DataPoint {
        let mut p = DataPoint::new(rpm);
        p.channels
            .insert(channel::TORQUE.to_string(), ChannelValue::Scalar(torque));
        p.channels.insert(
            channel::MAX_CYLINDER_PRESSURE.to_string(),
            ChannelValue::PerCylinder(CylinderValues::new(pressures.to_vec(), 2).unwrap()),
        );
        p
    }

    fn calculation() -> Calculation {
        Calculation {
            id: "$1".to_string(),
            display_name: "1".to_string(),
            data_points: vec![
                point(3000.0, 150.0, [60.0, 62.0]),
                point(2000.0, 140.0, [55.0, 70.0]),
                point(4000.0, 145.0, [65.0, 61.0]),
            ],
        }
    }

    #[test]
    fn test_cylinder_values_length_checked() {
        assert!(CylinderValues::new(vec![1.0, 2.0], 2).is_ok());
        assert_eq!(
            CylinderValues::new(vec![1.0], 4),
            Err(ParseError::CylinderCountMismatch {
                expected: 4,
                found: 1
            })
        );
    }

    #[test]
    fn test_cylinder_values_summary() {
        let values = CylinderValues::new(vec![60.0, 64.0, 62.0, 58.0], 4).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values.get(1), Some(64.0));
        assert_eq!(values.get(4), None);
        assert_eq!(values.average(), Some(61.0));
        assert_eq!(values.max(), Some(64.0));

        let empty = CylinderValues::new(Vec::new(), 0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.average(), None);
        assert_eq!(empty.max(), None);
    }

    #[test]
    fn test_engine_type_tags() {
        assert_eq!(EngineType::from_tag("NATUR"), EngineType::NaturallyAspirated);
        assert_eq!(EngineType::from_tag("turbo"), EngineType::Turbocharged);
        assert_eq!(EngineType::from_tag("SUPER").tag(), "SUPER");
    }

    #[test]
    fn test_rpm_summaries() {
        let calc = calculation();
        assert_eq!(calc.rpm_range(), Some((2000.0, 4000.0)));
        assert_eq!(calc.average_rpm_step(), Some(1000.0));

        let sorted: Vec<f64> = calc.sorted_by_rpm().iter().map(|p| p.rpm).collect();
        assert_eq!(sorted, vec![2000.0, 3000.0, 4000.0]);
    }

    #[test]
    fn test_average_step_rounds_to_fifty() {
        let points: Vec<DataPoint> = [1000.0, 1170.0, 1350.0, 1540.0]
            .iter()
            .map(|&rpm| DataPoint::new(rpm))
            .collect();
        // steps 170, 180, 190 -> 180 -> 200
        assert_eq!(average_rpm_step(&points), Some(200.0));
        assert_eq!(average_rpm_step(&points[..1]), None);
    }

    #[test]
    fn test_peaks() {
        let calc = calculation();
        assert_eq!(
            calc.peak(channel::TORQUE),
            Some(Peak {
                value: 150.0,
                rpm: 3000.0
            })
        );
        assert_eq!(
            calc.peak_for_cylinder(channel::MAX_CYLINDER_PRESSURE, 1),
            Some(Peak {
                value: 70.0,
                rpm: 2000.0
            })
        );
        assert_eq!(calc.peak(channel::AVERAGE_POWER), None);
    }

    #[test]
    fn test_validate_rejects_wrong_cylinder_count() {
        let mut project = EngineProject {
            file_identifier: "test.det".to_string(),
            metadata: EngineMetadata::new(4, EngineType::NaturallyAspirated),
            column_headers: vec![],
            calculations: vec![calculation()],
        };
        assert!(matches!(
            project.validate(),
            Err(ParseError::CylinderCountMismatch { expected: 4, found: 2 })
        ));

        project.metadata.num_cylinders = 2;
        assert!(project.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let project = EngineProject {
            file_identifier: "remote".to_string(),
            metadata: EngineMetadata::new(2, EngineType::NaturallyAspirated),
            column_headers: vec![],
            calculations: vec![calculation(), calculation()],
        };
        assert_eq!(
            project.validate(),
            Err(ParseError::DuplicateCalculation {
                id: "$1".to_string()
            })
        );
    }
}
