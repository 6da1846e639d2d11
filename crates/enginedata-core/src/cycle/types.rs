//! Cycle trace data model

use serde::Serialize;

/// Pressure and volume of one cylinder at one crank angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CylinderState {
    /// In-cylinder pressure in bar
    pub pressure_bar: f64,
    /// Cylinder volume in cm³
    pub volume_cm3: f64,
}

/// All cylinders at one crank angle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSample {
    /// Crank angle as written in the file
    pub angle_degrees: f64,
    /// One state per cylinder, in cylinder order
    pub per_cylinder: Vec<CylinderState>,
}

/// Per-cylinder extremes over the whole trace
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CylinderStats {
    /// Highest pressure
    pub peak_pressure: f64,
    /// Crank angle of the highest pressure
    pub peak_pressure_angle: f64,
    /// Lowest pressure
    pub min_pressure: f64,
    /// Crank angle of the lowest pressure
    pub min_pressure_angle: f64,
    /// Smallest volume
    pub min_volume: f64,
    /// Largest volume
    pub max_volume: f64,
}

impl CylinderStats {
    /// Swept range between the smallest and largest volume
    pub fn volume_range(&self) -> f64 {
        self.max_volume - self.min_volume
    }
}

/// Crank-angle-resolved pressure/volume trace for one RPM point.
///
/// Statistics are computed once on construction; the fields are private so
/// they cannot drift from the samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleTrace {
    rpm: f64,
    cylinder_count: usize,
    samples: Vec<CycleSample>,
    statistics: Vec<CylinderStats>,
}

impl CycleTrace {
    /// Build a trace and compute its statistics.
    ///
    /// Every sample must carry exactly `cylinder_count` entries; the parser
    /// guarantees this.
    pub fn new(rpm: f64, cylinder_count: usize, samples: Vec<CycleSample>) -> Self {
        let statistics = compute_statistics(cylinder_count, &samples);
        Self {
            rpm,
            cylinder_count,
            samples,
            statistics,
        }
    }

    /// Engine speed of the trace
    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Cylinders per sample
    pub fn cylinder_count(&self) -> usize {
        self.cylinder_count
    }

    /// Samples in stored order
    pub fn samples(&self) -> &[CycleSample] {
        &self.samples
    }

    /// Statistics for a 0-based cylinder index
    pub fn statistics(&self, cylinder: usize) -> Option<&CylinderStats> {
        self.statistics.get(cylinder)
    }

    /// Highest pressure over all cylinders, with the 0-based cylinder index
    pub fn peak_pressure(&self) -> Option<(usize, &CylinderStats)> {
        self.statistics
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &CylinderStats)>, (i, s)| match best {
                Some((_, b)) if b.peak_pressure >= s.peak_pressure => best,
                _ => Some((i, s)),
            })
    }

    /// Lowest pressure over all cylinders, with the 0-based cylinder index
    pub fn min_pressure(&self) -> Option<(usize, &CylinderStats)> {
        self.statistics
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, &CylinderStats)>, (i, s)| match best {
                Some((_, b)) if b.min_pressure <= s.min_pressure => best,
                _ => Some((i, s)),
            })
    }

    /// Pressure/volume series of one cylinder in stored order
    pub fn cylinder_series(&self, cylinder: usize) -> Vec<(f64, CylinderState)> {
        self.samples
            .iter()
            .filter_map(|s| s.per_cylinder.get(cylinder).map(|c| (s.angle_degrees, *c)))
            .collect()
    }

    /// Copy with angles wrapped into [0, 720), sorted strictly increasing.
    ///
    /// When two samples land on the same angle after wrapping, the first one
    /// in stored order is kept.
    pub fn normalized(&self) -> CycleTrace {
        let mut samples: Vec<CycleSample> = self
            .samples
            .iter()
            .map(|s| CycleSample {
                angle_degrees: wrap_angle(s.angle_degrees),
                per_cylinder: s.per_cylinder.clone(),
            })
            .collect();
        // Stable sort keeps stored order among equal angles
        samples.sort_by(|a, b| a.angle_degrees.total_cmp(&b.angle_degrees));
        samples.dedup_by(|later, earlier| later.angle_degrees == earlier.angle_degrees);
        CycleTrace::new(self.rpm, self.cylinder_count, samples)
    }

    /// Dominant angular step (median of the positive steps after normalization)
    pub fn angular_step(&self) -> Option<f64> {
        let normalized = self.normalized();
        let mut steps: Vec<f64> = normalized
            .samples
            .windows(2)
            .map(|w| w[1].angle_degrees - w[0].angle_degrees)
            .collect();
        if steps.is_empty() {
            return None;
        }
        steps.sort_by(f64::total_cmp);
        Some(steps[steps.len() / 2])
    }

    /// Angle intervals `(from, to)` wider than the dominant step, including
    /// the wrap from the last sample back to the first one of the next cycle.
    pub fn coverage_gaps(&self) -> Vec<(f64, f64)> {
        let Some(step) = self.angular_step() else {
            return Vec::new();
        };
        let normalized = self.normalized();
        let limit = step * (1.0 + 1e-6);
        let mut gaps: Vec<(f64, f64)> = normalized
            .samples
            .windows(2)
            .map(|w| (w[0].angle_degrees, w[1].angle_degrees))
            .filter(|(from, to)| to - from > limit)
            .collect();
        if let (Some(first), Some(last)) = (normalized.samples.first(), normalized.samples.last()) {
            let wrap_to = first.angle_degrees + 720.0;
            if wrap_to - last.angle_degrees > limit {
                gaps.push((last.angle_degrees, wrap_to));
            }
        }
        gaps
    }
}

/// Map any crank angle onto one four-stroke cycle, [0, 720)
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(720.0);
    // rem_euclid can round up to exactly 720 for tiny negative inputs
    if wrapped >= 720.0 {
        0.0
    } else {
        wrapped
    }
}

fn compute_statistics(cylinder_count: usize, samples: &[CycleSample]) -> Vec<CylinderStats> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };
    let mut stats: Vec<CylinderStats> = first
        .per_cylinder
        .iter()
        .take(cylinder_count)
        .map(|c| CylinderStats {
            peak_pressure: c.pressure_bar,
            peak_pressure_angle: first.angle_degrees,
            min_pressure: c.pressure_bar,
            min_pressure_angle: first.angle_degrees,
            min_volume: c.volume_cm3,
            max_volume: c.volume_cm3,
        })
        .collect();

    for sample in &samples[1..] {
        for (stat, state) in stats.iter_mut().zip(&sample.per_cylinder) {
            if state.pressure_bar > stat.peak_pressure {
                stat.peak_pressure = state.pressure_bar;
                stat.peak_pressure_angle = sample.angle_degrees;
            }
            if state.pressure_bar < stat.min_pressure {
                stat.min_pressure = state.pressure_bar;
                stat.min_pressure_angle = sample.angle_degrees;
            }
            stat.min_volume = stat.min_volume.min(state.volume_cm3);
            stat.max_volume = stat.max_volume.max(state.volume_cm3);
        }
    }
    stats
}
