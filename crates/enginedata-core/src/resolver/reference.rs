//! Cross-project calculation references

use serde::{Deserialize, Serialize};

use crate::results::{sorted_by_rpm, DataPoint};

/// Pointer to one calculation of one project, optionally carrying its data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationReference {
    /// Id the store loads the project by
    pub project_id: String,
    /// Project label shown to users
    pub project_name: String,
    /// Marker id including the sentinel, e.g. `$1`
    pub calculation_id: String,
    /// Calculation label shown to users
    pub calculation_name: String,
    /// Data points once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<DataPoint>>,
}

impl CalculationReference {
    /// Create an unresolved reference
    pub fn new(
        project_id: impl Into<String>,
        project_name: impl Into<String>,
        calculation_id: impl Into<String>,
        calculation_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            project_name: project_name.into(),
            calculation_id: calculation_id.into(),
            calculation_name: calculation_name.into(),
            data: None,
        }
    }

    /// True once the reference carries at least one data point
    pub fn is_resolved(&self) -> bool {
        self.data.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Copy of this reference carrying `data`
    pub fn with_data(&self, data: Vec<DataPoint>) -> Self {
        Self {
            data: Some(data),
            ..self.clone()
        }
    }

    /// Data points ordered by ascending RPM (empty when unresolved)
    pub fn sorted_by_rpm(&self) -> Vec<DataPoint> {
        self.data.as_deref().map(sorted_by_rpm).unwrap_or_default()
    }

    /// `project → calculation` label used in messages
    pub fn label(&self) -> String {
        format!("{} → {}", self.project_name, self.calculation_name)
    }
}

/// Number of references that already carry data
pub fn count_resolved(references: &[CalculationReference]) -> usize {
    references.iter().filter(|r| r.is_resolved()).count()
}

/// References that already carry data, in order
pub fn resolved_only(references: &[CalculationReference]) -> Vec<&CalculationReference> {
    references.iter().filter(|r| r.is_resolved()).collect()
}
