// Copyright 2025 Tribunal (https://github.com/tribunal-evals/tribunal)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Judge classification: criticality tags and scoring dimensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-judge severity tag governing hybrid-mode scheduling.
///
/// Critical judges run on the blocking path of a hybrid evaluation;
/// everything else is deferred to detached background work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Unspecified,
    SafetyCritical,
    /// Default for LLM-backed judges.
    #[default]
    Critical,
    /// Default for agent-backed judges.
    NonCritical,
}

impl Criticality {
    /// Whether this tag puts a judge on the blocking path in hybrid mode.
    /// `Unspecified` is treated as non-critical.
    pub fn is_critical(&self) -> bool {
        matches!(self, Criticality::SafetyCritical | Criticality::Critical)
    }
}

/// A named axis of quality scored by one or more judges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Quality,
    FactualAccuracy,
    Hallucination,
    QueryQuality,
    Completeness,
    Safety,
    Custom(String),
}

impl Dimension {
    /// Stable name used as the key in dimension score maps.
    pub fn name(&self) -> &str {
        match self {
            Dimension::Quality => "quality",
            Dimension::FactualAccuracy => "factual_accuracy",
            Dimension::Hallucination => "hallucination",
            Dimension::QueryQuality => "query_quality",
            Dimension::Completeness => "completeness",
            Dimension::Safety => "safety",
            Dimension::Custom(name) => name,
        }
    }

    /// A custom dimension must carry a non-blank name.
    pub fn validate(&self) -> Result<(), InvalidDimension> {
        match self {
            Dimension::Custom(name) if name.trim().is_empty() => Err(InvalidDimension),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised for a dimension tagged custom with no name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("custom dimension requires a name")]
pub struct InvalidDimension;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criticality_classification() {
        assert!(Criticality::SafetyCritical.is_critical());
        assert!(Criticality::Critical.is_critical());
        assert!(!Criticality::NonCritical.is_critical());
        assert!(!Criticality::Unspecified.is_critical());
    }

    #[test]
    fn llm_judges_default_to_critical() {
        assert_eq!(Criticality::default(), Criticality::Critical);
    }

    #[test]
    fn custom_dimension_requires_name() {
        assert!(Dimension::Custom("grounding".to_string()).validate().is_ok());
        assert_eq!(
            Dimension::Custom("  ".to_string()).validate(),
            Err(InvalidDimension)
        );
    }

    #[test]
    fn dimension_names_are_stable() {
        assert_eq!(Dimension::Quality.name(), "quality");
        assert_eq!(Dimension::FactualAccuracy.name(), "factual_accuracy");
        assert_eq!(Dimension::Custom("tone".to_string()).name(), "tone");
    }
}
