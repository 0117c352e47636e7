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

//! Thread-safe judge registry.
//!
//! Owns judge instances for the process lifetime; the orchestrator
//! borrows them by identity for the duration of an evaluation. Any
//! number of concurrent readers; writers exclusive.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::Judge;
use tribunal_core::{Criticality, Dimension};

/// Snapshot descriptor of a registered judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeDescriptor {
    pub id: String,
    pub name: String,
    pub criteria: String,
    pub weight: f64,
    pub criticality: Criticality,
    pub dimensions: Vec<Dimension>,
}

/// Registry for managing judge instances.
pub struct JudgeRegistry {
    judges: RwLock<HashMap<String, Arc<dyn Judge>>>,
}

impl JudgeRegistry {
    pub fn new() -> Self {
        Self {
            judges: RwLock::new(HashMap::new()),
        }
    }

    /// Register a judge. Fails on an empty identity, a negative weight,
    /// a nameless custom dimension, or a duplicate identity.
    pub fn register(&self, judge: Arc<dyn Judge>) -> Result<(), RegistryError> {
        let id = judge.id().to_string();
        if id.trim().is_empty() {
            return Err(RegistryError::InvalidJudge(
                "judge identity must be nonempty".to_string(),
            ));
        }
        if judge.weight() < 0.0 {
            return Err(RegistryError::InvalidJudge(format!(
                "judge {} has negative weight {}",
                id,
                judge.weight()
            )));
        }
        for dimension in judge.dimensions() {
            dimension
                .validate()
                .map_err(|e| RegistryError::InvalidJudge(format!("judge {}: {}", id, e)))?;
        }

        let mut judges = self.judges.write();
        if judges.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        info!("registering judge: {} ({})", judge.name(), id);
        judges.insert(id, judge);
        Ok(())
    }

    /// Unregister a judge by identity. A second call for the same
    /// identity fails with not-found.
    pub fn unregister(&self, judge_id: &str) -> Result<(), RegistryError> {
        let mut judges = self.judges.write();
        judges
            .remove(judge_id)
            .ok_or_else(|| RegistryError::NotFound(judge_id.to_string()))?;

        info!("unregistered judge: {}", judge_id);
        Ok(())
    }

    /// Look up a single judge.
    pub fn get(&self, judge_id: &str) -> Result<Arc<dyn Judge>, RegistryError> {
        let judges = self.judges.read();
        judges
            .get(judge_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(judge_id.to_string()))
    }

    /// Look up many judges, preserving the order of `ids`. Fails
    /// atomically on the first missing identity: no partial results.
    pub fn get_many(&self, ids: &[String]) -> Result<Vec<Arc<dyn Judge>>, RegistryError> {
        let judges = self.judges.read();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let judge = judges
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
            resolved.push(judge);
        }
        Ok(resolved)
    }

    /// Snapshot descriptors of every registered judge. Order unspecified.
    pub fn list(&self) -> Vec<JudgeDescriptor> {
        let judges = self.judges.read();
        judges.values().map(|judge| describe(judge.as_ref())).collect()
    }

    /// Judges whose criticality equals `criticality`.
    pub fn filter_by_criticality(&self, criticality: Criticality) -> Vec<Arc<dyn Judge>> {
        let judges = self.judges.read();
        judges
            .values()
            .filter(|judge| judge.criticality() == criticality)
            .cloned()
            .collect()
    }

    /// Judges whose dimension set contains `dimension`.
    pub fn filter_by_dimension(&self, dimension: &Dimension) -> Vec<Arc<dyn Judge>> {
        let judges = self.judges.read();
        judges
            .values()
            .filter(|judge| judge.dimensions().contains(dimension))
            .cloned()
            .collect()
    }

    /// Number of registered judges.
    pub fn count(&self) -> usize {
        self.judges.read().len()
    }
}

impl Default for JudgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(judge: &dyn Judge) -> JudgeDescriptor {
    JudgeDescriptor {
        id: judge.id().to_string(),
        name: judge.name().to_string(),
        criteria: judge.criteria().to_string(),
        weight: judge.weight(),
        criticality: judge.criticality(),
        dimensions: judge.dimensions(),
    }
}

/// Errors raised by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate judge id: {0}")]
    Duplicate(String),

    #[error("judge not found: {0}")]
    NotFound(String),

    #[error("invalid judge: {0}")]
    InvalidJudge(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JudgeError;
    use async_trait::async_trait;
    use tribunal_core::{EvaluationContext, JudgeResult, VerdictLabel};

    struct StubJudge {
        id: String,
        criticality: Criticality,
        dimensions: Vec<Dimension>,
        weight: f64,
    }

    impl StubJudge {
        fn new(id: &str) -> Self {
            Self {
                id: id.to_string(),
                criticality: Criticality::Critical,
                dimensions: vec![Dimension::Quality],
                weight: 1.0,
            }
        }
    }

    #[async_trait]
    impl Judge for StubJudge {
        fn id(&self) -> &str {
            &self.id
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        fn criticality(&self) -> Criticality {
            self.criticality
        }

        fn dimensions(&self) -> Vec<Dimension> {
            self.dimensions.clone()
        }

        async fn evaluate(&self, _: &EvaluationContext) -> Result<JudgeResult, JudgeError> {
            let mut result = JudgeResult::new(&self.id, &self.id);
            result.verdict = VerdictLabel::Pass;
            result.score = 100.0;
            Ok(result)
        }
    }

    #[test]
    fn register_and_get() {
        let registry = JudgeRegistry::new();
        registry.register(Arc::new(StubJudge::new("j1"))).unwrap();
        assert!(registry.get("j1").is_ok());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn register_rejects_duplicates_and_empty_ids() {
        let registry = JudgeRegistry::new();
        registry.register(Arc::new(StubJudge::new("j1"))).unwrap();

        match registry.register(Arc::new(StubJudge::new("j1"))) {
            Err(RegistryError::Duplicate(id)) => assert_eq!(id, "j1"),
            other => panic!("expected duplicate error, got {:?}", other.err()),
        }
        assert!(matches!(
            registry.register(Arc::new(StubJudge::new("  "))),
            Err(RegistryError::InvalidJudge(_))
        ));
    }

    #[test]
    fn register_rejects_negative_weight_and_blank_custom_dimension() {
        let registry = JudgeRegistry::new();

        let mut negative = StubJudge::new("neg");
        negative.weight = -1.0;
        assert!(matches!(
            registry.register(Arc::new(negative)),
            Err(RegistryError::InvalidJudge(_))
        ));

        let mut custom = StubJudge::new("custom");
        custom.dimensions = vec![Dimension::Custom(String::new())];
        assert!(matches!(
            registry.register(Arc::new(custom)),
            Err(RegistryError::InvalidJudge(_))
        ));
    }

    #[test]
    fn unregister_is_not_idempotent() {
        let registry = JudgeRegistry::new();
        registry.register(Arc::new(StubJudge::new("j1"))).unwrap();
        registry.unregister("j1").unwrap();
        assert!(matches!(
            registry.unregister("j1"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn get_many_preserves_order_and_fails_atomically() {
        let registry = JudgeRegistry::new();
        registry.register(Arc::new(StubJudge::new("a"))).unwrap();
        registry.register(Arc::new(StubJudge::new("b"))).unwrap();

        let resolved = registry
            .get_many(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(resolved[0].id(), "b");
        assert_eq!(resolved[1].id(), "a");

        match registry.get_many(&["a".to_string(), "missing".to_string(), "b".to_string()]) {
            Err(RegistryError::NotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("expected not-found, got {:?}", other.err()),
        }
    }

    #[test]
    fn filters_by_criticality_and_dimension() {
        let registry = JudgeRegistry::new();
        let mut safety = StubJudge::new("safety");
        safety.criticality = Criticality::SafetyCritical;
        safety.dimensions = vec![Dimension::Safety];
        registry.register(Arc::new(safety)).unwrap();
        registry.register(Arc::new(StubJudge::new("quality"))).unwrap();

        let safety_judges = registry.filter_by_criticality(Criticality::SafetyCritical);
        assert_eq!(safety_judges.len(), 1);
        assert_eq!(safety_judges[0].id(), "safety");

        let quality_judges = registry.filter_by_dimension(&Dimension::Quality);
        assert_eq!(quality_judges.len(), 1);
        assert_eq!(quality_judges[0].id(), "quality");
    }

    #[test]
    fn list_snapshots_descriptors() {
        let registry = JudgeRegistry::new();
        registry.register(Arc::new(StubJudge::new("j1"))).unwrap();

        let descriptors = registry.list();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, "j1");
        assert_eq!(descriptors[0].weight, 1.0);
        assert_eq!(descriptors[0].criticality, Criticality::Critical);
    }
}
