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

//! Pure aggregation over a verdict batch.
//!
//! Order-insensitive for every strategy: the orchestrator feeds verdicts
//! in completion order and the numbers come out the same.

use std::collections::HashMap;

use tribunal_core::{AggregatedMetrics, AggregationStrategy, JudgeResult, VerdictLabel};

/// Final-verdict thresholds. Hardcoded and independent of any judge's
/// own passing score.
const PASS_THRESHOLD: f64 = 80.0;
const PARTIAL_THRESHOLD: f64 = 60.0;

/// Combine a verdict batch under the given strategy.
///
/// `weights` maps judge id to aggregation weight; a verdict whose judge
/// id is absent gets weight 1.0, so batches decoupled from the registry
/// snapshot still aggregate. An empty batch yields an aggregate with
/// only the strategy tag populated.
pub fn aggregate(
    results: &[JudgeResult],
    weights: &HashMap<String, f64>,
    strategy: AggregationStrategy,
) -> AggregatedMetrics {
    if results.is_empty() {
        return AggregatedMetrics::empty(strategy);
    }

    let count = results.len() as f64;
    let mut min_score = f64::MAX;
    let mut max_score = f64::MIN;
    let mut score_sum = 0.0;
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    let mut pass_count = 0usize;
    let mut total_execution_time_ms = 0u64;
    let mut total_cost_usd = 0.0;
    let mut dimension_sums: HashMap<String, (f64, usize)> = HashMap::new();

    for result in results {
        min_score = min_score.min(result.score);
        max_score = max_score.max(result.score);
        score_sum += result.score;

        let weight = weights.get(&result.judge_id).copied().unwrap_or(1.0);
        weighted_sum += result.score * weight;
        weight_sum += weight;

        if result.verdict.is_pass() {
            pass_count += 1;
        }
        total_execution_time_ms += result.execution_time_ms;
        total_cost_usd += result.cost_usd;

        for (dimension, score) in &result.dimension_scores {
            let entry = dimension_sums.entry(dimension.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }
    }

    let mean = score_sum / count;
    let weighted_average = if weight_sum > 0.0 {
        weighted_sum / weight_sum
    } else {
        0.0
    };

    // Population stddev (denominator N); only meaningful for N >= 2.
    let std_deviation = if results.len() >= 2 {
        let variance = results
            .iter()
            .map(|r| (r.score - mean).powi(2))
            .sum::<f64>()
            / count;
        variance.sqrt()
    } else {
        0.0
    };

    // Each dimension averages over the verdicts that reported it, not
    // over the whole batch.
    let dimension_averages = dimension_sums
        .into_iter()
        .map(|(dimension, (sum, n))| (dimension, sum / n as f64))
        .collect();

    let final_score = match strategy {
        AggregationStrategy::WeightedAverage => weighted_average,
        AggregationStrategy::MinScore => min_score,
        AggregationStrategy::MaxScore => max_score,
        AggregationStrategy::AllMustPass
        | AggregationStrategy::MajorityPass
        | AggregationStrategy::AnyPass
        | AggregationStrategy::Unspecified => mean,
    };

    AggregatedMetrics {
        strategy,
        weighted_average_score: final_score,
        min_score,
        max_score,
        std_deviation,
        pass_rate: pass_count as f64 / count,
        total_execution_time_ms,
        total_cost_usd,
        dimension_averages,
    }
}

/// Derive the final textual verdict from an aggregate.
pub fn derive_verdict(metrics: &AggregatedMetrics) -> VerdictLabel {
    match metrics.strategy {
        AggregationStrategy::WeightedAverage => {
            score_verdict(metrics.weighted_average_score)
        }
        AggregationStrategy::AllMustPass => {
            if metrics.pass_rate >= 1.0 {
                VerdictLabel::Pass
            } else {
                VerdictLabel::Fail
            }
        }
        AggregationStrategy::MajorityPass => {
            if metrics.pass_rate > 0.5 {
                VerdictLabel::Pass
            } else if metrics.pass_rate >= 0.3 {
                VerdictLabel::Partial
            } else {
                VerdictLabel::Fail
            }
        }
        AggregationStrategy::AnyPass => {
            if metrics.pass_rate > 0.0 {
                VerdictLabel::Pass
            } else {
                VerdictLabel::Fail
            }
        }
        AggregationStrategy::MinScore => score_verdict(metrics.min_score),
        AggregationStrategy::MaxScore => score_verdict(metrics.max_score),
        AggregationStrategy::Unspecified => VerdictLabel::Partial,
    }
}

fn score_verdict(score: f64) -> VerdictLabel {
    if score >= PASS_THRESHOLD {
        VerdictLabel::Pass
    } else if score >= PARTIAL_THRESHOLD {
        VerdictLabel::Partial
    } else {
        VerdictLabel::Fail
    }
}

/// Summarize failed verdicts for humans:
/// `"N judge(s) failed: <name>: <reasoning> (score: <score>); …"`, or
/// `"All judges passed"` when nothing failed.
pub fn format_failures(results: &[JudgeResult]) -> String {
    let failed: Vec<&JudgeResult> = results
        .iter()
        .filter(|r| r.verdict == VerdictLabel::Fail)
        .collect();

    if failed.is_empty() {
        return "All judges passed".to_string();
    }

    let details: Vec<String> = failed
        .iter()
        .map(|r| format!("{}: {} (score: {:.1})", r.judge_name, r.reasoning, r.score))
        .collect();

    format!("{} judge(s) failed: {}", failed.len(), details.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn verdict(id: &str, score: f64, label: VerdictLabel) -> JudgeResult {
        let mut result = JudgeResult::new(id, id);
        result.score = score;
        result.verdict = label;
        result
    }

    #[test]
    fn two_judge_weighted_average() {
        let results = vec![
            verdict("j1", 90.0, VerdictLabel::Pass),
            verdict("j2", 80.0, VerdictLabel::Pass),
        ];
        let weights = HashMap::from([("j1".to_string(), 1.0), ("j2".to_string(), 1.0)]);

        let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
        assert_eq!(metrics.weighted_average_score, 85.0);
        assert_eq!(metrics.min_score, 80.0);
        assert_eq!(metrics.max_score, 90.0);
        assert_eq!(metrics.pass_rate, 1.0);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Pass);
    }

    #[test]
    fn unequal_weights_hit_pass_threshold_exactly() {
        let results = vec![
            verdict("j1", 90.0, VerdictLabel::Pass),
            verdict("j2", 60.0, VerdictLabel::Fail),
        ];
        let weights = HashMap::from([("j1".to_string(), 2.0), ("j2".to_string(), 1.0)]);

        let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
        assert_eq!(metrics.weighted_average_score, 80.0);
        assert_eq!(metrics.pass_rate, 0.5);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Pass);
    }

    #[test]
    fn unknown_judge_id_defaults_to_weight_one() {
        let results = vec![
            verdict("known", 100.0, VerdictLabel::Pass),
            verdict("unknown", 50.0, VerdictLabel::Fail),
        ];
        let weights = HashMap::from([("known".to_string(), 3.0)]);

        let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
        // (100*3 + 50*1) / 4
        assert_eq!(metrics.weighted_average_score, 87.5);
    }

    #[test]
    fn zero_total_weight_yields_zero_score() {
        let results = vec![verdict("j1", 90.0, VerdictLabel::Pass)];
        let weights = HashMap::from([("j1".to_string(), 0.0)]);

        let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
        assert_eq!(metrics.weighted_average_score, 0.0);
    }

    #[test]
    fn min_and_max_overload_the_final_score_field() {
        let results = vec![
            verdict("j1", 45.0, VerdictLabel::Fail),
            verdict("j2", 95.0, VerdictLabel::Pass),
        ];
        let weights = HashMap::new();

        let min = aggregate(&results, &weights, AggregationStrategy::MinScore);
        assert_eq!(min.weighted_average_score, 45.0);
        assert_eq!(derive_verdict(&min), VerdictLabel::Fail);

        let max = aggregate(&results, &weights, AggregationStrategy::MaxScore);
        assert_eq!(max.weighted_average_score, 95.0);
        assert_eq!(derive_verdict(&max), VerdictLabel::Pass);
    }

    #[test]
    fn majority_tie_breaks() {
        let mk = |passes: usize, fails: usize| {
            let mut results = Vec::new();
            for i in 0..passes {
                results.push(verdict(&format!("p{i}"), 90.0, VerdictLabel::Pass));
            }
            for i in 0..fails {
                results.push(verdict(&format!("f{i}"), 40.0, VerdictLabel::Fail));
            }
            aggregate(&results, &HashMap::new(), AggregationStrategy::MajorityPass)
        };

        // Strictly above one half passes; exactly one half is partial.
        assert_eq!(derive_verdict(&mk(3, 2)), VerdictLabel::Pass);
        assert_eq!(derive_verdict(&mk(2, 2)), VerdictLabel::Partial);
        assert_eq!(derive_verdict(&mk(1, 4)), VerdictLabel::Fail);
    }

    #[test]
    fn any_pass_requires_strictly_positive_pass_rate() {
        let all_fail = vec![verdict("j1", 90.0, VerdictLabel::Fail)];
        let metrics = aggregate(&all_fail, &HashMap::new(), AggregationStrategy::AnyPass);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Fail);

        let one_pass = vec![
            verdict("j1", 90.0, VerdictLabel::Fail),
            verdict("j2", 90.0, VerdictLabel::Pass),
        ];
        let metrics = aggregate(&one_pass, &HashMap::new(), AggregationStrategy::AnyPass);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Pass);
    }

    #[test]
    fn all_must_pass_needs_everyone() {
        let results = vec![
            verdict("j1", 90.0, VerdictLabel::Pass),
            verdict("j2", 85.0, VerdictLabel::Partial),
        ];
        let metrics = aggregate(&results, &HashMap::new(), AggregationStrategy::AllMustPass);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Fail);
    }

    #[test]
    fn unspecified_strategy_is_always_partial() {
        let results = vec![verdict("j1", 100.0, VerdictLabel::Pass)];
        let metrics = aggregate(&results, &HashMap::new(), AggregationStrategy::Unspecified);
        assert_eq!(derive_verdict(&metrics), VerdictLabel::Partial);
    }

    #[test]
    fn dimension_averages_divide_by_reporting_count() {
        let mut a = verdict("j1", 80.0, VerdictLabel::Pass);
        a.dimension_scores.insert("quality".to_string(), 80.0);
        a.dimension_scores.insert("safety".to_string(), 100.0);
        let mut b = verdict("j2", 60.0, VerdictLabel::Fail);
        b.dimension_scores.insert("quality".to_string(), 60.0);

        let metrics = aggregate(&[a, b], &HashMap::new(), AggregationStrategy::WeightedAverage);
        assert_eq!(metrics.dimension_averages["quality"], 70.0);
        // Only one verdict reported safety: divide by 1, not batch size.
        assert_eq!(metrics.dimension_averages["safety"], 100.0);
    }

    #[test]
    fn empty_batch_populates_only_the_strategy() {
        let metrics = aggregate(&[], &HashMap::new(), AggregationStrategy::AllMustPass);
        assert_eq!(metrics.strategy, AggregationStrategy::AllMustPass);
        assert_eq!(metrics.pass_rate, 0.0);
        assert_eq!(metrics.weighted_average_score, 0.0);
        assert!(metrics.dimension_averages.is_empty());
    }

    #[test]
    fn totals_sum_time_and_cost() {
        let mut a = verdict("j1", 80.0, VerdictLabel::Pass);
        a.execution_time_ms = 120;
        a.cost_usd = 0.002;
        let mut b = verdict("j2", 70.0, VerdictLabel::Pass);
        b.execution_time_ms = 80;
        b.cost_usd = 0.001;

        let metrics = aggregate(&[a, b], &HashMap::new(), AggregationStrategy::WeightedAverage);
        assert_eq!(metrics.total_execution_time_ms, 200);
        assert!((metrics.total_cost_usd - 0.003).abs() < 1e-9);
    }

    #[test]
    fn format_failures_matches_expected_shape() {
        let mut j1 = verdict("j1", 50.0, VerdictLabel::Fail);
        j1.judge_name = "Judge 1".to_string();
        j1.reasoning = "Missing context".to_string();
        let mut j2 = verdict("j2", 90.0, VerdictLabel::Pass);
        j2.judge_name = "Judge 2".to_string();
        let mut j3 = verdict("j3", 45.0, VerdictLabel::Fail);
        j3.judge_name = "Judge 3".to_string();
        j3.reasoning = "Incorrect logic".to_string();

        assert_eq!(
            format_failures(&[j1, j2.clone(), j3]),
            "2 judge(s) failed: Judge 1: Missing context (score: 50.0); \
             Judge 3: Incorrect logic (score: 45.0)"
        );
        assert_eq!(format_failures(&[j2]), "All judges passed");
    }

    proptest! {
        #[test]
        fn weighted_average_stays_between_min_and_max(
            batch in prop::collection::vec((0.0f64..=100.0, any::<bool>(), 0.1f64..10.0), 1..12)
        ) {
            let mut results = Vec::new();
            let mut weights = HashMap::new();
            for (i, (score, pass, weight)) in batch.iter().enumerate() {
                let id = format!("j{i}");
                let label = if *pass { VerdictLabel::Pass } else { VerdictLabel::Fail };
                results.push(verdict(&id, *score, label));
                weights.insert(id, *weight);
            }

            let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
            prop_assert!(metrics.min_score <= metrics.weighted_average_score + 1e-9);
            prop_assert!(metrics.weighted_average_score <= metrics.max_score + 1e-9);
            prop_assert!((0.0..=1.0).contains(&metrics.pass_rate));
            if results.len() < 2 {
                prop_assert_eq!(metrics.std_deviation, 0.0);
            }
        }

        #[test]
        fn equal_weights_reduce_to_arithmetic_mean(
            scores in prop::collection::vec(0.0f64..=100.0, 1..10)
        ) {
            let mut results = Vec::new();
            let mut weights = HashMap::new();
            for (i, score) in scores.iter().enumerate() {
                let id = format!("j{i}");
                results.push(verdict(&id, *score, VerdictLabel::Pass));
                weights.insert(id, 1.0);
            }

            let metrics = aggregate(&results, &weights, AggregationStrategy::WeightedAverage);
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            prop_assert!((metrics.weighted_average_score - mean).abs() < 1e-9);
        }
    }
}
