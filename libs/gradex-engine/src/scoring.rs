/// Score Aggregator - Partial Credit Arithmetic
///
/// **Core Responsibility:**
/// Turn per-case and per-condition verdicts into points. Pure functions,
/// no I/O; all rounding happens here and nowhere else.
use gradex_common::types::{AllStatus, CaseResult, ConditionResult};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distribute `total_points` across conditions proportionally to weight and
/// sum up what the passing ones earned.
///
/// Allocation is `total_points * weight / Σweights` rounded to two
/// decimals; a passing item scores its allocation, a failing item scores
/// zero. The rounding residual (computed over the allocations) is added to
/// the first passing item so the earned total meets the budget (±0.01)
/// when every item passes. With all weights zero every item weighs one.
pub fn distribute(
    mut results: Vec<ConditionResult>,
    total_points: f64,
) -> (Vec<ConditionResult>, f64) {
    if results.is_empty() || total_points <= 0.0 {
        for r in &mut results {
            r.score = 0.0;
        }
        return (results, 0.0);
    }

    let weight_sum: f64 = results.iter().map(|r| r.weight.max(0.0)).sum();
    let per_unit = if weight_sum > 0.0 {
        total_points / weight_sum
    } else {
        total_points / results.len() as f64
    };

    let mut allocated_sum = 0.0;
    for r in &mut results {
        let share = if weight_sum > 0.0 {
            r.weight.max(0.0)
        } else {
            1.0
        };
        let allocation = round2(per_unit * share);
        allocated_sum += allocation;
        r.score = if r.passed { allocation } else { 0.0 };
    }

    // Residual correction lands on the first passing item.
    let gap = round2(total_points - allocated_sum);
    if gap != 0.0 {
        if let Some(first_passing) = results.iter_mut().find(|r| r.passed) {
            first_passing.score = round2(first_passing.score + gap);
        }
    }

    let earned = round2(results.iter().filter(|r| r.passed).map(|r| r.score).sum());
    (results, earned)
}

/// Share of test cases passed, as a percentage. No cases means zero.
pub fn test_case_percent(results: &[CaseResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let passed = results.iter().filter(|r| r.passed).count();
    passed as f64 / results.len() as f64 * 100.0
}

pub fn final_score(percent: f64, max_points: f64) -> f64 {
    round2(percent / 100.0 * max_points)
}

/// Success iff every required condition passed; vacuously Success.
pub fn all_status(condition_results: &[ConditionResult]) -> AllStatus {
    let all_required_passed = condition_results
        .iter()
        .filter(|r| r.is_required)
        .all(|r| r.passed);
    if all_required_passed {
        AllStatus::Success
    } else {
        AllStatus::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradex_common::types::{CheckType, ExecutionStatus};

    fn condition(passed: bool, weight: f64) -> ConditionResult {
        ConditionResult {
            index: 0,
            condition: String::new(),
            is_required: true,
            check_type: CheckType::CodeAnalysis,
            description: String::new(),
            passed,
            feedback: String::new(),
            weight,
            score: 0.0,
        }
    }

    fn case(passed: bool) -> CaseResult {
        CaseResult {
            index: 0,
            status: ExecutionStatus::Success,
            stdout: String::new(),
            stderr: None,
            execution_time_ms: 1.0,
            peak_memory_bytes: 0,
            passed,
            input: String::new(),
            expected_output: String::new(),
        }
    }

    #[test]
    fn distributes_by_weight() {
        let items = vec![condition(true, 1.0), condition(false, 1.0), condition(true, 2.0)];
        let (results, earned) = distribute(items, 40.0);
        assert_eq!(results[0].score, 10.0);
        assert_eq!(results[1].score, 0.0);
        assert_eq!(results[2].score, 20.0);
        assert!((earned - 30.0).abs() < 0.01);
    }

    #[test]
    fn failed_conditions_score_zero() {
        let items = vec![condition(false, 3.0), condition(true, 1.0)];
        let (results, earned) = distribute(items, 40.0);
        assert_eq!(results[0].score, 0.0);
        assert_eq!(results[1].score, 10.0);
        assert!((earned - 10.0).abs() < 0.01);
        // Per-item scores and the earned sum agree.
        let total: f64 = results.iter().map(|r| r.score).sum();
        assert!((total - earned).abs() < 0.01);
    }

    #[test]
    fn rounding_residual_lands_on_first_passing_item() {
        let items = vec![condition(true, 1.0), condition(true, 1.0), condition(true, 1.0)];
        let (results, earned) = distribute(items, 10.0);
        let total: f64 = results.iter().map(|r| r.score).sum();
        assert!((total - 10.0).abs() < 0.01);
        assert!((earned - 10.0).abs() < 0.01);
        // 10/3 rounds to 3.33; the +0.01 correction goes to item 0.
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn zero_weights_fall_back_to_equal_shares() {
        let items = vec![condition(true, 0.0), condition(true, 0.0)];
        let (results, earned) = distribute(items, 10.0);
        assert_eq!(results[0].score, 5.0);
        assert_eq!(results[1].score, 5.0);
        assert!((earned - 10.0).abs() < 0.01);
    }

    #[test]
    fn negative_weights_are_clamped() {
        let items = vec![condition(true, -5.0), condition(true, 1.0)];
        let (results, earned) = distribute(items, 10.0);
        assert_eq!(results[0].score, 0.0);
        assert_eq!(results[1].score, 10.0);
        assert!((earned - 10.0).abs() < 0.01);
    }

    #[test]
    fn empty_or_zero_budget_earns_nothing() {
        let (results, earned) = distribute(Vec::new(), 40.0);
        assert!(results.is_empty());
        assert_eq!(earned, 0.0);

        let (_, earned) = distribute(vec![condition(true, 1.0)], 0.0);
        assert_eq!(earned, 0.0);
    }

    #[test]
    fn percent_and_score() {
        let results = vec![case(true), case(false), case(true), case(true)];
        assert_eq!(test_case_percent(&results), 75.0);
        assert_eq!(test_case_percent(&[]), 0.0);
        assert_eq!(final_score(75.0, 100.0), 75.0);
        assert_eq!(final_score(33.333333, 60.0), 20.0);
    }

    #[test]
    fn all_status_ignores_optional_conditions() {
        let mut optional_failed = condition(false, 1.0);
        optional_failed.is_required = false;
        let results = vec![condition(true, 1.0), optional_failed];
        assert_eq!(all_status(&results), AllStatus::Success);

        let results = vec![condition(true, 1.0), condition(false, 1.0)];
        assert_eq!(all_status(&results), AllStatus::Fail);

        assert_eq!(all_status(&[]), AllStatus::Success);
    }
}
