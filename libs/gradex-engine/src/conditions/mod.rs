/// Condition Checker - Natural-Language Requirements
///
/// **Core Responsibility:**
/// Evaluate free-form conditions attached to a problem ("must use a for
/// loop", "output format must be an array") against the submitted code and
/// its captured output.
///
/// **Two-Layer Design:**
/// - Deterministic rules (`rules`) run always: cheap, local, shallow.
/// - A semantic evaluator may be plugged in behind the `SemanticEvaluator`
///   trait; the core never implements it. A failed semantic evaluation
///   degrades that condition to rule-only instead of failing the grade.
///
/// The two verdicts are combined per `MergePolicy`; scores are assigned
/// later by the distributor, so results leave here with `score == 0`.
use async_trait::async_trait;

pub mod rules;

use gradex_common::types::{ConditionResult, ConditionSpec};
use tracing::warn;

/// Verdict from a semantic (LLM-backed) evaluator.
#[derive(Debug, Clone)]
pub struct SemanticVerdict {
    pub passed: bool,
    pub feedback: String,
}

/// Contract for semantic condition evaluation. Implementations live with
/// the caller; the engine only defines the seam.
#[async_trait]
pub trait SemanticEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        condition: &ConditionSpec,
        code: &str,
        language: &str,
        problem_description: &str,
    ) -> anyhow::Result<SemanticVerdict>;
}

/// How rule and semantic verdicts combine for one condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Both layers must pass. A condition with no semantic verdict falls
    /// back to its rule verdict.
    #[default]
    RequireBoth,
    RuleOnly,
    SemanticOnly,
    Either,
}

impl MergePolicy {
    fn combine(self, rule: bool, semantic: Option<bool>) -> bool {
        match (self, semantic) {
            (_, None) | (MergePolicy::RuleOnly, _) => rule,
            (MergePolicy::RequireBoth, Some(s)) => rule && s,
            (MergePolicy::SemanticOnly, Some(s)) => s,
            (MergePolicy::Either, Some(s)) => rule || s,
        }
    }
}

/// Run the deterministic rules over every condition. Output-oriented rules
/// see the first case's output and expected output; performance rules see
/// the total execution time, matching how results are persisted upstream.
pub fn check_all(
    conditions: &[ConditionSpec],
    code: &str,
    output: &str,
    expected_output: &str,
    execution_time_ms: f64,
) -> Vec<ConditionResult> {
    conditions
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let verdict = rules::check(spec, code, output, expected_output, execution_time_ms);
            ConditionResult {
                index,
                condition: spec.condition.clone(),
                is_required: spec.is_required,
                check_type: spec.check_type,
                description: spec.description.clone(),
                passed: verdict.passed,
                feedback: verdict.feedback,
                weight: spec.effective_weight(),
                score: 0.0,
            }
        })
        .collect()
}

/// Merge per-condition semantic verdicts into the rule results.
///
/// Feedback keeps the rule message when the merged verdict passes, and
/// prefers the semantic explanation on failure (falling back to the rule
/// message when no semantic verdict exists).
pub fn merge_condition_results(
    mut rule_results: Vec<ConditionResult>,
    semantic: Vec<Option<SemanticVerdict>>,
    policy: MergePolicy,
) -> Vec<ConditionResult> {
    for (result, verdict) in rule_results.iter_mut().zip(semantic) {
        let merged = policy.combine(result.passed, verdict.as_ref().map(|v| v.passed));
        if !merged {
            if let Some(v) = verdict {
                result.feedback = v.feedback;
            }
        }
        result.passed = merged;
    }
    rule_results
}

/// Full condition pipeline: rules, optional semantic evaluation, merge.
pub async fn evaluate_all(
    conditions: &[ConditionSpec],
    code: &str,
    language: &str,
    problem_description: &str,
    output: &str,
    expected_output: &str,
    execution_time_ms: f64,
    evaluator: Option<&dyn SemanticEvaluator>,
    policy: MergePolicy,
) -> Vec<ConditionResult> {
    let rule_results = check_all(conditions, code, output, expected_output, execution_time_ms);

    let Some(evaluator) = evaluator else {
        return rule_results;
    };

    let mut semantic = Vec::with_capacity(conditions.len());
    for spec in conditions {
        match evaluator
            .evaluate(spec, code, language, problem_description)
            .await
        {
            Ok(verdict) => semantic.push(Some(verdict)),
            Err(e) => {
                // Degrade to rule-only for this condition; the grade must
                // not depend on evaluator availability.
                warn!(condition = %spec.condition, error = %e, "semantic evaluation failed");
                semantic.push(None);
            }
        }
    }

    merge_condition_results(rule_results, semantic, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradex_common::types::CheckType;

    fn specs() -> Vec<ConditionSpec> {
        vec![
            ConditionSpec::new("must use a for loop"),
            {
                let mut s = ConditionSpec::new("output must be an exact match");
                s.check_type = CheckType::OutputValidation;
                s
            },
        ]
    }

    #[test]
    fn check_all_preserves_order_and_metadata() {
        let results = check_all(&specs(), "for i in range(3): pass", "42", "42", 10.0);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].check_type, CheckType::OutputValidation);
        assert!(results.iter().all(|r| r.passed));
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn require_both_needs_both_layers() {
        let rule_results = check_all(&specs()[..1], "for i in range(3): pass", "", "", 0.0);
        let semantic = vec![Some(SemanticVerdict {
            passed: false,
            feedback: "The loop never runs.".into(),
        })];
        let merged =
            merge_condition_results(rule_results, semantic, MergePolicy::RequireBoth);
        assert!(!merged[0].passed);
        assert_eq!(merged[0].feedback, "The loop never runs.");
    }

    #[test]
    fn either_policy_accepts_one_passing_layer() {
        let rule_results = check_all(&specs()[..1], "no loop here", "", "", 0.0);
        assert!(!rule_results[0].passed);
        let semantic = vec![Some(SemanticVerdict {
            passed: true,
            feedback: "Uses iteration via comprehension.".into(),
        })];
        let merged = merge_condition_results(rule_results, semantic, MergePolicy::Either);
        assert!(merged[0].passed);
    }

    #[test]
    fn missing_semantic_verdict_falls_back_to_rule() {
        let rule_results = check_all(&specs()[..1], "for i in range(3): pass", "", "", 0.0);
        let merged =
            merge_condition_results(rule_results, vec![None], MergePolicy::SemanticOnly);
        assert!(merged[0].passed);
    }

    #[test]
    fn passing_merge_keeps_rule_feedback() {
        let rule_results = check_all(&specs()[..1], "for i in range(3): pass", "", "", 0.0);
        let rule_feedback = rule_results[0].feedback.clone();
        let semantic = vec![Some(SemanticVerdict {
            passed: true,
            feedback: "Looks fine.".into(),
        })];
        let merged =
            merge_condition_results(rule_results, semantic, MergePolicy::RequireBoth);
        assert_eq!(merged[0].feedback, rule_feedback);
    }

    struct FlakyEvaluator;

    #[async_trait]
    impl SemanticEvaluator for FlakyEvaluator {
        async fn evaluate(
            &self,
            _condition: &ConditionSpec,
            _code: &str,
            _language: &str,
            _problem_description: &str,
        ) -> anyhow::Result<SemanticVerdict> {
            anyhow::bail!("upstream unavailable")
        }
    }

    #[tokio::test]
    async fn failed_evaluator_degrades_to_rule_only() {
        let results = evaluate_all(
            &specs()[..1],
            "for i in range(3): pass",
            "python",
            "",
            "",
            "",
            0.0,
            Some(&FlakyEvaluator),
            MergePolicy::RequireBoth,
        )
        .await;
        assert!(results[0].passed);
    }
}
