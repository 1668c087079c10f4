/// Grading Orchestrator - One Submission, End to End
///
/// **Core Responsibility:**
/// Sequence the pipeline for a single submission: resolve the rating mode,
/// run the sandbox, evaluate conditions, distribute condition points, and
/// assemble the final outcome.
///
/// **Critical Properties:**
/// - Stateless and reentrant: holds only the sandbox and the merge policy,
///   so concurrent grades share no mutable state
/// - Expected grading failures surface inside the outcome; `Err` means an
///   unsupported language or an infrastructure fault
use gradex_common::types::{GradeRequest, GradingOutcome, RatingMode};
use tracing::{info, instrument};

use crate::conditions::{self, MergePolicy, SemanticEvaluator};
use crate::error::EngineError;
use crate::sandbox::Sandbox;
use crate::scoring;

pub struct Grader {
    sandbox: Sandbox,
    merge_policy: MergePolicy,
}

impl Grader {
    pub fn new(sandbox: Sandbox, merge_policy: MergePolicy) -> Self {
        Grader {
            sandbox,
            merge_policy,
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Grade one submission. Pass an evaluator to enable semantic condition
    /// checks; without one, conditions are judged by the deterministic
    /// rules alone.
    ///
    /// `request.base_code` is carried through untouched: the engine runs
    /// the submitted code as-is and leaves starter-code handling to the
    /// caller that assembled the request.
    #[instrument(skip_all, fields(id = %request.id, language = %request.language))]
    pub async fn grade(
        &self,
        request: &GradeRequest,
        evaluator: Option<&dyn SemanticEvaluator>,
    ) -> Result<GradingOutcome, EngineError> {
        let mode = RatingMode::resolve(request.rating_mode, &request.test_cases);
        let run = self
            .sandbox
            .run(&request.code, &request.language, &request.test_cases, mode)
            .await?;

        // Output-oriented conditions see the first case; performance
        // conditions see the summed wall time across cases.
        let first = run.results.first();
        let output = first.map(|r| r.stdout.as_str()).unwrap_or_default();
        let expected = first.map(|r| r.expected_output.as_str()).unwrap_or_default();
        let execution_time_ms = run.total_execution_time_ms();

        let condition_results = conditions::evaluate_all(
            &request.conditions,
            &request.code,
            &request.language,
            &request.problem_description,
            output,
            expected,
            execution_time_ms,
            evaluator,
            self.merge_policy,
        )
        .await;

        let (condition_results, condition_points_earned) =
            scoring::distribute(condition_results, request.condition_points);
        let percent = scoring::test_case_percent(&run.results);
        let score = scoring::final_score(percent, request.max_points);
        let all_status = scoring::all_status(&condition_results);

        info!(
            percent,
            score,
            condition_points_earned,
            all_status = ?all_status,
            "grading complete"
        );

        Ok(GradingOutcome {
            percent,
            score,
            condition_results,
            condition_points_earned,
            all_status,
            run,
        })
    }
}

impl Default for Grader {
    fn default() -> Self {
        Grader::new(Sandbox::default(), MergePolicy::default())
    }
}
