use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One declared test case for a problem: stdin fed to the program and the
/// output the grader expects back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
}

/// Output-comparison policy selected per problem by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingMode {
    /// Exact match after trimming leading/trailing whitespace.
    Hard,
    /// Whitespace-insensitive match (runs collapsed, bracket/comma spacing
    /// normalized).
    Space,
    /// Expected output is a regular expression that must fully match.
    Regex,
    /// Comparison skipped; every completed case counts as passed.
    None,
}

impl RatingMode {
    /// Resolve the effective mode for a run. When no test case declares a
    /// non-empty expected output there is nothing to compare against, so the
    /// mode is forced to `None` regardless of what the caller asked for.
    pub fn resolve(requested: RatingMode, test_cases: &[TestCase]) -> RatingMode {
        let has_any_expected = test_cases
            .iter()
            .any(|tc| !tc.expected_output.trim().is_empty());
        if has_any_expected {
            requested
        } else {
            RatingMode::None
        }
    }
}

impl Default for RatingMode {
    fn default() -> Self {
        RatingMode::None
    }
}

/// Terminal status of a single test-case execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Timeout,
    Error,
}

/// Raw outcome of running one test case, including the echoed input and
/// expected output so downstream layers can persist the record as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub index: usize,
    pub status: ExecutionStatus,
    pub stdout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    pub execution_time_ms: f64,
    pub peak_memory_bytes: u64,
    pub passed: bool,
    pub input: String,
    pub expected_output: String,
}

/// Aggregate status across all test cases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Partial,
    Failed,
}

/// Full report of one sandbox run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// False when the run never reached per-case execution (missing runtime
    /// or compile failure).
    pub success: bool,
    pub results: Vec<CaseResult>,
    pub overall_status: OverallStatus,
    /// Peak RSS observed while compiling, for compiled languages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_memory_usage: Option<u64>,
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Total wall time spent executing test cases, in milliseconds.
    pub fn total_execution_time_ms(&self) -> f64 {
        self.results.iter().map(|r| r.execution_time_ms).sum()
    }
}

/// How a condition is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    CodeAnalysis,
    OutputValidation,
    Performance,
    GptCheck,
    /// Anything the engine cannot mechanically verify. Kept visible in the
    /// result list rather than silently dropped.
    #[serde(other)]
    Unknown,
}

impl Default for CheckType {
    fn default() -> Self {
        CheckType::CodeAnalysis
    }
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

/// A natural-language requirement on submitted code, checked independently
/// of test-case output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub condition: String,
    #[serde(default = "default_true")]
    pub is_required: bool,
    #[serde(default)]
    pub check_type: CheckType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl ConditionSpec {
    pub fn new(condition: impl Into<String>) -> Self {
        let condition = condition.into();
        ConditionSpec {
            description: condition.clone(),
            condition,
            is_required: true,
            check_type: CheckType::CodeAnalysis,
            weight: 1.0,
        }
    }

    /// Weights below zero make the distribution arithmetic meaningless, so
    /// they are clamped when read.
    pub fn effective_weight(&self) -> f64 {
        self.weight.max(0.0)
    }
}

/// Verdict for one condition, with the score assigned by the distributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResult {
    pub index: usize,
    pub condition: String,
    pub is_required: bool,
    pub check_type: CheckType,
    pub description: String,
    pub passed: bool,
    pub feedback: String,
    pub weight: f64,
    pub score: f64,
}

/// Whether every required condition passed. Reported independently of the
/// numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllStatus {
    Success,
    Fail,
}

/// Final grading outcome for one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingOutcome {
    pub percent: f64,
    pub score: f64,
    pub condition_results: Vec<ConditionResult>,
    pub condition_points_earned: f64,
    pub all_status: AllStatus,
    pub run: RunReport,
}

/// A grading job as submitted by a caller (or read from a job file by the
/// CLI). `base_code` is an explicit optional field for debugging-style
/// problems that grade a patch against starter code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub rating_mode: RatingMode,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    #[serde(default)]
    pub problem_description: String,
    #[serde(default)]
    pub base_code: Option<String>,
    #[serde(default = "default_max_points")]
    pub max_points: f64,
    #[serde(default)]
    pub condition_points: f64,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

fn default_max_points() -> f64 {
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_mode_forced_to_none_without_expected_output() {
        let cases = vec![
            TestCase {
                input: "1".into(),
                expected_output: "".into(),
            },
            TestCase {
                input: "2".into(),
                expected_output: "   ".into(),
            },
        ];
        assert_eq!(
            RatingMode::resolve(RatingMode::Hard, &cases),
            RatingMode::None
        );
    }

    #[test]
    fn rating_mode_kept_when_any_expected_output_present() {
        let cases = vec![
            TestCase {
                input: "1".into(),
                expected_output: "".into(),
            },
            TestCase {
                input: "2".into(),
                expected_output: "4".into(),
            },
        ];
        assert_eq!(
            RatingMode::resolve(RatingMode::Space, &cases),
            RatingMode::Space
        );
    }

    #[test]
    fn condition_spec_defaults_from_json() {
        let spec: ConditionSpec =
            serde_json::from_str(r#"{"condition": "must use a for loop"}"#).unwrap();
        assert!(spec.is_required);
        assert_eq!(spec.check_type, CheckType::CodeAnalysis);
        assert_eq!(spec.weight, 1.0);
    }

    #[test]
    fn unknown_check_type_round_trips_as_unknown() {
        let spec: ConditionSpec = serde_json::from_str(
            r#"{"condition": "style", "check_type": "vibes_check"}"#,
        )
        .unwrap();
        assert_eq!(spec.check_type, CheckType::Unknown);
    }

    #[test]
    fn negative_weight_clamped() {
        let mut spec = ConditionSpec::new("x");
        spec.weight = -3.0;
        assert_eq!(spec.effective_weight(), 0.0);
    }

    #[test]
    fn rating_mode_wire_format() {
        assert_eq!(serde_json::to_string(&RatingMode::Hard).unwrap(), r#""hard""#);
        let m: RatingMode = serde_json::from_str(r#""space""#).unwrap();
        assert_eq!(m, RatingMode::Space);
    }
}
