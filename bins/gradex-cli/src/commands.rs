// CLI commands for running the grading engine locally
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use gradex_common::types::GradeRequest;
use gradex_engine::{Grader, LanguageRegistry, MergePolicy, Sandbox, SandboxLimits};
use tracing::info;

/// Load a job file, grade it, and print the outcome as pretty JSON on
/// stdout. Flags override the corresponding job-file fields and limits.
pub async fn grade(
    job_path: &str,
    max_points: Option<f64>,
    condition_points: Option<f64>,
    timeout_ms: Option<u64>,
    memory_limit_mb: Option<u64>,
) -> Result<()> {
    let content = fs::read_to_string(job_path)
        .with_context(|| format!("Failed to read job file '{job_path}'"))?;
    let mut request: GradeRequest =
        serde_json::from_str(&content).context("Failed to parse job file")?;

    if let Some(points) = max_points {
        request.max_points = points;
    }
    if let Some(points) = condition_points {
        request.condition_points = points;
    }

    let mut limits = SandboxLimits::default();
    if let Some(ms) = timeout_ms {
        limits.run_timeout = Duration::from_millis(ms);
    }
    if let Some(mb) = memory_limit_mb {
        limits.memory_ceiling = mb * 1024 * 1024;
    }

    info!(id = %request.id, language = %request.language, "grading job");

    let grader = Grader::new(
        Sandbox::new(LanguageRegistry::builtin(), limits),
        MergePolicy::default(),
    );
    // No semantic evaluator on the CLI path; conditions are judged by the
    // deterministic rules.
    let outcome = grader.grade(&request, None).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Print the built-in language registry.
pub fn list_languages() {
    let registry = LanguageRegistry::builtin();
    for name in registry.names() {
        println!("{name}");
    }
}
