/// Execution Sandbox - Process-Level Code Execution
///
/// **Core Responsibility:**
/// Materialize submitted code, compile it when the language requires it,
/// and run it once per test case under wall-clock and memory limits.
///
/// **Critical Architectural Boundary:**
/// - The sandbox knows HOW to execute (processes, limits, cleanup)
/// - The sandbox does NOT know scoring rules beyond the per-case verdict
///   delegated to the judge
/// - Expected failures become result records; `Err` is reserved for faults
///   like filesystem exhaustion
///
/// **Execution Rules:**
/// 1. Required binaries are resolved on PATH before anything is spawned
/// 2. Every test case gets a freshly spawned process in its own process
///    group; nothing is shared across cases
/// 3. A timed-out process group is SIGKILLed, descendants included
/// 4. A paired sampler records peak RSS while the process runs
/// 5. All temp artifacts live in a per-run TempDir removed on every path
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use gradex_common::types::{
    CaseResult, ExecutionStatus, OverallStatus, RatingMode, RunReport, TestCase,
};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

pub mod rss;

use crate::error::EngineError;
use crate::judge;
use crate::languages::{render_command, LanguageRegistry, LanguageSpec};
use crate::sandbox::rss::RssSampler;

/// Resource budgets for one grading run. Compile and run phases have
/// separate timeout windows.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    pub run_timeout: Duration,
    pub compile_timeout: Duration,
    /// Best-effort address-space ceiling applied to each child (RLIMIT_AS).
    pub memory_ceiling: u64,
    /// Peak-RSS sampling granularity.
    pub sample_interval: Duration,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        SandboxLimits {
            run_timeout: Duration::from_secs(5),
            compile_timeout: Duration::from_secs(10),
            memory_ceiling: 512 * 1024 * 1024,
            sample_interval: Duration::from_millis(10),
        }
    }
}

/// Whether this platform can enforce the address-space ceiling. Callers can
/// check this instead of discovering a silent no-op at runtime.
pub fn memory_ceiling_supported() -> bool {
    cfg!(unix)
}

enum CompileOutcome {
    Compiled { peak_memory: u64 },
    Failed { message: String, peak_memory: u64 },
}

/// Stateless, reentrant sandbox. Holds only the immutable language registry
/// and the resource limits; concurrent runs share no mutable state.
pub struct Sandbox {
    registry: LanguageRegistry,
    limits: SandboxLimits,
}

impl Sandbox {
    pub fn new(registry: LanguageRegistry, limits: SandboxLimits) -> Self {
        Sandbox { registry, limits }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    /// Run `code` against every test case and report per-case results.
    ///
    /// Expected failure modes (missing runtime, compile failure, per-case
    /// timeout or crash) are reported inside the `RunReport`; only an
    /// unsupported language or an infrastructure fault returns `Err`.
    #[instrument(skip(self, code, test_cases), fields(language = %language, test_count = test_cases.len()))]
    pub async fn run(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
        rating_mode: RatingMode,
    ) -> Result<RunReport, EngineError> {
        let spec = self.registry.get(language)?;
        let mode = RatingMode::resolve(rating_mode, test_cases);

        if !memory_ceiling_supported() {
            warn!("address-space ceiling unsupported on this platform; running without it");
        }

        // Pre-flight: refuse to spawn anything when the toolchain is absent,
        // reporting one uniform error per declared test case.
        for binary in spec.required_binaries() {
            if which::which(binary).is_err() {
                let message = format!("Required runtime '{binary}' is not installed on server.");
                warn!(binary, "missing runtime");
                return Ok(Self::uniform_error_report(test_cases, &message));
            }
        }

        // TempDir removes the source file and any compiled artifacts on
        // every exit path, including early `?` returns.
        let workdir = tempfile::tempdir()?;
        tokio::fs::write(
            workdir.path().join(&spec.file_name),
            spec.source_code(code),
        )
        .await?;

        let mut compile_memory_usage = None;
        if let Some(compile_template) = spec.compile_cmd.clone() {
            match self.compile(spec, &compile_template, workdir.path()).await? {
                CompileOutcome::Compiled { peak_memory } => {
                    debug!(peak_memory, "compilation succeeded");
                    compile_memory_usage = Some(peak_memory);
                }
                CompileOutcome::Failed {
                    message,
                    peak_memory,
                } => {
                    // Compile failure is the only whole-run abort: one
                    // synthetic result regardless of test-case count.
                    warn!(error = %message.lines().next().unwrap_or(""), "compilation failed");
                    return Ok(RunReport {
                        success: false,
                        results: vec![CaseResult {
                            index: 0,
                            status: ExecutionStatus::Error,
                            stdout: String::new(),
                            stderr: Some(message),
                            execution_time_ms: 0.0,
                            peak_memory_bytes: peak_memory,
                            passed: false,
                            input: String::new(),
                            expected_output: String::new(),
                        }],
                        overall_status: OverallStatus::Failed,
                        compile_memory_usage: Some(peak_memory),
                    });
                }
            }
        }

        let mut results = Vec::with_capacity(test_cases.len());
        for (index, test_case) in test_cases.iter().enumerate() {
            let result = self
                .run_case(spec, workdir.path(), index, test_case, mode)
                .await?;
            debug!(
                index,
                status = ?result.status,
                passed = result.passed,
                execution_time_ms = result.execution_time_ms,
                "case finished"
            );
            results.push(result);
        }

        let passed_count = results.iter().filter(|r| r.passed).count();
        let overall_status = if passed_count == results.len() && !results.is_empty() {
            OverallStatus::Success
        } else if passed_count == 0 {
            OverallStatus::Failed
        } else {
            OverallStatus::Partial
        };

        info!(
            passed = passed_count,
            total = results.len(),
            status = ?overall_status,
            "run complete"
        );

        Ok(RunReport {
            success: true,
            results,
            overall_status,
            compile_memory_usage,
        })
    }

    async fn compile(
        &self,
        spec: &LanguageSpec,
        template: &[String],
        dir: &Path,
    ) -> Result<CompileOutcome, EngineError> {
        let argv = render_command(template, dir, &spec.file_name);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Compilers keep the group isolation but not the address-space
        // ceiling; javac in particular reserves far more than it touches.
        configure_child(&mut cmd, None);

        let child = cmd.spawn()?;
        let pid = child.id().unwrap_or(0);
        let sampler = RssSampler::spawn(pid, self.limits.sample_interval);

        match tokio::time::timeout(self.limits.compile_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let peak_memory = sampler.stop().await?;
                if output.status.success() {
                    Ok(CompileOutcome::Compiled { peak_memory })
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Ok(CompileOutcome::Failed {
                        message: format!("Compilation error: {stderr}"),
                        peak_memory,
                    })
                }
            }
            Ok(Err(e)) => {
                kill_process_group(pid);
                let peak_memory = sampler.stop().await?;
                Ok(CompileOutcome::Failed {
                    message: format!("Compilation error: {e}"),
                    peak_memory,
                })
            }
            Err(_) => {
                kill_process_group(pid);
                sampler.stop().await?;
                Ok(CompileOutcome::Failed {
                    message: "Compilation timed out".to_string(),
                    peak_memory: 0,
                })
            }
        }
    }

    async fn run_case(
        &self,
        spec: &LanguageSpec,
        dir: &Path,
        index: usize,
        test_case: &TestCase,
        mode: RatingMode,
    ) -> Result<CaseResult, EngineError> {
        let argv = render_command(&spec.run_cmd, dir, &spec.file_name);
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        configure_child(&mut cmd, Some(self.limits.memory_ceiling));

        let started = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                // Spawn refusal (e.g. exec format error) is a per-case
                // failure, not an engine fault.
                return Ok(Self::error_result(
                    index,
                    test_case,
                    format!("Failed to start process: {e}"),
                ));
            }
        };
        let pid = child.id().unwrap_or(0);
        let sampler = RssSampler::spawn(pid, self.limits.sample_interval);

        // Feed stdin concurrently so a child that fills its stdout pipe
        // before reading input cannot deadlock the write. A broken pipe
        // means the child exited early; that surfaces via its exit status.
        let stdin_task = child.stdin.take().map(|mut stdin| {
            let input = test_case.input.clone();
            tokio::spawn(async move {
                let _ = stdin.write_all(input.as_bytes()).await;
            })
        });

        let waited = tokio::time::timeout(self.limits.run_timeout, child.wait_with_output()).await;
        if let Some(task) = stdin_task {
            task.abort();
        }

        match waited {
            Ok(Ok(output)) => {
                let execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                let peak_memory_bytes = sampler.stop().await?;
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                if output.status.success() {
                    let passed = judge::compare(&stdout, &test_case.expected_output, mode);
                    Ok(CaseResult {
                        index,
                        status: ExecutionStatus::Success,
                        stdout,
                        stderr: (!stderr.is_empty()).then_some(stderr),
                        execution_time_ms,
                        peak_memory_bytes,
                        passed,
                        input: test_case.input.clone(),
                        expected_output: test_case.expected_output.clone(),
                    })
                } else {
                    // Runtime failure: stdout is still captured for the
                    // caller, but an errored case can never count as passed.
                    warn!(index, code = ?output.status.code(), "runtime failure");
                    Ok(CaseResult {
                        index,
                        status: ExecutionStatus::Error,
                        stdout,
                        stderr: Some(if stderr.is_empty() {
                            format!("Process exited with {}", output.status)
                        } else {
                            stderr
                        }),
                        execution_time_ms,
                        peak_memory_bytes,
                        passed: false,
                        input: test_case.input.clone(),
                        expected_output: test_case.expected_output.clone(),
                    })
                }
            }
            Ok(Err(e)) => {
                kill_process_group(pid);
                sampler.stop().await?;
                Ok(Self::error_result(index, test_case, e.to_string()))
            }
            Err(_) => {
                // Wall-clock expiry: kill the whole process group so no
                // descendant outlives the case, then report zeroed metrics.
                kill_process_group(pid);
                sampler.stop().await?;
                warn!(index, timeout_ms = self.limits.run_timeout.as_millis() as u64, "case timed out");
                Ok(CaseResult {
                    index,
                    status: ExecutionStatus::Timeout,
                    stdout: String::new(),
                    stderr: Some("Execution timed out".to_string()),
                    execution_time_ms: self.limits.run_timeout.as_secs_f64() * 1000.0,
                    peak_memory_bytes: 0,
                    passed: false,
                    input: test_case.input.clone(),
                    expected_output: test_case.expected_output.clone(),
                })
            }
        }
    }

    fn error_result(index: usize, test_case: &TestCase, message: String) -> CaseResult {
        CaseResult {
            index,
            status: ExecutionStatus::Error,
            stdout: String::new(),
            stderr: Some(message),
            execution_time_ms: 0.0,
            peak_memory_bytes: 0,
            passed: false,
            input: test_case.input.clone(),
            expected_output: test_case.expected_output.clone(),
        }
    }

    fn uniform_error_report(test_cases: &[TestCase], message: &str) -> RunReport {
        RunReport {
            success: false,
            results: test_cases
                .iter()
                .enumerate()
                .map(|(index, tc)| Self::error_result(index, tc, message.to_string()))
                .collect(),
            overall_status: OverallStatus::Failed,
            compile_memory_usage: None,
        }
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Sandbox::new(LanguageRegistry::builtin(), SandboxLimits::default())
    }
}

/// Put the child in its own process group (so a timeout kill reaches every
/// descendant) and apply the optional address-space ceiling before exec.
#[cfg(unix)]
fn configure_child(cmd: &mut Command, memory_ceiling: Option<u64>) {
    unsafe {
        cmd.pre_exec(move || {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            if let Some(limit) = memory_ceiling {
                let rlim = libc::rlimit {
                    rlim_cur: limit as libc::rlim_t,
                    rlim_max: limit as libc::rlim_t,
                };
                // Best-effort: a refused rlimit must not abort the exec.
                let _ = libc::setrlimit(libc::RLIMIT_AS, &rlim);
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn configure_child(_cmd: &mut Command, _memory_ceiling: Option<u64>) {}

/// SIGKILL the process group rooted at `pid`. Negative pid addresses the
/// group, reaching descendants the direct child may have spawned.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    if pid == 0 {
        return;
    }
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
