/// Execution Engine - Abstraction for Code Execution
///
/// **Core Responsibility:**
/// Run a synthesized program with one input and capture raw outputs.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (child process, Docker)
/// - Engine does NOT know what a test case is or how results are compared
/// - Engine returns raw stdout/stderr/exit status for the runner to judge
///
/// Every execution is bounded: a wall-clock deadline after which the
/// program is killed, plus CPU and memory limits where the backend supports
/// them.

use crate::config::{LanguageConfig, LanguageConfigManager};
use crate::docker::DockerEngine;
use algolab_common::config::{EngineKind, HarnessConfig};
use algolab_common::types::Language;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Safety limits to prevent pathological inputs from reaching an interpreter
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Deadline for syntax checks, which never run user code
pub const CHECK_TIMEOUT_MS: u64 = 10_000;

const TRUNCATION_NOTICE: &str = "\n[output truncated]";

/// Raw execution output for a single program run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status; signals are reported as 128 + signal number
    pub exit_code: Option<i64>,
    pub execution_time_ms: u64,
    pub timed_out: bool,
    pub runtime_error: bool,
}

/// Result of a syntax check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationResult {
    pub success: bool,
    pub stderr: String,
}

impl CompilationResult {
    pub fn success() -> Self {
        Self {
            success: true,
            stderr: String::new(),
        }
    }

    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stderr: stderr.into(),
        }
    }
}

/// Resource limits applied to every execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub cpu_seconds: u64,
    pub memory_limit_mb: Option<u64>,
    pub max_output_bytes: usize,
}

impl From<&HarnessConfig> for ExecutionLimits {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            cpu_seconds: config.cpu_seconds,
            memory_limit_mb: config.memory_limit_mb,
            max_output_bytes: config.max_output_bytes,
        }
    }
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        (&HarnessConfig::default()).into()
    }
}

/// Backend able to syntax-check and run programs.
///
/// `Err` means the infrastructure failed (interpreter missing, Docker
/// unreachable); problems with the program itself are reported inside the
/// returned values.
#[allow(async_fn_in_trait)]
pub trait ExecutionEngine {
    async fn check(&self, language: Language, source: &str) -> Result<CompilationResult>;

    async fn execute(
        &self,
        language: Language,
        source: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<TestExecutionOutput>;
}

/// Reject sources and inputs too large to be reasonable submissions
pub fn validate_sizes(source: &str, input: &str) -> Result<()> {
    if source.len() > MAX_SOURCE_CODE_BYTES {
        bail!("Source code exceeds maximum size of {} bytes", MAX_SOURCE_CODE_BYTES);
    }
    if input.len() > MAX_TEST_INPUT_BYTES {
        bail!("Test input exceeds maximum size of {} bytes", MAX_TEST_INPUT_BYTES);
    }
    Ok(())
}

/// Cut captured output at `max_bytes`, respecting UTF-8 boundaries
pub fn truncate_output(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str(TRUNCATION_NOTICE);
    text
}

/// Local child-process engine.
///
/// Each run gets a fresh temporary directory holding only the program. The
/// child is killed when the deadline passes (the future owning it is
/// dropped with `kill_on_drop`), and on Unix it inherits `RLIMIT_CPU` and an
/// optional `RLIMIT_AS`.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    languages: LanguageConfigManager,
    limits: ExecutionLimits,
}

impl ProcessEngine {
    pub fn new(languages: LanguageConfigManager, limits: ExecutionLimits) -> Self {
        Self { languages, limits }
    }

    async fn write_source(dir: &Path, config: &LanguageConfig, source: &str) -> Result<PathBuf> {
        let path = dir.join(config.source_file_name());
        tokio::fs::write(&path, source)
            .await
            .with_context(|| format!("Failed to write source to {}", path.display()))?;
        Ok(path)
    }

    fn command(&self, program: &str, args: &[String], source_path: &Path, dir: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(source_path)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.apply_limits(&mut cmd);
        cmd
    }

    #[cfg(unix)]
    fn apply_limits(&self, cmd: &mut Command) {
        use nix::sys::resource::{setrlimit, Resource};

        let cpu_seconds = self.limits.cpu_seconds;
        let memory_bytes = self.limits.memory_limit_mb.map(|mb| mb * 1024 * 1024);

        // SAFETY: the closure runs between fork and exec and only calls
        // setrlimit, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                if cpu_seconds > 0 {
                    // SIGXCPU at the soft limit, SIGKILL one second later
                    setrlimit(Resource::RLIMIT_CPU, cpu_seconds as _, (cpu_seconds + 1) as _)?;
                }
                if let Some(bytes) = memory_bytes {
                    setrlimit(Resource::RLIMIT_AS, bytes as _, bytes as _)?;
                }
                Ok(())
            });
        }
    }

    #[cfg(not(unix))]
    fn apply_limits(&self, _cmd: &mut Command) {}

    async fn run(
        &self,
        mut cmd: Command,
        program: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<TestExecutionOutput> {
        let start_time = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", program))?;

        if let Some(mut stdin) = child.stdin.take() {
            let bytes = input.as_bytes().to_vec();
            tokio::spawn(async move {
                // The program may exit without reading its input
                if let Err(e) = stdin.write_all(&bytes).await {
                    debug!(error = %e, "stdin closed before input was fully written");
                }
            });
        }

        let timeout_duration = Duration::from_millis(timeout_ms);
        let timeout_result = tokio::time::timeout(timeout_duration, child.wait_with_output()).await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        let output = match timeout_result {
            Ok(result) => result.context("Failed to collect program output")?,
            Err(_) => {
                // Dropping the wait future killed the child
                warn!(timeout_ms = timeout_ms, program = %program, "Execution timed out");
                return Ok(TestExecutionOutput {
                    stdout: String::new(),
                    stderr: "[Execution timed out]".to_string(),
                    exit_code: None,
                    execution_time_ms,
                    timed_out: true,
                    runtime_error: false,
                });
            }
        };

        let max = self.limits.max_output_bytes;
        let exit_code = exit_code_of(&output.status);
        let runtime_error = !output.status.success();

        if runtime_error {
            debug!(exit_code = ?exit_code, execution_time_ms = execution_time_ms, "Program exited with failure");
        }

        Ok(TestExecutionOutput {
            stdout: truncate_output(String::from_utf8_lossy(&output.stdout).into_owned(), max),
            stderr: truncate_output(String::from_utf8_lossy(&output.stderr).into_owned(), max),
            exit_code,
            execution_time_ms,
            timed_out: false,
            runtime_error,
        })
    }
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> Option<i64> {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .map(i64::from)
        .or_else(|| status.signal().map(|signal| 128 + i64::from(signal)))
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> Option<i64> {
    status.code().map(i64::from)
}

impl ExecutionEngine for ProcessEngine {
    async fn check(&self, language: Language, source: &str) -> Result<CompilationResult> {
        validate_sizes(source, "")?;
        let config = self.languages.get_config(&language)?;
        let check_args = match &config.execution.check_args {
            Some(args) => args,
            None => return Ok(CompilationResult::success()),
        };

        let dir = tempfile::Builder::new()
            .prefix("algolab-check-")
            .tempdir()
            .context("Failed to create temporary directory")?;
        let path = Self::write_source(dir.path(), config, source).await?;
        let cmd = self.command(&config.execution.command, check_args, &path, dir.path());

        let output = self
            .run(cmd, &config.execution.command, "", CHECK_TIMEOUT_MS)
            .await?;

        if output.timed_out {
            return Ok(CompilationResult::failure("Syntax check timed out"));
        }
        if output.runtime_error {
            let diagnostics = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            debug!(language = %language, "Syntax check failed");
            return Ok(CompilationResult::failure(diagnostics));
        }
        Ok(CompilationResult::success())
    }

    async fn execute(
        &self,
        language: Language,
        source: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<TestExecutionOutput> {
        validate_sizes(source, input)?;
        let config = self.languages.get_config(&language)?;

        let dir = tempfile::Builder::new()
            .prefix("algolab-run-")
            .tempdir()
            .context("Failed to create temporary directory")?;
        let path = Self::write_source(dir.path(), config, source).await?;
        let cmd = self.command(&config.execution.command, &config.execution.args, &path, dir.path());

        self.run(cmd, &config.execution.command, input, timeout_ms).await
    }
}

/// Engine selected at runtime from configuration
pub enum AnyEngine {
    Process(ProcessEngine),
    Docker(DockerEngine),
}

impl AnyEngine {
    pub fn from_config(config: &HarnessConfig) -> Result<Self> {
        let languages = LanguageConfigManager::load_or_builtin(Path::new(&config.languages_path))?;
        let limits = ExecutionLimits::from(config);

        info!(
            engine = %config.engine,
            languages = ?languages.list_languages(),
            timeout_ms = config.timeout_ms,
            cpu_seconds = limits.cpu_seconds,
            "Execution engine configured"
        );

        match config.engine {
            EngineKind::Process => Ok(AnyEngine::Process(ProcessEngine::new(languages, limits))),
            EngineKind::Docker => Ok(AnyEngine::Docker(DockerEngine::new(languages, limits)?)),
        }
    }
}

impl ExecutionEngine for AnyEngine {
    async fn check(&self, language: Language, source: &str) -> Result<CompilationResult> {
        match self {
            AnyEngine::Process(engine) => engine.check(language, source).await,
            AnyEngine::Docker(engine) => engine.check(language, source).await,
        }
    }

    async fn execute(
        &self,
        language: Language,
        source: &str,
        input: &str,
        timeout_ms: u64,
    ) -> Result<TestExecutionOutput> {
        match self {
            AnyEngine::Process(engine) => engine.execute(language, source, input, timeout_ms).await,
            AnyEngine::Docker(engine) => engine.execute(language, source, input, timeout_ms).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ProcessEngine {
        ProcessEngine::new(LanguageConfigManager::builtin().unwrap(), ExecutionLimits::default())
    }

    #[test]
    fn test_validate_sizes() {
        assert!(validate_sizes("x", "y").is_ok());

        let big_source = "a".repeat(MAX_SOURCE_CODE_BYTES + 1);
        let err = validate_sizes(&big_source, "").unwrap_err();
        assert!(err.to_string().contains("Source code exceeds"));

        let big_input = "1".repeat(MAX_TEST_INPUT_BYTES + 1);
        assert!(validate_sizes("", &big_input).is_err());
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short".to_string(), 10), "short");

        let truncated = truncate_output("abcdefgh".to_string(), 4);
        assert_eq!(truncated, format!("abcd{}", TRUNCATION_NOTICE));

        // Never splits a multi-byte character
        let truncated = truncate_output("ééé".to_string(), 3);
        assert!(truncated.starts_with('é'));
        assert!(!truncated.starts_with("éé"));
    }

    #[test]
    fn test_limits_from_config() {
        let config = HarnessConfig {
            cpu_seconds: 2,
            memory_limit_mb: Some(64),
            max_output_bytes: 10,
            ..HarnessConfig::default()
        };
        let limits = ExecutionLimits::from(&config);
        assert_eq!(limits.cpu_seconds, 2);
        assert_eq!(limits.memory_limit_mb, Some(64));
        assert_eq!(limits.max_output_bytes, 10);
    }

    #[test]
    fn test_compilation_result_constructors() {
        assert!(CompilationResult::success().success);
        let failure = CompilationResult::failure("SyntaxError: bad");
        assert!(!failure.success);
        assert_eq!(failure.stderr, "SyntaxError: bad");
    }

    #[tokio::test]
    async fn test_typescript_check_is_skipped() {
        // No check_args configured, so nothing is spawned
        let result = engine().check(Language::TypeScript, "const x: number = 1;").await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_oversized_source_rejected_before_spawning() {
        let source = "a".repeat(MAX_SOURCE_CODE_BYTES + 1);
        assert!(engine().execute(Language::Python, &source, "", 1000).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires python3
    async fn test_python_execution() {
        let output = engine()
            .execute(Language::Python, "import sys\nprint(sys.stdin.read().upper())", "abc", 5000)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "ABC");
        assert_eq!(output.exit_code, Some(0));
        assert!(!output.runtime_error);
    }

    #[tokio::test]
    #[ignore] // Requires node
    async fn test_node_timeout_kills_program() {
        let output = engine()
            .execute(Language::JavaScript, "while (true) {}", "", 300)
            .await
            .unwrap();
        assert!(output.timed_out);
        assert!(output.execution_time_ms >= 300);
    }

    #[tokio::test]
    #[ignore] // Requires node
    async fn test_node_syntax_check() {
        let result = engine().check(Language::JavaScript, "function (").await.unwrap();
        assert!(!result.success);
        assert!(result.stderr.contains("SyntaxError"));
    }
}
