// Docker-backed execution engine using Bollard

use crate::config::{LanguageConfig, LanguageConfigManager};
use crate::engine::{
    truncate_output, validate_sizes, CompilationResult, ExecutionEngine, ExecutionLimits,
    TestExecutionOutput, CHECK_TIMEOUT_MS,
};
use algolab_common::types::Language;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Linux rejects a single environment string longer than this (MAX_ARG_STRLEN)
const MAX_ENV_VALUE_BYTES: usize = 128 * 1024 - 1;

const PIDS_LIMIT: i64 = 64;

/// Container cleanup guard - guarantees container removal on drop,
/// including when the execution future is cancelled by a timeout
struct ContainerGuard {
    docker: Docker,
    container_id: String,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        // Drop cannot be async; removal is handed to the runtime
        let container_id = self.container_id.clone();
        let docker = self.docker.clone();

        tokio::spawn(async move {
            let remove_options = RemoveContainerOptions {
                force: true,
                ..Default::default()
            };

            if let Err(e) = docker.remove_container(&container_id, Some(remove_options)).await {
                warn!(container_id = %container_id, error = %e, "Failed to remove container");
            }
        });
    }
}

/// Docker-based execution engine
///
/// Each program runs in a throwaway container built from the language's
/// image with:
/// - network disabled
/// - memory, CPU and process-count limits from languages.json
/// - source and input passed base64-encoded through the environment
/// - a hard wall-clock timeout, after which the container is killed
pub struct DockerEngine {
    docker: Docker,
    languages: LanguageConfigManager,
    limits: ExecutionLimits,
}

impl DockerEngine {
    pub fn new(languages: LanguageConfigManager, limits: ExecutionLimits) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon")?;

        Ok(Self {
            docker,
            languages,
            limits,
        })
    }

    /// Ensure the image is available locally, pulling it on a cache miss
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        warn!(image = %image, "Image cache miss, pulling");

        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });

        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            result.context("Failed to pull Docker image")?;
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }

    /// Run a shell script in a fresh container and collect its output
    async fn run_container(
        &self,
        config: &LanguageConfig,
        script: String,
        env: Vec<String>,
        timeout_ms: u64,
    ) -> Result<TestExecutionOutput> {
        self.ensure_image(&config.image)
            .await
            .with_context(|| format!("Failed to ensure Docker image '{}' is available", config.image))?;

        let container_name = format!("algolab-{}", uuid::Uuid::new_v4());

        let container_config = Config {
            image: Some(config.image.clone()),
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), script]),
            env: Some(env),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            network_disabled: Some(true),
            host_config: Some(bollard::models::HostConfig {
                memory: Some(i64::from(config.memory_limit_mb) * 1024 * 1024),
                nano_cpus: Some((f64::from(config.cpu_limit) * 1_000_000_000.0) as i64),
                pids_limit: Some(PIDS_LIMIT),
                ..Default::default()
            }),
            ..Default::default()
        };

        let create_options = CreateContainerOptions {
            name: container_name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), container_config)
            .await
            .context("Failed to create Docker container")?;

        let container_id = container.id.clone();
        let _guard = ContainerGuard {
            docker: self.docker.clone(),
            container_id: container_id.clone(),
        };

        let start_time = Instant::now();

        self.docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start Docker container")?;

        let execution_future = async {
            let mut stdout = String::new();
            let mut stderr = String::new();

            let logs_options = Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                follow: true,
                ..Default::default()
            });

            let mut logs_stream = self.docker.logs(&container_id, logs_options);
            while let Some(output) = logs_stream.next().await {
                match output {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Error reading container logs");
                        break;
                    }
                }
            }

            let wait_options = WaitContainerOptions {
                condition: "not-running",
            };

            let mut exit_code = None;
            let mut wait_stream = self.docker.wait_container(&container_id, Some(wait_options));
            match wait_stream.next().await {
                Some(Ok(response)) => exit_code = Some(response.status_code),
                // Bollard reports non-zero exits as errors carrying the code
                Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                    exit_code = Some(code)
                }
                Some(Err(e)) => warn!(error = %e, "Failed to get container exit code"),
                None => warn!("No wait response from container"),
            }

            (stdout, stderr, exit_code)
        };

        let timeout_result =
            tokio::time::timeout(Duration::from_millis(timeout_ms), execution_future).await;
        let execution_time_ms = start_time.elapsed().as_millis() as u64;

        match timeout_result {
            Ok((stdout, stderr, exit_code)) => {
                let runtime_error = exit_code != Some(0);
                debug!(
                    container = %container_name,
                    exit_code = ?exit_code,
                    execution_time_ms = execution_time_ms,
                    "Container finished"
                );

                let max = self.limits.max_output_bytes;
                Ok(TestExecutionOutput {
                    stdout: truncate_output(stdout, max),
                    stderr: truncate_output(stderr, max),
                    exit_code,
                    execution_time_ms,
                    timed_out: false,
                    runtime_error,
                })
            }
            Err(_) => {
                warn!(container = %container_name, timeout_ms = timeout_ms, "Execution timed out, killing container");

                if let Err(e) = self
                    .docker
                    .kill_container(&container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(error = %e, "Failed to kill timed-out container");
                }

                Ok(TestExecutionOutput {
                    stdout: String::new(),
                    stderr: "[Execution timed out]".to_string(),
                    exit_code: None,
                    execution_time_ms,
                    timed_out: true,
                    runtime_error: false,
                })
            }
        }
    }
}

/// Encode a value for the container environment
fn env_var(name: &str, value: &str) -> Result<String> {
    let encoded = general_purpose::STANDARD.encode(value);
    if encoded.len() > MAX_ENV_VALUE_BYTES {
        bail!(
            "{} is too large to pass to a container ({} bytes encoded)",
            name,
            encoded.len()
        );
    }
    Ok(format!("{}={}", name, encoded))
}

/// Shell script that decodes the source and runs `command args` on it
fn container_script(command: &str, args: &[String], file_name: &str, with_input: bool) -> String {
    let path = format!("/tmp/{}", file_name);
    let mut invocation = vec![command.to_string()];
    invocation.extend(args.iter().cloned());
    invocation.push(path.clone());

    let write_source = format!("printf '%s' \"$SOURCE_CODE\" | base64 -d > {}", path);
    if with_input {
        format!(
            "{} && printf '%s' \"$TEST_INPUT\" | base64 -d | {}",
            write_source,
            invocation.join(" ")
        )
    } else {
        format!("{} && {}", write_source, invocation.join(" "))
    }
}

impl ExecutionEngine for DockerEngine {
    async fn check(&self, language: Language, source: &str) -> Result<CompilationResult> {
        validate_sizes(source, "")?;
        let config = self.languages.get_config(&language)?;
        let check_args = match &config.execution.check_args {
            Some(args) => args,
            None => return Ok(CompilationResult::success()),
        };

        let script = container_script(
            &config.execution.command,
            check_args,
            &config.source_file_name(),
            false,
        );
        let env = vec![env_var("SOURCE_CODE", source)?];

        let output = self.run_container(config, script, env, CHECK_TIMEOUT_MS).await?;
        if output.timed_out {
            return Ok(CompilationResult::failure("Syntax check timed out"));
        }
        if output.runtime_error {
            let diagnostics = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
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

        let script = container_script(
            &config.execution.command,
            &config.execution.args,
            &config.source_file_name(),
            true,
        );
        let env = vec![env_var("SOURCE_CODE", source)?, env_var("TEST_INPUT", input)?];

        self.run_container(config, script, env, timeout_ms).await
    }
}
