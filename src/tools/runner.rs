//! Process Runner
//!
//! Runs a batch of commands through the platform command interpreter with a
//! bounded wall-clock timeout, captures both output streams, and classifies
//! the outcome into an [`ExecuteResult`].
//!
//! A batch is joined with `" ; "` into one command line and handed to a
//! single interpreter process as its final argument. Later commands run
//! regardless of earlier exit codes; the batch exit code is whatever the
//! interpreter reports for the whole line.

use super::result::{new_execution_id, ExecuteResult, ExecuteStatus};
use super::timeout::ExecutionTimeout;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Stdout marker returned by a dry-run invocation
pub const DRY_RUN_MARKER: &str = "DRY_RUN";

/// Separator placed between commands of one batch
pub const COMMAND_SEPARATOR: &str = " ; ";

/// How long to keep draining output pipes after a kill
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// Something that can execute a batch of commands
///
/// [`ProcessRunner`] is the production implementation. Errors returned from
/// `run` are infrastructure failures; the gateway converts them into ERROR
/// results instead of propagating them.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute the batch and report the outcome
    async fn run(&self, commands: &[String]) -> anyhow::Result<ExecuteResult>;

    /// Whether this runner synthesizes results without spawning processes
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Interpreter program plus the arguments preceding the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    /// PowerShell without profile loading and with execution policy bypassed
    pub fn powershell() -> Self {
        Self {
            program: "powershell.exe".to_string(),
            args: vec![
                "-NoProfile".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-Command".to_string(),
            ],
        }
    }

    /// Non-interactive POSIX shell
    pub fn posix_shell() -> Self {
        Self {
            program: "sh".to_string(),
            args: vec!["-c".to_string()],
        }
    }

    /// PowerShell on Windows, the POSIX shell elsewhere
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::powershell()
        } else {
            Self::posix_shell()
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Configuration for a [`ProcessRunner`]
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bound on the wait for process exit (default: 30 seconds)
    pub timeout: ExecutionTimeout,

    /// Synthesize results instead of spawning (default: false)
    pub dry_run: bool,

    /// Interpreter used to run the combined command line
    pub interpreter: Interpreter,

    /// Working directory for the interpreter (default: inherited)
    pub working_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: ExecutionTimeout::default(),
            dry_run: false,
            interpreter: Interpreter::platform_default(),
            working_dir: None,
        }
    }
}

impl RunnerConfig {
    /// Default config with a custom timeout
    pub fn with_timeout(timeout: ExecutionTimeout) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Default config in dry-run mode
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Default::default()
        }
    }

    /// Replace the interpreter
    pub fn interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = interpreter;
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Subprocess runner with timeout enforcement
///
/// Holds only immutable configuration, so one instance can serve concurrent
/// invocations; every invocation owns its own process and output buffers.
///
/// # Example
///
/// ```no_run
/// use opsgate::tools::{ProcessRunner, RunnerConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let runner = ProcessRunner::with_config(RunnerConfig::default());
///     let result = runner.execute(&["Get-Service".to_string()]).await;
///     println!("{}", result.summary());
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    /// Create a runner with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner with a custom configuration
    pub fn with_config(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute a batch of commands in one interpreter process
    ///
    /// Never fails: spawn errors, wait errors and timeouts are reported as
    /// [`ExecuteStatus::Error`] with exit code -1.
    pub async fn execute(&self, commands: &[String]) -> ExecuteResult {
        let execution_id = new_execution_id();

        if commands.is_empty() {
            return ExecuteResult::error(execution_id, String::new(), "No commands provided");
        }

        if self.config.dry_run {
            debug!(%execution_id, command_count = commands.len(), "Dry run, not spawning");
            return ExecuteResult {
                execution_id,
                exit_code: 0,
                stdout: DRY_RUN_MARKER.to_string(),
                stderr: String::new(),
                status: ExecuteStatus::Success,
            };
        }

        let command_line = join_commands(commands);
        let interpreter = &self.config.interpreter;
        info!(
            %execution_id,
            program = %interpreter.program,
            command_count = commands.len(),
            "Executing command batch"
        );
        debug!(%execution_id, "Command line: {}", command_line);

        let mut process = TokioCommand::new(&interpreter.program);
        process
            .args(&interpreter.args)
            .arg(&command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.config.working_dir {
            process.current_dir(dir);
        }

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(%execution_id, "Failed to spawn {}: {}", interpreter.program, e);
                return ExecuteResult::error(
                    execution_id,
                    String::new(),
                    format!("Execution failed: {}", e),
                );
            }
        };

        let stdout = OutputCapture::start(child.stdout.take());
        let stderr = OutputCapture::start(child.stderr.take());

        let started = Instant::now();
        match self.config.timeout.run(child.wait()).await {
            Some(Ok(status)) => {
                let budget = self
                    .config
                    .timeout
                    .duration()
                    .saturating_sub(started.elapsed())
                    .max(OUTPUT_GRACE);
                let stdout = stdout.finish(budget).await;
                let stderr = stderr.finish(budget).await;

                match status.code() {
                    Some(code) => {
                        if code == 0 {
                            info!(%execution_id, "Command batch succeeded");
                        } else {
                            warn!(%execution_id, exit_code = code, "Command batch failed");
                        }
                        ExecuteResult::completed(execution_id, code, stdout, stderr)
                    }
                    None => {
                        warn!(%execution_id, "Interpreter terminated without an exit code");
                        ExecuteResult::error(
                            execution_id,
                            stdout,
                            append_note(stderr, "Process terminated without an exit code"),
                        )
                    }
                }
            }
            Some(Err(e)) => {
                warn!(%execution_id, "Failed waiting for process: {}", e);
                if let Err(kill_err) = child.kill().await {
                    debug!(%execution_id, "Kill after wait failure: {}", kill_err);
                }
                let stdout = stdout.finish(OUTPUT_GRACE).await;
                let stderr = stderr.finish(OUTPUT_GRACE).await;
                ExecuteResult::error(
                    execution_id,
                    stdout,
                    append_note(stderr, &format!("Execution failed: {}", e)),
                )
            }
            None => {
                warn!(
                    %execution_id,
                    "Command batch timed out after {:?}",
                    self.config.timeout.duration()
                );
                if let Err(kill_err) = child.kill().await {
                    warn!(%execution_id, "Failed to kill timed out process: {}", kill_err);
                }
                let stdout = stdout.finish(OUTPUT_GRACE).await;
                let stderr = stderr.finish(OUTPUT_GRACE).await;
                ExecuteResult::error(
                    execution_id,
                    stdout,
                    append_note(
                        stderr,
                        &format!(
                            "Execution timed out after {:?}",
                            self.config.timeout.duration()
                        ),
                    ),
                )
            }
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, commands: &[String]) -> anyhow::Result<ExecuteResult> {
        Ok(self.execute(commands).await)
    }

    fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }
}

/// Join a batch into one interpreter command line
pub fn join_commands(commands: &[String]) -> String {
    commands.join(COMMAND_SEPARATOR)
}

fn append_note(mut stderr: String, note: &str) -> String {
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        stderr.push('\n');
    }
    stderr.push_str(note);
    stderr
}

/// Background drain of one output pipe into a per-invocation buffer
///
/// Draining concurrently with the wait keeps a chatty process from blocking
/// on a full pipe. The buffer is readable even if the drain is abandoned,
/// so output produced before a kill is kept.
struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl OutputCapture {
    fn start<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = reader.map(|mut reader| {
            let sink = Arc::clone(&buffer);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => {
                            let mut bytes = sink.lock().unwrap_or_else(PoisonError::into_inner);
                            bytes.extend_from_slice(&chunk[..n]);
                        }
                        Err(e) => {
                            debug!("Output pipe read failed: {}", e);
                            break;
                        }
                    }
                }
            })
        });
        Self { buffer, handle }
    }

    /// Wait up to `budget` for the pipe to close, then return what was read
    async fn finish(self, budget: Duration) -> String {
        if let Some(mut handle) = self.handle {
            if tokio::time::timeout(budget, &mut handle).await.is_err() {
                debug!("Output pipe still open after {:?}, abandoning drain", budget);
                handle.abort();
            }
        }
        let bytes = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn missing_interpreter() -> Interpreter {
        Interpreter {
            program: "opsgate-interpreter-that-does-not-exist-12345".to_string(),
            args: vec![],
        }
    }

    #[test]
    fn test_join_commands() {
        assert_eq!(join_commands(&commands(&["a"])), "a");
        assert_eq!(
            join_commands(&commands(&["ipconfig /flushdns", "netsh winsock reset"])),
            "ipconfig /flushdns ; netsh winsock reset"
        );
    }

    #[test]
    fn test_interpreters() {
        let ps = Interpreter::powershell();
        assert_eq!(ps.program, "powershell.exe");
        assert_eq!(ps.args, vec!["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"]);

        let sh = Interpreter::posix_shell();
        assert_eq!(sh.program, "sh");
        assert_eq!(sh.args, vec!["-c"]);

        if cfg!(windows) {
            assert_eq!(Interpreter::default(), ps);
        } else {
            assert_eq!(Interpreter::default(), sh);
        }
    }

    #[test]
    fn test_runner_config_builders() {
        let config = RunnerConfig::default();
        assert_eq!(config.timeout.duration(), Duration::from_secs(30));
        assert!(!config.dry_run);
        assert!(config.working_dir.is_none());

        let config = RunnerConfig::with_timeout(ExecutionTimeout::from_millis(500));
        assert_eq!(config.timeout.duration(), Duration::from_millis(500));

        let config = RunnerConfig::dry_run().working_dir("/tmp");
        assert!(config.dry_run);
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[tokio::test]
    async fn test_empty_batch_is_error_without_spawning() {
        let runner =
            ProcessRunner::with_config(RunnerConfig::default().interpreter(missing_interpreter()));

        let result = runner.execute(&[]).await;

        assert_eq!(result.status, ExecuteStatus::Error);
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "No commands provided");
        assert!(!result.execution_id.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_never_spawns() {
        // A missing interpreter would fail if anything were spawned
        let runner =
            ProcessRunner::with_config(RunnerConfig::dry_run().interpreter(missing_interpreter()));
        assert!(runner.is_dry_run());

        let result = runner.execute(&commands(&["Get-Service"])).await;

        assert_eq!(result.status, ExecuteStatus::Success);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, DRY_RUN_MARKER);
        assert_eq!(result.stderr, "");
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let runner =
            ProcessRunner::with_config(RunnerConfig::default().interpreter(missing_interpreter()));

        let result = runner.execute(&commands(&["Get-Service"])).await;

        assert_eq!(result.status, ExecuteStatus::Error);
        assert_eq!(result.exit_code, -1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.starts_with("Execution failed:"));
    }

    #[tokio::test]
    async fn test_fresh_execution_id_per_call() {
        let runner = ProcessRunner::with_config(RunnerConfig::dry_run());
        let batch = commands(&["Get-Service"]);

        let first = runner.execute(&batch).await;
        let second = runner.execute(&batch).await;

        assert_ne!(first.execution_id, second.execution_id);
    }

    #[tokio::test]
    async fn test_trait_run_delegates_to_execute() {
        let runner: Box<dyn CommandRunner> =
            Box::new(ProcessRunner::with_config(RunnerConfig::dry_run()));

        let result = runner.run(&commands(&["Get-Date"])).await.unwrap();
        assert_eq!(result.stdout, DRY_RUN_MARKER);
    }

    #[cfg(unix)]
    mod posix {
        use super::*;

        fn sh_runner(timeout: ExecutionTimeout) -> ProcessRunner {
            ProcessRunner::with_config(
                RunnerConfig::with_timeout(timeout).interpreter(Interpreter::posix_shell()),
            )
        }

        #[tokio::test]
        async fn test_execute_echo() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let result = runner.execute(&commands(&["echo hello world"])).await;

            assert_eq!(result.status, ExecuteStatus::Success);
            assert_eq!(result.exit_code, 0);
            assert_eq!(result.stdout.trim(), "hello world");
            assert!(result.is_success());
        }

        #[tokio::test]
        async fn test_non_zero_exit_is_failure() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let result = runner.execute(&commands(&["echo oops 1>&2", "exit 3"])).await;

            assert_eq!(result.status, ExecuteStatus::Failure);
            assert_eq!(result.exit_code, 3);
            assert!(result.stderr.contains("oops"));
        }

        #[tokio::test]
        async fn test_batch_runs_sequentially_without_short_circuit() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let result = runner
                .execute(&commands(&["echo one", "false", "echo two"]))
                .await;

            // The failing middle command does not stop the batch
            assert_eq!(result.status, ExecuteStatus::Success);
            assert!(result.stdout.contains("one"));
            assert!(result.stdout.contains("two"));
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let runner = sh_runner(ExecutionTimeout::from_millis(300));
            let started = Instant::now();

            let result = runner.execute(&commands(&["echo started", "sleep 10"])).await;

            assert!(started.elapsed() < Duration::from_secs(5));
            assert_eq!(result.status, ExecuteStatus::Error);
            assert_eq!(result.exit_code, -1);
            assert!(result.stderr.contains("timed out"));
        }

        #[tokio::test]
        async fn test_signal_termination_is_error() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let result = runner.execute(&commands(&["kill -9 $$"])).await;

            assert_eq!(result.status, ExecuteStatus::Error);
            assert_eq!(result.exit_code, -1);
        }

        #[tokio::test]
        async fn test_large_output_is_not_truncated() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let result = runner.execute(&commands(&["seq 1 20000"])).await;

            assert!(result.is_success());
            assert_eq!(result.stdout.lines().count(), 20000);
            assert!(result.stdout.ends_with("20000\n"));
        }

        #[tokio::test]
        async fn test_working_directory() {
            let dir = tempfile::tempdir().unwrap();
            let runner = ProcessRunner::with_config(
                RunnerConfig::default()
                    .interpreter(Interpreter::posix_shell())
                    .working_dir(dir.path()),
            );

            let result = runner.execute(&commands(&["pwd"])).await;

            assert!(result.is_success());
            let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
            assert!(result.stdout.contains(&name));
        }

        #[tokio::test]
        async fn test_concurrent_invocations_do_not_share_output() {
            let runner = sh_runner(ExecutionTimeout::from_secs(10));
            let batches: Vec<Vec<String>> = (0..8)
                .map(|i| commands(&[&format!("echo run-{}", i)]))
                .collect();

            let results =
                futures::future::join_all(batches.iter().map(|batch| runner.execute(batch))).await;

            for (i, result) in results.iter().enumerate() {
                assert!(result.is_success());
                assert_eq!(result.stdout.trim(), format!("run-{}", i));
            }
        }
    }
}
