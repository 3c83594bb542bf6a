//! Subprocess-backed build tool
//!
//! Spawns the build tool with piped stdout/stderr, captures both streams in
//! full and interleaves them line by line into a merged transcript.

use super::{BuildTool, Invocation, RunResult};
use crate::config::schema::RunnerConfig;
use crate::error::{HarnessError, HarnessResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Callback invoked with every captured output line
pub type OutputListener = Arc<dyn Fn(&str) + Send + Sync>;

#[cfg(windows)]
const WRAPPER: &str = "gradlew.bat";
#[cfg(not(windows))]
const WRAPPER: &str = "gradlew";

const DEFAULT_EXECUTABLE: &str = "gradle";

/// Runs the build tool as a child process
pub struct ProcessRunner {
    executable: Option<PathBuf>,
    use_wrapper: bool,
    extra_flags: Vec<String>,
    env: Vec<(String, String)>,
    default_timeout: Option<Duration>,
    listener: Option<OutputListener>,
}

impl ProcessRunner {
    /// Runner that prefers the project wrapper, then `gradle` on `PATH`
    pub fn new() -> Self {
        Self {
            executable: None,
            use_wrapper: true,
            extra_flags: Vec::new(),
            env: Vec::new(),
            default_timeout: None,
            listener: None,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        let mut env: Vec<(String, String)> = config
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.sort();

        Self {
            executable: config.executable.clone(),
            use_wrapper: config.use_wrapper,
            extra_flags: config.extra_flags.clone(),
            env,
            default_timeout: config.timeout(),
            listener: None,
        }
    }

    /// Always run this executable
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Timeout applied when the invocation does not set one
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Observe output lines as they arrive
    pub fn with_listener(mut self, listener: OutputListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Pick the executable: explicit path, then project wrapper, then `PATH`
    pub fn resolve_executable(&self, workdir: &Path) -> PathBuf {
        if let Some(ref exe) = self.executable {
            return exe.clone();
        }
        if self.use_wrapper {
            let wrapper = workdir.join(WRAPPER);
            if wrapper.is_file() {
                return wrapper;
            }
        }
        PathBuf::from(DEFAULT_EXECUTABLE)
    }

    fn build_command(&self, program: &Path, args: &[String], workdir: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(workdir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout can take down the whole tree
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        cmd
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildTool for ProcessRunner {
    async fn invoke(&self, invocation: &Invocation) -> HarnessResult<RunResult> {
        invocation.validate()?;

        let program = self.resolve_executable(&invocation.workdir);
        let mut flags = invocation.flags.clone();
        flags.extend(self.extra_flags.iter().cloned());
        let args: Vec<String> = invocation.tasks.iter().chain(&flags).cloned().collect();
        let command = format!("{} {}", program.display(), args.join(" "));

        debug!("Executing in {}: {}", invocation.workdir.display(), command);

        let started = Instant::now();
        let mut child = self
            .build_command(&program, &args, &invocation.workdir)
            .spawn()
            .map_err(|e| HarnessError::launch(program.display().to_string(), e))?;

        let mut group = GroupGuard::new(&child);
        let mut captured = Captured::default();
        let limit = invocation.timeout.or(self.default_timeout);

        let status = match limit {
            Some(limit) => {
                let driven = tokio::time::timeout(
                    limit,
                    drive(&mut child, &mut captured, self.listener.as_ref()),
                )
                .await;
                match driven {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("{} exceeded {:?}, terminating", command, limit);
                        terminate(&mut child).await;
                        group.disarm();
                        captured.flush_pending(self.listener.as_ref());
                        return Err(HarnessError::Timeout {
                            command,
                            timeout: limit,
                            output: super::output_tail(
                                &captured.merged_text(),
                                super::OUTPUT_TAIL_LINES,
                            ),
                        });
                    }
                }
            }
            None => drive(&mut child, &mut captured, self.listener.as_ref()).await?,
        };
        group.disarm();

        let duration = started.elapsed();
        info!(
            "{} finished in {:.1}s with {:?}",
            command,
            duration.as_secs_f64(),
            status.code()
        );

        Ok(RunResult {
            command,
            tasks: invocation.tasks.clone(),
            flags,
            exit_code: status.code(),
            output: captured.merged_text(),
            stdout: String::from_utf8_lossy(&captured.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&captured.stderr).into_owned(),
            duration,
        })
    }

    fn describe(&self, workdir: &Path) -> String {
        self.resolve_executable(workdir).display().to_string()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Raw bytes captured from the child, kept outside the reading future so a
/// timeout still leaves the partial transcript available. Bytes of a line
/// that has not seen its newline yet wait in the pending buffers.
#[derive(Debug, Default)]
struct Captured {
    merged: Vec<u8>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    stdout_pending: Vec<u8>,
    stderr_pending: Vec<u8>,
}

impl Captured {
    fn push(&mut self, stream: Stream, chunk: &[u8], listener: Option<&OutputListener>) {
        self.merged.extend_from_slice(chunk);
        match stream {
            Stream::Stdout => self.stdout.extend_from_slice(chunk),
            Stream::Stderr => self.stderr.extend_from_slice(chunk),
        }
        if let Some(listener) = listener {
            let line = String::from_utf8_lossy(chunk);
            listener(line.trim_end_matches(['\r', '\n']));
        }
    }

    fn pending_mut(&mut self, stream: Stream) -> &mut Vec<u8> {
        match stream {
            Stream::Stdout => &mut self.stdout_pending,
            Stream::Stderr => &mut self.stderr_pending,
        }
    }

    /// Handle one `read_until` completion. Bytes from an interrupted read
    /// stay pending, so a partial final line is flushed at EOF rather than
    /// lost. Returns whether the stream reached EOF.
    fn on_read(
        &mut self,
        read: std::io::Result<usize>,
        stream: Stream,
        listener: Option<&OutputListener>,
    ) -> HarnessResult<bool> {
        let n = read.map_err(|e| HarnessError::io(format!("reading build tool {:?}", stream), e))?;
        let eof = n == 0;
        let pending = self.pending_mut(stream);
        if !pending.is_empty() && (eof || pending.ends_with(b"\n")) {
            let line = std::mem::take(pending);
            self.push(stream, &line, listener);
        }
        Ok(eof)
    }

    /// Move unterminated lines into the transcript
    fn flush_pending(&mut self, listener: Option<&OutputListener>) {
        for stream in [Stream::Stdout, Stream::Stderr] {
            let line = std::mem::take(self.pending_mut(stream));
            if !line.is_empty() {
                self.push(stream, &line, listener);
            }
        }
    }

    fn merged_text(&self) -> String {
        String::from_utf8_lossy(&self.merged).into_owned()
    }
}

/// Read both pipes to EOF, then reap the child.
async fn drive(
    child: &mut Child,
    captured: &mut Captured,
    listener: Option<&OutputListener>,
) -> HarnessResult<ExitStatus> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HarnessError::Internal("stdout was not piped".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HarnessError::Internal("stderr was not piped".to_string()))?;

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            read = stdout_reader.read_until(b'\n', &mut captured.stdout_pending), if !stdout_done => {
                stdout_done = captured.on_read(read, Stream::Stdout, listener)?;
            }
            read = stderr_reader.read_until(b'\n', &mut captured.stderr_pending), if !stderr_done => {
                stderr_done = captured.on_read(read, Stream::Stderr, listener)?;
            }
        }
    }

    child
        .wait()
        .await
        .map_err(|e| HarnessError::io("waiting for build tool", e))
}

/// Kills the child's process group when an invocation is dropped before
/// the child was reaped. `kill_on_drop` alone only reaches the direct child.
struct GroupGuard {
    pgid: Option<u32>,
}

impl GroupGuard {
    fn new(child: &Child) -> Self {
        Self { pgid: child.id() }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            debug!("invocation dropped, killing process group {}", pgid);
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    // SAFETY: signals the process group created at spawn; no memory is shared.
    unsafe {
        libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_group(pid);
    }
    if let Err(e) = child.kill().await {
        debug!("kill after timeout: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn sh() -> ProcessRunner {
        ProcessRunner::new().with_executable("/bin/sh")
    }

    #[test]
    fn resolves_wrapper_when_present() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        assert_eq!(runner.resolve_executable(temp.path()), PathBuf::from("gradle"));

        std::fs::write(temp.path().join(WRAPPER), "#!/bin/sh\n").unwrap();
        assert_eq!(
            runner.resolve_executable(temp.path()),
            temp.path().join(WRAPPER)
        );
    }

    #[test]
    fn explicit_executable_wins_over_wrapper() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(WRAPPER), "#!/bin/sh\n").unwrap();
        let runner = ProcessRunner::new().with_executable("/usr/bin/gradle");
        assert_eq!(
            runner.resolve_executable(temp.path()),
            PathBuf::from("/usr/bin/gradle")
        );
    }

    #[tokio::test]
    async fn empty_tasks_never_spawn() {
        let runner = ProcessRunner::new().with_executable("/definitely/not/here");
        let err = runner
            .invoke(&Invocation::new("."))
            .await
            .unwrap_err();
        // a spawn attempt would have produced a launch error instead
        assert!(matches!(err, HarnessError::Precondition(_)));
    }

    #[tokio::test]
    async fn missing_executable_is_launch_failure() {
        let temp = TempDir::new().unwrap();
        let runner = ProcessRunner::new().with_executable(temp.path().join("no-such-tool"));
        let err = runner
            .invoke(&Invocation::new(temp.path()).task("check"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
        assert!(err.hint().is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_both_streams_and_exit_code() {
        let temp = TempDir::new().unwrap();
        let result = sh()
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("echo out; echo err 1>&2; printf tail; exit 3"),
            )
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
        assert_eq!(result.stdout, "out\ntail");
        assert_eq!(result.stderr, "err\n");
        assert!(result.contains("out"));
        assert!(result.contains("err"));
        assert!(result.contains("tail"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn large_output_is_not_truncated() {
        let temp = TempDir::new().unwrap();
        let result = sh()
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done; echo done 1>&2"),
            )
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.lines().count(), 20000);
        assert!(result.contains("line-19999"));
        assert!(result.contains("done"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_workdir_with_env() {
        let temp = TempDir::new().unwrap();
        let result = sh()
            .with_env("CACHECHECK_PROBE", "probe-value")
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("pwd; echo $CACHECHECK_PROBE"),
            )
            .await
            .unwrap();

        let canonical = temp.path().canonicalize().unwrap();
        assert!(result.contains(&canonical.display().to_string()));
        assert!(result.contains("probe-value"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_terminates_child() {
        let temp = TempDir::new().unwrap();
        let started = Instant::now();
        let err = sh()
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("echo starting; sleep 30")
                    .timeout(Some(Duration::from_millis(300))),
            )
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            HarnessError::Timeout { output, .. } => assert!(output.contains("starting")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_keeps_unterminated_last_line() {
        let temp = TempDir::new().unwrap();
        let err = sh()
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("echo starting; printf 'Calculating task graph'; sleep 30")
                    .timeout(Some(Duration::from_millis(500))),
            )
            .await
            .unwrap_err();

        match err {
            HarnessError::Timeout { output, .. } => {
                assert!(output.contains("starting"));
                assert!(output.contains("Calculating task graph"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[cfg(unix)]
    fn read_pid(path: &Path) -> Option<i32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    /// Alive and not a zombie waiting to be reaped
    #[cfg(unix)]
    fn is_running(pid: i32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => unsafe { libc::kill(pid, 0) == 0 },
        }
    }

    #[cfg(unix)]
    async fn wait_until_gone(pid: i32) -> bool {
        for _ in 0..50 {
            if !is_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_invocation_kills_process_tree() {
        let temp = TempDir::new().unwrap();
        let shell_pid = temp.path().join("shell.pid");
        let child_pid = temp.path().join("child.pid");
        let script = format!(
            "echo $$ > {}; sleep 30 & echo $! > {}; wait",
            shell_pid.display(),
            child_pid.display()
        );

        let runner = sh();
        let invocation = Invocation::new(temp.path()).task("-c").task(script);
        let outer = tokio::time::timeout(Duration::from_millis(500), runner.invoke(&invocation)).await;
        assert!(outer.is_err(), "invocation should still have been running");

        let shell = read_pid(&shell_pid).expect("shell pid written");
        let grandchild = read_pid(&child_pid).expect("background pid written");
        assert!(wait_until_gone(shell).await, "shell {shell} survived the drop");
        assert!(
            wait_until_gone(grandchild).await,
            "background process {grandchild} survived the drop"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runner_default_timeout_applies() {
        let temp = TempDir::new().unwrap();
        let err = sh()
            .with_default_timeout(Some(Duration::from_millis(300)))
            .invoke(&Invocation::new(temp.path()).task("-c").task("sleep 30"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn no_timeout_by_default() {
        let temp = TempDir::new().unwrap();
        let result = sh()
            .invoke(&Invocation::new(temp.path()).task("-c").task("sleep 1; echo ok"))
            .await
            .unwrap();
        assert!(result.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn listener_sees_every_line() {
        let temp = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = sh().with_listener(Arc::new(move |line: &str| {
            sink.lock().unwrap().push(line.to_string());
        }));

        runner
            .invoke(&Invocation::new(temp.path()).task("-c").task("echo a; echo b"))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn extra_flags_follow_invocation_flags() {
        let temp = TempDir::new().unwrap();
        let config = RunnerConfig {
            executable: Some(PathBuf::from("/bin/sh")),
            extra_flags: vec!["extra".to_string()],
            ..RunnerConfig::default()
        };
        let result = ProcessRunner::from_config(&config)
            .invoke(
                &Invocation::new(temp.path())
                    .task("-c")
                    .task("echo \"$0 $1\"")
                    .flag("first"),
            )
            .await
            .unwrap();

        assert_eq!(result.flags, vec!["first", "extra"]);
        assert!(result.contains("first extra"));
    }
}
