use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::StageError;

pub const NORMALIZE_TIMEOUT: Duration = Duration::from_secs(2 * 60);
pub const ORG_SCORE_TIMEOUT: Duration = Duration::from_secs(2 * 60);
pub const JOB_MATCH_TIMEOUT: Duration = Duration::from_secs(3 * 60);

const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Flags whose value never reaches the logs.
const SECRET_FLAGS: [&str; 1] = ["--db-password"];

/// One external scoring step.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub name: &'static str,
    pub script: PathBuf,
    pub timeout: Duration,
    /// Appended after `--input <in> --output <out>`.
    pub extra_args: Vec<String>,
}

impl StageSpec {
    pub fn new(name: &'static str, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            name,
            script: script.into(),
            timeout,
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// `extra_args` as they appear in the logs, secrets masked.
    pub fn display_args(&self) -> String {
        let mut shown = Vec::with_capacity(self.extra_args.len());
        let mut mask_next = false;
        for arg in &self.extra_args {
            shown.push(if mask_next { "****" } else { arg.as_str() });
            mask_next = SECRET_FLAGS.contains(&arg.as_str());
        }
        shown.join(" ")
    }
}

/// Launches stages as `<executable> <script> --input <in> --output <out> [extra..]`
/// from a fixed working directory.
#[derive(Debug, Clone)]
pub struct StageRunner {
    executable: PathBuf,
    working_dir: PathBuf,
}

impl StageRunner {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Runs one stage to completion. Succeeds only on exit status 0 within the
    /// stage's timeout; a stage that overruns is killed.
    pub async fn run(&self, stage: &StageSpec, input: &Path, output: &Path) -> Result<(), StageError> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(&stage.script)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .args(&stage.extra_args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            "Executing stage '{}': {} {} --input {} --output {} {}",
            stage.name,
            self.executable.display(),
            stage.script.display(),
            input.display(),
            output.display(),
            stage.display_args()
        );

        let mut child = cmd.spawn().map_err(|source| StageError::Spawn {
            stage: stage.name,
            source,
        })?;
        let stdout = child.stdout.take().map(|out| tokio::spawn(read_all(out)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(read_all(err)));

        let status = match tokio::time::timeout(stage.timeout, child.wait()).await {
            Ok(res) => Some(res.map_err(|source| StageError::Io {
                stage: stage.name,
                source,
            })?),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Could not kill stage '{}': {e}", stage.name);
                }
                None
            }
        };

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            debug!("[{}] {}", stage.name, line);
        }

        match status {
            None => {
                error!(
                    "Stage '{}' timed out after {:?} and was killed. stderr: {}",
                    stage.name, stage.timeout, stderr
                );
                Err(StageError::Timeout {
                    stage: stage.name,
                    after: stage.timeout,
                })
            }
            Some(status) if status.success() => {
                if !stderr.is_empty() {
                    debug!("[{}] stderr: {}", stage.name, stderr);
                }
                info!("Stage '{}' completed", stage.name);
                Ok(())
            }
            Some(status) => {
                warn!(
                    "Stage '{}' failed with {:?}: {}",
                    stage.name,
                    status.code(),
                    stderr
                );
                Err(StageError::Exit {
                    stage: stage.name,
                    code: status.code(),
                    stderr,
                })
            }
        }
    }
}

async fn read_all(mut pipe: impl AsyncRead + Unpin) -> String {
    let mut buf = Vec::new();
    // partial output is still worth logging
    let _ = pipe.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).trim().to_string()
}

/// Output of a reader task. A killed stage may leave grandchildren holding
/// the pipe open, so the wait is bounded.
async fn collect(reader: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = reader else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_GRACE, &mut handle).await {
        Ok(Ok(out)) => out,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn runner(dir: &Path) -> StageRunner {
        StageRunner::new("sh", dir)
    }

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_stage_receives_input_and_output_flags() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "copy.sh", "cp \"$2\" \"$4\"\n");
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "payload").unwrap();

        let spec = StageSpec::new("copy", s, Duration::from_secs(10));
        runner(dir.path()).run(&spec, &input, &output).await.unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_extra_args_follow_output() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "args.sh", "echo \"$5 $6\" > \"$4\"\n");
        let output = dir.path().join("out.txt");

        let spec = StageSpec::new("args", s, Duration::from_secs(10))
            .with_args(["--db-host".to_string(), "db.internal".to_string()]);
        runner(dir.path())
            .run(&spec, &dir.path().join("in"), &output)
            .await
            .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap().trim(), "--db-host db.internal");
    }

    #[test]
    fn test_display_args_masks_password() {
        let spec = StageSpec::new("job_match", "m.py", Duration::from_secs(1)).with_args(
            ["--db-user", "scorer", "--db-password", "hunter2", "--db-name", "cv"]
                .map(String::from),
        );
        let shown = spec.display_args();
        assert_eq!(shown, "--db-user scorer --db-password **** --db-name cv");
        assert!(!shown.contains("hunter2"));
        assert_eq!(StageSpec::new("n", "n.py", Duration::from_secs(1)).display_args(), "");
    }

    #[tokio::test]
    async fn test_stderr_chatter_does_not_fail_stage() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "noisy.sh", "echo 'loading model' >&2\ntouch \"$4\"\n");

        let spec = StageSpec::new("noisy", s, Duration::from_secs(10));
        let output = dir.path().join("out");
        runner(dir.path())
            .run(&spec, &dir.path().join("in"), &output)
            .await
            .unwrap();
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_captures_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "fail.sh", "echo 'bad input' >&2\nexit 3\n");

        let spec = StageSpec::new("fail", s, Duration::from_secs(10));
        let err = runner(dir.path())
            .run(&spec, &dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();

        match err {
            StageError::Exit { code, stderr, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "bad input");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_overrunning_stage_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let s = script(dir.path(), "slow.sh", "exec sleep 5\n");

        let spec = StageSpec::new("slow", s, Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = runner(dir.path())
            .run(&spec, &dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();

        assert!(matches!(err, StageError::Timeout { stage: "slow", .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_executable_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = StageRunner::new(dir.path().join("no-such-interpreter"), dir.path());
        let spec = StageSpec::new("ghost", "x.py", Duration::from_secs(1));

        let err = runner
            .run(&spec, &dir.path().join("in"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::Spawn { .. }));
    }
}
