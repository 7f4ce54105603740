//! Bounded invocation of the external rendering engine.
//!
//! The engine is an opaque binary invoked as `<binary> <input> -o <output>`.
//! Standard error is captured for diagnostics; standard output is never
//! consumed for data. A hard wall-clock timeout applies to every
//! invocation, and an expired child is killed and reaped before the call
//! returns so no writer outlives the request's scratch files.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use bytes::Bytes;
use thiserror::Error;
use tokio::{io::AsyncReadExt, process::Command, time::timeout};
use tracing::{debug, info, warn};

const OUTPUT_FLAG: &str = "-o";
const PROBE_FLAG: &str = "--version";

/// Read-only invocation parameters, fixed at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub binary_path: PathBuf,
    pub timeout: Duration,
    pub probe_timeout: Duration,
}

/// Result of one engine invocation. Exactly one variant is populated.
#[derive(Debug)]
pub enum RenderOutcome {
    Artifact { bytes: Bytes, size: u64 },
    Failed(RenderFailure),
}

#[derive(Debug, Error)]
pub enum RenderFailure {
    #[error("rendering engine could not be started: {0}")]
    Spawn(io::Error),
    #[error("rendering engine failed (exit {exit_code:?}): {stderr}")]
    EngineExit {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("rendering engine produced no output")]
    EmptyOutput,
    #[error("rendering engine exceeded the {}s time limit", limit.as_secs())]
    Timeout { limit: Duration },
    #[error("i/o failure during engine invocation: {0}")]
    Io(io::Error),
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("rendering engine could not be started: {0}")]
    Spawn(io::Error),
    #[error("engine probe exceeded the {}s time limit", limit.as_secs())]
    Timeout { limit: Duration },
    #[error("i/o failure during engine probe: {0}")]
    Io(io::Error),
}

#[derive(Debug, Clone)]
pub struct PdfEngine {
    config: EngineConfig,
}

impl PdfEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn binary_path(&self) -> &Path {
        &self.config.binary_path
    }

    /// Render `input` into `output`, enforcing the configured wall-clock
    /// timeout. Every failure is classified into a [`RenderFailure`];
    /// nothing is retried; the engine is stateless per invocation and
    /// retries belong to the caller.
    pub async fn render(&self, input: &Path, output: &Path) -> RenderOutcome {
        let started = Instant::now();
        let limit = self.config.timeout;

        let mut command = Command::new(&self.config.binary_path);
        command
            .arg(input)
            .arg(OUTPUT_FLAG)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            target = "application::convert::engine",
            op = "engine::render",
            binary = %self.config.binary_path.display(),
            input = %input.display(),
            output = %output.display(),
            timeout_s = limit.as_secs(),
            "Invoking rendering engine"
        );

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(
                    target = "application::convert::engine",
                    op = "engine::render",
                    result = "error",
                    error_code = "spawn",
                    binary = %self.config.binary_path.display(),
                    error = %err,
                    "Failed to spawn rendering engine"
                );
                return RenderOutcome::Failed(classify_spawn(err));
            }
        };

        // Drain stderr concurrently with the wait so a chatty engine can
        // never deadlock on a full pipe.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(err)) => {
                stderr_task.abort();
                return RenderOutcome::Failed(RenderFailure::Io(err));
            }
            Err(_elapsed) => {
                // Kill and reap before returning: the workspace is about
                // to be released and must not have a lingering writer.
                if let Err(err) = child.kill().await {
                    warn!(
                        target = "application::convert::engine",
                        op = "engine::render",
                        error = %err,
                        "Failed to kill timed-out engine process"
                    );
                }
                stderr_task.abort();
                metrics::counter!("stampa_engine_kill_total").increment(1);
                warn!(
                    target = "application::convert::engine",
                    op = "engine::render",
                    result = "error",
                    error_code = "timeout",
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    timeout_s = limit.as_secs(),
                    "Rendering engine exceeded the time limit"
                );
                return RenderOutcome::Failed(RenderFailure::Timeout { limit });
            }
        };

        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

        if !status.success() {
            let exit_code = status.code();
            warn!(
                target = "application::convert::engine",
                op = "engine::render",
                result = "error",
                error_code = "engine_exit",
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                elapsed_ms = started.elapsed().as_millis() as u64,
                stderr = %stderr,
                "Rendering engine invocation failed"
            );
            return RenderOutcome::Failed(RenderFailure::EngineExit { exit_code, stderr });
        }

        let bytes = match tokio::fs::read(output).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return RenderOutcome::Failed(RenderFailure::EmptyOutput);
            }
            Err(err) => return RenderOutcome::Failed(RenderFailure::Io(err)),
        };
        if bytes.is_empty() {
            warn!(
                target = "application::convert::engine",
                op = "engine::render",
                result = "error",
                error_code = "empty_output",
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Rendering engine exited cleanly but wrote no artifact"
            );
            return RenderOutcome::Failed(RenderFailure::EmptyOutput);
        }

        let size = bytes.len() as u64;
        info!(
            target = "application::convert::engine",
            op = "engine::render",
            result = "ok",
            elapsed_ms = started.elapsed().as_millis() as u64,
            artifact_bytes = size,
            "Rendering engine produced artifact"
        );
        RenderOutcome::Artifact {
            bytes: Bytes::from(bytes),
            size,
        }
    }

    /// Lightweight liveness probe: run the engine with its version flag
    /// under the probe timeout.
    ///
    /// A probe that runs to completion reports whether the exit status was
    /// successful; a probe that cannot run at all (spawn failure, timeout)
    /// is an error, which the HTTP layer reports as an unhealthy service.
    pub async fn probe(&self) -> Result<bool, ProbeError> {
        let limit = self.config.probe_timeout;

        let mut child = Command::new(&self.config.binary_path)
            .arg(PROBE_FLAG)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => ProbeError::Spawn(err),
                _ => ProbeError::Io(err),
            })?;

        match timeout(limit, child.wait()).await {
            Ok(Ok(status)) => Ok(status.success()),
            Ok(Err(err)) => Err(ProbeError::Io(err)),
            Err(_elapsed) => {
                let _ = child.kill().await;
                Err(ProbeError::Timeout { limit })
            }
        }
    }
}

fn classify_spawn(err: io::Error) -> RenderFailure {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied => RenderFailure::Spawn(err),
        _ => RenderFailure::Io(err),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    fn engine(binary: PathBuf, timeout: Duration) -> PdfEngine {
        PdfEngine::new(EngineConfig {
            binary_path: binary,
            timeout,
            probe_timeout: Duration::from_millis(500),
        })
    }

    // $1 = input path, $2 = "-o", $3 = output path.
    const COPYING_ENGINE: &str = r#"#!/bin/sh
set -eu
if [ "$2" != "-o" ]; then
  echo "unexpected output flag: $2" >&2
  exit 9
fi
printf '%%PDF ' > "$3"
cat "$1" >> "$3"
"#;

    #[tokio::test]
    async fn render_returns_artifact_from_output_file() {
        let dir = TempDir::new().expect("temp dir");
        let binary = write_script(&dir, "fake-prince", COPYING_ENGINE);
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html>hi</html>").expect("write input");
        fs::write(&output, "").expect("write output");

        let outcome = engine(binary, Duration::from_secs(5))
            .render(&input, &output)
            .await;

        match outcome {
            RenderOutcome::Artifact { bytes, size } => {
                assert!(bytes.starts_with(b"%PDF "));
                assert_eq!(size, bytes.len() as u64);
            }
            RenderOutcome::Failed(failure) => panic!("unexpected failure: {failure}"),
        }
    }

    #[tokio::test]
    async fn render_is_deterministic_for_identical_input() {
        let dir = TempDir::new().expect("temp dir");
        let binary = write_script(&dir, "fake-prince", COPYING_ENGINE);
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html>same</html>").expect("write input");
        fs::write(&output, "").expect("write output");

        let engine = engine(binary, Duration::from_secs(5));
        let first = match engine.render(&input, &output).await {
            RenderOutcome::Artifact { bytes, .. } => bytes,
            RenderOutcome::Failed(failure) => panic!("unexpected failure: {failure}"),
        };
        let second = match engine.render(&input, &output).await {
            RenderOutcome::Artifact { bytes, .. } => bytes,
            RenderOutcome::Failed(failure) => panic!("unexpected failure: {failure}"),
        };
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn render_surfaces_engine_exit_with_stderr() {
        let dir = TempDir::new().expect("temp dir");
        let binary = write_script(
            &dir,
            "fake-prince",
            "#!/bin/sh\necho \"prince: bad stylesheet\" >&2\nexit 42\n",
        );
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html/>").expect("write input");
        fs::write(&output, "").expect("write output");

        let outcome = engine(binary, Duration::from_secs(5))
            .render(&input, &output)
            .await;

        match outcome {
            RenderOutcome::Failed(RenderFailure::EngineExit { exit_code, stderr }) => {
                assert_eq!(exit_code, Some(42));
                assert!(stderr.contains("bad stylesheet"), "stderr: {stderr}");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn render_detects_missing_artifact() {
        let dir = TempDir::new().expect("temp dir");
        let binary = write_script(&dir, "fake-prince", "#!/bin/sh\nexit 0\n");
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html/>").expect("write input");
        fs::write(&output, "").expect("write output");

        let outcome = engine(binary, Duration::from_secs(5))
            .render(&input, &output)
            .await;

        assert!(matches!(
            outcome,
            RenderOutcome::Failed(RenderFailure::EmptyOutput)
        ));
    }

    #[tokio::test]
    async fn render_kills_engine_on_timeout() {
        let dir = TempDir::new().expect("temp dir");
        let binary = write_script(&dir, "fake-prince", "#!/bin/sh\nsleep 30\n");
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html/>").expect("write input");
        fs::write(&output, "").expect("write output");

        let started = Instant::now();
        let outcome = engine(binary, Duration::from_millis(200))
            .render(&input, &output)
            .await;

        assert!(matches!(
            outcome,
            RenderOutcome::Failed(RenderFailure::Timeout { .. })
        ));
        // The call must return as soon as the limit fires, not after the
        // child would have finished on its own.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn render_classifies_missing_binary_as_spawn_failure() {
        let dir = TempDir::new().expect("temp dir");
        let input = dir.path().join("doc.html");
        let output = dir.path().join("doc.pdf");
        fs::write(&input, "<html/>").expect("write input");
        fs::write(&output, "").expect("write output");

        let outcome = engine(dir.path().join("no-such-engine"), Duration::from_secs(5))
            .render(&input, &output)
            .await;

        assert!(matches!(
            outcome,
            RenderOutcome::Failed(RenderFailure::Spawn(_))
        ));
    }

    #[tokio::test]
    async fn probe_reports_engine_availability() {
        let dir = TempDir::new().expect("temp dir");
        let good = write_script(&dir, "good-prince", "#!/bin/sh\nexit 0\n");
        let bad = write_script(&dir, "bad-prince", "#!/bin/sh\nexit 1\n");

        assert!(engine(good, Duration::from_secs(5)).probe().await.unwrap());
        assert!(!engine(bad, Duration::from_secs(5)).probe().await.unwrap());
    }

    #[tokio::test]
    async fn probe_errors_when_binary_is_missing() {
        let dir = TempDir::new().expect("temp dir");
        let result = engine(dir.path().join("no-such-engine"), Duration::from_secs(5))
            .probe()
            .await;
        assert!(matches!(result, Err(ProbeError::Spawn(_))));
    }

    #[tokio::test]
    async fn probe_times_out_against_a_hung_engine() {
        let dir = TempDir::new().expect("temp dir");
        let hung = write_script(&dir, "hung-prince", "#!/bin/sh\nsleep 30\n");

        let result = engine(hung, Duration::from_secs(5)).probe().await;
        assert!(matches!(result, Err(ProbeError::Timeout { .. })));
    }
}
