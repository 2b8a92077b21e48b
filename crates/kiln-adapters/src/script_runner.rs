//! Process-based lifecycle script runner.
//!
//! Each script runs as its own child process. The hook payload goes to its
//! stdin as one JSON document; stdout and stderr are captured. A script that
//! outlives its timeout is killed.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use kiln_core::{
    application::{
        ExitInfo,
        ports::{ScriptInvocation, ScriptOutcome, ScriptRunner},
    },
    error::{Context, KilnResult},
};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// How long pipes are drained after the script itself has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Runs scripts with `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessScriptRunner;

impl ProcessScriptRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptRunner for ProcessScriptRunner {
    fn run(&self, invocation: &ScriptInvocation) -> KilnResult<ScriptOutcome> {
        let payload = serde_json::to_vec(&invocation.payload)
            .context("Failed to serialize hook payload")?;

        let mut child = Command::new(&invocation.script)
            .args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(format!("Failed to start {}", invocation.script.display()))?;

        // Scripts may ignore stdin and exit early; a broken pipe is fine.
        if let Some(mut pipe) = child.stdin.take() {
            thread::spawn(move || {
                let _ = pipe.write_all(&payload);
            });
        }
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + invocation.timeout;
        let status = wait_until(&mut child, deadline, &invocation.script)?;

        let (exit, stdout, stderr) = match status {
            // Background processes started by the script may keep the pipes
            // open; their output is not waited for.
            Some(status) => {
                let drain_until = Instant::now() + OUTPUT_GRACE;
                (
                    exit_info(status),
                    collect(stdout, drain_until),
                    collect(stderr, drain_until),
                )
            }
            None => {
                warn!(
                    script = %invocation.script.display(),
                    timeout = ?invocation.timeout,
                    "Script timed out; killed it"
                );
                (
                    ExitInfo::TimedOut {
                        after: invocation.timeout,
                    },
                    String::new(),
                    String::new(),
                )
            }
        };
        debug!(script = %invocation.script.display(), %exit, "Script finished");

        Ok(ScriptOutcome {
            exit,
            stdout,
            stderr,
        })
    }
}

/// `None` when the deadline passed and the child was killed.
fn wait_until(
    child: &mut Child,
    deadline: Instant,
    script: &Path,
) -> KilnResult<Option<ExitStatus>> {
    loop {
        if let Some(status) = child
            .try_wait()
            .context(format!("Failed to wait for {}", script.display()))?
        {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output of a reader, or empty if the pipe is still open at `until`.
fn collect(reader: Option<Receiver<String>>, until: Instant) -> String {
    reader
        .and_then(|rx| rx.recv_timeout(until.saturating_duration_since(Instant::now())).ok())
        .unwrap_or_default()
}

fn exit_info(status: ExitStatus) -> ExitInfo {
    match status.code() {
        Some(code) => ExitInfo::Code(code),
        None => ExitInfo::Signal,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::BTreeMap;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use kiln_core::application::ports::{HookPackage, HookPayload, HookProject};
    use kiln_core::domain::Phase;
    use tempfile::TempDir;

    use super::*;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn invocation(script: PathBuf, dir: &Path, timeout: Duration) -> ScriptInvocation {
        let payload = HookPayload {
            version: 1,
            phase: Phase::Pre,
            project: HookProject {
                name: "demo".into(),
                path: dir.join("demo"),
            },
            package: HookPackage {
                label: "py".into(),
                name: "Python".into(),
            },
            variables: BTreeMap::new(),
        };
        ScriptInvocation {
            script,
            args: vec![dir.join("demo").display().to_string()],
            env: payload.env(),
            working_dir: dir.to_path_buf(),
            timeout,
            payload,
        }
    }

    #[test]
    fn captures_output_and_status() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "ok.sh", "echo \"$KILN_PHASE $KILN_PACKAGE_LABEL\"; exit 3");

        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_secs(5)))
            .unwrap();

        assert_eq!(outcome.exit, ExitInfo::Code(3));
        assert_eq!(outcome.stdout.trim(), "pre py");
    }

    #[test]
    fn payload_arrives_on_stdin() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "cat.sh", "cat");

        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_secs(5)))
            .unwrap();

        let json: serde_json::Value = serde_json::from_str(&outcome.stdout).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["phase"], "pre");
        assert_eq!(json["package"]["label"], "py");
        assert_eq!(json["project"]["name"], "demo");
    }

    #[test]
    fn runs_in_working_dir_with_project_argument() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "where.sh", "pwd; echo \"$1\"");

        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_secs(5)))
            .unwrap();

        let lines: Vec<_> = outcome.stdout.lines().collect();
        let cwd = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(std::fs::canonicalize(lines[0]).unwrap(), cwd);
        assert!(lines[1].ends_with("demo"));
    }

    #[test]
    fn slow_script_is_killed() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "slow.sh", "exec sleep 5");

        let started = Instant::now();
        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_millis(200)))
            .unwrap();

        assert!(matches!(outcome.exit, ExitInfo::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn background_children_do_not_hold_the_runner() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "bg.sh", "echo started\nsleep 6 &\nexit 0");

        let started = Instant::now();
        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_millis(500)))
            .unwrap();

        assert_eq!(outcome.exit, ExitInfo::Code(0));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn timeout_keeps_sub_second_precision() {
        let dir = TempDir::new().unwrap();
        let path = script(dir.path(), "slow.sh", "exec sleep 5");

        let outcome = ProcessScriptRunner
            .run(&invocation(path, dir.path(), Duration::from_millis(200)))
            .unwrap();

        assert_eq!(
            outcome.exit,
            ExitInfo::TimedOut {
                after: Duration::from_millis(200)
            }
        );
        assert_eq!(outcome.exit.to_string(), "timed out after 200ms");
    }

    #[test]
    fn missing_script_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = ProcessScriptRunner.run(&invocation(
            dir.path().join("nope.sh"),
            dir.path(),
            Duration::from_secs(1),
        ));
        assert!(result.is_err());
    }
}
