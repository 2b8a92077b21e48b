//! Runs one phase of lifecycle scripts, one after another.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        ApplicationError,
        error::ExitInfo,
        ports::{HookPayload, ScriptInvocation, ScriptRunner},
    },
    domain::Plugin,
};

pub const DEFAULT_PLUGIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PluginScheduler {
    runner: Arc<dyn ScriptRunner>,
    plugin_root: PathBuf,
    timeout: Duration,
}

impl PluginScheduler {
    pub fn new(runner: Arc<dyn ScriptRunner>, plugin_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            plugin_root: plugin_root.into(),
            timeout: DEFAULT_PLUGIN_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `plugins` in order for `payload.phase`.
    ///
    /// Stops at the first script that does not exit with status 0; later
    /// scripts of the phase never start. Returns how many scripts ran.
    #[instrument(skip_all, fields(phase = %payload.phase, plugins = plugins.len()))]
    pub fn run_phase(
        &self,
        plugins: &[Plugin],
        payload: &HookPayload,
        working_dir: &Path,
    ) -> Result<usize, ApplicationError> {
        let phase = payload.phase;

        for (order, plugin) in plugins.iter().enumerate() {
            let script = plugin.resolve(&self.plugin_root);
            let invocation = ScriptInvocation {
                script: script.clone(),
                args: vec![payload.project.path.display().to_string()],
                env: payload.env(),
                working_dir: working_dir.to_path_buf(),
                timeout: self.timeout,
                payload: payload.clone(),
            };

            debug!(order, script = %script.display(), "Running plugin");

            let exit = match self.runner.run(&invocation) {
                Ok(outcome) => {
                    if !outcome.stdout.trim().is_empty() {
                        debug!(script = %script.display(), stdout = %outcome.stdout.trim_end());
                    }
                    if outcome.success() {
                        continue;
                    }
                    if !outcome.stderr.trim().is_empty() {
                        warn!(script = %script.display(), stderr = %outcome.stderr.trim_end());
                    }
                    outcome.exit
                }
                Err(e) => ExitInfo::SpawnFailed(e.to_string()),
            };

            warn!(order, script = %script.display(), %exit, "Plugin failed");
            return Err(ApplicationError::PluginFailed {
                phase,
                script,
                exit,
            });
        }

        if !plugins.is_empty() {
            info!(count = plugins.len(), "Phase complete");
        }
        Ok(plugins.len())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use mockall::Sequence;

    use super::*;
    use crate::application::ports::{MockScriptRunner, ScriptOutcome};
    use crate::domain::{Package, Phase, RenderContext};
    use crate::error::KilnError;

    fn payload(phase: Phase) -> HookPayload {
        let package = Package::builder().label("py").name("Python").build().unwrap();
        HookPayload::new(
            phase,
            "demo",
            Path::new("/w/demo"),
            &package,
            &RenderContext::empty(),
        )
    }

    fn exited(code: i32) -> ScriptOutcome {
        ScriptOutcome {
            exit: ExitInfo::Code(code),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    #[test]
    fn runs_scripts_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut runner = MockScriptRunner::new();
        let log = seen.clone();
        runner.expect_run().times(3).returning(move |inv| {
            log.lock().unwrap().push(inv.script.clone());
            Ok(exited(0))
        });

        let scheduler = PluginScheduler::new(Arc::new(runner), "/plugins");
        let plugins = [Plugin::new("a.sh"), Plugin::new("b.sh"), Plugin::new("/abs/c.sh")];

        let ran = scheduler
            .run_phase(&plugins, &payload(Phase::Pre), Path::new("/w"))
            .unwrap();

        assert_eq!(ran, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                PathBuf::from("/plugins/a.sh"),
                PathBuf::from("/plugins/b.sh"),
                PathBuf::from("/abs/c.sh"),
            ]
        );
    }

    #[test]
    fn failure_stops_the_phase() {
        let mut seq = Sequence::new();
        let mut runner = MockScriptRunner::new();
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(exited(0)));
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(exited(2)));
        // A third call would fail the mock's expectations.

        let scheduler = PluginScheduler::new(Arc::new(runner), "/plugins");
        let plugins = [Plugin::new("a.sh"), Plugin::new("b.sh"), Plugin::new("c.sh")];

        let err = scheduler
            .run_phase(&plugins, &payload(Phase::Post), Path::new("/w/demo"))
            .unwrap_err();

        match err {
            ApplicationError::PluginFailed {
                phase,
                script,
                exit,
            } => {
                assert_eq!(phase, Phase::Post);
                assert_eq!(script, PathBuf::from("/plugins/b.sh"));
                assert_eq!(exit, ExitInfo::Code(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invocation_carries_contract() {
        let mut runner = MockScriptRunner::new();
        runner
            .expect_run()
            .withf(|inv| {
                inv.args == vec!["/w/demo".to_string()]
                    && inv.working_dir == Path::new("/w")
                    && inv.timeout == Duration::from_secs(5)
                    && inv
                        .env
                        .contains(&("KILN_PHASE".to_string(), "pre".to_string()))
                    && inv.payload.version == 1
            })
            .returning(|_| Ok(exited(0)));

        let scheduler =
            PluginScheduler::new(Arc::new(runner), "/plugins").with_timeout(Duration::from_secs(5));
        scheduler
            .run_phase(&[Plugin::new("a.sh")], &payload(Phase::Pre), Path::new("/w"))
            .unwrap();
    }

    #[test]
    fn spawn_errors_become_plugin_failures() {
        let mut runner = MockScriptRunner::new();
        runner.expect_run().returning(|_| {
            Err(KilnError::Internal {
                message: "no such file".into(),
            })
        });

        let scheduler = PluginScheduler::new(Arc::new(runner), "/plugins");
        let err = scheduler
            .run_phase(&[Plugin::new("gone.sh")], &payload(Phase::Pre), Path::new("/w"))
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::PluginFailed {
                exit: ExitInfo::SpawnFailed(_),
                ..
            }
        ));
    }

    #[test]
    fn empty_phase_runs_nothing() {
        let runner = MockScriptRunner::new();
        let scheduler = PluginScheduler::new(Arc::new(runner), "/plugins");
        assert_eq!(
            scheduler
                .run_phase(&[], &payload(Phase::Pre), Path::new("/w"))
                .unwrap(),
            0
        );
    }
}
