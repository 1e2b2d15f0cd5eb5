//! Process supervisor for the single local nginx instance.
//!
//! The supervisor holds a mutex-guarded two-state machine. Every transition
//! runs its action while the lock is held and commits the target state only
//! when the action succeeds, so start, stop and reload never interleave.
//!
//! Start and reload always regenerate the configuration tree first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::Mutex;

use ignis_core::source::{DomainSource, IntegrationResolver};
use ignis_core::store;
use ignis_detector::SupportedFeatures;
use ignis_renderer::ConfigPaths;
use ignis_sync::Synthesizer;

use crate::error::SupervisorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Stopped,
    Running,
}

/// Signals dispatched through `nginx -s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSignal {
    Reload,
    Stop,
    Reopen,
}

impl ServerSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerSignal::Reload => "reload",
            ServerSignal::Stop => "stop",
            ServerSignal::Reopen => "reopen",
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Rewrites the configuration tree before a launch or reload.
#[async_trait]
pub trait ConfigurationGenerator: Send + Sync {
    async fn regenerate(&self) -> Result<(), SupervisorError>;
}

/// The nginx binary and the processes it manages.
#[async_trait]
pub trait ServerControl: Send + Sync {
    async fn launch(&self) -> Result<(), SupervisorError>;

    async fn signal(&self, signal: ServerSignal) -> Result<(), SupervisorError>;

    /// Whether the PID file names a live process this supervisor did not
    /// start, e.g. one left over from a previous daemon.
    fn foreign_process_alive(&self) -> bool;

    /// Best-effort cleanup after a stop.
    fn cleanup(&self) {}
}

/// [`ServerControl`] that shells out to the real binary with
/// `-e <errlog> -c <config> [-s <signal>]`.
pub struct NginxProcess {
    binary: PathBuf,
    paths: ConfigPaths,
}

impl NginxProcess {
    pub fn new(binary: impl Into<PathBuf>, paths: ConfigPaths) -> Self {
        Self {
            binary: binary.into(),
            paths,
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-e".to_string(),
            self.paths.main_log().display().to_string(),
            "-c".to_string(),
            self.paths.main_config().display().to_string(),
        ]
    }

    async fn invoke(&self, action: &'static str, extra: &[&str]) -> Result<(), SupervisorError> {
        let mut args = self.base_args();
        args.extend(extra.iter().map(|s| s.to_string()));
        tracing::debug!(binary = %self.binary.display(), ?args, "invoking nginx");

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SupervisorError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(SupervisorError::Command {
            action,
            output: combined.trim().to_string(),
        })
    }
}

#[async_trait]
impl ServerControl for NginxProcess {
    async fn launch(&self) -> Result<(), SupervisorError> {
        self.invoke("start", &[]).await
    }

    async fn signal(&self, signal: ServerSignal) -> Result<(), SupervisorError> {
        self.invoke(signal.as_str(), &["-s", signal.as_str()]).await
    }

    fn foreign_process_alive(&self) -> bool {
        read_pid(&self.paths.pid_file()).is_some_and(process_alive)
    }

    fn cleanup(&self) {
        let socket = self.paths.stats_socket();
        match std::fs::remove_file(&socket) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %socket.display(), error = %e, "failed to remove stats socket")
            }
        }
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    pid > 0 && kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    false
}

/// [`ConfigurationGenerator`] that reloads the YAML model and replaces the
/// tree through the synthesis facade on a blocking thread.
pub struct ModelGenerator {
    synthesizer: Arc<Synthesizer>,
    features: SupportedFeatures,
    model_path: PathBuf,
}

impl ModelGenerator {
    pub fn new(synthesizer: Arc<Synthesizer>, features: SupportedFeatures, model_path: PathBuf) -> Self {
        Self {
            synthesizer,
            features,
            model_path,
        }
    }
}

#[async_trait]
impl ConfigurationGenerator for ModelGenerator {
    async fn regenerate(&self) -> Result<(), SupervisorError> {
        let synthesizer = self.synthesizer.clone();
        let features = self.features.clone();
        let model_path = self.model_path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), String> {
            let snapshot = store::load_at(&model_path).map_err(|e| e.to_string())?;
            let source: &dyn DomainSource = &snapshot;
            let integrations: &dyn IntegrationResolver = &snapshot;
            synthesizer
                .replace_configuration_files(&features, source, integrations)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| SupervisorError::Generation(format!("synthesis task join error: {e}")))?
        .map_err(SupervisorError::Generation)
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor {
    control: Arc<dyn ServerControl>,
    generator: Arc<dyn ConfigurationGenerator>,
    state: Mutex<ServerState>,
}

impl Supervisor {
    pub fn new(control: Arc<dyn ServerControl>, generator: Arc<dyn ConfigurationGenerator>) -> Self {
        Self {
            control,
            generator,
            state: Mutex::new(ServerState::Stopped),
        }
    }

    /// Run `action`, then commit `target`. A failed action leaves `state`
    /// untouched.
    async fn transition<F>(
        state: &mut ServerState,
        target: ServerState,
        action: F,
    ) -> Result<(), SupervisorError>
    where
        F: std::future::Future<Output = Result<(), SupervisorError>>,
    {
        action.await?;
        if *state != target {
            tracing::info!(from = ?*state, to = ?target, "nginx state changed");
        }
        *state = target;
        Ok(())
    }

    async fn regenerate_and_signal(&self, signal: ServerSignal) -> Result<(), SupervisorError> {
        self.generator.regenerate().await?;
        self.control.signal(signal).await
    }

    /// Start nginx. A live process found through the PID file is adopted
    /// and reloaded instead of launching a second master.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        if *state == ServerState::Running {
            tracing::debug!("start requested while running");
            return Ok(());
        }
        if self.control.foreign_process_alive() {
            tracing::warn!("found a running nginx from a previous session, reloading it");
            return Self::transition(
                &mut state,
                ServerState::Running,
                self.regenerate_and_signal(ServerSignal::Reload),
            )
            .await;
        }
        Self::transition(&mut state, ServerState::Running, async {
            self.generator.regenerate().await?;
            self.control.launch().await
        })
        .await
    }

    /// Regenerate and reload. With `fail_if_not_running`, a stopped server
    /// is reported as [`SupervisorError::NotRunning`] without touching disk.
    pub async fn reload(&self, fail_if_not_running: bool) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        if fail_if_not_running && *state != ServerState::Running {
            return Err(SupervisorError::NotRunning);
        }
        Self::transition(
            &mut state,
            ServerState::Running,
            self.regenerate_and_signal(ServerSignal::Reload),
        )
        .await
    }

    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let mut state = self.state.lock().await;
        if *state == ServerState::Stopped {
            tracing::debug!("stop requested while stopped");
            return Ok(());
        }
        Self::transition(
            &mut state,
            ServerState::Stopped,
            self.control.signal(ServerSignal::Stop),
        )
        .await?;
        self.control.cleanup();
        Ok(())
    }

    /// Rewrite the configuration tree without signalling nginx, serialized
    /// with the other transitions.
    pub async fn regenerate(&self) -> Result<(), SupervisorError> {
        let _state = self.state.lock().await;
        self.generator.regenerate().await
    }

    /// Ask nginx to reopen its log files after rotation.
    pub async fn reopen_logs(&self) -> Result<(), SupervisorError> {
        self.control.signal(ServerSignal::Reopen).await
    }

    pub async fn state(&self) -> ServerState {
        *self.state.lock().await
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == ServerState::Running
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
