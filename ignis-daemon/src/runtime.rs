use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use ignis_core::AppConfig;
use ignis_detector::SupportedFeatures;
use ignis_renderer::{ConfigPaths, GeoIpProvider};
use ignis_sync::Synthesizer;

use crate::error::{io_err, DaemonError, SupervisorError};
use crate::logs::LogRotationTask;
use crate::paths::{DEBOUNCE_WINDOW, STARTUP_ATTEMPTS, STARTUP_RETRY_DELAY};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::scheduler::{self, Task};
use crate::supervisor::{ModelGenerator, NginxProcess, Supervisor};

/// `IGNIS_LOG_FORMAT=json` switches daemon logs to JSON lines.
pub const ENV_LOG_FORMAT: &str = "IGNIS_LOG_FORMAT";

/// State shared by the socket server and the watcher.
struct DaemonState {
    supervisor: Arc<Supervisor>,
    rotation: Arc<dyn Task>,
    features: SupportedFeatures,
    config: AppConfig,
    started_at_unix: u64,
    last_reload_at_unix: AtomicU64,
}

impl DaemonState {
    fn new(
        supervisor: Arc<Supervisor>,
        rotation: Arc<dyn Task>,
        features: SupportedFeatures,
        config: AppConfig,
    ) -> Self {
        Self {
            supervisor,
            rotation,
            features,
            config,
            started_at_unix: unix_seconds_now(),
            last_reload_at_unix: AtomicU64::new(0),
        }
    }

    async fn reload(&self) -> Result<(), SupervisorError> {
        self.supervisor.reload(true).await?;
        self.last_reload_at_unix
            .store(unix_seconds_now(), Ordering::SeqCst);
        Ok(())
    }

    async fn status_payload(&self) -> Value {
        let nginx = self.supervisor.state().await;
        json!({
            "running": true,
            "nginx": nginx,
            "started_at_unix": self.started_at_unix,
            "last_reload_at_unix": self.last_reload_at_unix.load(Ordering::SeqCst),
            "nginx_binary": self.config.nginx_binary.display().to_string(),
            "config_root": self.config.config_root.display().to_string(),
            "model_path": self.config.model_path.display().to_string(),
            "socket": self.config.control_socket.display().to_string(),
            "features": self.features,
        })
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: AppConfig) -> Result<(), DaemonError> {
    init_tracing("info");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon: probe nginx, start it, then serve the control socket,
/// watch the model file and rotate logs until shutdown.
pub async fn run(config: AppConfig) -> Result<(), DaemonError> {
    let paths = ConfigPaths::new(&config.config_root);
    ignis_sync::writer::ensure_layout(&paths)?;

    let capabilities = ignis_detector::probe(&config.nginx_binary, config.probe_timeout).await?;
    let features = capabilities.supported_features();
    tracing::info!(
        version = capabilities.version.as_deref().unwrap_or("unknown"),
        stream = ?features.stream_type,
        run_code = ?features.run_code_type,
        tls_sni = ?features.tls_sni,
        stats = ?features.stats_type,
        "nginx capabilities detected",
    );

    let synthesizer = Arc::new(Synthesizer::new(
        paths.clone(),
        GeoIpProvider::http(config.geoip.clone()),
    )?);
    let supervisor = Arc::new(Supervisor::new(
        Arc::new(NginxProcess::new(&config.nginx_binary, paths.clone())),
        Arc::new(ModelGenerator::new(
            synthesizer,
            features.clone(),
            config.model_path.clone(),
        )),
    ));
    let rotation: Arc<dyn Task> = Arc::new(LogRotationTask::new(
        paths,
        config.model_path.clone(),
        supervisor.clone(),
    ));
    let state = Arc::new(DaemonState::new(
        supervisor.clone(),
        rotation.clone(),
        features,
        config.clone(),
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let startup_handle = {
        let shutdown = shutdown_tx.clone();
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => {}
                _ = start_with_retry(&supervisor, STARTUP_ATTEMPTS, STARTUP_RETRY_DELAY) => {}
            }
            Ok::<(), DaemonError>(())
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let model_path = config.model_path.clone();
        tokio::spawn(async move {
            let result = watcher_task(model_path, state, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        let socket = config.control_socket.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(socket, state, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            scheduler::run_scheduled(rotation, shutdown.subscribe()).await;
            Ok::<(), DaemonError>(())
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (startup_result, watcher_result, socket_result, rotation_result, signal_result) = tokio::join!(
        startup_handle,
        watcher_handle,
        socket_handle,
        rotation_handle,
        signal_handle
    );

    if let Err(err) = supervisor.stop().await {
        tracing::error!(error = %err, "failed to stop nginx during shutdown");
    }

    handle_join("startup", startup_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Try to start nginx up to `attempts` times, `delay` apart. Returns
/// whether it ended up running.
pub async fn start_with_retry(supervisor: &Supervisor, attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=attempts {
        match supervisor.start().await {
            Ok(()) => {
                tracing::info!(attempt, "nginx started");
                return true;
            }
            Err(err) => {
                tracing::warn!(attempt, attempts, error = %err, "nginx failed to start");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    tracing::warn!(attempts, "nginx did not start, no more retries");
    false
}

async fn watcher_task(
    model_path: PathBuf,
    state: Arc<DaemonState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let dir = model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    // FSEvents reports real paths (/private/var/... on macOS), so compare
    // against the canonical directory.
    let dir = fs::canonicalize(&dir).unwrap_or(dir);
    let Some(file_name) = model_path.file_name().map(|n| n.to_os_string()) else {
        return Err(DaemonError::Protocol(format!(
            "model path has no file name: {}",
            model_path.display()
        )));
    };
    let watched = dir.join(&file_name);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %watched.display(), "watching model file");

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                if !event.paths.iter().any(|p| p.file_name() == Some(file_name.as_os_str())) {
                    continue;
                }
                if !should_process_event(&mut debounce, &watched, Instant::now()) {
                    continue;
                }

                match state.reload().await {
                    Ok(()) => tracing::info!("model changed, nginx reloaded"),
                    Err(SupervisorError::NotRunning) => {
                        tracing::debug!("model changed while nginx is stopped");
                    }
                    Err(err) => tracing::error!(error = %err, "reload after model change failed"),
                }
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    socket: PathBuf,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Some(dir) = socket.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "control socket listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client<S>(
    stream: S,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = dispatch(request, &state, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if request == DaemonRequest::Shutdown {
            break;
        }
    }

    Ok(())
}

async fn dispatch(
    request: DaemonRequest,
    state: &DaemonState,
    shutdown_tx: &broadcast::Sender<()>,
) -> DaemonResponse {
    tracing::debug!(?request, "control request");
    match request {
        DaemonRequest::Status => DaemonResponse::ok(state.status_payload().await),
        DaemonRequest::Start => match state.supervisor.start().await {
            Ok(()) => DaemonResponse::ok(json!({ "nginx": "running" })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Apply => match state.supervisor.regenerate().await {
            Ok(()) => DaemonResponse::ok(json!({ "applied": true })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Reload => match state.reload().await {
            Ok(()) => DaemonResponse::ok(json!({ "reloaded": true })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Rotate => match state.rotation.run().await {
            Ok(()) => DaemonResponse::ok(json!({ "rotated": true })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Stop => match state.supervisor.stop().await {
            Ok(()) => DaemonResponse::ok(json!({ "nginx": "stopped" })),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        DaemonRequest::Shutdown => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

async fn write_response<W>(writer: &mut W, response: &DaemonResponse) -> Result<(), DaemonError>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global stderr subscriber: `RUST_LOG` filter (falling back to
/// `default_directive`), plain text unless [`ENV_LOG_FORMAT`] is `json`.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::duplex;
    use tokio::time::advance;

    use crate::supervisor::fakes;

    struct CountingRotation {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Task for CountingRotation {
        fn name(&self) -> &'static str {
            "rotation"
        }

        fn schedule(&self) -> Duration {
            Duration::from_secs(3600)
        }

        async fn run(&self) -> Result<(), DaemonError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn state() -> (Arc<DaemonState>, Arc<CountingRotation>, Arc<fakes::Recorder>) {
        let (supervisor, _control, _generator, recorder) = fakes::supervisor();
        let rotation = Arc::new(CountingRotation {
            runs: AtomicUsize::new(0),
        });
        let config = AppConfig {
            nginx_binary: PathBuf::from("/usr/sbin/nginx"),
            config_root: PathBuf::from("/srv/ignis"),
            ..AppConfig::default()
        };
        let state = Arc::new(DaemonState::new(
            Arc::new(supervisor),
            rotation.clone(),
            SupportedFeatures::default(),
            config,
        ));
        (state, rotation, recorder)
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_events() {
        let threshold = Duration::from_millis(100);
        let mut debounce = HashMap::<PathBuf, Instant>::new();
        let path = PathBuf::from("/tmp/model.yaml");
        let mut reloads = 0usize;

        for _ in 0..5 {
            if should_process_event_with_threshold(&mut debounce, &path, Instant::now(), threshold)
            {
                reloads += 1;
            }
            advance(Duration::from_millis(10)).await;
        }
        assert_eq!(reloads, 1, "rapid saves should collapse to one reload");

        advance(Duration::from_millis(150)).await;
        assert!(should_process_event_with_threshold(
            &mut debounce,
            &path,
            Instant::now(),
            threshold
        ));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn startup_retries_until_nginx_comes_up() {
        let (supervisor, control, _generator, recorder) = fakes::supervisor();
        control.fail_launches.store(2, Ordering::SeqCst);

        let started = start_with_retry(&supervisor, 5, Duration::from_secs(5)).await;
        assert!(started);
        assert!(supervisor.is_running().await);
        let launches = recorder.calls().iter().filter(|c| *c == "launch").count();
        assert_eq!(launches, 3);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn startup_gives_up_after_the_last_attempt() {
        let (supervisor, control, _generator, recorder) = fakes::supervisor();
        control.fail_launches.store(10, Ordering::SeqCst);

        let began = Instant::now();
        let started = start_with_retry(&supervisor, 3, Duration::from_secs(5)).await;
        assert!(!started);
        assert!(!supervisor.is_running().await);
        assert_eq!(recorder.calls().iter().filter(|c| *c == "launch").count(), 3);
        // no sleep after the final attempt
        assert_eq!(began.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn status_reports_nginx_state_and_paths() {
        let (state, _rotation, _recorder) = state();
        let (shutdown_tx, _) = broadcast::channel(1);

        let response = dispatch(DaemonRequest::Status, &state, &shutdown_tx).await;
        assert!(response.ok);
        let data = response.data.expect("status data");
        assert_eq!(data["nginx"], json!("stopped"));
        assert_eq!(data["last_reload_at_unix"], json!(0));
        assert_eq!(data["config_root"], json!("/srv/ignis"));
        assert_eq!(data["features"]["stream_type"], json!("none"));
    }

    #[tokio::test]
    async fn reload_is_strict_over_the_socket() {
        let (state, _rotation, recorder) = state();
        let (shutdown_tx, _) = broadcast::channel(1);

        let response = dispatch(DaemonRequest::Reload, &state, &shutdown_tx).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("nginx is not running"));
        assert!(recorder.calls().is_empty());

        assert!(dispatch(DaemonRequest::Start, &state, &shutdown_tx).await.ok);
        let response = dispatch(DaemonRequest::Reload, &state, &shutdown_tx).await;
        assert!(response.ok);
        assert!(state.last_reload_at_unix.load(Ordering::SeqCst) > 0);
        assert_eq!(
            recorder.calls(),
            vec!["regenerate", "launch", "regenerate", "reload"]
        );
    }

    #[tokio::test]
    async fn apply_regenerates_without_touching_nginx() {
        let (state, _rotation, recorder) = state();
        let (shutdown_tx, _) = broadcast::channel(1);

        let response = dispatch(DaemonRequest::Apply, &state, &shutdown_tx).await;
        assert_eq!(response.data, Some(json!({ "applied": true })));
        assert!(!state.supervisor.is_running().await);
        assert_eq!(recorder.calls(), vec!["regenerate"]);
    }

    #[tokio::test]
    async fn rotate_and_stop_commands() {
        let (state, rotation, recorder) = state();
        let (shutdown_tx, _) = broadcast::channel(1);

        assert!(dispatch(DaemonRequest::Rotate, &state, &shutdown_tx).await.ok);
        assert_eq!(rotation.runs.load(Ordering::SeqCst), 1);

        assert!(dispatch(DaemonRequest::Start, &state, &shutdown_tx).await.ok);
        let response = dispatch(DaemonRequest::Stop, &state, &shutdown_tx).await;
        assert_eq!(response.data, Some(json!({ "nginx": "stopped" })));
        assert!(!state.supervisor.is_running().await);
        assert!(recorder.calls().ends_with(&["stop".to_string(), "cleanup".to_string()]));
    }

    #[tokio::test]
    async fn socket_client_answers_each_line_until_shutdown() {
        let (state, _rotation, _recorder) = state();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let (client, server) = duplex(4096);

        let handle = tokio::spawn(handle_socket_client(server, state, shutdown_tx));

        let (reader, mut writer) = tokio::io::split(client);
        writer
            .write_all(b"{\"cmd\":\"status\"}\n{\"cmd\":\"sync\"}\n{\"cmd\":\"shutdown\"}\n")
            .await
            .unwrap();
        let mut lines = BufReader::new(reader).lines();

        let status: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(status.ok);
        let invalid: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert!(!invalid.ok);
        assert!(invalid.error.unwrap().starts_with("invalid request"));
        let stopping: DaemonResponse =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(stopping.data, Some(json!({ "stopping": true })));

        handle.await.unwrap().unwrap();
        shutdown_rx.recv().await.expect("shutdown signal");
    }

    #[test]
    fn stale_socket_file_is_removed_before_bind() {
        let dir = tempfile::TempDir::new().unwrap();
        let socket = dir.path().join("ignis.sock");
        fs::write(&socket, b"").unwrap();

        prepare_socket_for_bind(&socket).unwrap();
        assert!(!socket.exists());
    }
}
