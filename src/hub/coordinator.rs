//! `HubCoordinator` — serialises job dispatch per namespace and owns
//! signal-driven shutdown (spec §4.1), grounded on the teacher's
//! `tokio::signal::ctrl_c` shutdown idiom generalised to also catch SIGTERM
//! and to run registered cleanup handlers exactly once.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashSet;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::hub::events::{HudEventSink, HudPayload};

/// Options accepted by [`HubCoordinator::run`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// If true, `run` returns as soon as the job starts rather than
    /// awaiting its completion.
    pub detached: bool,
    /// Optional wall-clock timeout applied to the job.
    pub timeout_ms: Option<u64>,
}

type CleanupHandler = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Serialises job dispatch by namespace (`wallet:<alias>`, `tx:<txid>`, or
/// the literal `targetList`) and owns orderly shutdown.
pub struct HubCoordinator {
    running_namespaces: DashSet<String>,
    hud: Arc<dyn HudEventSink>,
    cleanup_handlers: tokio::sync::Mutex<Vec<CleanupHandler>>,
    job_payload_dir: PathBuf,
}

impl HubCoordinator {
    pub fn new(hud: Arc<dyn HudEventSink>) -> Arc<Self> {
        Self::with_payload_dir(hud, PathBuf::from("jobs"))
    }

    /// Build a coordinator that writes detached-job payload files under
    /// `job_payload_dir` (spec §4.1's `{detached, pid, payloadFile}`
    /// descriptor).
    pub fn with_payload_dir(hud: Arc<dyn HudEventSink>, job_payload_dir: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            running_namespaces: DashSet::new(),
            hud,
            cleanup_handlers: tokio::sync::Mutex::new(Vec::new()),
            job_payload_dir,
        })
    }

    /// Write `payload` to a namespaced file under the job payload directory,
    /// returning its path. Best-effort: a write failure is logged and the
    /// job still proceeds without a payload file to point to.
    fn write_job_payload(&self, namespace: &str, command: &str, payload: &serde_json::Value) -> Option<PathBuf> {
        let file_name = format!(
            "{}-{}-{}.json",
            command,
            namespace.replace([':', '/'], "_"),
            Utc::now().timestamp_millis()
        );
        let path = self.job_payload_dir.join(file_name);
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %path.display(), error = %e, "failed to create job payload directory");
                return None;
            }
        }
        match serde_json::to_vec_pretty(payload) {
            Ok(bytes) => match std::fs::write(&path, bytes) {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to write job payload file");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to serialize job payload");
                None
            }
        }
    }

    /// Derive the serialisation namespace for a command (spec §4.1).
    pub fn namespace_for(command: &str, payload: &serde_json::Value) -> String {
        match command {
            "swap" => {
                let key = payload
                    .get("walletAlias")
                    .and_then(|v| v.as_str())
                    .or_else(|| payload.get("walletId").and_then(|v| v.as_str()))
                    .unwrap_or("unknown");
                format!("wallet:{key}")
            }
            "txMonitor" => {
                let txid = payload.get("txid").and_then(|v| v.as_str()).unwrap_or("unknown");
                format!("tx:{txid}")
            }
            _ => "targetList".to_string(),
        }
    }

    /// Register a cleanup handler, invoked exactly once during shutdown, in
    /// the order registered.
    pub async fn register_cleanup<F, Fut>(&self, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cleanup_handlers
            .lock()
            .await
            .push(Box::new(move || Box::pin(handler())));
    }

    /// Run `command` with `payload` under namespace-serialised dispatch.
    /// Returns [`CoreError::AlreadyRunning`] immediately (never queues) if the
    /// namespace already has a job in flight.
    pub async fn run<F, Fut>(
        &self,
        command: &str,
        payload: serde_json::Value,
        options: RunOptions,
        job: F,
    ) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let namespace = Self::namespace_for(command, &payload);

        if !self.running_namespaces.insert(namespace.clone()) {
            return Err(CoreError::AlreadyRunning(namespace));
        }

        self.hud.emit(HudPayload::Job {
            namespace: namespace.clone(),
            command: command.to_string(),
            phase: "start",
            detail: None,
            at: Utc::now(),
        });

        let run_job = async move {
            match options.timeout_ms {
                Some(ms) => tokio::time::timeout(Duration::from_millis(ms), job())
                    .await
                    .unwrap_or_else(|_| Err(CoreError::Timeout(ms))),
                None => job().await,
            }
        };

        if options.detached {
            let payload_file = self.write_job_payload(&namespace, command, &payload);
            let namespace_clone = namespace.clone();
            let command_owned = command.to_string();
            let hud = Arc::clone(&self.hud);
            tokio::spawn(async move {
                let result = run_job.await;
                emit_completion(&hud, &namespace_clone, &command_owned, &result);
            });
            self.running_namespaces.remove(&namespace);
            return Ok(serde_json::json!({
                "detached": true,
                "namespace": namespace,
                "pid": std::process::id(),
                "payloadFile": payload_file.map(|p| p.display().to_string()),
            }));
        }

        let result = run_job.await;
        emit_completion(&self.hud, &namespace, command, &result);
        self.running_namespaces.remove(&namespace);
        result
    }

    /// Run forever until SIGINT or SIGTERM is received, then invoke every
    /// registered cleanup handler exactly once, in registration order.
    pub async fn run_until_signal(self: &Arc<Self>) {
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    self.shutdown().await;
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        }

        self.shutdown().await;
    }

    /// Invoke every registered cleanup handler exactly once.
    pub async fn shutdown(&self) {
        info!("hub coordinator shutting down, running cleanup handlers");
        let handlers = std::mem::take(&mut *self.cleanup_handlers.lock().await);
        for handler in handlers {
            handler().await;
        }
    }
}

fn emit_completion(
    hud: &Arc<dyn HudEventSink>,
    namespace: &str,
    command: &str,
    result: &Result<serde_json::Value>,
) {
    let (phase, detail) = match result {
        Ok(_) => ("result", None),
        Err(e) => ("error", Some(e.to_string())),
    };
    hud.emit(HudPayload::Job {
        namespace: namespace.to_string(),
        command: command.to_string(),
        phase,
        detail,
        at: Utc::now(),
    });
}
