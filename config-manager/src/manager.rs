use crate::context::GlobalContext;
use crate::errors::ApplyError;
use crate::metrics_defs::{CONFIG_DOWNLOAD_FAILURES, REFRESH_TICKS, ROLLOUT_COMMITS};
use crate::rollouts::RolloutsClient;
use crate::service_configs::ServiceConfigsClient;
use crate::trigger::{Trigger, decide};
use crate::types::{ConfigId, ConfigWeight, Rollout, RolloutId, RolloutSnapshot, WeightedConfig};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinSet;

/// Invoked with the full weighted config set after every successful commit.
/// This is a success-only channel; fetch and download failures never reach it.
pub type CommitCallback = Arc<dyn Fn(Vec<WeightedConfig>) + Send + Sync>;

#[derive(Debug)]
enum Command {
    // Run a full refresh outside the normal interval, bypassing the request
    // gate. The worker sends the apply result when the attempt finishes.
    Refresh(oneshot::Sender<Result<(), ApplyError>>),
    // Tear the worker down.
    Shutdown,
}

struct ManagerInner {
    core: Arc<ManagerCore>,
    #[allow(dead_code)]
    handle: tokio::task::JoinHandle<()>,
    tx: mpsc::Sender<Command>,
}

/// Keeps the committed service configuration in sync with the rollout the
/// operator published. A worker task polls the rollouts endpoint on a timer,
/// gated on data-plane activity; when the rollout id changes, every
/// referenced config is downloaded and the whole set is committed atomically
/// and handed to the embedder through the commit callback.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ManagerInner>,
}

impl ConfigManager {
    pub fn new(context: Arc<GlobalContext>, callback: CommitCallback) -> Self {
        // Channel to send commands to the worker task.
        let (tx, rx) = mpsc::channel::<Command>(16);

        let core = Arc::new(ManagerCore::new(context, callback));

        // Spawn the refresh worker. All fetching happens from this task.
        let worker = core.clone();
        let handle = tokio::spawn(async move {
            worker.run(rx).await;
        });

        ConfigManager {
            inner: Arc::new(ManagerInner { core, handle, tx }),
        }
    }

    /// Records data-plane traffic since the last tick. A tick that begins
    /// with a zero count makes no outbound requests at all.
    pub fn count_requests(&self, n: u64) {
        self.inner
            .core
            .pending_requests
            .fetch_add(n, Ordering::Relaxed);
    }

    /// Runs a full refresh now, regardless of request activity. A stopped
    /// manager ignores the request.
    pub async fn refresh(&self) -> Result<(), ApplyError> {
        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.tx.send(Command::Refresh(done_tx)).await.is_err() {
            return Ok(());
        }
        done_rx.await.unwrap_or(Ok(()))
    }

    /// Stops the periodic refresh. A fetch sequence still in flight finishes
    /// its requests but commits nothing and invokes no callback.
    pub async fn stop(&self) {
        self.inner.core.stopped.store(true, Ordering::Relaxed);
        let _ = self.inner.tx.send(Command::Shutdown).await;
    }

    /// True once a config set has been committed.
    pub fn is_ready(&self) -> bool {
        self.inner.core.ready.load(Ordering::Relaxed)
    }

    pub fn current_rollout_id(&self) -> Option<RolloutId> {
        self.inner.core.state.read().rollout_id.clone()
    }

    /// Primes the committed rollout id without downloading anything, e.g.
    /// when the embedder already holds the matching config set.
    pub fn set_current_rollout_id(&self, rollout_id: impl Into<RolloutId>) {
        self.inner.core.state.write().rollout_id = Some(rollout_id.into());
    }

    pub fn snapshot(&self) -> RolloutSnapshot {
        self.inner.core.snapshot()
    }
}

#[derive(Default)]
struct CommittedState {
    rollout_id: Option<RolloutId>,
    configs: Vec<WeightedConfig>,
}

struct ManagerCore {
    context: Arc<GlobalContext>,
    rollouts: RolloutsClient,
    service_configs: ServiceConfigsClient,
    callback: CommitCallback,
    // rollout_id and configs always change together, under one write guard.
    state: RwLock<CommittedState>,
    // Incremented by data-plane threads, drained by the worker each tick.
    pending_requests: AtomicU64,
    // Holds the single fetch-sequence permit; a tick that cannot take it
    // does nothing.
    update_lock: Semaphore,
    ready: AtomicBool,
    stopped: AtomicBool,
}

impl ManagerCore {
    fn new(context: Arc<GlobalContext>, callback: CommitCallback) -> Self {
        ManagerCore {
            rollouts: RolloutsClient::new(context.clone()),
            service_configs: ServiceConfigsClient::new(context.clone()),
            context,
            callback,
            state: RwLock::new(CommittedState::default()),
            pending_requests: AtomicU64::new(0),
            update_lock: Semaphore::new(1),
            ready: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Ticks at the configured interval until the Shutdown command arrives.
    /// The first fetch happens one full interval after construction.
    async fn run(&self, mut rx: mpsc::Receiver<Command>) {
        let interval = Duration::from_millis(
            self.context
                .server_config()
                .service_management
                .refresh_interval_ms,
        );
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = ticks.tick() => self.tick().await,
                cmd = rx.recv() => match cmd {
                    Some(Command::Refresh(done)) => {
                        let result = self.apply(Trigger::Full).await;
                        let _ = done.send(result);
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }
    }

    async fn tick(&self) {
        if self.stopped.load(Ordering::Relaxed) {
            return;
        }

        let pending = self.pending_requests.swap(0, Ordering::Relaxed);
        let observed = self.context.rollout_id();
        let committed = self.state.read().rollout_id.clone();

        let trigger = decide(pending, observed.as_deref(), committed.as_deref());
        metrics::counter!(REFRESH_TICKS.name, "trigger" => trigger.as_str()).increment(1);

        if trigger == Trigger::Skip {
            return;
        }

        // Errors are already logged; the next tick retries from scratch.
        let _ = self.apply(trigger).await;
    }

    /// One fetch sequence: rollouts, then all referenced configs, then an
    /// all-or-nothing commit. A sequence that finds the committed rollout id
    /// unchanged stops after the rollouts fetch.
    async fn apply(&self, trigger: Trigger) -> Result<(), ApplyError> {
        if self.stopped.load(Ordering::Relaxed) {
            return Ok(());
        }

        // Only one sequence at a time; a tick that lands while one is still
        // running does nothing.
        let Ok(_permit) = self.update_lock.try_acquire() else {
            return Ok(());
        };

        let rollout = match self.rollouts.fetch_latest().await {
            Ok(rollout) => rollout,
            Err(e) => {
                tracing::warn!(error = %e, trigger = trigger.as_str(), "failed to fetch rollouts");
                return Err(e.into());
            }
        };

        if self.state.read().rollout_id.as_deref() == Some(rollout.rollout_id.as_str()) {
            return Ok(());
        }

        let configs = match self.download_all(&rollout).await {
            Ok(configs) => configs,
            Err(e) => {
                // Usually propagation lag on a fresh rollout; retried next tick.
                tracing::info!(error = %e, "rollout not applied");
                return Err(e);
            }
        };

        if self.stopped.load(Ordering::Relaxed) {
            return Ok(());
        }

        {
            let mut state = self.state.write();
            state.rollout_id = Some(rollout.rollout_id.clone());
            state.configs = configs.clone();
        }
        self.ready.store(true, Ordering::Relaxed);

        metrics::counter!(ROLLOUT_COMMITS.name).increment(1);
        tracing::info!(
            rollout_id = %rollout.rollout_id,
            configs = configs.len(),
            "committed new rollout"
        );

        (self.callback)(configs);
        Ok(())
    }

    /// Downloads every config the rollout references. Any failure discards
    /// the whole batch; a partial set is never committed.
    async fn download_all(&self, rollout: &Rollout) -> Result<Vec<WeightedConfig>, ApplyError> {
        let mut downloads = JoinSet::new();
        for (config_id, _) in &rollout.percentages {
            let client = self.service_configs.clone();
            let config_id = config_id.clone();
            downloads.spawn(async move {
                let result = client.fetch(&config_id).await;
                (config_id, result)
            });
        }

        let mut blobs: HashMap<ConfigId, Bytes> = HashMap::new();
        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((config_id, Ok(blob))) => {
                    blobs.insert(config_id, blob);
                }
                Ok((config_id, Err(e))) => {
                    metrics::counter!(CONFIG_DOWNLOAD_FAILURES.name).increment(1);
                    tracing::info!(config_id = %config_id, error = %e, "config download failed");
                }
                Err(e) => tracing::error!(error = %e, "config download task panicked"),
            }
        }

        if blobs.len() != rollout.percentages.len() {
            let failed: Vec<ConfigId> = rollout
                .percentages
                .iter()
                .map(|(config_id, _)| config_id)
                .filter(|config_id| !blobs.contains_key(*config_id))
                .cloned()
                .collect();
            return Err(ApplyError::PartialDownload {
                rollout_id: rollout.rollout_id.clone(),
                failed,
                total: rollout.percentages.len(),
            });
        }

        // Delivery order is the percentages order as received.
        let mut configs = Vec::with_capacity(rollout.percentages.len());
        for (config_id, percent) in &rollout.percentages {
            let config = blobs.remove(config_id).expect("downloaded above");
            configs.push(WeightedConfig {
                config_id: config_id.clone(),
                config,
                percent: *percent,
            });
        }
        Ok(configs)
    }

    fn snapshot(&self) -> RolloutSnapshot {
        let state = self.state.read();
        RolloutSnapshot {
            rollout_id: state.rollout_id.clone(),
            configs: state
                .configs
                .iter()
                .map(|c| ConfigWeight {
                    config_id: c.config_id.clone(),
                    percent: c.percent,
                    size_bytes: c.config.len(),
                })
                .collect(),
        }
    }
}
