pub mod leaderboard;
pub mod session_lifecycle;

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    dao::session_store::PuzzleStore,
    dto::sse::ServerEvent,
    error::ServiceError,
};

pub type SharedState = Arc<AppState>;

const LEADERBOARD_SSE_CAPACITY: usize = 16;

/// Central application state: storage handle, time source, tunables and per-user gates.
pub struct AppState {
    store: RwLock<Option<Arc<dyn PuzzleStore>>>,
    degraded: watch::Sender<bool>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
    user_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    best_scores: broadcast::Sender<ServerEvent>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(config: AppConfig, clock: Arc<dyn Clock>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (best_scores, _) = broadcast::channel(LEADERBOARD_SSE_CAPACITY);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            clock,
            config,
            user_gates: DashMap::new(),
            best_scores,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn PuzzleStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Store handle for an operation, failing while degraded.
    pub async fn require_store(&self) -> Result<Arc<dyn PuzzleStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn PuzzleStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    pub fn now(&self) -> std::time::SystemTime {
        self.clock.now()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Receive best-score events published after this call.
    pub fn subscribe_best_scores(&self) -> broadcast::Receiver<ServerEvent> {
        self.best_scores.subscribe()
    }

    /// Fan `event` out to the connected leaderboard streams. No subscriber is not an error.
    pub fn publish_best_score(&self, event: ServerEvent) {
        let _ = self.best_scores.send(event);
    }

    fn user_gate(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_gates
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `work` while holding the per-user gate.
    ///
    /// Storage write conflicts are retried up to the configured number of times; the whole
    /// run, including waiting for the gate, is bounded by the operation timeout. Work that
    /// times out is dropped together with its uncommitted transaction.
    pub async fn run_for_user<F, Fut, T>(
        &self,
        user_id: Uuid,
        mut work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.user_gate(user_id);
        let max_attempts = self.config.conflict_retries.saturating_add(1);

        let serialized = async {
            let _guard = gate.lock().await;
            let mut attempt = 1;
            loop {
                match work().await {
                    Err(ServiceError::Conflict(message)) if attempt < max_attempts => {
                        debug!(%user_id, attempt, %message, "write conflict; retrying");
                        attempt += 1;
                    }
                    outcome => return outcome,
                }
            }
        };

        let outcome = match self.config.operation_timeout {
            Some(limit) => match timeout(limit, serialized).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%user_id, timeout_ms = limit.as_millis(), "user operation timed out");
                    Err(ServiceError::Timeout)
                }
            },
            None => serialized.await,
        };

        drop(gate);
        self.user_gates
            .remove_if(&user_id, |_, gate| Arc::strong_count(gate) == 1);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dao::session_store::MemoryStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_store().await,
            Err(ServiceError::Degraded)
        ));

        state.set_store(Arc::new(MemoryStore::new())).await;
        assert!(!state.is_degraded());
        assert!(state.require_store().await.is_ok());
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_surfaced() {
        let state = AppState::new(AppConfig {
            conflict_retries: 2,
            ..AppConfig::default()
        });
        let user = Uuid::new_v4();
        let mut calls = 0;

        let result: Result<(), _> = state
            .run_for_user(user, || {
                calls += 1;
                async { Err(ServiceError::Conflict("busy".into())) }
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert_eq!(calls, 3);
        assert!(state.user_gates.is_empty());
    }

    #[tokio::test]
    async fn slow_work_times_out() {
        let state = AppState::new(AppConfig {
            operation_timeout: Some(Duration::from_millis(20)),
            ..AppConfig::default()
        });

        let result = state
            .run_for_user(Uuid::new_v4(), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ServiceError::Timeout)));
    }
}
