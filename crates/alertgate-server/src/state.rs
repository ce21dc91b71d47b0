//! Shared state for the gateway server.

use std::sync::Arc;
use std::time::Instant;

use alertgate_core::{AlertEvent, AlertState, DecisionEngine, RuleResolver, incident::find_active};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::{GatewayConfig, StateSource};
use crate::dispatch::Dispatcher;
use crate::notifier::Notifier;
use crate::store::AlertStore;

/// Shared state for the gateway server.
#[derive(Debug)]
pub struct GatewayState {
    /// Gateway configuration.
    config: Arc<GatewayConfig>,
    /// Pre-validated rule sets.
    resolver: RuleResolver,
    /// Decision engine.
    engine: DecisionEngine,
    /// Alert store.
    store: Arc<dyn AlertStore>,
    /// Spawns side effects.
    dispatcher: Dispatcher,
    /// Server start time.
    start_time: Instant,
    /// Side-effect tasks that may still be running.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl GatewayState {
    /// Create a new gateway state.
    pub fn new(
        config: GatewayConfig,
        resolver: RuleResolver,
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine: DecisionEngine::new(config.utc_offset),
            config: Arc::new(config),
            resolver,
            dispatcher: Dispatcher::new(Arc::clone(&store), notifier),
            store,
            start_time: Instant::now(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the rule resolver.
    pub const fn resolver(&self) -> &RuleResolver {
        &self.resolver
    }

    /// Get the decision engine.
    pub const fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Get the alert store.
    pub fn store(&self) -> &dyn AlertStore {
        self.store.as_ref()
    }

    /// Get the dispatcher.
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Keeps `handles` so they can be awaited on shutdown.
    ///
    /// Finished tasks are pruned on every call.
    pub fn track(&self, handles: Vec<JoinHandle<()>>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.extend(handles);
    }

    /// Waits for every tracked task and returns how many were awaited.
    pub async fn drain(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "side-effect task failed");
            }
        }
        count
    }

    /// Fetches the prior notification state for `event`.
    ///
    /// Reads the store when configured to, falling back to the event's own
    /// annotations if the store fails or has no active record.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidAnnotation` if the state that was found
    /// cannot be parsed.
    pub async fn prior_state(&self, event: &AlertEvent) -> alertgate_core::Result<AlertState> {
        if self.config.state_source == StateSource::Store {
            match self.store.active(event.name(), event.instance()).await {
                Ok(alerts) => {
                    if let Some(stored) = find_active(&alerts, event.name()) {
                        return stored.state();
                    }
                    debug!(alert = %event.name(), "no active record in store, using annotations");
                }
                Err(e) => {
                    warn!(alert = %event.name(), error = %e, "store lookup failed, using annotations");
                }
            }
        }
        event.recorded_state()
    }
}
