//! Carries out decisions.
//!
//! Store writes and route deliveries are spawned and not awaited by the
//! request. Failures are logged and never retried.

use std::sync::Arc;

use alertgate_core::{Action, AlertEvent, WebhookMessage, WireAlert};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::notifier::Notifier;
use crate::store::AlertStore;

/// Spawns the side effects of an [`Action`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<dyn AlertStore>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn AlertStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Spawns whatever `action` requires for `event`.
    ///
    /// `envelope` is the inbound webhook message; forwarded messages are a
    /// copy of it carrying only the decided alert. The returned handles may be
    /// dropped; the tasks keep running.
    pub fn dispatch(
        &self,
        action: &Action,
        event: &AlertEvent,
        envelope: &WebhookMessage,
    ) -> Vec<JoinHandle<()>> {
        match action {
            Action::Notify {
                routes,
                alert,
                update,
            } => {
                let mut handles = vec![self.persist(update.apply_to(event))];
                handles.extend(self.deliver(routes, &envelope.single(alert)));
                handles
            }
            Action::AutoResolve { update, .. } | Action::HardAutoResolve { update, .. } => {
                vec![self.persist(update.apply_to(event))]
            }
            Action::ForwardResolved { routes } => self.deliver(routes, &envelope.single(event)),
            Action::Suppress { .. } | Action::NoOp => Vec::new(),
        }
    }

    fn persist(&self, record: AlertEvent) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let name = record.name().to_string();
            let postable = WireAlert::from(&record).into_postable();
            match store.post(std::slice::from_ref(&postable)).await {
                Ok(()) => info!(alert = %name, resolved = postable.ends_at.is_some(), "stored alert state"),
                Err(e) => warn!(alert = %name, error = %e, "failed to store alert state"),
            }
        })
    }

    fn deliver(&self, routes: &[String], message: &WebhookMessage) -> Vec<JoinHandle<()>> {
        routes
            .iter()
            .map(|route| {
                let notifier = Arc::clone(&self.notifier);
                let route = route.clone();
                let message = message.clone();
                tokio::spawn(async move {
                    let result = notifier.deliver(&route, &message).await;
                    if result.success {
                        info!(route = %route, status = ?result.status_code, "notification delivered");
                    } else {
                        warn!(
                            route = %route,
                            status = ?result.status_code,
                            error = result.message.as_deref().unwrap_or("unknown"),
                            "notification failed"
                        );
                    }
                })
            })
            .collect()
    }
}
