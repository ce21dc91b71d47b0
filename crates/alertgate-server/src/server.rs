//! Gateway server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use alertgate_core::RuleResolver;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::notifier::Notifier;
use crate::routes::create_router;
use crate::state::GatewayState;
use crate::store::AlertStore;

/// HTTP server for the webhook and incident endpoints.
#[derive(Debug, Clone)]
pub struct GatewayServer {
    state: Arc<GatewayState>,
}

impl GatewayServer {
    /// Create a new gateway server.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        resolver: RuleResolver,
        store: Arc<dyn AlertStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::from_state(Arc::new(GatewayState::new(config, resolver, store, notifier)))
    }

    /// Wrap existing shared state.
    #[must_use]
    pub const fn from_state(state: Arc<GatewayState>) -> Self {
        Self { state }
    }

    /// Get the gateway state.
    #[must_use]
    pub fn state(&self) -> Arc<GatewayState> {
        Arc::clone(&self.state)
    }

    /// Listen on `addr` until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve(&self, addr: SocketAddr) -> GatewayResult<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Listen on `addr` until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn serve_with_shutdown<F>(&self, addr: SocketAddr, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::BindFailed(addr, e))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Internal` if the server fails.
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> GatewayResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener
            .local_addr()
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        info!(
            addr = %local,
            alertmanager = %self.state.config().alertmanager_url,
            rules = self.state.resolver().names().count(),
            "alertgate listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        let pending = self.state.drain().await;
        info!(pending, "alertgate shut down");
        Ok(())
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> axum::Router {
        create_router(Arc::clone(&self.state))
    }
}
