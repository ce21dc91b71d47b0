//! # alertgate-server
//!
//! HTTP front end for the alertgate decision engine.
//!
//! Alertmanager posts webhook batches here. Each alert is decided on
//! against its rule set and prior state; notifications are forwarded to the
//! rule's routes and the updated state is written back to Alertmanager,
//! which doubles as the alert store.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use alertgate_server::{AlertmanagerStore, GatewayConfig, GatewayServer, WebhookNotifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::default();
//!     let resolver = config.load_rules()?;
//!     let store = AlertmanagerStore::new(&config.alertmanager_url, Duration::from_secs(10))?;
//!     let notifier = WebhookNotifier::new(Duration::from_secs(10))?;
//!     let addr = config.bind_addr;
//!
//!     let server = GatewayServer::new(config, resolver, Arc::new(store), Arc::new(notifier));
//!     server.serve(addr).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/webhook` | POST | Alertmanager webhook receiver |
//! | `/alerts` | POST | Record incidents reported by a monitored system |
//! | `/alerts` | DELETE | Finish the named active alerts |
//! | `/health` | GET | Liveness and uptime |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod routes;
pub mod server;
pub mod state;
pub mod store;

// Re-export main types
pub use config::{Args, GatewayConfig, StateSource};
pub use dispatch::Dispatcher;
pub use error::{GatewayError, GatewayResult};
pub use notifier::{DeliveryResult, Notifier, WebhookNotifier};
pub use server::GatewayServer;
pub use state::GatewayState;
pub use store::{AlertStore, AlertmanagerStore, MemoryStore};
