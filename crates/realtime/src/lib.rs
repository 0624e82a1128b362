//! Realtime channel client for the campus forum.
//!
//! [`ConnectionManager`](manager::ConnectionManager) owns the single
//! authenticated channel to the forum's realtime endpoint: it checks the
//! access credential before connecting, refreshes it through a
//! [`CredentialStore`](store::CredentialStore) when the server reports
//! expiry, tears the session down on fatal auth errors, keeps the channel
//! alive with periodic pings, and fans inbound events out to subscribers.

pub mod config;
pub mod liveness;
pub mod manager;
pub mod notifier;
pub mod protocol;
pub mod store;
pub mod subscriptions;
pub mod transport;
pub mod ws;

pub use config::RealtimeConfig;
pub use manager::ConnectionManager;
pub use notifier::{NoticeLevel, Notifier, TracingNotifier};
pub use store::{AuthError, CredentialStore, HttpCredentialStore, StoreConfig};
pub use subscriptions::{SubscriptionId, SubscriptionRegistry};
pub use transport::{Transport, TransportEvent};
pub use ws::WsTransport;
