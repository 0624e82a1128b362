//! `campus-realtime` -- command-line realtime client.
//!
//! Connects to the campus forum's realtime endpoint with the stored
//! session, logs every inbound notification, like and comment, and keeps
//! the channel alive (refreshing credentials as needed) until Ctrl-C.
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default                        | Description                          |
//! |-------------------------------|----------|--------------------------------|--------------------------------------|
//! | `REALTIME_URL`                | no       | `ws://localhost:5000/realtime` | Realtime WebSocket endpoint          |
//! | `REALTIME_PING_INTERVAL_SECS` | no       | `25`                           | Seconds between liveness pings       |
//! | `AUTH_API_URL`                | no       | `http://localhost:5000/api`    | REST base URL for credential refresh |
//! | `SESSION_FILE`                | no       | --                             | JSON file holding the credential pair|
//! | `ACCESS_TOKEN`                | no       | --                             | Access credential (no session file)  |
//! | `REFRESH_TOKEN`               | no       | --                             | Refresh credential (no session file) |

use std::sync::Arc;
use std::time::Duration;

use campus_core::credential::CredentialPair;
use campus_core::events::EventKind;
use campus_realtime::{
    ConnectionManager, CredentialStore, HttpCredentialStore, RealtimeConfig, StoreConfig,
    TracingNotifier, Transport, WsTransport,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait for the socket to send its close frame on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_realtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RealtimeConfig::from_env();
    let store_config = StoreConfig::from_env();

    tracing::info!(
        url = %config.url,
        ping_interval_secs = config.ping_interval.as_secs(),
        auth_api_url = %store_config.api_url,
        "Starting campus-realtime",
    );

    let store = HttpCredentialStore::load(store_config).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load session");
        std::process::exit(1);
    });

    if !store.is_authenticated() {
        match (std::env::var("ACCESS_TOKEN"), std::env::var("REFRESH_TOKEN")) {
            (Ok(access), Ok(refresh)) => store.set_credentials(CredentialPair::new(access, refresh)),
            _ => {
                tracing::error!("No session: set SESSION_FILE or ACCESS_TOKEN and REFRESH_TOKEN");
                std::process::exit(1);
            }
        }
    }

    let Some(access) = store.access_credential() else {
        tracing::error!("Session has no access credential");
        std::process::exit(1);
    };

    let transport = Arc::new(WsTransport::new());
    let manager = ConnectionManager::new(
        config,
        Arc::new(store),
        Arc::new(TracingNotifier),
        Arc::clone(&transport) as Arc<dyn Transport>,
    );

    for kind in EventKind::ALL {
        manager.subscribe(kind, move |payload| {
            tracing::info!(%kind, %payload, "Realtime event");
        });
    }

    manager.connect(&access);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }

    tracing::info!(state = %manager.state(), "Shutting down");
    manager.disconnect();
    transport.shutdown(SHUTDOWN_GRACE).await;
}
