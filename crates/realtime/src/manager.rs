//! Realtime connection manager.
//!
//! [`ConnectionManager`] owns at most one authenticated channel to the
//! realtime endpoint. It refuses to open a channel with an already-expired
//! credential, refreshes the credential through the [`CredentialStore`]
//! when the server reports expiry, tears the session down on fatal auth
//! errors, keeps the channel alive with pings, and fans inbound events out
//! to subscribers.
//!
//! Every channel is tagged with an epoch. Tearing a channel down (via
//! [`disconnect`](ConnectionManager::disconnect), a new
//! [`connect`](ConnectionManager::connect), a refresh or a fatal error)
//! bumps the epoch and cancels the channel's token, so events still
//! buffered for the old channel are discarded.
//!
//! Nothing here returns an error to the caller. Failures drive state
//! transitions and, when the session ends, a notice via the [`Notifier`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use campus_core::credential::{self, CredentialPair};
use campus_core::error::{ExpirySource, SessionError};
use campus_core::events::{ChannelState, EventKind};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::RealtimeConfig;
use crate::liveness::spawn_liveness;
use crate::notifier::{NoticeLevel, Notifier};
use crate::protocol::{parse_frame, InboundFrame, OutboundFrame};
use crate::store::CredentialStore;
use crate::subscriptions::{SubscriptionId, SubscriptionRegistry};
use crate::transport::{Transport, TransportEvent};

/// Manages the realtime channel for one logged-in session.
///
/// Created via [`ConnectionManager::new`]. The returned `Arc` can be
/// cloned freely; independent instances do not share state.
pub struct ConnectionManager {
    config: RealtimeConfig,
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    transport: Arc<dyn Transport>,
    session: Mutex<Session>,
    subscriptions: SubscriptionRegistry,
    /// Handed to spawned tasks so they never keep the manager alive.
    this: Weak<ConnectionManager>,
}

/// Mutable channel state. Never held across an `.await` or while
/// subscriber handlers run.
#[derive(Default)]
struct Session {
    state: ChannelState,
    /// Incremented on every teardown.
    epoch: u64,
    pending_refresh: bool,
    /// Epoch the in-flight refresh reconnects. Stale once anything else
    /// tears the channel down.
    refresh_epoch: u64,
    channel: Option<ActiveChannel>,
}

/// Manager-side bookkeeping for the open channel.
struct ActiveChannel {
    epoch: u64,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    cancel: CancellationToken,
}

impl Session {
    /// Close the current channel (if any) and start a new epoch.
    fn teardown(&mut self) -> u64 {
        if let Some(channel) = self.channel.take() {
            channel.cancel.cancel();
        }
        self.epoch += 1;
        self.epoch
    }

    /// Whether events tagged `epoch` belong to the open channel.
    fn is_current(&self, epoch: u64) -> bool {
        self.channel.as_ref().is_some_and(|c| c.epoch == epoch)
    }
}

impl ConnectionManager {
    pub fn new(
        config: RealtimeConfig,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            config,
            store,
            notifier,
            transport,
            session: Mutex::new(Session::default()),
            subscriptions: SubscriptionRegistry::new(),
            this: this.clone(),
        })
    }

    /// Current channel state.
    pub fn state(&self) -> ChannelState {
        self.lock_session().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Connected
    }

    /// Whether a credential refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.lock_session().pending_refresh
    }

    /// Open a channel authenticated with `access_credential`, replacing
    /// any existing channel.
    ///
    /// An already-expired credential is never sent: the refresh protocol
    /// runs instead and reconnects with the refreshed credential.
    pub fn connect(&self, access_credential: &str) {
        if credential::is_expired(access_credential) {
            tracing::info!("Access credential already expired, refreshing before connect");
            self.begin_refresh(ExpirySource::Decoded);
            return;
        }

        let (epoch, events, cancel) = {
            let mut session = self.lock_session();
            let epoch = session.teardown();
            let handle = self.transport.open(&self.config.url, access_credential);
            session.channel = Some(ActiveChannel {
                epoch,
                outbound: handle.outbound,
                cancel: handle.cancel.clone(),
            });
            session.state = ChannelState::Connecting;
            (epoch, handle.events, handle.cancel)
        };

        tracing::info!(epoch, url = %self.config.url, "Opening realtime channel");
        self.spawn_driver(epoch, events, cancel);
    }

    /// Close the channel and stop its timers. A no-op when already
    /// disconnected.
    ///
    /// Once this returns, no further transitions or dispatches happen for
    /// the closed channel, and an in-flight refresh will not reconnect.
    pub fn disconnect(&self) {
        let mut session = self.lock_session();
        if session.state == ChannelState::Disconnected && session.channel.is_none() {
            tracing::trace!("Disconnect requested while already disconnected");
            return;
        }

        let epoch = session.teardown();
        session.state = ChannelState::Disconnected;
        tracing::info!(epoch, "Realtime channel disconnected");
    }

    /// Register `handler` for inbound events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(kind, handler)
    }

    /// Remove a handler registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    /// Invoke every handler for `kind` with `payload`, in registration
    /// order, before returning. Returns the number of handlers invoked.
    pub fn dispatch(&self, kind: EventKind, payload: &serde_json::Value) -> usize {
        self.subscriptions.dispatch(kind, payload)
    }

    /// Ask the server to mark a notification as read. Fire-and-forget;
    /// dropped when no channel is open.
    pub fn mark_read(&self, notification_id: &str) {
        let session = self.lock_session();
        let Some(channel) = &session.channel else {
            tracing::debug!(notification_id, "No realtime channel, dropping mark-read");
            return;
        };

        let frame = OutboundFrame::MarkRead {
            notification_id: notification_id.to_string(),
        };
        if channel.outbound.send(frame).is_err() {
            tracing::debug!(notification_id, "Realtime channel closing, dropping mark-read");
        }
    }

    // ---- private helpers ----

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward transport events for one channel until it is cancelled or
    /// its event stream ends.
    fn spawn_driver(
        &self,
        epoch: u64,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        cancel: CancellationToken,
    ) {
        let this = self.this.clone();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };

                let Some(manager) = this.upgrade() else { break };
                match event {
                    Some(event) => manager.handle_transport_event(epoch, event),
                    None => {
                        manager.handle_transport_event(epoch, TransportEvent::Closed);
                        break;
                    }
                }
            }
            tracing::trace!(epoch, "Channel driver exited");
        });
    }

    fn handle_transport_event(&self, epoch: u64, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.handle_opened(epoch),
            TransportEvent::Message(text) => self.handle_frame(epoch, &text),
            TransportEvent::Error(message) => self.handle_connection_error(epoch, &message),
            TransportEvent::Closed => self.handle_closed(epoch),
        }
    }

    fn handle_opened(&self, epoch: u64) {
        let mut session = self.lock_session();
        if !session.is_current(epoch) || session.state != ChannelState::Connecting {
            return;
        }
        session.state = ChannelState::Connected;

        if let Some(channel) = &session.channel {
            spawn_liveness(
                self.config.ping_interval,
                channel.outbound.clone(),
                channel.cancel.child_token(),
            );
        }
        tracing::info!(epoch, "Realtime channel connected");
    }

    fn handle_closed(&self, epoch: u64) {
        let mut session = self.lock_session();
        if !session.is_current(epoch) {
            return;
        }
        session.teardown();
        session.state = ChannelState::Disconnected;
        tracing::info!(epoch, "Realtime channel closed by transport");
    }

    fn handle_frame(&self, epoch: u64, text: &str) {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(epoch, error = %e, raw_message = %text, "Failed to parse realtime frame");
                return;
            }
        };

        match frame {
            InboundFrame::Event { kind, data } => {
                if !self.lock_session().is_current(epoch) {
                    return;
                }
                let invoked = self.dispatch(kind, &data);
                tracing::debug!(epoch, %kind, invoked, "Realtime event dispatched");
            }
            InboundFrame::Error { message } => self.handle_connection_error(epoch, &message),
            InboundFrame::Pong => tracing::trace!(epoch, "Liveness pong"),
            InboundFrame::Unknown { event } => {
                tracing::debug!(epoch, event = %event, "Ignoring unknown realtime event");
            }
        }
    }

    fn handle_connection_error(&self, epoch: u64, message: &str) {
        if !self.lock_session().is_current(epoch) {
            return;
        }

        let error = SessionError::from_connection_error(message);
        match error {
            SessionError::Expiry { origin } => {
                tracing::info!(epoch, error = %message, "Server reported expired credential");
                self.begin_refresh(origin);
            }
            SessionError::FatalAuth { .. } => {
                tracing::warn!(epoch, error = %error, "Fatal authentication error");
                self.terminate_session(error);
            }
            _ => {
                tracing::warn!(epoch, error = %message, "Realtime connection error");
            }
        }
    }

    /// Close the current channel and hand it to the refresh protocol.
    ///
    /// Only one refresh runs at a time. A trigger that arrives while one is
    /// in flight does not start another; the in-flight refresh reconnects
    /// the channel instead.
    fn begin_refresh(&self, origin: ExpirySource) {
        let (epoch, in_flight) = {
            let mut session = self.lock_session();
            let epoch = session.teardown();
            session.state = ChannelState::Refreshing;
            session.refresh_epoch = epoch;
            let in_flight = std::mem::replace(&mut session.pending_refresh, true);
            (epoch, in_flight)
        };

        if in_flight {
            tracing::debug!(epoch, ?origin, "Refresh already in flight, awaiting its result");
            return;
        }

        tracing::info!(epoch, ?origin, "Refreshing access credential");

        let this = self.this.clone();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let outcome = request_refresh(store.as_ref()).await;
            if let Some(manager) = this.upgrade() {
                manager.finish_refresh(outcome);
            }
        });
    }

    fn finish_refresh(&self, outcome: Result<CredentialPair, SessionError>) {
        let (epoch, current) = {
            let mut session = self.lock_session();
            session.pending_refresh = false;
            (session.refresh_epoch, session.refresh_epoch == session.epoch)
        };

        match outcome {
            Ok(pair) => {
                if !self.store.is_authenticated() {
                    tracing::info!(epoch, "Session logged out during refresh, discarding credentials");
                    if current {
                        self.lock_session().state = ChannelState::Disconnected;
                    }
                    return;
                }

                let access = pair.access_token.clone();
                self.store.set_credentials(pair);

                if current {
                    tracing::info!(epoch, "Access credential refreshed, reconnecting");
                    self.connect(&access);
                } else {
                    tracing::info!(epoch, "Refresh superseded, not reconnecting");
                }
            }
            Err(error) if current => {
                tracing::warn!(epoch, error = %error, "Credential refresh failed");
                self.terminate_session(error);
            }
            Err(error) => {
                tracing::info!(epoch, error = %error, "Superseded refresh failed, ignoring");
            }
        }
    }

    /// Tear the session down: close the channel, clear stored
    /// credentials, and tell the user to log in again.
    fn terminate_session(&self, error: SessionError) {
        {
            let mut session = self.lock_session();
            session.teardown();
            session.state = ChannelState::Disconnected;
        }

        self.store.logout();
        if let Some(notice) = error.user_notice() {
            self.notifier.notify(NoticeLevel::Error, notice);
        }
    }
}

/// Exchange the stored refresh credential for a new pair.
async fn request_refresh(store: &dyn CredentialStore) -> Result<CredentialPair, SessionError> {
    let refresh = store
        .refresh_credential()
        .ok_or_else(|| SessionError::RefreshFailure("no refresh credential available".into()))?;

    let pair = store
        .refresh(&refresh)
        .await
        .map_err(|e| SessionError::RefreshFailure(e.to_string()))?;

    if credential::is_expired(&pair.access_token) {
        return Err(SessionError::RefreshFailure(
            "refreshed access credential is already expired".into(),
        ));
    }

    Ok(pair)
}
