//! Shared fakes for connection manager integration tests.
//!
//! [`MockTransport`] records every channel the manager opens and lets the
//! test play the server side; [`MemoryStore`] is an in-memory credential
//! store whose refresh can be held open to simulate an in-flight request;
//! [`RecordingNotifier`] captures user notices.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use campus_core::credential::CredentialPair;
use campus_core::types::now_secs;
use campus_realtime::protocol::OutboundFrame;
use campus_realtime::transport::{channel_pair, ChannelEndpoint, ChannelHandle};
use campus_realtime::{
    AuthError, ConnectionManager, CredentialStore, NoticeLevel, Notifier, RealtimeConfig,
    Transport, TransportEvent,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::sync::Semaphore;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Sign a token whose `exp` is `offset_secs` from now.
pub fn token_expiring_in(offset_secs: i64) -> String {
    let claims = serde_json::json!({
        "sub": "student-1",
        "exp": now_secs() + offset_secs,
        "nonce": NONCE.fetch_add(1, Ordering::Relaxed),
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"campus-test-secret"),
    )
    .expect("token encoding should succeed")
}

static NONCE: AtomicUsize = AtomicUsize::new(0);

pub fn valid_token() -> String {
    token_expiring_in(15 * 60)
}

pub fn expired_token() -> String {
    token_expiring_in(-10)
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A channel opened by the manager, as seen from the server side.
pub struct OpenedChannel {
    pub url: String,
    pub credential: String,
    pub endpoint: ChannelEndpoint,
}

#[derive(Default)]
pub struct MockTransport {
    opened: Mutex<Vec<OpenedChannel>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn credential(&self, index: usize) -> String {
        self.opened.lock().unwrap()[index].credential.clone()
    }

    pub fn url(&self, index: usize) -> String {
        self.opened.lock().unwrap()[index].url.clone()
    }

    /// Deliver `event` on channel `index`.
    pub fn emit(&self, index: usize, event: TransportEvent) {
        self.opened.lock().unwrap()[index].endpoint.emit(event);
    }

    /// Deliver a server text frame on channel `index`.
    pub fn emit_frame(&self, index: usize, frame: serde_json::Value) {
        self.emit(index, TransportEvent::Message(frame.to_string()));
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        self.opened.lock().unwrap()[index].endpoint.cancel.is_cancelled()
    }

    /// Drain every frame the manager has queued on channel `index`.
    pub fn outbound(&self, index: usize) -> Vec<OutboundFrame> {
        let mut opened = self.opened.lock().unwrap();
        let mut frames = Vec::new();
        while let Ok(frame) = opened[index].endpoint.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &str, credential: &str) -> ChannelHandle {
        let (handle, endpoint) = channel_pair();
        self.opened.lock().unwrap().push(OpenedChannel {
            url: url.to_string(),
            credential: credential.to_string(),
            endpoint,
        });
        handle
    }
}

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

/// What the next refresh call returns.
#[derive(Clone)]
pub enum RefreshOutcome {
    Succeed(CredentialPair),
    Reject,
}

pub struct MemoryStore {
    pair: Mutex<Option<CredentialPair>>,
    authenticated: AtomicBool,
    outcome: Mutex<RefreshOutcome>,
    refresh_calls: AtomicUsize,
    /// When set, each refresh waits for a permit before answering.
    gate: Option<Semaphore>,
}

impl MemoryStore {
    fn build(pair: Option<CredentialPair>, outcome: RefreshOutcome, gated: bool) -> Arc<Self> {
        Arc::new(Self {
            authenticated: AtomicBool::new(pair.is_some()),
            pair: Mutex::new(pair),
            outcome: Mutex::new(outcome),
            refresh_calls: AtomicUsize::new(0),
            gate: gated.then(|| Semaphore::new(0)),
        })
    }

    /// Logged-in store whose refresh answers immediately.
    pub fn new(pair: CredentialPair, outcome: RefreshOutcome) -> Arc<Self> {
        Self::build(Some(pair), outcome, false)
    }

    /// Logged-in store whose refresh blocks until [`release`](Self::release).
    pub fn gated(pair: CredentialPair, outcome: RefreshOutcome) -> Arc<Self> {
        Self::build(Some(pair), outcome, true)
    }

    /// Store with no credentials at all.
    pub fn empty() -> Arc<Self> {
        Self::build(None, RefreshOutcome::Reject, false)
    }

    /// Let one pending refresh answer.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<CredentialPair> {
        self.pair.lock().unwrap().clone()
    }

    pub fn is_authenticated_now(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Simulate a fresh login.
    pub fn set_logged_in(&self, pair: CredentialPair) {
        *self.pair.lock().unwrap() = Some(pair);
        self.authenticated.store(true, Ordering::SeqCst);
    }

    /// Simulate the user logging out from elsewhere in the app.
    pub fn log_out_now(&self) {
        *self.pair.lock().unwrap() = None;
        self.authenticated.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    fn access_credential(&self) -> Option<String> {
        self.current().map(|p| p.access_token)
    }

    fn refresh_credential(&self) -> Option<String> {
        self.current().map(|p| p.refresh_token)
    }

    async fn refresh(&self, _refresh_credential: &str) -> Result<CredentialPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            RefreshOutcome::Succeed(pair) => Ok(pair),
            RefreshOutcome::Reject => Err(AuthError::Rejected {
                status: 401,
                body: "refresh token expired".into(),
            }),
        }
    }

    fn set_credentials(&self, pair: CredentialPair) {
        *self.pair.lock().unwrap() = Some(pair);
        self.authenticated.store(true, Ordering::SeqCst);
    }

    fn clear(&self) {
        *self.pair.lock().unwrap() = None;
    }

    fn logout(&self) {
        self.clear();
        self.authenticated.store(false, Ordering::SeqCst);
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub const TEST_URL: &str = "ws://realtime.test/realtime";

pub struct Harness {
    pub manager: Arc<ConnectionManager>,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn harness(store: Arc<MemoryStore>) -> Harness {
    let transport = MockTransport::new();
    let notifier = RecordingNotifier::new();
    let config = RealtimeConfig {
        url: TEST_URL.to_string(),
        ..RealtimeConfig::default()
    };
    let manager = ConnectionManager::new(
        config,
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&transport) as Arc<dyn Transport>,
    );
    Harness {
        manager,
        transport,
        store,
        notifier,
    }
}

/// Yield to spawned tasks until `cond` holds.
pub async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Yield to spawned tasks a fixed number of times.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
