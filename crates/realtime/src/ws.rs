//! WebSocket transport for the realtime endpoint.
//!
//! [`WsTransport`] authenticates the handshake with an
//! `Authorization: Bearer <credential>` header and runs one task per
//! channel that pumps outbound frames to the socket and inbound text
//! frames back to the manager until the channel is cancelled or closes.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::task::TaskTracker;

use crate::protocol::error_message_from_body;
use crate::transport::{channel_pair, ChannelEndpoint, ChannelHandle, Transport, TransportEvent};

/// Production transport backed by `tokio-tungstenite`.
///
/// Requires a running tokio runtime: [`Transport::open`] spawns the
/// socket task.
#[derive(Debug, Default, Clone)]
pub struct WsTransport {
    tasks: TaskTracker,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `grace` for every socket task to exit.
    ///
    /// Call after the manager has disconnected so the final close frame
    /// reaches the server before the runtime stops. Returns `false` if
    /// the deadline passed first.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tasks.close();
        let finished = tokio::time::timeout(grace, self.tasks.wait()).await.is_ok();
        if !finished {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Realtime socket tasks still running at shutdown"
            );
        }
        finished
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, credential: &str) -> ChannelHandle {
        let (handle, endpoint) = channel_pair();
        self.tasks
            .spawn(run_socket(url.to_string(), credential.to_string(), endpoint));
        handle
    }
}

/// Errors raised while preparing the handshake request.
#[derive(Debug, thiserror::Error)]
pub enum WsTransportError {
    /// The endpoint URL could not be turned into a WebSocket request.
    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(#[from] tungstenite::Error),

    /// The credential contains bytes that are not valid in a header.
    #[error("Credential is not a valid header value")]
    InvalidCredential,
}

/// Build the handshake request carrying the bearer credential.
pub fn build_request(url: &str, credential: &str) -> Result<Request, WsTransportError> {
    let mut request = url.into_client_request()?;
    let value = HeaderValue::from_str(&format!("Bearer {credential}"))
        .map_err(|_| WsTransportError::InvalidCredential)?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

/// Turn a handshake failure into the message the server sent, when it
/// sent one, so that auth errors can be classified.
pub fn describe_handshake_error(error: &tungstenite::Error) -> String {
    match error {
        tungstenite::Error::Http(response) => response
            .body()
            .as_deref()
            .and_then(error_message_from_body)
            .unwrap_or_else(|| format!("Handshake rejected with HTTP {}", response.status())),
        other => other.to_string(),
    }
}

/// Drive a single channel from handshake to close.
async fn run_socket(url: String, credential: String, mut endpoint: ChannelEndpoint) {
    let request = match build_request(&url, &credential) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build realtime handshake");
            endpoint.emit(TransportEvent::Error(e.to_string()));
            endpoint.emit(TransportEvent::Closed);
            return;
        }
    };

    tracing::debug!(url = %url, "Connecting to realtime endpoint");

    let connected = tokio::select! {
        _ = endpoint.cancel.cancelled() => {
            tracing::debug!("Handshake cancelled");
            return;
        }
        result = connect_async(request) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            let message = describe_handshake_error(&e);
            tracing::warn!(url = %url, error = %message, "Realtime handshake failed");
            endpoint.emit(TransportEvent::Error(message));
            endpoint.emit(TransportEvent::Closed);
            return;
        }
    };

    tracing::info!(url = %url, "Realtime WebSocket connected");
    endpoint.emit(TransportEvent::Opened);

    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            _ = endpoint.cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                tracing::debug!("Realtime channel closed by client");
                return;
            }
            frame = endpoint.outbound.recv() => {
                let Some(frame) = frame else { break };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, ?frame, "Failed to serialize outbound frame");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "Failed to send realtime frame");
                    endpoint.emit(TransportEvent::Error(e.to_string()));
                    break;
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !endpoint.emit(TransportEvent::Message(text)) {
                            return;
                        }
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Realtime server closed WebSocket");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary / Frame: not part of the protocol.
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Realtime receive error");
                        endpoint.emit(TransportEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!("Realtime stream exhausted");
                        break;
                    }
                }
            }
        }
    }

    endpoint.emit(TransportEvent::Closed);
}
