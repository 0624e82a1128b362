//! Transport seam between the connection manager and the wire.
//!
//! A [`Transport`] opens one channel per call and reports its lifecycle
//! through [`TransportEvent`]s. The manager keeps the [`ChannelHandle`];
//! the transport drives the matching [`ChannelEndpoint`].

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::OutboundFrame;

/// Lifecycle and traffic events reported by an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed; the channel can carry traffic.
    Opened,
    /// A text frame arrived from the server.
    Message(String),
    /// The connection failed or the handshake was rejected.
    Error(String),
    /// The channel closed. No further events follow.
    Closed,
}

/// Manager-side half of a channel.
pub struct ChannelHandle {
    /// Events reported by the transport.
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Outbound frames to write to the wire.
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    /// Cancelled by the manager to close the channel.
    pub cancel: CancellationToken,
}

/// Transport-side half of a channel.
pub struct ChannelEndpoint {
    pub events: mpsc::UnboundedSender<TransportEvent>,
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    pub cancel: CancellationToken,
}

impl ChannelEndpoint {
    /// Report an event to the manager. Returns `false` once the manager
    /// has dropped its handle.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// Create a connected handle/endpoint pair sharing one cancellation token.
pub fn channel_pair() -> (ChannelHandle, ChannelEndpoint) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let handle = ChannelHandle {
        events: event_rx,
        outbound: outbound_tx,
        cancel: cancel.clone(),
    };
    let endpoint = ChannelEndpoint {
        events: event_tx,
        outbound: outbound_rx,
        cancel,
    };
    (handle, endpoint)
}

/// Opens realtime channels.
pub trait Transport: Send + Sync {
    /// Start opening a channel to `url` authenticated with `credential`.
    ///
    /// Must return immediately; connection progress is reported through
    /// the handle's event stream.
    fn open(&self, url: &str, credential: &str) -> ChannelHandle;
}
