//! Realtime event vocabulary and channel lifecycle states.
//!
//! Event names are the wire tags used in the `"event"` field of every
//! realtime frame.

/// Inbound: a notification was created for the current user.
pub const EVENT_NOTIFICATION: &str = "notification";

/// Inbound: someone liked the user's content.
pub const EVENT_LIKE: &str = "like";

/// Inbound: someone commented on the user's content.
pub const EVENT_COMMENT: &str = "comment";

/// Outbound: mark a notification as read.
pub const EVENT_MARK_READ: &str = "notification:read";

/// Outbound liveness signal.
pub const EVENT_PING: &str = "ping";

/// Inbound liveness reply. Ignored.
pub const EVENT_PONG: &str = "pong";

/// Inbound: the server refused the connection handshake.
pub const EVENT_CONNECT_ERROR: &str = "connect_error";

/// Inbound: generic server-side error on an established channel.
pub const EVENT_ERROR: &str = "error";

/// Inbound event kinds that subscribers can listen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Notification,
    Like,
    Comment,
}

impl EventKind {
    /// Every subscribable kind, in a stable order.
    pub const ALL: [EventKind; 3] = [Self::Notification, Self::Like, Self::Comment];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Notification => EVENT_NOTIFICATION,
            Self::Like => EVENT_LIKE,
            Self::Comment => EVENT_COMMENT,
        }
    }

    /// Map a wire tag to a kind. Returns `None` for tags that are not
    /// subscribable events.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Refreshing,
}

impl ChannelState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Refreshing => "refreshing",
        }
    }
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
