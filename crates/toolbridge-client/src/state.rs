//! Connection lifecycle states.

use std::fmt;

/// Where a [`Client`](crate::Client) is in its connection lifecycle.
///
/// ```text
/// Idle ──► Connecting ──► Handshaking ──► Ready ──► Disconnected
///              │               │                         │
///              └──► Error ◄────┘                         └──► Connecting
/// ```
///
/// `Error` is a failed connection that still holds resources; it only leaves
/// through `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClientState {
    /// Never connected.
    #[default]
    Idle,
    /// Opening the transport.
    Connecting,
    /// Exchanging `initialize` and running discovery.
    Handshaking,
    /// Connected and discovered; tool calls are accepted.
    Ready,
    /// Torn down. May connect again.
    Disconnected,
    /// Connection setup failed. Call `disconnect` before reconnecting.
    Error,
}

impl ClientState {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle | Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Handshaking)
                | (Self::Handshaking, Self::Ready)
                | (Self::Connecting | Self::Handshaking, Self::Error)
                | (
                    Self::Connecting | Self::Handshaking | Self::Ready | Self::Error,
                    Self::Disconnected
                )
        )
    }

    /// Whether the client holds (or is building) a connection.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Handshaking | Self::Ready)
    }

    /// Whether `connect` is accepted from this state.
    #[must_use]
    pub const fn can_connect(self) -> bool {
        matches!(self, Self::Idle | Self::Disconnected)
    }

    /// Lowercase name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
