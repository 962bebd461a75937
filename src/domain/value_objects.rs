//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

/// Connectivity state reported by a connection handle.
///
/// Mirrors the usual RPC channel lifecycle. The pool only reuses an idle
/// connection whose handle reports [`ConnectionState::Ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected and not trying to connect
    Idle,
    /// Connection attempt in progress
    Connecting,
    /// Usable for requests
    Ready,
    /// Failed, may recover
    TransientFailure,
    /// Closed, will never recover
    Shutdown,
}

impl ConnectionState {
    /// Whether a handle in this state may be handed out again.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::TransientFailure => "transient-failure",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
