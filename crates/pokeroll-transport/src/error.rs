//! Error types for the transport layer.

/// Errors from the listener or an individual connection.
///
/// Connection-scoped failures (`SendFailed`, `ReceiveFailed`) end that one
/// connection's handler; a listener failure is logged by the accept loop,
/// which keeps accepting.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A listener operation failed: bind, local-address lookup, accept,
    /// or the WebSocket upgrade.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading the next frame from the peer failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
