//! Unified error type for the Pokeroll server.

use pokeroll_dex::DexError;
use pokeroll_protocol::ProtocolError;
use pokeroll_table::TableError;
use pokeroll_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Server and handler code deals with this single type instead of
/// importing errors from each sub-crate. The `#[from]` attribute on each
/// variant auto-generates `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PokerollError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The table actor is gone.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Species data failed to load.
    #[error(transparent)]
    Dex(#[from] DexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let io = std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "peer reset",
        );
        let top: PokerollError = TransportError::ReceiveFailed(io).into();
        assert!(matches!(top, PokerollError::Transport(_)));
        assert!(top.to_string().contains("peer reset"));
    }

    #[test]
    fn test_from_table_error() {
        let top: PokerollError = TableError::Unavailable.into();
        assert!(matches!(top, PokerollError::Table(_)));
    }

    #[test]
    fn test_from_dex_error() {
        let top: PokerollError = DexError::Empty.into();
        assert!(matches!(top, PokerollError::Dex(_)));
        assert!(top.to_string().contains("no species"));
    }
}
