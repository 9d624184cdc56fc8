//! Per-connection handler: attach, event pump, detach.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Attach the connection to the table (registers its outbound channel)
//!   2. Loop: decode incoming frames → forward to the table;
//!      drain table events → encode → send
//!   3. Detach on exit, however the loop ends
//!
//! There is no handshake phase: a connection has no identity until the
//! table approves its `join-request`, and every rule about identity lives
//! in the table, not here.

use std::sync::Arc;
use std::time::Duration;

use pokeroll_protocol::{ClientEvent, Codec, ConnectionId};
use pokeroll_table::TableHandle;
use pokeroll_transport::{Connection, WebSocketConnection};

use crate::PokerollError;
use crate::server::ServerState;

/// How long a socket may stay silent before the handler gives up on it.
///
/// Identity liveness is the table's sweep; this timeout only reaps
/// sockets that never speak at all (clients heartbeat every few seconds,
/// so a live one is never this quiet).
const RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// Drop guard that detaches the connection from the table when the
/// handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async send.
struct DetachGuard {
    conn: ConnectionId,
    table: TableHandle,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let conn = self.conn;
        let table = self.table.clone();
        tokio::spawn(async move {
            let _ = table.detach(conn).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), PokerollError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    state.table.attach(conn_id, event_tx).await?;
    let _guard = DetachGuard {
        conn: conn_id,
        table: state.table.clone(),
    };

    loop {
        tokio::select! {
            // Table events destined for this connection.
            outbound = event_rx.recv() => {
                let Some(event) = outbound else {
                    // Table dropped our sender; it is shutting down.
                    break;
                };
                let bytes = state.codec.encode(&event)?;
                conn.send(&bytes).await.map_err(PokerollError::Transport)?;
            }

            // Incoming frames. conn.recv() is cancel-safe: cancelling
            // between polls leaves any partial frame buffered in the
            // stream.
            incoming = tokio::time::timeout(RECV_TIMEOUT, conn.recv()) => {
                let data = match incoming {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        tracing::info!(%conn_id, "connection timed out");
                        break;
                    }
                };

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(
                            %conn_id, error = %e, "failed to decode event"
                        );
                        continue;
                    }
                };

                state.table.event(conn_id, event).await?;
            }
        }
    }

    // _guard drops here → detach fires.
    Ok(())
}
