//! `PokerollServer` builder and server loop.
//!
//! This is the entry point for running a Pokeroll table server. It ties
//! together all the layers: transport → protocol → table.

use std::sync::Arc;

use pokeroll_dex::Pokedex;
use pokeroll_protocol::{Codec, JsonCodec};
use pokeroll_table::{TableConfig, TableHandle, spawn_table};
use pokeroll_transport::{Transport, WebSocketTransport};

use crate::PokerollError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The table
/// handle is itself a cheap channel clone; only the codec lives here
/// directly.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) table: TableHandle,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Pokeroll server.
///
/// # Example
///
/// ```rust,ignore
/// use pokeroll::PokerollServerBuilder;
///
/// let server = PokerollServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PokerollServerBuilder {
    bind_addr: String,
    table_config: TableConfig,
    dex: Option<Arc<Pokedex>>,
}

impl PokerollServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            table_config: TableConfig::default(),
            dex: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the table configuration.
    pub fn table_config(mut self, config: TableConfig) -> Self {
        self.table_config = config;
        self
    }

    /// Sets the species dex the table draws from.
    ///
    /// Defaults to the bundled dataset.
    pub fn dex(mut self, dex: Pokedex) -> Self {
        self.dex = Some(Arc::new(dex));
        self
    }

    /// Builds and starts the server.
    ///
    /// Binds the WebSocket transport and spawns the table actor. Uses
    /// `JsonCodec`, the format the browser clients speak.
    pub async fn build(
        self,
    ) -> Result<PokerollServer<JsonCodec>, PokerollError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let dex = self
            .dex
            .unwrap_or_else(|| Arc::new(Pokedex::bundled()));
        let table = spawn_table(self.table_config, dex);

        let state = Arc::new(ServerState {
            table,
            codec: JsonCodec,
        });

        Ok(PokerollServer { transport, state })
    }
}

impl Default for PokerollServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Pokeroll table server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PokerollServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl<C> PokerollServer<C>
where
    C: Codec + Clone + 'static,
{
    /// Creates a new builder.
    pub fn builder() -> PokerollServerBuilder {
        PokerollServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, PokerollError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), PokerollError> {
        tracing::info!("Pokeroll server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
