//! `TwentyOneServer` builder and server loop.
//!
//! This is the entry point for running a blackjack server. It ties
//! together all the layers: transport → protocol → room, plus the HTTP
//! room API served alongside the WebSocket listener.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use twentyone_room::{Registry, TableConfig};
use twentyone_transport::{
    DEFAULT_OUTBOX_CAPACITY, Transport, WebSocketTransport,
};

use crate::dispatch::Dispatcher;
use crate::handler::handle_connection;
use crate::{TwentyOneError, api};

/// Listener addresses and table limits.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Where WebSocket clients connect.
    pub ws_addr: String,
    /// Where the HTTP room API listens.
    pub http_addr: String,
    /// Frames queued per connection before a slow client is dropped.
    pub outbox_capacity: usize,
    pub table: TableConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_addr: "127.0.0.1:9001".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            table: TableConfig::default(),
        }
    }
}

/// Builder for configuring and starting a server.
///
/// # Example
///
/// ```rust,no_run
/// # use twentyone::prelude::*;
/// # async fn run() -> Result<(), TwentyOneError> {
/// let server = TwentyOneServer::builder()
///     .ws_bind("0.0.0.0:9001")
///     .http_bind("0.0.0.0:8080")
///     .outbox_capacity(128)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TwentyOneServerBuilder {
    config: ServerConfig,
}

impl TwentyOneServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the WebSocket listener address.
    pub fn ws_bind(mut self, addr: &str) -> Self {
        self.config.ws_addr = addr.to_string();
        self
    }

    /// Sets the HTTP listener address.
    pub fn http_bind(mut self, addr: &str) -> Self {
        self.config.http_addr = addr.to_string();
        self
    }

    pub fn outbox_capacity(mut self, capacity: usize) -> Self {
        self.config.outbox_capacity = capacity;
        self
    }

    pub fn table_config(mut self, table: TableConfig) -> Self {
        self.config.table = table;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Validates the configuration and binds both listeners.
    pub async fn build(self) -> Result<TwentyOneServer, TwentyOneError> {
        let ServerConfig {
            ws_addr,
            http_addr,
            outbox_capacity,
            table,
        } = self.config;
        let table = table.validated()?;

        let transport = WebSocketTransport::bind(&ws_addr).await?;
        let http = TcpListener::bind(&http_addr)
            .await
            .map_err(TwentyOneError::Http)?;

        let registry = Arc::new(Registry::new(table));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&registry)));

        Ok(TwentyOneServer {
            transport,
            http,
            registry,
            dispatcher,
            outbox_capacity: outbox_capacity.max(1),
        })
    }
}

impl Default for TwentyOneServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, not yet running, blackjack server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct TwentyOneServer {
    transport: WebSocketTransport,
    http: TcpListener,
    registry: Arc<Registry>,
    dispatcher: Arc<Dispatcher>,
    outbox_capacity: usize,
}

impl TwentyOneServer {
    /// Creates a new builder.
    pub fn builder() -> TwentyOneServerBuilder {
        TwentyOneServerBuilder::new()
    }

    /// Returns the address the WebSocket listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the address the HTTP API is bound to.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// The room registry shared by both listeners.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Runs the HTTP API and the WebSocket accept loop.
    ///
    /// Each accepted connection gets its own handler task. Runs until the
    /// process is terminated or the HTTP server fails.
    pub async fn run(self) -> Result<(), TwentyOneError> {
        let TwentyOneServer {
            mut transport,
            http,
            registry,
            dispatcher,
            outbox_capacity,
        } = self;

        let app = api::router(registry);
        let mut http = tokio::spawn(async move { axum::serve(http, app).await });
        tracing::info!(
            ws = ?transport.local_addr().ok(),
            "twentyone server running"
        );

        loop {
            tokio::select! {
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        tokio::spawn(handle_connection(
                            conn,
                            Arc::clone(&dispatcher),
                            outbox_capacity,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
                finished = &mut http => {
                    let err = match finished {
                        Ok(Ok(())) => std::io::Error::other("http server stopped"),
                        Ok(Err(e)) => e,
                        Err(e) => std::io::Error::other(e),
                    };
                    tracing::error!(error = %err, "http server exited");
                    return Err(TwentyOneError::Http(err));
                }
            }
        }
    }
}
