//! # twentyone
//!
//! A real-time, multi-room blackjack ("21") server.
//!
//! Clients hold a WebSocket open, join a room by its five-digit code, and
//! play: the server deals, takes hit/stand actions, settles the hand, and
//! keeps every seat's view in sync. Rooms are created, queried and left
//! over a small HTTP API.
//!
//! ```text
//! WebSocket frames → Link (read loop) → Dispatcher → Registry / Room
//!                                                        │
//! client ◀── Link (writer) ◀── Outbox ◀── broadcast ◀────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use twentyone::prelude::*;
//!
//! # async fn run() -> Result<(), TwentyOneError> {
//! let server = TwentyOneServer::builder()
//!     .ws_bind("0.0.0.0:9001")
//!     .http_bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod api;
pub mod dispatch;
mod error;
mod handler;
mod server;

pub use error::TwentyOneError;
pub use server::{ServerConfig, TwentyOneServer, TwentyOneServerBuilder};

pub mod prelude {
    pub use crate::dispatch::Dispatcher;
    pub use crate::{
        ServerConfig, TwentyOneError, TwentyOneServer, TwentyOneServerBuilder,
    };
    pub use twentyone_protocol::{
        Envelope, MessageKind, PlayerId, RoomId, RoomStatus,
    };
    pub use twentyone_room::{Registry, TableConfig};
    pub use twentyone_transport::DEFAULT_OUTBOX_CAPACITY;
}
