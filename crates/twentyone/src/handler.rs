//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Open a `Link`: the writer loop starts draining the outbox
//!   2. Loop: read frames and hand each to the dispatcher, in order
//!   3. On exit the outbox and socket are closed and every seat bound to
//!      this connection drops its outbox
//!
//! A closed connection does not unseat its player. The seat keeps its
//! state until an explicit leave, and a later connect or join from the
//! same player id rebinds a fresh connection to it.

use std::sync::Arc;

use twentyone_protocol::Codec;
use twentyone_transport::{Connection, Link};

use crate::dispatch::Dispatcher;

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, K>(
    conn: C,
    dispatcher: Arc<Dispatcher<K>>,
    capacity: usize,
) where
    C: Connection,
    K: Codec,
{
    let link = Link::open(conn, capacity);
    let conn_id = link.id();
    let outbox = link.outbox().clone();
    tracing::debug!(%conn_id, "handling new connection");

    link.read_loop(|frame| dispatcher.dispatch(&outbox, &frame))
        .await;

    let released = dispatcher.registry().disconnect(conn_id);
    tracing::debug!(%conn_id, seats = released, "connection finished");
}
