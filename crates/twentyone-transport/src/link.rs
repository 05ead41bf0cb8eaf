//! Connection wrapper: a bounded outbound queue drained by a writer task,
//! and an inbound loop that hands each frame to a synchronous handler.
//!
//! ```text
//!   game logic ──Outbox::send──▶ [bounded queue] ──writer task──▶ socket
//!   socket ──Link::read_loop──▶ handler(frame)
//! ```
//!
//! [`Outbox::send`] never waits. When the queue is full the connection is
//! torn down on the spot: a slow consumer gets disconnected instead of
//! stalling whoever is broadcasting to it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{Connection, ConnectionId, TransportError};

/// Default number of frames an outbound queue can hold.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// How long the writer waits for the close handshake of a stuck peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct OutboxInner {
    conn_id: ConnectionId,
    /// `None` once the outbox is closed.
    queue: Mutex<Option<mpsc::Sender<String>>>,
    closed: watch::Sender<bool>,
}

/// Cheap, cloneable handle for queueing frames to one connection.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<OutboxInner>,
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("conn_id", &self.inner.conn_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Outbox {
    /// Creates an outbox and the receiving end of its queue.
    ///
    /// [`Link::open`] wires the receiver to a writer task; tests can read
    /// frames from it directly.
    pub fn new(
        conn_id: ConnectionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        let outbox = Self {
            inner: Arc::new(OutboxInner {
                conn_id,
                queue: Mutex::new(Some(tx)),
                closed,
            }),
        };
        (outbox, rx)
    }

    /// The connection this outbox feeds.
    pub fn id(&self) -> ConnectionId {
        self.inner.conn_id
    }

    /// Queues a frame without waiting.
    ///
    /// # Errors
    /// - [`TransportError::ConnectionClosed`] if the outbox is already closed.
    /// - [`TransportError::QueueFull`] if the queue was full; the outbox is
    ///   closed as a side effect.
    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        let mut queue = self.inner.queue.lock();
        let Some(tx) = queue.as_ref() else {
            return Err(TransportError::ConnectionClosed(format!(
                "{} is closed",
                self.inner.conn_id
            )));
        };

        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %self.inner.conn_id,
                    "outbound queue full, disconnecting slow consumer"
                );
                self.shut(&mut queue);
                Err(TransportError::QueueFull(self.inner.conn_id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shut(&mut queue);
                Err(TransportError::ConnectionClosed(format!(
                    "{} writer stopped",
                    self.inner.conn_id
                )))
            }
        }
    }

    /// Closes the outbox. Idempotent and callable from any task.
    ///
    /// Stops the writer and reader loops of the owning [`Link`]; the writer
    /// then closes the underlying connection.
    pub fn close(&self) {
        let mut queue = self.inner.queue.lock();
        self.shut(&mut queue);
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    fn shut(&self, queue: &mut Option<mpsc::Sender<String>>) {
        if queue.take().is_some() {
            self.inner.closed.send_replace(true);
            tracing::debug!(conn_id = %self.inner.conn_id, "outbox closed");
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }
}

/// Resolves once the outbox is closed (or every handle to it is gone).
async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

/// A live connection with its writer task running.
pub struct Link<C: Connection> {
    conn: Arc<C>,
    outbox: Outbox,
    writer: JoinHandle<()>,
}

impl<C: Connection> Link<C> {
    /// Wraps a connection, spawning the outbound writer loop.
    pub fn open(conn: C, capacity: usize) -> Self {
        let conn = Arc::new(conn);
        let (outbox, rx) = Outbox::new(conn.id(), capacity);
        let writer = tokio::spawn(write_loop(
            Arc::clone(&conn),
            rx,
            outbox.clone(),
        ));
        Self {
            conn,
            outbox,
            writer,
        }
    }

    /// The connection's identifier.
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// The outbox feeding this connection's writer.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Runs the inbound loop until the peer goes away, a read fails, or the
    /// outbox is closed. Each frame is passed to `handler` before the next
    /// one is read.
    ///
    /// On exit the outbox is closed and the writer task has finished, which
    /// means the underlying connection is closed too.
    pub async fn read_loop<F>(self, mut handler: F)
    where
        F: FnMut(String),
    {
        let conn_id = self.conn.id();
        let mut closed = self.outbox.subscribe();

        loop {
            let received = tokio::select! {
                biased;
                _ = wait_closed(&mut closed) => {
                    tracing::debug!(%conn_id, "reader stopped by close");
                    break;
                }
                received = self.conn.recv() => received,
            };

            match received {
                Ok(Some(frame)) => handler(frame),
                Ok(None) => {
                    tracing::debug!(%conn_id, "peer closed connection");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%conn_id, error = %e, "read failed");
                    break;
                }
            }
        }

        self.outbox.close();
        if let Err(e) = self.writer.await {
            tracing::debug!(%conn_id, error = %e, "writer task failed");
        }
    }
}

async fn write_loop<C: Connection>(
    conn: Arc<C>,
    mut rx: mpsc::Receiver<String>,
    outbox: Outbox,
) {
    let conn_id = conn.id();
    let mut closed = outbox.subscribe();

    loop {
        let frame = tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        // A peer that stops reading can park the write forever; closing
        // the outbox must still get through.
        tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => {
                tracing::debug!(%conn_id, "pending write abandoned on close");
                break;
            }
            sent = conn.send(&frame) => {
                if let Err(e) = sent {
                    tracing::debug!(%conn_id, error = %e, "write failed");
                    break;
                }
            }
        }
    }

    outbox.close();
    match tokio::time::timeout(CLOSE_TIMEOUT, conn.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "close failed"),
        Err(_) => tracing::debug!(%conn_id, "close timed out"),
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    /// In-memory connection: frames pushed by the test arrive through
    /// `recv`, frames written by the link land in `written`.
    struct MemoryConnection {
        id: ConnectionId,
        inbound: AsyncMutex<mpsc::UnboundedReceiver<Result<String, ()>>>,
        written: mpsc::UnboundedSender<String>,
        closes: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("memory connection failure")]
    struct MemoryError;

    impl Connection for MemoryConnection {
        type Error = MemoryError;

        async fn send(&self, frame: &str) -> Result<(), MemoryError> {
            self.written.send(frame.to_owned()).map_err(|_| MemoryError)
        }

        async fn recv(&self) -> Result<Option<String>, MemoryError> {
            match self.inbound.lock().await.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(())) => Err(MemoryError),
                None => Ok(None),
            }
        }

        async fn close(&self) -> Result<(), MemoryError> {
            self.closes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            self.id
        }
    }

    struct Harness {
        conn: MemoryConnection,
        push: mpsc::UnboundedSender<Result<String, ()>>,
        written: mpsc::UnboundedReceiver<String>,
        closes: Arc<std::sync::atomic::AtomicUsize>,
    }

    fn harness() -> Harness {
        let (push, inbound) = mpsc::unbounded_channel();
        let (written_tx, written) = mpsc::unbounded_channel();
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        Harness {
            conn: MemoryConnection {
                id: ConnectionId::new(9),
                inbound: AsyncMutex::new(inbound),
                written: written_tx,
                closes: Arc::clone(&closes),
            },
            push,
            written,
            closes,
        }
    }

    #[test]
    fn test_outbox_send_queues_in_order() {
        let (outbox, mut rx) = Outbox::new(ConnectionId::new(1), 4);
        outbox.send("a".into()).unwrap();
        outbox.send("b".into()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
    }

    #[test]
    fn test_outbox_full_queue_closes_connection() {
        let (outbox, _rx) = Outbox::new(ConnectionId::new(1), 2);
        outbox.send("1".into()).unwrap();
        outbox.send("2".into()).unwrap();

        let err = outbox.send("3".into()).unwrap_err();
        assert!(matches!(err, TransportError::QueueFull(_)));
        assert!(outbox.is_closed());

        // Further sends are refused rather than queued.
        let err = outbox.send("4".into()).unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed(_)));
    }

    #[test]
    fn test_outbox_close_is_idempotent() {
        let (outbox, mut rx) = Outbox::new(ConnectionId::new(1), 2);
        let other = outbox.clone();
        outbox.close();
        other.close();
        outbox.close();
        assert!(other.is_closed());
        // The queue sender was dropped, so the receiver sees the end.
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_link_delivers_frames_both_ways() {
        let mut h = harness();
        let link = Link::open(h.conn, 8);
        let outbox = link.outbox().clone();

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(link.read_loop(move |frame| {
            let _ = seen_tx.send(frame);
        }));

        h.push.send(Ok("hello".into())).unwrap();
        assert_eq!(seen_rx.recv().await.unwrap(), "hello");

        outbox.send("world".into()).unwrap();
        assert_eq!(h.written.recv().await.unwrap(), "world");

        // Peer hangs up: reader exits and the connection gets closed.
        drop(h.push);
        reader.await.unwrap();
        assert!(outbox.is_closed());
        assert_eq!(h.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_link_read_failure_closes() {
        let h = harness();
        let link = Link::open(h.conn, 8);
        let outbox = link.outbox().clone();
        let reader = tokio::spawn(link.read_loop(|_| {}));

        h.push.send(Err(())).unwrap();
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should stop on read failure")
            .unwrap();
        assert!(outbox.is_closed());
        assert_eq!(h.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_external_close_stops_reader() {
        let h = harness();
        let link = Link::open(h.conn, 8);
        let outbox = link.outbox().clone();
        let reader = tokio::spawn(link.read_loop(|_| {}));

        // Nothing is ever pushed; only the close can end the loop.
        outbox.close();
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should stop on close")
            .unwrap();
        assert_eq!(h.closes.load(std::sync::atomic::Ordering::SeqCst), 1);
        drop(h.push);
    }

    /// A peer that never drains: writes and reads stay pending forever.
    struct StalledConnection {
        closes: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Connection for StalledConnection {
        type Error = MemoryError;

        async fn send(&self, _frame: &str) -> Result<(), MemoryError> {
            std::future::pending().await
        }

        async fn recv(&self) -> Result<Option<String>, MemoryError> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<(), MemoryError> {
            self.closes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(13)
        }
    }

    #[tokio::test]
    async fn test_overflow_tears_down_link_stuck_in_write() {
        let closes = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let link = Link::open(
            StalledConnection {
                closes: Arc::clone(&closes),
            },
            1,
        );
        let outbox = link.outbox().clone();
        let reader = tokio::spawn(link.read_loop(|_| {}));

        // The first frame parks the writer inside `send`.
        outbox.send("first".into()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // The next one fills the queue, the one after overflows it.
        outbox.send("second".into()).unwrap();
        let err = outbox.send("third".into()).unwrap_err();
        assert!(matches!(err, TransportError::QueueFull(_)));

        tokio::time::timeout(Duration::from_secs(2), reader)
            .await
            .expect("link should finish despite the stuck write")
            .unwrap();
        assert!(outbox.is_closed());
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes_outbox() {
        let h = harness();
        // Dropping the written receiver makes every send fail.
        drop(h.written);
        let link = Link::open(h.conn, 8);
        let outbox = link.outbox().clone();
        let reader = tokio::spawn(link.read_loop(|_| {}));

        outbox.send("lost".into()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("write failure should end the link")
            .unwrap();
        assert!(outbox.is_closed());
        drop(h.push);
    }
}
