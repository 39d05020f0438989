use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use nvrpc_codec::{Decoder, Encoder, Value};
use nvrpc_transport::{ChannelWriter, ChunkStream, TransportError};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, trace, warn};

use crate::config::{OverflowPolicy, SessionConfig};
use crate::error::{RemoteError, Result, SessionError};
use crate::message::{Message, Notification, Outcome, Request, RequestId};
use crate::store::CorrelationStore;

/// Client handle of a msgpack-RPC session.
///
/// Cheap to clone; every clone shares one write lock and one correlation
/// store. The session lives as long as its [`Driver`] runs: once the driver
/// returns (or is dropped) pending calls fail with [`SessionError::Closed`]
/// and new calls fail fast with the same error.
pub struct Session<W> {
    shared: Arc<Shared<W>>,
}

struct Shared<W> {
    store: Arc<CorrelationStore>,
    outbound: Mutex<Outbound<W>>,
    config: SessionConfig,
}

/// Everything a write needs, behind one lock so encode-then-write is atomic.
struct Outbound<W> {
    encoder: Encoder,
    writer: W,
}

/// Ordered batches of inbound notifications.
///
/// Each batch holds the notifications decoded from one inbound read. The
/// stream ends after the session is torn down and the queued batches are
/// consumed.
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::Receiver<Vec<Notification>>,
}

/// The session's read loop. Spawn [`Driver::run`] on the runtime.
pub struct Driver<R> {
    inbound: R,
    decoder: Decoder,
    store: Arc<CorrelationStore>,
    notifications: mpsc::Sender<Vec<Notification>>,
    overflow: OverflowPolicy,
    subscriber_gone: bool,
}

impl<W> Clone for Session<W> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<W: ChannelWriter> Session<W> {
    /// Build a session over the two halves of a channel.
    ///
    /// Nothing is read until the returned [`Driver`] runs.
    pub fn new<R: ChunkStream>(
        inbound: R,
        writer: W,
        config: SessionConfig,
    ) -> (Self, Notifications, Driver<R>) {
        let store = Arc::new(CorrelationStore::new(config.request_id_ceiling));
        let (tx, rx) = mpsc::channel(config.notification_capacity.max(1));

        let driver = Driver {
            inbound,
            decoder: Decoder::new(),
            store: Arc::clone(&store),
            notifications: tx,
            overflow: config.overflow,
            subscriber_gone: false,
        };
        let session = Self {
            shared: Arc::new(Shared {
                store,
                outbound: Mutex::new(Outbound {
                    encoder: Encoder::new(),
                    writer,
                }),
                config,
            }),
        };
        (session, Notifications { rx }, driver)
    }

    /// Send a request and wait for its response.
    ///
    /// Dropping the returned future after the request went out does not
    /// retract it; the response still clears the pending entry when it
    /// arrives.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let store = &self.shared.store;
        let id = store.issue_id();
        let (tx, rx) = oneshot::channel();
        store
            .register(
                id,
                Box::new(move |completion| {
                    // The caller may have stopped waiting.
                    let _ = tx.send(completion);
                }),
            )
            .map_err(|_| SessionError::Closed)?;

        trace!(%id, method, "sending request");
        if let Err(err) = self.send(vec![Request::new(id, method, params).into()]).await {
            store.forget(id);
            return Err(err);
        }

        match rx.await {
            Ok(Ok(Outcome::Success(result))) => Ok(result),
            Ok(Ok(Outcome::Failure(error))) => Err(RemoteError(error).into()),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Send a request without waiting for (or tracking) its response.
    ///
    /// The request still gets a fresh id; a response to it is ignored.
    pub async fn fast_call(&self, method: &str, params: Vec<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let id = self.shared.store.issue_id();
        trace!(%id, method, "sending untracked request");
        self.send(vec![Request::new(id, method, params).into()]).await
    }

    /// Send several untracked requests in a single write.
    ///
    /// No other caller's bytes can land between them. Returns the ids in
    /// call order; an empty batch writes nothing.
    pub async fn fast_calls_transaction<I, M>(&self, calls: I) -> Result<Vec<RequestId>>
    where
        I: IntoIterator<Item = (M, Vec<Value>)>,
        M: Into<String>,
    {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let store = &self.shared.store;
        let (ids, messages): (Vec<RequestId>, Vec<Message>) = calls
            .into_iter()
            .map(|(method, params)| {
                let id = store.issue_id();
                (id, Request::new(id, method, params).into())
            })
            .unzip();

        if messages.is_empty() {
            return Ok(ids);
        }
        trace!(count = messages.len(), "sending request batch");
        self.send(messages).await?;
        Ok(ids)
    }

    /// Encode `messages` into one buffer and write it under the write lock.
    ///
    /// The write runs on its own task so a caller dropping its future cannot
    /// leave half a frame on the wire.
    async fn send(&self, messages: Vec<Message>) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let write = tokio::spawn(async move {
            let mut outbound = shared.outbound.lock().await;
            let Outbound { encoder, writer } = &mut *outbound;
            for message in messages {
                encoder.append(&message.into_value());
            }
            let bytes = encoder.finish();
            writer.write(bytes).await
        });

        match write.await {
            Ok(result) => result.map_err(SessionError::from),
            Err(join) => Err(TransportError::Io(std::io::Error::other(join)).into()),
        }
    }

    /// True once the read loop has ended.
    pub fn is_closed(&self) -> bool {
        self.shared.store.is_closed()
    }

    /// Number of calls waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.store.pending_len()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }
}

impl<W> std::fmt::Debug for Session<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.shared.store)
            .field("config", &self.shared.config)
            .finish()
    }
}

impl Notifications {
    /// Next batch, or `None` once the session is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<Vec<Notification>> {
        self.rx.recv().await
    }

    /// Next batch if one is queued right now.
    pub fn try_recv(&mut self) -> Option<Vec<Notification>> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Notifications {
    type Item = Vec<Notification>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl<R: ChunkStream> Driver<R> {
    /// Read until the channel closes or fails.
    ///
    /// Returns `Ok(())` on a clean end of stream. A read failure, malformed
    /// MessagePack or a value that is not a msgpack-RPC message ends the
    /// session with the corresponding error. Either way every pending call is
    /// failed with [`SessionError::Closed`] before this returns.
    pub async fn run(mut self) -> Result<()> {
        let result = self.read_loop().await;
        match &result {
            Ok(()) => debug!("channel closed; ending session"),
            Err(err) => error!(%err, "session read loop failed"),
        }
        result
    }

    async fn read_loop(&mut self) -> Result<()> {
        loop {
            let Some(chunk) = poll_fn(|cx| Pin::new(&mut self.inbound).poll_next(cx)).await else {
                return Ok(());
            };
            let chunk = chunk.map_err(TransportError::Io)?;
            trace!(len = chunk.len(), "inbound chunk");

            let mut batch = Vec::new();
            for value in self.decoder.feed(&chunk)? {
                match Message::from_value(value)? {
                    Message::Response(response) => {
                        trace!(id = %response.id, success = response.outcome.is_success(), "response");
                        self.store.resolve(response.id, response.outcome);
                    }
                    Message::Notification(notification) => batch.push(notification),
                    Message::Request(request) => {
                        warn!(
                            id = %request.id,
                            method = %request.method,
                            "dropping inbound request; this session only acts as a client"
                        );
                    }
                }
            }

            if !batch.is_empty() {
                self.deliver(batch).await;
            }
        }
    }

    async fn deliver(&mut self, batch: Vec<Notification>) {
        if self.subscriber_gone {
            return;
        }
        let delivered = match self.overflow {
            OverflowPolicy::Backpressure => self.notifications.send(batch).await.is_ok(),
            OverflowPolicy::DropNewest => match self.notifications.try_send(batch) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(batch)) => {
                    warn!(dropped = batch.len(), "notification queue full; dropping batch");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        };
        if !delivered {
            debug!("notification receiver dropped; discarding further notifications");
            self.subscriber_gone = true;
        }
    }
}

impl<R> Drop for Driver<R> {
    fn drop(&mut self) {
        let failed = self.store.drain_all(|| SessionError::Closed);
        if failed > 0 {
            debug!(failed, "failed pending calls on session teardown");
        }
    }
}

impl<R> std::fmt::Debug for Driver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("decoder", &self.decoder)
            .field("overflow", &self.overflow)
            .finish_non_exhaustive()
    }
}
