use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use nvrpc_codec::{encode, Decoder, ParseError, Value};
use nvrpc_session::{
    FrameError, Message, Notification, OverflowPolicy, Request, RequestId, Response, Session,
    SessionConfig, SessionError,
};
use nvrpc_transport::{from_io, ChannelWriter, ChunkStream, IoWriter, TransportError};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, WriteHalf};
use tokio::task::JoinHandle;

type DuplexSession = Session<IoWriter<WriteHalf<DuplexStream>>>;

/// The far end of the channel, standing in for nvim.
struct Peer {
    stream: DuplexStream,
    decoder: Decoder,
    ready: VecDeque<Value>,
}

impl Peer {
    async fn next_message(&mut self) -> Message {
        loop {
            if let Some(value) = self.ready.pop_front() {
                return Message::from_value(value).expect("session sent a valid message");
            }
            let mut buf = [0u8; 4096];
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "session closed its write half");
            self.ready.extend(self.decoder.feed(&buf[..n]).unwrap());
        }
    }

    async fn next_request(&mut self) -> Request {
        match self.next_message().await {
            Message::Request(request) => request,
            other => panic!("expected a request, got {other:?}"),
        }
    }

    async fn send(&mut self, message: impl Into<Message>) {
        let bytes = encode(&message.into().into_value());
        self.stream.write_all(&bytes).await.unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }
}

fn connect(
    config: SessionConfig,
) -> (
    DuplexSession,
    nvrpc_session::Notifications,
    JoinHandle<nvrpc_session::Result<()>>,
    Peer,
) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (read, write) = tokio::io::split(client);
    let (inbound, writer) = from_io(read, write);
    let (session, notifications, driver) = Session::new(inbound, writer, config);
    let driver = tokio::spawn(driver.run());
    let peer = Peer {
        stream: server,
        decoder: Decoder::new(),
        ready: VecDeque::new(),
    };
    (session, notifications, driver, peer)
}

/// Records every write as one entry.
#[derive(Clone, Default)]
struct RecordingWriter {
    writes: Arc<Mutex<Vec<Bytes>>>,
}

impl ChannelWriter for RecordingWriter {
    async fn write(&mut self, bytes: Bytes) -> nvrpc_transport::Result<()> {
        self.writes.lock().unwrap().push(bytes);
        Ok(())
    }
}

struct ClosedWriter;

impl ChannelWriter for ClosedWriter {
    async fn write(&mut self, _bytes: Bytes) -> nvrpc_transport::Result<()> {
        Err(TransportError::Closed)
    }
}

fn never_inbound() -> impl ChunkStream {
    futures_util::stream::pending::<io::Result<Bytes>>()
}

fn chunks_inbound(chunks: Vec<Vec<u8>>) -> impl ChunkStream {
    futures_util::stream::iter(chunks.into_iter().map(|c| Ok::<_, io::Error>(Bytes::from(c))))
}

fn notification(method: &str, n: i64) -> Notification {
    Notification::new(method, vec![Value::from(n)])
}

fn wire(message: impl Into<Message>) -> Vec<u8> {
    encode(&message.into().into_value()).to_vec()
}

#[tokio::test]
async fn call_returns_the_result() {
    let (session, _notifications, _driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("nvim_get_api_info", vec![]).await })
    };

    let request = peer.next_request().await;
    assert_eq!(request.method, "nvim_get_api_info");
    assert!(request.params.is_empty());
    peer.send(Response::success(request.id, Value::from("ok"))).await;

    assert_eq!(caller.await.unwrap().unwrap(), Value::from("ok"));
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn call_surfaces_remote_error_verbatim() {
    let (session, _notifications, _driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("nvim_nope", vec![Value::from(1)]).await })
    };

    let request = peer.next_request().await;
    let error = Value::Array(vec![Value::from(0), Value::from("Invalid method: nvim_nope")]);
    peer.send(Response::failure(request.id, error.clone())).await;

    match caller.await.unwrap() {
        Err(SessionError::Remote(remote)) => {
            assert_eq!(remote.value(), &error);
            assert_eq!(remote.message(), Some("Invalid method: nvim_nope"));
        }
        other => panic!("expected a remote error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_get_distinct_ids_and_their_own_results() {
    const CALLS: i64 = 64;
    let (session, _notifications, _driver, mut peer) = connect(SessionConfig::default());

    let callers: Vec<_> = (0..CALLS)
        .map(|n| {
            let session = session.clone();
            tokio::spawn(async move { (n, session.call("echo", vec![Value::from(n)]).await) })
        })
        .collect();

    let mut requests = Vec::new();
    for _ in 0..CALLS {
        requests.push(peer.next_request().await);
    }
    let ids: HashSet<RequestId> = requests.iter().map(|r| r.id).collect();
    assert_eq!(ids.len(), requests.len());

    // Answer out of order.
    for request in requests.into_iter().rev() {
        let echoed = request.params[0].clone();
        peer.send(Response::success(request.id, echoed)).await;
    }

    for caller in callers {
        let (n, result) = caller.await.unwrap();
        assert_eq!(result.unwrap(), Value::from(n));
    }
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn transaction_is_a_single_write_in_call_order() {
    let writer = RecordingWriter::default();
    let (session, _notifications, _driver) =
        Session::new(never_inbound(), writer.clone(), SessionConfig::default());

    let ids = session
        .fast_calls_transaction([("a", vec![]), ("b", vec![Value::from(1)])])
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    let writes = writer.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);

    let messages: Vec<Message> = Decoder::decode_all(&writes[0])
        .unwrap()
        .into_iter()
        .map(|v| Message::from_value(v).unwrap())
        .collect();
    assert_eq!(
        messages,
        vec![
            Message::Request(Request::new(ids[0], "a", vec![])),
            Message::Request(Request::new(ids[1], "b", vec![Value::from(1)])),
        ]
    );
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn empty_transaction_writes_nothing() {
    let writer = RecordingWriter::default();
    let (session, _notifications, _driver) =
        Session::new(never_inbound(), writer.clone(), SessionConfig::default());

    let ids = session
        .fast_calls_transaction(Vec::<(String, Vec<Value>)>::new())
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert!(writer.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fast_call_writes_once_and_registers_nothing() {
    let writer = RecordingWriter::default();
    let (session, _notifications, _driver) =
        Session::new(never_inbound(), writer.clone(), SessionConfig::default());

    session
        .fast_call("nvim_input", vec![Value::from("<Esc>")])
        .await
        .unwrap();

    let writes = writer.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    let values = Decoder::decode_all(&writes[0]).unwrap();
    assert!(matches!(
        Message::from_value(values[0].clone()).unwrap(),
        Message::Request(Request { ref method, .. }) if method == "nvim_input"
    ));
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn notifications_are_batched_per_read() {
    let mut n3 = wire(notification("n", 3));
    let n3_tail = n3.split_off(n3.len() / 2);

    let mut first = wire(notification("n", 1));
    first.extend(wire(notification("n", 2)));
    let mut last = n3_tail;
    last.extend(wire(notification("n", 4)));

    let inbound = chunks_inbound(vec![first, n3, last]);
    let (_session, mut notifications, driver) =
        Session::new(inbound, RecordingWriter::default(), SessionConfig::default());
    driver.run().await.unwrap();

    assert_eq!(
        notifications.recv().await,
        Some(vec![notification("n", 1), notification("n", 2)])
    );
    assert_eq!(
        notifications.recv().await,
        Some(vec![notification("n", 3), notification("n", 4)])
    );
    assert_eq!(notifications.recv().await, None);
}

#[tokio::test]
async fn notification_fed_byte_by_byte_arrives_once() {
    let bytes = wire(Notification::new("redraw", vec![Value::Array(vec![Value::from("flush")])]));
    let inbound = chunks_inbound(bytes.iter().map(|b| vec![*b]).collect());
    let (_session, notifications, driver) =
        Session::new(inbound, RecordingWriter::default(), SessionConfig::default());
    driver.run().await.unwrap();

    let batches: Vec<Vec<Notification>> = futures_util::StreamExt::collect(notifications).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].method, "redraw");
}

#[tokio::test]
async fn drop_newest_discards_batches_that_do_not_fit() {
    let inbound = chunks_inbound(vec![
        wire(notification("n", 1)),
        wire(notification("n", 2)),
        wire(notification("n", 3)),
    ]);
    let config = SessionConfig {
        notification_capacity: 1,
        overflow: OverflowPolicy::DropNewest,
        ..SessionConfig::default()
    };
    let (_session, mut notifications, driver) =
        Session::new(inbound, RecordingWriter::default(), config);
    driver.run().await.unwrap();

    assert_eq!(notifications.recv().await, Some(vec![notification("n", 1)]));
    assert_eq!(notifications.recv().await, None);
}

#[tokio::test]
async fn dropped_notification_receiver_does_not_stall_responses() {
    let config = SessionConfig {
        notification_capacity: 1,
        ..SessionConfig::default()
    };
    let (session, notifications, _driver, mut peer) = connect(config);
    drop(notifications);

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("nvim_eval", vec![Value::from("1")]).await })
    };
    let request = peer.next_request().await;
    for n in 0..5 {
        peer.send(notification("n", n)).await;
    }
    peer.send(Response::success(request.id, Value::from(1))).await;

    assert_eq!(caller.await.unwrap().unwrap(), Value::from(1));
}

#[tokio::test]
async fn orphan_response_is_ignored() {
    let (session, _notifications, driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("x", vec![]).await })
    };
    let request = peer.next_request().await;

    let orphan = RequestId(request.id.0.wrapping_add(1000));
    peer.send(Response::success(orphan, Value::from("stray"))).await;
    peer.send(Response::success(request.id, Value::from("mine"))).await;

    assert_eq!(caller.await.unwrap().unwrap(), Value::from("mine"));
    assert!(!driver.is_finished());
    assert!(!session.is_closed());
}

#[tokio::test]
async fn inbound_request_is_dropped() {
    let (session, mut notifications, _driver, mut peer) = connect(SessionConfig::default());

    peer.send(Request::new(RequestId(7), "nvim_client_handler", vec![])).await;
    peer.send(notification("after", 1)).await;

    assert_eq!(notifications.recv().await, Some(vec![notification("after", 1)]));
    assert!(!session.is_closed());
}

#[tokio::test]
async fn channel_close_fails_pending_calls_and_later_calls() {
    let (session, _notifications, driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("never_answered", vec![]).await })
    };
    peer.next_request().await;
    drop(peer);

    assert!(driver.await.unwrap().is_ok());
    assert!(matches!(caller.await.unwrap(), Err(SessionError::Closed)));
    assert!(session.is_closed());
    assert_eq!(session.pending_calls(), 0);

    assert!(matches!(session.call("x", vec![]).await, Err(SessionError::Closed)));
    assert!(matches!(session.fast_call("x", vec![]).await, Err(SessionError::Closed)));
    assert!(matches!(
        session.fast_calls_transaction([("x", vec![])]).await,
        Err(SessionError::Closed)
    ));
}

#[tokio::test]
async fn dropping_the_driver_tears_down() {
    let (session, _notifications, driver) =
        Session::new(never_inbound(), RecordingWriter::default(), SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("x", vec![]).await })
    };
    while session.pending_calls() == 0 {
        tokio::task::yield_now().await;
    }
    drop(driver);

    assert!(matches!(caller.await.unwrap(), Err(SessionError::Closed)));
    assert!(session.is_closed());
}

#[tokio::test]
async fn invalid_bytes_end_the_session() {
    let (session, _notifications, driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("x", vec![]).await })
    };
    peer.next_request().await;
    peer.send_raw(&[0xc1]).await;

    let result = driver.await.unwrap();
    assert!(matches!(
        result,
        Err(SessionError::Parse(ParseError::InvalidTag(0xc1)))
    ));
    assert!(result.unwrap_err().is_fatal());
    assert!(matches!(caller.await.unwrap(), Err(SessionError::Closed)));
    assert!(session.is_closed());
}

#[tokio::test]
async fn non_message_value_ends_the_session() {
    let (_session, _notifications, driver, mut peer) = connect(SessionConfig::default());
    peer.send_raw(&encode(&Value::Array(vec![Value::from(7), Value::Nil, Value::Nil]))).await;

    assert!(matches!(
        driver.await.unwrap(),
        Err(SessionError::Frame(FrameError::UnknownType(_)))
    ));
}

#[tokio::test]
async fn read_error_ends_the_session() {
    let inbound = futures_util::stream::iter(vec![Err::<Bytes, _>(io::Error::other("boom"))]);
    let (session, _notifications, driver) =
        Session::new(inbound, RecordingWriter::default(), SessionConfig::default());

    assert!(matches!(
        driver.run().await,
        Err(SessionError::Transport(TransportError::Io(_)))
    ));
    assert!(session.is_closed());
}

#[tokio::test]
async fn write_failure_reaches_the_caller_and_forgets_the_call() {
    let (session, _notifications, _driver) =
        Session::new(never_inbound(), ClosedWriter, SessionConfig::default());

    assert!(matches!(
        session.call("x", vec![]).await,
        Err(SessionError::Transport(TransportError::Closed))
    ));
    assert_eq!(session.pending_calls(), 0);
    assert!(!session.is_closed());

    assert!(matches!(
        session.fast_call("x", vec![]).await,
        Err(SessionError::Transport(TransportError::Closed))
    ));
}

#[tokio::test]
async fn cancelled_call_is_cleaned_up_by_its_reply() {
    let (session, _notifications, _driver, mut peer) = connect(SessionConfig::default());

    let caller = {
        let session = session.clone();
        tokio::spawn(async move { session.call("slow", vec![]).await })
    };
    let slow = peer.next_request().await;
    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());
    assert_eq!(session.pending_calls(), 1);

    peer.send(Response::success(slow.id, Value::Nil)).await;

    // Responses are handled in arrival order, so once this call completes
    // the earlier reply has been processed too.
    let ping = {
        let session = session.clone();
        tokio::spawn(async move { session.call("ping", vec![]).await })
    };
    let request = peer.next_request().await;
    peer.send(Response::success(request.id, Value::from("pong"))).await;
    assert_eq!(
        tokio::time::timeout(Duration::from_secs(5), ping)
            .await
            .unwrap()
            .unwrap()
            .unwrap(),
        Value::from("pong")
    );
    assert_eq!(session.pending_calls(), 0);
}

#[tokio::test]
async fn ids_wrap_at_configured_ceiling() {
    let writer = RecordingWriter::default();
    let config = SessionConfig {
        request_id_ceiling: 2,
        ..SessionConfig::default()
    };
    let (session, _notifications, _driver) = Session::new(never_inbound(), writer, config);

    let ids = session
        .fast_calls_transaction([("a", vec![]), ("b", vec![]), ("c", vec![])])
        .await
        .unwrap();
    assert_eq!(ids, vec![RequestId(0), RequestId(1), RequestId(0)]);
}
