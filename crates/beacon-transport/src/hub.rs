//! The unix-socket hub client.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use beacon_core::{BusEvent, BusClient, BusSink, Responder, StreamToken, TransportError, TransportResult};

use crate::frame::Frame;

/// Where the reader routes the replies of one open call.
enum PendingReply {
    /// A one-shot caller is blocked on this rendezvous; deliver and forget.
    OneShot(SyncSender<String>),
    /// A checked subscriber is blocked waiting for the acknowledgement;
    /// deliver the first reply there, then forward the rest to the sink.
    AwaitFirst(SyncSender<String>),
    /// Forward every reply to the sink.
    Stream,
}

type PendingMap = Arc<Mutex<HashMap<StreamToken, PendingReply>>>;

/// [`BusClient`] over a unix-domain socket to the bus hub.
pub struct HubClient {
    next_token: AtomicU64,
    outbox: mpsc::UnboundedSender<Frame>,
    pending: PendingMap,
}

impl HubClient {
    /// Connects to the hub at `path` and announces `identity` as this
    /// client's bus name. Reader and writer tasks are spawned on `runtime`;
    /// every asynchronous completion goes to `sink`.
    pub fn connect(
        path: &Path,
        identity: &str,
        sink: BusSink,
        runtime: &tokio::runtime::Handle,
    ) -> TransportResult<Self> {
        let stream = runtime
            .block_on(UnixStream::connect(path))
            .map_err(|err| TransportError::ConnectionFailed {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        let (reader, writer) = stream.into_split();

        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        runtime.spawn(write_loop(writer, outbox_rx));
        runtime.spawn(read_loop(reader, sink, Arc::clone(&pending), outbox.clone()));

        let client = Self {
            next_token: AtomicU64::new(0),
            outbox,
            pending,
        };
        client.send(Frame::Hello {
            identity: identity.to_string(),
        })?;

        info!(path = %path.display(), identity, "Connected to bus hub");
        Ok(client)
    }

    fn allocate_token(&self) -> StreamToken {
        self.next_token.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn send(&self, frame: Frame) -> TransportResult<()> {
        self.outbox
            .send(frame)
            .map_err(|_| TransportError::Closed("hub connection lost".to_string()))
    }
}

impl BusClient for HubClient {
    fn call_once(
        &self,
        url: &str,
        payload: &str,
        timeout: Duration,
    ) -> TransportResult<Option<String>> {
        let token = self.allocate_token();
        let (tx, rx) = sync_channel(1);
        self.pending
            .lock()
            .unwrap()
            .insert(token, PendingReply::OneShot(tx));
        self.send(Frame::Call {
            token,
            url: url.to_string(),
            payload: payload.to_string(),
            subscribe: false,
        })?;

        match rx.recv_timeout(timeout) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => {
                self.pending.lock().unwrap().remove(&token);
                let _ = self.outbox.send(Frame::Cancel { token });
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(TransportError::Closed("hub connection lost".to_string()))
            }
        }
    }

    fn post(&self, url: &str, payload: &str) -> TransportResult<()> {
        // No pending entry: whatever reply comes back has no consumer and is
        // dropped by the reader.
        self.send(Frame::Call {
            token: self.allocate_token(),
            url: url.to_string(),
            payload: payload.to_string(),
            subscribe: false,
        })
    }

    fn open_stream(
        &self,
        url: &str,
        payload: &str,
        first_reply: Option<Duration>,
    ) -> TransportResult<(StreamToken, Option<String>)> {
        let token = self.allocate_token();

        let waiter = match first_reply {
            None => {
                self.pending
                    .lock()
                    .unwrap()
                    .insert(token, PendingReply::Stream);
                None
            }
            Some(budget) => {
                let (tx, rx) = sync_channel(1);
                self.pending
                    .lock()
                    .unwrap()
                    .insert(token, PendingReply::AwaitFirst(tx));
                Some((rx, budget))
            }
        };

        self.send(Frame::Call {
            token,
            url: url.to_string(),
            payload: payload.to_string(),
            subscribe: true,
        })?;

        let Some((rx, budget)) = waiter else {
            return Ok((token, None));
        };

        match rx.recv_timeout(budget) {
            Ok(first) => Ok((token, Some(first))),
            // The caller decides; it is expected to cancel the stream.
            Err(RecvTimeoutError::Timeout) => Ok((token, None)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(TransportError::Closed("hub connection lost".to_string()))
            }
        }
    }

    fn cancel_stream(&self, token: StreamToken) {
        self.pending.lock().unwrap().remove(&token);
        let _ = self.outbox.send(Frame::Cancel { token });
    }

    fn register_method(&self, category: &str, name: &str) -> TransportResult<()> {
        self.send(Frame::Register {
            category: category.to_string(),
            name: name.to_string(),
        })
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbox: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = outbox.recv().await {
        let mut line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(err) => {
                error!(%err, "Failed to encode hub frame");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            warn!(%err, "Failed to write to hub");
            break;
        }
    }
}

async fn read_loop(
    reader: OwnedReadHalf,
    sink: BusSink,
    pending: PendingMap,
    outbox: mpsc::UnboundedSender<Frame>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Frame>(&line) {
                    Ok(frame) => handle_frame(frame, &sink, &pending, &outbox),
                    Err(err) => warn!(%err, line, "Unparseable frame from hub"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "Hub read failed");
                break;
            }
        }
    }

    info!("Bus hub connection closed");
    // Wake every blocked synchronous caller by dropping its rendezvous.
    pending.lock().unwrap().clear();
    sink(BusEvent::Disconnected);
}

fn handle_frame(
    frame: Frame,
    sink: &BusSink,
    pending: &PendingMap,
    outbox: &mpsc::UnboundedSender<Frame>,
) {
    match frame {
        Frame::Reply { token, payload } => {
            let mut pending = pending.lock().unwrap();
            match pending.get(&token) {
                Some(PendingReply::OneShot(_)) => {
                    if let Some(PendingReply::OneShot(tx)) = pending.remove(&token) {
                        let _ = tx.try_send(payload);
                    }
                }
                Some(PendingReply::AwaitFirst(_)) => {
                    if let Some(PendingReply::AwaitFirst(tx)) =
                        pending.insert(token, PendingReply::Stream)
                    {
                        let _ = tx.try_send(payload);
                    }
                }
                Some(PendingReply::Stream) => {
                    drop(pending);
                    trace!(token, "Forwarding stream reply");
                    sink(BusEvent::Reply { token, payload });
                }
                None => debug!(token, "Reply for an unknown token, dropping"),
            }
        }
        Frame::Request {
            token,
            category,
            name,
            payload,
        } => {
            let outbox = outbox.clone();
            let responder = Responder::new(move |response| {
                let _ = outbox.send(Frame::Response {
                    token,
                    payload: response,
                });
            });
            sink(BusEvent::MethodCall {
                category,
                name,
                payload,
                responder,
            });
        }
        other => warn!(?other, "Unexpected frame from hub"),
    }
}
