use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

/// What the transport reports back to the connection manager
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Handshake completed, the stream is open
    Opened,
    Text(String),
    Binary(Vec<u8>),
    /// Peer closed the stream (optional close reason)
    Closed(Option<String>),
    /// Connect or I/O failure
    Failed(String),
}

/// Non-blocking message transport.
///
/// `connect` only starts an attempt; its outcome arrives later through
/// `poll_event`. Every method returns immediately.
pub trait Transport {
    /// Start a new connection attempt, abandoning any previous one
    fn connect(&mut self, url: &str);

    /// Next buffered event, or `None` when nothing is pending
    fn poll_event(&mut self) -> Option<TransportEvent>;

    /// Queue a text frame for sending
    fn send(&mut self, text: String) -> Result<()>;

    /// Drop the current connection or attempt
    fn close(&mut self);
}

/// WebSocket transport driven by a tokio task.
///
/// Socket I/O runs on the runtime; the owning thread only touches the
/// channel ends with `try_recv`/`send`.
pub struct WebSocketTransport {
    runtime: Handle,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    /// A Closed/Failed event has already been handed out for this attempt
    finished: bool,
}

impl WebSocketTransport {
    /// Create a transport bound to the current tokio runtime
    pub fn new() -> Result<Self> {
        let runtime =
            Handle::try_current().context("WebSocket transport requires a tokio runtime")?;
        Ok(Self::with_runtime(runtime))
    }

    fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime,
            events: None,
            outbound: None,
            task: None,
            finished: false,
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Transport for WebSocketTransport {
    fn connect(&mut self, url: &str) {
        self.close();
        self.abort_task();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        self.task = Some(
            self.runtime
                .spawn(run_socket(url.to_string(), event_tx, outbound_rx)),
        );
        self.events = Some(event_rx);
        self.outbound = Some(outbound_tx);
        self.finished = false;
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        let events = self.events.as_mut()?;

        match events.try_recv() {
            Ok(event) => {
                if matches!(event, TransportEvent::Closed(_) | TransportEvent::Failed(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // Task ended without reporting why (panicked or aborted)
                self.events = None;
                if self.finished {
                    None
                } else {
                    self.finished = true;
                    Some(TransportEvent::Failed("socket task ended".to_string()))
                }
            }
        }
    }

    fn send(&mut self, text: String) -> Result<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| anyhow!("no open socket"))?;
        outbound
            .send(text)
            .map_err(|_| anyhow!("socket task has stopped"))
    }

    fn close(&mut self) {
        // Dropping the sender makes the task send a close frame and exit
        self.outbound = None;
        self.events = None;
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.abort_task();
    }
}

/// Pump one WebSocket connection between the socket and the channels
async fn run_socket(
    url: String,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let (socket, _response) = match connect_async(url.as_str()).await {
        Ok(pair) => pair,
        Err(e) => {
            let _ = events.send(TransportEvent::Failed(e.to_string()));
            return;
        }
    };

    info!(url = %url, "WebSocket connected");
    let _ = events.send(TransportEvent::Opened);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Text(text)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if events.send(TransportEvent::Binary(bytes)).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string());
                        let _ = events.send(TransportEvent::Closed(reason));
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Failed(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed(None));
                        break;
                    }
                }
            }

            command = outbound.recv() => {
                match command {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            let _ = events.send(TransportEvent::Failed(e.to_string()));
                            break;
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        }
    }

    debug!(url = %url, "WebSocket task finished");
}
