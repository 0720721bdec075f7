use council_core::{CouncilEvent, TaskMessage};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

/// Fixed pause between reconnect attempts. No growth and no attempt cap:
/// this talks to a local backend that may restart at any time, and the
/// client always wants the link back.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

const OUTBOUND_QUEUE: usize = 32;
const EVENT_QUEUE: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Disconnected => "disconnected",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: Url,
    pub reconnect_delay: Duration,
}

impl ConnectionConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Handle to the session link. The background task owns the socket; this
/// side sends task messages and watches the link status. Dropping the handle
/// is the explicit manual stop: the task closes the socket and exits instead
/// of reconnecting.
pub struct Connection {
    outbound: mpsc::Sender<String>,
    status: watch::Receiver<LinkStatus>,
}

impl Connection {
    /// Spawn the link task. Returns the handle, the ordered inbound event
    /// stream, and the task itself.
    pub fn spawn(
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<CouncilEvent>, JoinHandle<()>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (status_tx, status_rx) = watch::channel(LinkStatus::Disconnected);
        let task = tokio::spawn(link_loop(config, status_tx, outbound_rx, events_tx));
        (
            Self {
                outbound: outbound_tx,
                status: status_rx,
            },
            events_rx,
            task,
        )
    }

    pub fn is_connected(&self) -> bool {
        *self.status.borrow() == LinkStatus::Connected
    }

    /// A fresh watch on the link status, for indicator updates.
    pub fn status(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Queue a task message for transmission. Fails silently while the
    /// transport is not open; callers gate on `is_connected`.
    pub async fn send_task(&self, message: &TaskMessage) {
        if !self.is_connected() {
            debug!("send_dropped_while_closed: council={}", message.council);
            return;
        }
        if self.outbound.send(message.to_wire()).await.is_err() {
            debug!("send_dropped_link_task_gone");
        }
    }
}

async fn link_loop(
    config: ConnectionConfig,
    status: watch::Sender<LinkStatus>,
    mut outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<CouncilEvent>,
) {
    loop {
        status.send_replace(LinkStatus::Connecting);
        let (mut ws, _) = match connect_async(config.endpoint.as_str()).await {
            Ok(value) => value,
            Err(err) => {
                warn!("session_connect_error: {err}");
                status.send_replace(LinkStatus::Disconnected);
                tokio::time::sleep(config.reconnect_delay).await;
                continue;
            }
        };
        info!("session_link_up: {}", config.endpoint);
        status.send_replace(LinkStatus::Connected);

        // Anything queued while the link was down is stale; a task message
        // must never fire against a later connection.
        while outbound.try_recv().is_ok() {}

        loop {
            tokio::select! {
                inbound = ws.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => {
                            match CouncilEvent::from_wire(&text) {
                                Ok(event) => {
                                    if events.send(event).await.is_err() {
                                        let _ = ws.close(None).await;
                                        status.send_replace(LinkStatus::Disconnected);
                                        return;
                                    }
                                }
                                // A frame this client cannot parse is a
                                // transport glitch, not a task failure.
                                Err(err) => debug!("session_frame_dropped: {err}"),
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            warn!("session_link_error: {err}");
                            break;
                        }
                        None => break,
                    }
                }
                queued = outbound.recv() => {
                    match queued {
                        Some(text) => {
                            if ws.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            // Manual stop: the handle is gone.
                            let _ = ws.close(None).await;
                            status.send_replace(LinkStatus::Disconnected);
                            return;
                        }
                    }
                }
            }
        }

        let _ = ws.close(None).await;
        status.send_replace(LinkStatus::Disconnected);
        warn!(
            "session_link_down: retrying in {}s",
            config.reconnect_delay.as_secs_f32()
        );
        tokio::time::sleep(config.reconnect_delay).await;
    }
}
