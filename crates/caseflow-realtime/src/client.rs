//! Realtime client
//!
//! Owns one socket at a time. Provides:
//! - Token-authenticated connect, refused when no token is stored
//! - Re-subscription of case/user channels on every open
//! - Bounded reconnection after abnormal closes
//! - Periodic reconciliation of token presence against connection state
//! - Typed, filterable sub-streams of inbound messages
//!
//! Outbound messages are sent only while the socket is open; nothing is
//! queued for later delivery.

use crate::config::RealtimeConfig;
use crate::error::TransportError;
use crate::message::{Category, ControlMessage, InboundMessage, OutboundMessage};
use crate::status::{ConnectionStatus, MAX_RETRIES_REACHED};
use crate::stream::{EventFilter, EventStream};
use crate::token::TokenStore;
use crate::transport::{Connection, Connector, Frame, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use caseflow_model::{CaseId, UserId};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Sends messages to peer sessions
///
/// Implemented by [`RealtimeClient`]; the context store and sync orchestrator
/// depend on this rather than on the socket.
pub trait Broadcaster: Send + Sync + fmt::Debug {
    /// Send `message`; `false` if it could not be sent
    fn broadcast(&self, message: OutboundMessage) -> bool;
}

#[derive(Debug, Default)]
struct Subscriptions {
    case: Option<CaseId>,
    user: Option<UserId>,
}

#[derive(Debug, Default)]
struct Link {
    sink: Option<mpsc::UnboundedSender<Frame>>,
    generation: u64,
    connecting: bool,
    subscriptions: Subscriptions,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    token_watch: Option<JoinHandle<()>>,
}

impl Link {
    fn is_open(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| !sink.is_closed())
    }

    fn send(&self, message: &OutboundMessage) -> bool {
        let Some(sink) = self.sink.as_ref() else {
            tracing::warn!("socket not open; dropping {} message", message.kind);
            return false;
        };
        match serde_json::to_string(message) {
            Ok(text) => sink.send(Frame::Text(text)).is_ok(),
            Err(e) => {
                tracing::warn!("could not encode {} message: {}", message.kind, e);
                false
            }
        }
    }
}

#[derive(Debug)]
struct Channels {
    all: broadcast::Sender<InboundMessage>,
    case: broadcast::Sender<InboundMessage>,
    task: broadcast::Sender<InboundMessage>,
    assignment: broadcast::Sender<InboundMessage>,
    notification: broadcast::Sender<InboundMessage>,
}

impl Channels {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            all: broadcast::channel(capacity).0,
            case: broadcast::channel(capacity).0,
            task: broadcast::channel(capacity).0,
            assignment: broadcast::channel(capacity).0,
            notification: broadcast::channel(capacity).0,
        }
    }

    fn for_category(&self, category: Category) -> Option<&broadcast::Sender<InboundMessage>> {
        match category {
            Category::Case => Some(&self.case),
            Category::Task => Some(&self.task),
            Category::Assignment => Some(&self.assignment),
            Category::Notification => Some(&self.notification),
            Category::Control | Category::Error => None,
        }
    }
}

struct Inner {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenStore>,
    status: watch::Sender<ConnectionStatus>,
    link: Mutex<Link>,
    channels: Channels,
}

impl Inner {
    fn open(self: Arc<Self>) -> BoxFuture<'static, Result<(), TransportError>> {
        async move {
            let Some(token) = self.tokens.token() else {
                tracing::warn!("refusing to connect: no authentication token");
                self.status.send_modify(|status| {
                    status.connected = false;
                    status.reconnecting = false;
                    status.error = Some(TransportError::MissingToken.to_string());
                });
                return Err(TransportError::MissingToken);
            };

            let generation = {
                let mut link = self.link.lock();
                if link.is_open() || link.connecting {
                    tracing::debug!("connect skipped: socket already open or opening");
                    return Ok(());
                }
                link.connecting = true;
                link.generation
            };

            let url = self.config.url_with_token(&token);
            match self.connector.connect(&url).await {
                Ok(connection) => {
                    self.on_open(connection, generation);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("realtime connect failed: {}", e);
                    self.link.lock().connecting = false;
                    self.status.send_modify(|status| {
                        status.connected = false;
                        status.error = Some(e.to_string());
                    });
                    self.schedule_reconnect();
                    Err(e)
                }
            }
        }
        .boxed()
    }

    fn on_open(self: &Arc<Self>, connection: Connection, generation: u64) {
        let Connection { sink, stream } = connection;
        let mut link = self.link.lock();
        link.connecting = false;

        if link.generation != generation {
            tracing::debug!("discarding socket opened across a disconnect");
            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE)));
            return;
        }

        link.generation += 1;
        link.sink = Some(sink);
        link.reconnect = None;

        if let Some(case_id) = link.subscriptions.case {
            link.send(&ControlMessage::SubscribeCase(case_id).into());
        }
        if let Some(user_id) = link.subscriptions.user {
            link.send(&ControlMessage::SubscribeUser(user_id).into());
        }

        let reader = tokio::spawn(read_loop(Arc::downgrade(self), stream, link.generation));
        if let Some(previous) = link.reader.replace(reader) {
            previous.abort();
        }
        drop(link);

        self.status
            .send_replace(ConnectionStatus::open(chrono::Utc::now()));
        tracing::info!("realtime connection established");
    }

    fn on_close(self: &Arc<Self>, generation: u64, code: u16) {
        {
            let mut link = self.link.lock();
            if link.generation != generation {
                return;
            }
            link.sink = None;
            link.reader = None;
        }

        tracing::info!("realtime socket closed with code {}", code);
        self.status.send_modify(|status| status.connected = false);

        if code != NORMAL_CLOSURE {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let retry_count = self.status.borrow().retry_count;
        let max = self.config.max_reconnect_attempts;

        if retry_count >= max {
            tracing::error!("giving up after {} reconnection attempts", retry_count);
            self.status.send_modify(|status| {
                status.connected = false;
                status.reconnecting = false;
                status.error = Some(MAX_RETRIES_REACHED.to_string());
            });
            return;
        }

        let attempt = retry_count + 1;
        self.status.send_modify(|status| {
            status.reconnecting = true;
            status.retry_count = attempt;
        });

        let delay = self.config.reconnect_interval();
        tracing::info!("reconnecting in {:?} (attempt {}/{})", delay, attempt, max);

        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                if let Err(e) = Inner::open(inner).await {
                    tracing::debug!("reconnection attempt {} failed: {}", attempt, e);
                }
            }
        });
        self.link.lock().reconnect = Some(handle);
    }

    fn close_link(&self) {
        let mut link = self.link.lock();
        link.generation += 1;
        link.connecting = false;
        if let Some(handle) = link.reconnect.take() {
            handle.abort();
        }
        if let Some(handle) = link.reader.take() {
            handle.abort();
        }
        if let Some(sink) = link.sink.take() {
            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE)));
        }
    }

    fn dispatch(&self, text: &str) {
        let Some(message) = InboundMessage::decode(text) else {
            return;
        };

        let category = message.kind.category();
        if category == Category::Error {
            tracing::warn!("realtime error message: {}", message.data);
        }

        if let Some(tx) = self.channels.for_category(category) {
            let _ = tx.send(message.clone());
        }
        let _ = self.channels.all.send(message);
    }

    async fn reconcile_token(self: Arc<Self>) {
        let has_token = self.tokens.token().is_some();
        let (connected, reconnecting) = {
            let status = self.status.borrow();
            (status.connected, status.reconnecting)
        };

        if has_token && !connected && !reconnecting {
            tracing::debug!("token present but socket closed; connecting");
            let _ = Inner::open(self).await;
        } else if !has_token && connected {
            tracing::debug!("token gone but socket open; disconnecting");
            self.close_link();
            self.status.send_replace(ConnectionStatus::default());
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let link = self.link.get_mut();
        for handle in [
            link.reader.take(),
            link.reconnect.take(),
            link.token_watch.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        if let Some(sink) = link.sink.take() {
            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE)));
        }
    }
}

async fn read_loop(
    inner: Weak<Inner>,
    mut stream: mpsc::UnboundedReceiver<Frame>,
    generation: u64,
) {
    let code = loop {
        match stream.recv().await {
            Some(Frame::Text(text)) => match inner.upgrade() {
                Some(inner) => inner.dispatch(&text),
                None => return,
            },
            Some(Frame::Close(code)) => break code.unwrap_or(ABNORMAL_CLOSURE),
            None => break ABNORMAL_CLOSURE,
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.on_close(generation, code);
    }
}

/// Realtime client handle; cheap to clone, all clones share one socket
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a client; nothing connects until [`connect`](Self::connect)
    #[must_use]
    pub fn new(
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        let channels = Channels::new(config.channel_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                tokens,
                status: watch::Sender::new(ConnectionStatus::default()),
                link: Mutex::new(Link::default()),
                channels,
            }),
        }
    }

    /// Open the socket
    ///
    /// A no-op when a socket is already open or opening. A failed open
    /// schedules a reconnection attempt.
    ///
    /// # Errors
    /// `TransportError::MissingToken` when no token is stored (no retry is
    /// scheduled), `TransportError::Connect` when the socket cannot be opened.
    pub async fn connect(&self) -> Result<(), TransportError> {
        Inner::open(Arc::clone(&self.inner)).await
    }

    /// Close the socket and cancel any pending reconnection
    ///
    /// Status resets to disconnected with a zero retry count. Channel
    /// subscriptions are remembered and re-sent on the next open.
    pub fn disconnect(&self) {
        self.inner.close_link();
        self.inner.status.send_replace(ConnectionStatus::default());
        tracing::info!("realtime connection closed by client");
    }

    /// Whether the socket is open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.link.lock().is_open()
    }

    /// Send a message if the socket is open; logs and drops it otherwise
    pub fn send_message(&self, message: &OutboundMessage) -> bool {
        self.inner.link.lock().send(message)
    }

    /// Send a keepalive
    pub fn ping(&self) -> bool {
        self.send_message(&ControlMessage::Ping(chrono::Utc::now().timestamp_millis()).into())
    }

    /// Follow a case's events, replacing any previously followed case
    pub fn subscribe_to_case(&self, case_id: CaseId) {
        let mut link = self.inner.link.lock();
        if let Some(previous) = link.subscriptions.case.replace(case_id) {
            if previous != case_id && link.is_open() {
                link.send(&ControlMessage::UnsubscribeCase(previous).into());
            }
        }
        if link.is_open() {
            link.send(&ControlMessage::SubscribeCase(case_id).into());
        }
    }

    /// Stop following the current case
    pub fn unsubscribe_from_case(&self) {
        let mut link = self.inner.link.lock();
        if let Some(case_id) = link.subscriptions.case.take() {
            if link.is_open() {
                link.send(&ControlMessage::UnsubscribeCase(case_id).into());
            }
        }
    }

    /// Follow a user's events, replacing any previously followed user
    pub fn subscribe_to_user(&self, user_id: UserId) {
        let mut link = self.inner.link.lock();
        if let Some(previous) = link.subscriptions.user.replace(user_id) {
            if previous != user_id && link.is_open() {
                link.send(&ControlMessage::UnsubscribeUser(previous).into());
            }
        }
        if link.is_open() {
            link.send(&ControlMessage::SubscribeUser(user_id).into());
        }
    }

    /// Stop following the current user
    pub fn unsubscribe_from_user(&self) {
        let mut link = self.inner.link.lock();
        if let Some(user_id) = link.subscriptions.user.take() {
            if link.is_open() {
                link.send(&ControlMessage::UnsubscribeUser(user_id).into());
            }
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Status updates
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    /// Every decoded message, unfiltered
    #[must_use]
    pub fn messages(&self) -> EventStream {
        EventStream::new(self.inner.channels.all.subscribe(), EventFilter::any())
    }

    /// Case metadata events
    #[must_use]
    pub fn case_events(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.inner.channels.case.subscribe(), filter)
    }

    /// Task events
    #[must_use]
    pub fn task_events(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.inner.channels.task.subscribe(), filter)
    }

    /// Team membership events, including peer orchestrator broadcasts
    #[must_use]
    pub fn assignment_events(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.inner.channels.assignment.subscribe(), filter)
    }

    /// User-facing notification events
    #[must_use]
    pub fn notifications(&self, filter: EventFilter) -> EventStream {
        EventStream::new(self.inner.channels.notification.subscribe(), filter)
    }

    /// Start the periodic token/connection reconciliation timer
    ///
    /// Connects when a token is present but the socket is closed, and
    /// disconnects when the token is gone but the socket is open. Replaces
    /// any timer already running.
    pub fn start_token_watch(&self) {
        let period = self.inner.config.token_check_interval();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.reconcile_token().await;
            }
        });

        if let Some(previous) = self.inner.link.lock().token_watch.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the reconciliation timer
    pub fn stop_token_watch(&self) {
        if let Some(handle) = self.inner.link.lock().token_watch.take() {
            handle.abort();
        }
    }
}

impl Broadcaster for RealtimeClient {
    fn broadcast(&self, message: OutboundMessage) -> bool {
        self.send_message(&message)
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("url", &self.inner.config.url)
            .field("status", &*self.inner.status.borrow())
            .finish_non_exhaustive()
    }
}
