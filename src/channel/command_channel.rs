//! Resilient command channel.
//!
//! [`CommandChannel`] owns at most one live socket to the backend. Each
//! socket runs in its own task: it drains the outbound queue into the
//! write half and decodes inbound frames into [`ChannelEvent`]s. When the
//! socket closes with anything but a normal-closure code, a reconnect is
//! scheduled after a fixed delay until the attempt budget runs out.
//!
//! All operations return immediately and never fail loudly: problems are
//! reported as a `false` return or a [`ChannelEvent::Error`].
//!
//! Every socket gets a generation number. Superseding a socket (new
//! `connect`, `disconnect`, reconnect) bumps the generation, so callbacks
//! from an old socket find themselves stale and do nothing.
//!
//! Operations that open sockets or schedule reconnects spawn tasks and must
//! run inside a Tokio runtime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::connector::{
    ABNORMAL_CLOSURE, Connector, Frame, NO_STATUS_RECEIVED, NORMAL_CLOSURE, Socket,
    TungsteniteConnector,
};
use super::messages::{decode_frame, encode_command};
use super::reconnect::ReconnectPolicy;
use super::subscription::{EventHandler, SubscriptionRegistry, deliver};
use crate::config::ChannelConfig;
use crate::domain::{
    ChannelError, ChannelEvent, ChannelState, Command, Endpoint, EventKind, OutboundCommand,
    Speed, SubscriptionId,
};

/// Handle to the live socket task.
#[derive(Debug)]
struct SocketHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

impl SocketHandle {
    /// Asks the socket task to send a normal close and exit.
    fn shutdown(self) {
        if self.outbound.send(Frame::Close(Some(NORMAL_CLOSURE))).is_err() {
            self.task.abort();
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: ChannelState,
    endpoint: Option<Endpoint>,
    socket: Option<SocketHandle>,
    reconnect: ReconnectPolicy,
    generation: u64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reconnect.cancel();
        if let Some(socket) = self.socket.take() {
            socket.shutdown();
        }
    }
}

struct Shared<C> {
    connector: C,
    config: ChannelConfig,
    inner: Mutex<Inner>,
    subscriptions: Mutex<SubscriptionRegistry>,
}

/// Reconnecting WebSocket channel for vehicle commands and status events.
///
/// Cloning is cheap and every clone drives the same connection. Background
/// tasks only hold weak references: dropping the last handle closes the
/// socket with a normal-closure code and cancels any pending reconnect,
/// without publishing further events.
///
/// # Reconnect budget
///
/// When the budget is exhausted the channel publishes
/// [`ChannelError::ReconnectExhausted`] once, stays
/// [`ChannelState::Closed`] and keeps its subscribers. It does not retry on
/// its own again: call [`reset_reconnect_attempts`](Self::reset_reconnect_attempts)
/// and then [`connect`](Self::connect) to start over with a full budget.
pub struct CommandChannel<C: Connector = TungsteniteConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for CommandChannel<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> fmt::Debug for CommandChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.shared.inner);
        f.debug_struct("CommandChannel")
            .field("state", &inner.state)
            .field("endpoint", &inner.endpoint)
            .field("attempts", &inner.reconnect.attempts())
            .field("subscribers", &lock(&self.shared.subscriptions).total())
            .finish()
    }
}

impl CommandChannel<TungsteniteConnector> {
    /// Creates an idle channel that connects with `tokio-tungstenite`.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(TungsteniteConnector, config)
    }
}

impl<C: Connector> CommandChannel<C> {
    /// Creates an idle channel that opens sockets through `connector`.
    #[must_use]
    pub fn with_connector(connector: C, config: ChannelConfig) -> Self {
        let reconnect = ReconnectPolicy::from_config(&config);
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                inner: Mutex::new(Inner {
                    state: ChannelState::Idle,
                    endpoint: None,
                    socket: None,
                    reconnect,
                    generation: 0,
                }),
                subscriptions: Mutex::new(SubscriptionRegistry::new()),
            }),
        }
    }

    /// Connects to the backend behind `base_url`.
    ///
    /// `base_url` may be HTTP(S), WS(S) or a bare `host:port`; see
    /// [`Endpoint::parse`]. Does nothing if the channel is already open.
    /// Otherwise cancels any pending reconnect, closes the current socket and
    /// opens a new one in the background. The outcome is published as
    /// [`ChannelEvent::Connected`] or [`ChannelEvent::Error`].
    pub fn connect(&self, base_url: &str) {
        let endpoint = match Endpoint::parse(base_url) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::warn!(input = base_url, error = %e, "rejecting endpoint");
                self.shared.emit(&ChannelEvent::Error(ChannelError::InvalidEndpoint {
                    input: base_url.to_string(),
                }));
                return;
            }
        };

        let mut inner = lock(&self.shared.inner);
        if inner.state == ChannelState::Open {
            tracing::debug!(%endpoint, "already connected; ignoring connect");
            return;
        }

        inner.reconnect.cancel();
        tracing::info!(%endpoint, "connecting command channel");
        self.shared.open_socket(&mut inner, endpoint);
    }

    /// Sends `command` at `speed`.
    ///
    /// Returns `true` once the frame is queued on the open socket. Returns
    /// `false` without writing anything if the channel is not open, and
    /// `false` plus a [`ChannelError::Send`] event if the frame cannot be
    /// encoded or queued. Acknowledgment arrives later as
    /// [`ChannelEvent::Acknowledgment`].
    pub fn send_command(&self, command: Command, speed: Speed) -> bool {
        let outcome = {
            let inner = lock(&self.shared.inner);
            let socket = match (&inner.state, inner.socket.as_ref()) {
                (ChannelState::Open, Some(socket)) => socket,
                _ => {
                    tracing::debug!(
                        %command,
                        state = ?inner.state,
                        "not connected; command dropped"
                    );
                    return false;
                }
            };

            let frame = OutboundCommand::now(command, speed);
            encode_command(&frame)
                .map_err(|e| e.to_string())
                .and_then(|text| {
                    socket
                        .outbound
                        .send(Frame::Text(text))
                        .map_err(|_| "socket task is gone".to_string())
                })
        };

        match outcome {
            Ok(()) => {
                tracing::debug!(%command, %speed, "command sent");
                true
            }
            Err(message) => {
                tracing::warn!(%command, error = %message, "failed to send command");
                self.shared
                    .emit(&ChannelEvent::Error(ChannelError::Send { message }));
                false
            }
        }
    }

    /// Sends `command` at the configured default speed.
    pub fn send_default(&self, command: Command) -> bool {
        self.send_command(command, self.shared.config.default_speed)
    }

    /// Registers `handler` for events of `kind`.
    ///
    /// Handlers run in registration order on the task that produced the
    /// event. A panicking handler is logged and skipped.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ChannelEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        lock(&self.shared.subscriptions).subscribe(kind, handler)
    }

    /// Removes the handler `id`, or every handler for `kind` when `id` is
    /// `None`. Returns the number of handlers removed.
    pub fn off(&self, kind: EventKind, id: Option<SubscriptionId>) -> usize {
        lock(&self.shared.subscriptions).unsubscribe(kind, id)
    }

    /// Closes the connection for good.
    ///
    /// Cancels any pending reconnect, closes the socket with a normal-closure
    /// code (so no reconnect follows), clears every subscription and resets
    /// the attempt counter.
    pub fn disconnect(&self) {
        let socket = {
            let mut inner = lock(&self.shared.inner);
            inner.reconnect.cancel();
            inner.reconnect.reset();
            inner.generation = inner.generation.wrapping_add(1);
            inner.state = ChannelState::Idle;
            inner.endpoint = None;
            inner.socket.take()
        };

        if let Some(socket) = socket {
            tracing::info!(generation = socket.generation, "disconnecting command channel");
            socket.shutdown();
        }

        lock(&self.shared.subscriptions).clear();
    }

    /// Returns `true` iff the socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Zeroes the reconnect attempt counter.
    pub fn reset_reconnect_attempts(&self) {
        lock(&self.shared.inner).reconnect.reset();
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        lock(&self.shared.inner).state
    }

    /// Returns the reconnect attempts made since the last reset.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.shared.inner).reconnect.attempts()
    }

    /// Returns `true` while a reconnect is scheduled but has not fired.
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        lock(&self.shared.inner).reconnect.is_pending()
    }

    /// Returns the endpoint of the last `connect`, until `disconnect`.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        lock(&self.shared.inner).endpoint.clone()
    }

    /// Returns the number of handlers registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        lock(&self.shared.subscriptions).count(kind)
    }

    /// Returns the channel settings.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.shared.config
    }
}

impl<C: Connector> Shared<C> {
    /// Publishes `event` to the handlers registered for its kind.
    fn emit(&self, event: &ChannelEvent) {
        let handlers = lock(&self.subscriptions).handlers_for(event.kind());
        deliver(&handlers, event);
    }

    /// Replaces the current socket with a new one for `endpoint`.
    fn open_socket(self: &Arc<Self>, inner: &mut Inner, endpoint: Endpoint) {
        if let Some(old) = inner.socket.take() {
            tracing::debug!(generation = old.generation, "closing superseded socket");
            old.shutdown();
        }

        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;
        inner.state = ChannelState::Connecting;
        inner.endpoint = Some(endpoint.clone());

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run_socket(
            Arc::downgrade(self),
            endpoint,
            generation,
            outbound_rx,
        ));
        inner.socket = Some(SocketHandle {
            generation,
            outbound: outbound_tx,
            task,
        });
    }

    /// Socket task: open, pump frames until close, then report the close.
    ///
    /// Holds the channel only weakly between frames, so the task winds down
    /// once every [`CommandChannel`] handle is gone.
    async fn run_socket(
        weak: Weak<Self>,
        endpoint: Endpoint,
        generation: u64,
        mut outbound: mpsc::UnboundedReceiver<Frame>,
    ) {
        tracing::debug!(%endpoint, generation, "opening socket");

        let Some(shared) = weak.upgrade() else {
            return;
        };
        // Only a close can be queued before the socket opens.
        let result = tokio::select! {
            result = shared.connector.connect(&endpoint) => result,
            _ = outbound.recv() => {
                tracing::debug!(generation, "socket superseded while opening");
                return;
            }
        };

        let Socket {
            mut sink,
            mut stream,
        } = match result {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(%endpoint, generation, error = %e, "failed to open socket");
                if shared.is_current(generation) {
                    shared.emit(&ChannelEvent::Error(ChannelError::Transport {
                        message: e.to_string(),
                    }));
                    shared.handle_close(generation, ABNORMAL_CLOSURE, false);
                }
                return;
            }
        };

        if !shared.mark_open(generation) {
            tracing::debug!(generation, "socket opened after being superseded");
            let _ = sink.send(Frame::Close(Some(NORMAL_CLOSURE))).await;
            let _ = sink.close().await;
            return;
        }

        tracing::info!(%endpoint, generation, "command channel open");
        shared.emit(&ChannelEvent::Connected(true));
        drop(shared);

        let close_code = loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(Frame::Close(code)) => {
                        let _ = sink.send(Frame::Close(code)).await;
                        let _ = sink.close().await;
                        break None;
                    }
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            tracing::warn!(generation, error = %e, "socket write failed");
                            if let Some(shared) = weak.upgrade() {
                                shared.report_transport_error(generation, &e.to_string());
                            }
                            break Some(ABNORMAL_CLOSURE);
                        }
                    }
                    None => break None,
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(Frame::Text(text))) => {
                        if let Some(shared) = weak.upgrade() {
                            shared.handle_text(generation, &text);
                        }
                    }
                    Some(Ok(Frame::Close(code))) => {
                        break Some(code.unwrap_or(NO_STATUS_RECEIVED));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(generation, error = %e, "socket read failed");
                        if let Some(shared) = weak.upgrade() {
                            shared.report_transport_error(generation, &e.to_string());
                        }
                        break Some(ABNORMAL_CLOSURE);
                    }
                    None => break Some(ABNORMAL_CLOSURE),
                },
            }
        };

        match (close_code, weak.upgrade()) {
            (Some(code), Some(shared)) => shared.handle_close(generation, code, true),
            _ => tracing::debug!(generation, "socket closed locally"),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.inner).generation == generation
    }

    /// Moves to `Open` if `generation` is still current, resetting the
    /// reconnect budget.
    fn mark_open(&self, generation: u64) -> bool {
        let mut inner = lock(&self.inner);
        if inner.generation != generation {
            return false;
        }
        inner.state = ChannelState::Open;
        inner.reconnect.cancel();
        inner.reconnect.reset();
        true
    }

    fn handle_text(&self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }
        match decode_frame(text) {
            Ok(Some(event)) => self.emit(&event),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(generation, error = %e, "dropping malformed message");
            }
        }
    }

    fn report_transport_error(&self, generation: u64, message: &str) {
        if self.is_current(generation) {
            self.emit(&ChannelEvent::Error(ChannelError::Transport {
                message: message.to_string(),
            }));
        }
    }

    /// Records that socket `generation` closed with `code`.
    ///
    /// Publishes `Connected(false)` when `announce` is set, then schedules a
    /// reconnect for any code but normal closure.
    fn handle_close(self: &Arc<Self>, generation: u64, code: u16, announce: bool) {
        let exhausted = {
            let mut inner = lock(&self.inner);
            if inner.generation != generation {
                return;
            }
            inner.socket = None;
            inner.state = ChannelState::Closed;
            tracing::info!(generation, code, "command channel closed");

            if code == NORMAL_CLOSURE {
                None
            } else {
                self.schedule_reconnect(&mut inner)
            }
        };

        if announce {
            self.emit(&ChannelEvent::Connected(false));
        }
        if let Some(attempts) = exhausted {
            self.emit(&ChannelEvent::Error(ChannelError::ReconnectExhausted {
                attempts,
            }));
        }
    }

    /// Schedules the next reconnect attempt.
    ///
    /// Returns `Some(attempts)` when the budget is already spent and nothing
    /// was scheduled.
    fn schedule_reconnect(self: &Arc<Self>, inner: &mut Inner) -> Option<u32> {
        let endpoint = inner.endpoint.clone()?;

        let Some(attempt) = inner.reconnect.next_attempt() else {
            let attempts = inner.reconnect.attempts();
            tracing::error!(attempts, "max reconnection attempts reached");
            return Some(attempts);
        };

        let delay = inner.reconnect.delay();
        let generation = inner.generation;
        inner.state = ChannelState::Reconnecting;
        tracing::info!(
            attempt,
            max = inner.reconnect.max_attempts(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reconnect(generation, endpoint);
            }
        });
        inner.reconnect.arm(task);
        None
    }

    /// Runs a scheduled attempt unless something superseded it meanwhile.
    fn fire_reconnect(self: &Arc<Self>, generation: u64, endpoint: Endpoint) {
        let mut inner = lock(&self.inner);
        if inner.generation != generation || inner.state != ChannelState::Reconnecting {
            return;
        }
        tracing::info!(
            %endpoint,
            attempt = inner.reconnect.attempts(),
            "reconnecting command channel"
        );
        self.open_socket(&mut inner, endpoint);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
