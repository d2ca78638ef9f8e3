//! WebSocket connection to the bout simulator.
//!
//! The [`ConnectionManager`] owns one supervising task per connection. That
//! task is the only writer: it opens the socket, reads frames one at a time,
//! and pushes each parsed snapshot into the [`BoutStateStore`]. Lifecycle
//! events go through [`ConnectionLifecycle`] in the order the transport
//! delivers them.
//!
//! The client is receive-only and never sends application messages.
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = BoutStateStore::new();
//! let mut manager = ConnectionManager::new(ClientConfig::default(), store.clone());
//! manager.start();
//!
//! let mut updates = store.subscribe();
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     // draw snapshot
//! }
//!
//! manager.stop().await;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ParseError, TransportError};
use crate::state::bout::BoutState;
use crate::state::connection::{ConnectionEvent, ConnectionLifecycle, ConnectionStatus};
use crate::state::store::BoutStateStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the peer to drop the socket after its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Receiver for connectivity changes.
pub type StatusWatch = watch::Receiver<ConnectionStatus>;

/// Lifecycle and disposal flag, always locked together.
#[derive(Debug, Default)]
struct Guarded {
    lifecycle: ConnectionLifecycle,
    /// Set once the manager is dropped; nothing is applied afterwards
    disposed: bool,
}

/// State shared between the manager handle and its supervising task.
#[derive(Debug)]
struct Shared {
    store: BoutStateStore,
    guarded: Mutex<Guarded>,
    status_tx: watch::Sender<ConnectionStatus>,
    rejected: AtomicU64,
}

impl Shared {
    fn new(store: BoutStateStore) -> Self {
        Self {
            store,
            guarded: Mutex::new(Guarded::default()),
            status_tx: watch::Sender::new(ConnectionStatus::Disconnected),
            rejected: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> ConnectionStatus {
        self.lock().lifecycle.status()
    }

    fn apply(&self, event: ConnectionEvent) {
        let mut guarded = self.lock();
        if guarded.disposed {
            return;
        }
        self.transition(&mut guarded.lifecycle, event);
    }

    fn transition(&self, lifecycle: &mut ConnectionLifecycle, event: ConnectionEvent) {
        match lifecycle.apply_mut(event) {
            Ok(from) => {
                let to = lifecycle.status();
                debug!(?from, ?to, ?event, "connection status changed");
                self.status_tx.send_replace(to);
            }
            Err(err) => warn!(error = %err, "ignoring connection event"),
        }
    }

    /// Final `Closed`, then refuse everything after it.
    fn dispose(&self) {
        let mut guarded = self.lock();
        if guarded.disposed {
            return;
        }
        if guarded.lifecycle.status() != ConnectionStatus::Disconnected {
            self.transition(&mut guarded.lifecycle, ConnectionEvent::Closed);
        }
        guarded.disposed = true;
    }

    fn ingest(&self, payload: &str) -> Result<u64, ParseError> {
        let state = match BoutState::from_json(payload) {
            Ok(state) => state,
            Err(err) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, len = payload.len(), "dropping malformed bout frame");
                return Err(err);
            }
        };

        if state.priority_conflict() {
            warn!(
                fencer1 = %state.fencer1.name,
                fencer2 = %state.fencer2.name,
                "both fencers flagged with priority"
            );
        }
        if !state.distance.is_recognized() {
            debug!(distance = %state.distance, "unrecognized distance, drawing at medium");
        }

        let guarded = self.lock();
        if guarded.disposed {
            return Ok(self.store.sequence());
        }
        Ok(self.store.replace(state))
    }
}

struct Supervisor {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Supervises the connection to the bout source and feeds the store.
pub struct ConnectionManager {
    config: ClientConfig,
    shared: Arc<Shared>,
    supervisor: Option<Supervisor>,
}

impl ConnectionManager {
    /// Create an idle manager that will write into `store`.
    pub fn new(config: ClientConfig, store: BoutStateStore) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::new(store)),
            supervisor: None,
        }
    }

    /// Settings this manager connects with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The store fed by this manager.
    pub fn store(&self) -> &BoutStateStore {
        &self.shared.store
    }

    /// Begin connecting to the configured endpoint.
    ///
    /// Does nothing while a connection is already being attempted or is
    /// open. Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if let Some(supervisor) = &self.supervisor {
            if !supervisor.handle.is_finished() {
                debug!("start ignored, connection already active");
                return;
            }
        }

        self.shared.apply(ConnectionEvent::Start);
        info!(endpoint = %self.config.endpoint, "connecting to bout simulator");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(supervise(
            self.config.clone(),
            Arc::clone(&self.shared),
            shutdown_rx,
        ));
        self.supervisor = Some(Supervisor { shutdown, handle });
    }

    /// Close the connection if open and wait for the task to finish.
    ///
    /// Safe to call in any state, including repeatedly.
    pub async fn stop(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            return;
        };
        let _ = supervisor.shutdown.send(());
        if let Err(err) = supervisor.handle.await {
            warn!(error = %err, "connection task ended abnormally");
            self.shared.apply(ConnectionEvent::Closed);
        }
    }

    /// Handle one inbound payload.
    ///
    /// On success the store holds the new snapshot and its sequence number is
    /// returned. On failure the previous snapshot stays in place.
    pub fn on_message(&self, payload: &str) -> Result<u64, ParseError> {
        self.shared.ingest(payload)
    }

    /// Current connectivity.
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Observe connectivity changes.
    pub fn status_watch(&self) -> StatusWatch {
        self.shared.status_tx.subscribe()
    }

    /// Frames dropped because they did not parse.
    pub fn frames_rejected(&self) -> u64 {
        self.shared.rejected.load(Ordering::Relaxed)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.handle.abort();
            debug!("connection manager dropped, socket released");
        }
        self.shared.dispose();
    }
}

/// Connection task: connect, read until closed, optionally retry.
async fn supervise(
    config: ClientConfig,
    shared: Arc<Shared>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let attempt = tokio::select! {
            _ = &mut shutdown => {
                shared.apply(ConnectionEvent::Closed);
                return;
            }
            attempt = open(&config) => attempt,
        };

        match attempt {
            Ok(ws) => {
                shared.apply(ConnectionEvent::Opened);
                info!(endpoint = %config.endpoint, "connected to bout simulator");

                let stopped = receive(ws, &shared, &mut shutdown).await;
                shared.apply(ConnectionEvent::Closed);
                info!(endpoint = %config.endpoint, "disconnected from bout simulator");
                if stopped {
                    return;
                }
            }
            Err(err) => {
                warn!(endpoint = %config.endpoint, error = %err, "connection attempt failed");
                shared.apply(ConnectionEvent::Failed);
            }
        }

        let Some(delay) = config.reconnect.delay() else {
            return;
        };
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
        shared.apply(ConnectionEvent::Start);
        debug!(endpoint = %config.endpoint, ?delay, "reconnecting");
    }
}

async fn open(config: &ClientConfig) -> Result<WsStream, TransportError> {
    let attempt = tokio_tungstenite::connect_async(config.endpoint.as_str());
    match tokio::time::timeout(config.connect_timeout, attempt).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(TransportError::TimedOut {
            after: config.connect_timeout,
        }),
    }
}

/// Read frames until the peer goes away or shutdown is requested.
///
/// Returns true when the loop ended because of a shutdown request.
async fn receive(
    mut ws: WsStream,
    shared: &Shared,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool {
    loop {
        let next = tokio::select! {
            _ = &mut *shutdown => None,
            frame = ws.next() => Some(frame),
        };

        let frame = match next {
            None => {
                if let Err(err) = ws.close(None).await {
                    debug!(error = %err, "close handshake did not complete");
                }
                return true;
            }
            Some(frame) => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let _ = shared.ingest(text.as_str());
            }
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => {
                    let _ = shared.ingest(text);
                }
                Err(_) => {
                    shared.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %ParseError::NotUtf8, len = bytes.len(), "dropping binary frame");
                }
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "server closed the connection");
                finish_close(&mut ws).await;
                return false;
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(error = %TransportError::from(err), "connection lost");
                return false;
            }
            None => return false,
        }
    }
}

/// Keep reading after the peer's close frame so the queued reply is flushed,
/// until the peer drops the socket.
async fn finish_close(ws: &mut WsStream) {
    let drain = async { while let Some(Ok(_)) = ws.next().await {} };
    if tokio::time::timeout(CLOSE_GRACE, drain).await.is_err() {
        debug!("peer kept the socket open after the close handshake");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::distance::{DistanceClass, DistanceGeometryMapper};
    use futures_util::SinkExt;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    const SHORT_FRAME: &str = r#"{"distance":"SHORT",
        "fencer1":{"name":"A","score":3,"blade_position":"en-garde","has_priority":true},
        "fencer2":{"name":"B","score":2,"blade_position":"en-garde","has_priority":false},
        "current_action":"attack","rounds":5}"#;

    type ServerWs = WebSocketStream<TcpStream>;

    async fn listen() -> (TcpListener, ClientConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = ClientConfig::from_host_port("127.0.0.1", port)
            .unwrap()
            .with_connect_timeout(Duration::from_secs(5));
        (listener, config)
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }

    async fn wait_for_status(manager: &ConnectionManager, status: ConnectionStatus) {
        let mut statuses = manager.status_watch();
        tokio::time::timeout(Duration::from_secs(5), statuses.wait_for(|s| *s == status))
            .await
            .unwrap()
            .unwrap();
    }

    async fn wait_for_sequence(store: &BoutStateStore, sequence: u64) {
        let mut updates = store.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            updates.wait_for(|snapshot| snapshot.sequence >= sequence),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[test]
    fn test_on_message_replaces_state() {
        let store = BoutStateStore::new();
        let manager = ConnectionManager::new(ClientConfig::default(), store.clone());

        let seq = manager.on_message(SHORT_FRAME).unwrap();
        assert_eq!(seq, 1);

        let current = store.current();
        assert_eq!(current, BoutState::from_json(SHORT_FRAME).unwrap());
        assert_eq!(DistanceGeometryMapper::spacing_for(Some(&current.distance)), 200);
    }

    #[test]
    fn test_malformed_frame_keeps_previous_state() {
        let store = BoutStateStore::new();
        let manager = ConnectionManager::new(ClientConfig::default(), store.clone());
        manager.on_message(SHORT_FRAME).unwrap();
        let before = store.current();

        assert!(manager.on_message("{not json").is_err());
        assert!(manager.on_message(r#"{"distance":"LONG"}"#).is_err());

        assert_eq!(store.current(), before);
        assert_eq!(store.sequence(), 1);
        assert_eq!(manager.frames_rejected(), 2);
    }

    #[test]
    fn test_no_messages_yields_default() {
        let store = BoutStateStore::new();
        let manager = ConnectionManager::new(ClientConfig::default(), store.clone());

        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        let current = store.current();
        assert_eq!(current, BoutState::default());
        assert_eq!(current.distance.class(), Some(DistanceClass::Medium));
        assert_eq!(DistanceGeometryMapper::spacing_for(Some(&current.distance)), 400);
    }

    #[tokio::test]
    async fn test_end_to_end_short_frame() {
        let (listener, config) = listen().await;
        let store = BoutStateStore::new();
        let mut manager = ConnectionManager::new(config, store.clone());

        manager.start();
        assert_eq!(manager.status(), ConnectionStatus::Connecting);

        let mut server = accept(&listener).await;
        server.send(Message::text(SHORT_FRAME)).await.unwrap();
        wait_for_sequence(&store, 1).await;

        assert_eq!(manager.status(), ConnectionStatus::Connected);
        let current = store.current();
        assert_eq!(current, BoutState::from_json(SHORT_FRAME).unwrap());
        assert_eq!(DistanceGeometryMapper::spacing_for(Some(&current.distance)), 200);

        manager.stop().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_frame_over_socket() {
        let (listener, config) = listen().await;
        let store = BoutStateStore::new();
        let mut manager = ConnectionManager::new(config, store.clone());
        manager.start();

        let mut server = accept(&listener).await;
        server.send(Message::text(SHORT_FRAME)).await.unwrap();
        server.send(Message::text("definitely not json")).await.unwrap();
        server
            .send(Message::binary(vec![0xff_u8, 0xfe, 0xfd]))
            .await
            .unwrap();
        let next = SHORT_FRAME.replace("\"rounds\":5", "\"rounds\":6");
        server.send(Message::text(next)).await.unwrap();

        wait_for_sequence(&store, 2).await;
        assert_eq!(store.current().rounds, 6);
        assert_eq!(manager.frames_rejected(), 2);
        assert_eq!(manager.status(), ConnectionStatus::Connected);

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_server_close_lands_disconnected() {
        let (listener, config) = listen().await;
        let store = BoutStateStore::new();
        let mut manager = ConnectionManager::new(config, store.clone());
        manager.start();

        let mut server = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;
        server.close(None).await.unwrap();
        drop(server);

        wait_for_status(&manager, ConnectionStatus::Disconnected).await;
        assert_eq!(store.current(), BoutState::default());
    }

    #[tokio::test]
    async fn test_server_close_is_acknowledged() {
        let (listener, config) = listen().await;
        let mut manager = ConnectionManager::new(config, BoutStateStore::new());
        manager.start();

        let mut server = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;
        server.close(None).await.unwrap();

        // the client echoes the close frame instead of resetting the socket
        let echo = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .unwrap();
        assert!(matches!(echo, Some(Ok(Message::Close(_)))));
        drop(server);

        wait_for_status(&manager, ConnectionStatus::Disconnected).await;
        manager.stop().await;
    }

    #[tokio::test]
    async fn test_handshake_timeout_lands_disconnected() {
        let (listener, config) = listen().await;
        let config = config.with_connect_timeout(Duration::from_millis(200));

        // accept the TCP connection but never answer the upgrade request
        let silent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let mut manager = ConnectionManager::new(config.clone(), BoutStateStore::new());
        manager.start();
        wait_for_status(&manager, ConnectionStatus::Disconnected).await;

        let supervisor = manager.supervisor.take().unwrap();
        tokio::time::timeout(Duration::from_secs(5), supervisor.handle)
            .await
            .unwrap()
            .unwrap();

        // a second attempt sits in the backlog and times out the same way
        let attempt = open(&config).await;
        assert!(matches!(
            attempt,
            Err(TransportError::TimedOut { after }) if after == Duration::from_millis(200)
        ));
        silent.abort();
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_retried() {
        let (listener, config) = listen().await;
        drop(listener);

        let mut manager = ConnectionManager::new(config, BoutStateStore::new());
        manager.start();
        wait_for_status(&manager, ConnectionStatus::Disconnected).await;

        // task exits on its own
        let supervisor = manager.supervisor.take().unwrap();
        tokio::time::timeout(Duration::from_secs(5), supervisor.handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (listener, config) = listen().await;
        let mut manager = ConnectionManager::new(config, BoutStateStore::new());

        manager.start();
        manager.start();
        let _server = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;
        manager.start();
        assert_eq!(manager.status(), ConnectionStatus::Connected);

        // only one connection was made
        let second = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(second.is_err());

        manager.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_once() {
        let (listener, config) = listen().await;
        let mut manager = ConnectionManager::new(config, BoutStateStore::new());
        manager.start();

        let mut server = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;

        manager.stop().await;
        manager.stop().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);

        let first = server.next().await;
        assert!(matches!(first, Some(Ok(Message::Close(_)))));
        // nothing after the close handshake
        let rest = server.next().await;
        assert!(!matches!(rest, Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_)))));
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let mut manager = ConnectionManager::new(ClientConfig::default(), BoutStateStore::new());
        manager.stop().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_drop_releases_socket() {
        let (listener, config) = listen().await;
        let store = BoutStateStore::new();
        let manager = {
            let mut manager = ConnectionManager::new(config, store.clone());
            manager.start();
            manager
        };

        let mut server = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;
        drop(manager);

        let ended = tokio::time::timeout(Duration::from_secs(5), server.next())
            .await
            .unwrap();
        assert!(!matches!(ended, Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_)))));

        // no handler runs after disposal
        let _ = server.send(Message::text(SHORT_FRAME)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.sequence(), 0);
    }

    #[test]
    fn test_disposed_ignores_late_events() {
        let store = BoutStateStore::new();
        let shared = Shared::new(store.clone());
        let mut statuses = shared.status_tx.subscribe();
        shared.apply(ConnectionEvent::Start);
        shared.apply(ConnectionEvent::Opened);

        shared.dispose();
        assert_eq!(shared.status(), ConnectionStatus::Disconnected);
        assert_eq!(*statuses.borrow_and_update(), ConnectionStatus::Disconnected);

        // a task still mid-poll cannot reopen or write after disposal
        shared.apply(ConnectionEvent::Start);
        shared.apply(ConnectionEvent::Opened);
        assert_eq!(shared.status(), ConnectionStatus::Disconnected);
        assert!(!statuses.has_changed().unwrap());
        assert_eq!(shared.ingest(SHORT_FRAME).unwrap(), 0);
        assert_eq!(store.sequence(), 0);

        shared.dispose();
        assert_eq!(shared.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_reconnect_policy_retries() {
        let (listener, config) = listen().await;
        let config = config.with_reconnect(crate::config::ReconnectPolicy::After(
            Duration::from_millis(20),
        ));
        let store = BoutStateStore::new();
        let mut manager = ConnectionManager::new(config, store.clone());
        manager.start();

        let mut first = accept(&listener).await;
        wait_for_status(&manager, ConnectionStatus::Connected).await;
        first.close(None).await.unwrap();
        drop(first);

        let mut second = accept(&listener).await;
        second.send(Message::text(SHORT_FRAME)).await.unwrap();
        wait_for_sequence(&store, 1).await;
        assert_eq!(manager.status(), ConnectionStatus::Connected);

        manager.stop().await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }
}
