use crate::connection::{Connection, ConnectionId, ConnectionState};
use crate::error::Result as HandshakeResult;
use crate::listener::Listener;
use crate::protocol::Command;
use crate::registry::GlobalObject;
use crate::relay::RelaySeam;
use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::{self, AbortHandle};
use tracing::{debug, info, warn};

/// ClientSettings holds what one proxy instance needs to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Local address clients connect to, "host:port"
    pub listen: String,
    /// Upper bound on greeting + request; `None` waits forever
    pub handshake_timeout: Option<Duration>,
}

/// ConnectionSlot is what the context keeps about one live connection.
/// The connection itself lives in its task.
struct ConnectionSlot {
    peer: SocketAddr,
    state: watch::Receiver<ConnectionState>,
    task: AbortHandle,
}

/// ConnectionTable hands out connection ids and holds the slots of the
/// connections that have not reached a terminal state yet
#[derive(Default)]
struct ConnectionTable {
    next_id: u64,
    live: HashMap<ConnectionId, ConnectionSlot>,
}

impl ConnectionTable {
    fn allocate(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId::new(self.next_id)
    }

    fn insert(&mut self, id: ConnectionId, slot: ConnectionSlot) {
        self.live.insert(id, slot);
    }

    fn release(&mut self, id: ConnectionId) -> Option<ConnectionSlot> {
        self.live.remove(&id)
    }
}

/// ClientContext is one running proxy instance: its listener plus the
/// connections accepted on it.
///
/// Everything here runs on the registry's single-threaded executor, so the
/// table sits in a `RefCell` and is never borrowed across an `.await`.
pub struct ClientContext {
    settings: ClientSettings,
    listener: Rc<Listener>,
    connections: RefCell<ConnectionTable>,
    relay: Rc<dyn RelaySeam>,
    accept_task: RefCell<Option<AbortHandle>>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// ClientContext implementation block
impl ClientContext {
    /// bind creates the context and binds its listener. Nothing is accepted
    /// until start_listen is called.
    pub async fn bind(settings: ClientSettings, relay: Rc<dyn RelaySeam>) -> Result<Rc<Self>> {
        let listener = Listener::bind(&settings.listen).await?;

        Ok(Rc::new(Self {
            settings,
            listener: Rc::new(listener),
            connections: RefCell::new(ConnectionTable::default()),
            relay,
            accept_task: RefCell::new(None),
        }))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// start_listen arms the accept loop on the current `LocalSet`.
    /// Calling it again while the loop runs does nothing.
    pub fn start_listen(self: &Rc<Self>) {
        let mut accept_task = self.accept_task.borrow_mut();
        if accept_task.is_some() {
            return;
        }

        let handle = task::spawn_local(self.listener.clone().start_listen(Rc::downgrade(self)));
        *accept_task = Some(handle.abort_handle());
    }

    /// add_connection registers a freshly accepted socket and starts its
    /// handshake on the executor
    pub fn add_connection(self: &Rc<Self>, stream: TcpStream, peer: SocketAddr) -> ConnectionId {
        let id = self.connections.borrow_mut().allocate();
        let mut conn = Connection::new(id, stream);
        let state = conn.subscribe();

        let ctx = Rc::downgrade(self);
        let deadline = self.settings.handshake_timeout;

        let handle = task::spawn_local(async move {
            let outcome = conn.start(deadline).await;

            // A dropped context already released every slot
            if let Some(ctx) = ctx.upgrade() {
                ctx.report(conn, outcome);
            }
        });

        // The task cannot run before we yield, so the slot is in place
        // before it can be released
        self.connections.borrow_mut().insert(
            id,
            ConnectionSlot {
                peer,
                state,
                task: handle.abort_handle(),
            },
        );

        id
    }

    /// report receives the terminal outcome of a connection's handshake
    fn report(&self, conn: Connection<TcpStream>, outcome: HandshakeResult<Command>) {
        let id = conn.id();
        let peer = self
            .connections
            .borrow()
            .live
            .get(&id)
            .map(|slot| slot.peer);

        match outcome {
            Ok(command) => {
                info!(conn = %id, ?peer, "request: {command}");
                conn.finish();
                self.relay.dispatch(id, command, conn.into_stream());
            }
            Err(e) if e.is_eof() => {
                debug!(conn = %id, ?peer, "client hung up during handshake");
            }
            Err(e) => {
                // No SOCKS5 failure reply is sent; the socket is just dropped
                warn!(conn = %id, ?peer, "handshake failed: {e}");
            }
        }

        self.connections.borrow_mut().release(id);
    }

    /// live_connections counts connections still negotiating
    pub fn live_connections(&self) -> usize {
        self.connections.borrow().live.len()
    }

    /// connection_state looks up the state of a live connection. Released
    /// connections give `None`.
    pub fn connection_state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.connections
            .borrow()
            .live
            .get(&id)
            .map(|slot| *slot.state.borrow())
    }

    /// shutdown stops accepting and aborts every handshake in flight
    pub fn shutdown(&self) {
        if let Some(accept_task) = self.accept_task.borrow_mut().take() {
            accept_task.abort();
        }

        let drained: Vec<_> = self.connections.borrow_mut().live.drain().collect();
        for (id, slot) in drained {
            debug!(conn = %id, peer = %slot.peer, "aborting handshake");
            slot.task.abort();
        }
    }
}

impl GlobalObject for ClientContext {
    fn describe(&self) -> String {
        format!(
            "socks5 client context on {} ({} live)",
            self.local_addr(),
            self.live_connections()
        )
    }
}

impl Drop for ClientContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
