use crate::error::{Error, Result};
use crate::handshake::{decode_request, negotiate_greeting, with_deadline};
use crate::protocol::Command;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tracing::debug;

/// ConnectionState tracks how far a client got through the handshake.
///
/// `Init` -> `Authed` -> `Closed` is the happy path. `Error` can be entered
/// from `Init` or `Authed`. `Error` and `Closed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet
    Init,
    /// Greeting done, request being decoded or decoded
    Authed,
    /// Handshake failed
    Error,
    /// Command handed to the relay
    Closed,
}

/// ConnectionState implementation block
impl ConnectionState {
    /// is_terminal reports whether no further protocol step can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Error | ConnectionState::Closed)
    }
}

/// ConnectionId is the stable handle of a connection inside its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection drives one accepted client through the SOCKS5 handshake.
/// It owns the client's stream for as long as it lives.
pub struct Connection<S> {
    id: ConnectionId,
    stream: S,
    state: watch::Sender<ConnectionState>,
}

/// Connection implementation block
impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// new is a constructor for the Connection type; the state starts at
    /// `Init`
    pub fn new(id: ConnectionId, stream: S) -> Self {
        let (state, _) = watch::channel(ConnectionState::Init);
        Self { id, stream, state }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// subscribe hands out a receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// start runs the greeting and then decodes the request, all under the
    /// given deadline. Any failure moves the connection to `Error` and is
    /// returned for the owner to report.
    pub async fn start(&mut self, deadline: Option<Duration>) -> Result<Command> {
        if self.state() != ConnectionState::Init {
            return Err(Error::protocol(format!(
                "connection {} already started",
                self.id
            )));
        }

        let Self { id, stream, state } = self;
        let id = *id;

        let outcome = with_deadline(deadline, async {
            negotiate_greeting(stream).await?;
            transition(id, state, ConnectionState::Authed);
            decode_request(stream).await
        })
        .await;

        if outcome.is_err() {
            transition(id, state, ConnectionState::Error);
        }

        outcome
    }

    /// finish marks a connection whose command was handed off as `Closed`
    pub fn finish(&self) {
        if self.state() == ConnectionState::Authed {
            transition(self.id, &self.state, ConnectionState::Closed);
        }
    }

    /// into_stream gives the client stream back, e.g. to a relay
    pub fn into_stream(self) -> S {
        self.stream
    }
}

fn transition(id: ConnectionId, state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    let prev = state.send_replace(next);
    debug!(conn = %id, from = ?prev, to = ?next, "state change");
}
