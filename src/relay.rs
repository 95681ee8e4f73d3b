use crate::connection::ConnectionId;
use crate::protocol::Command;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// RelaySeam is where the traffic relay attaches: it is handed every
/// successfully decoded command together with the client's socket
pub trait RelaySeam {
    fn dispatch(&self, id: ConnectionId, command: Command, stream: TcpStream);
}

/// UnattachedRelay records the decoded command and closes the client
/// socket. It stands in until a real relay toward the upstream server
/// exists.
#[derive(Debug, Clone)]
pub struct UnattachedRelay {
    upstream: String,
}

/// UnattachedRelay implementation block
impl UnattachedRelay {
    /// new is a constructor for the UnattachedRelay type; upstream is the
    /// server a relay would forward to
    pub fn new(upstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
        }
    }

    pub fn upstream(&self) -> &str {
        &self.upstream
    }
}

impl RelaySeam for UnattachedRelay {
    fn dispatch(&self, id: ConnectionId, command: Command, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        info!(
            conn = %id,
            ?peer,
            upstream = %self.upstream,
            "client request decoded: {command}"
        );
    }
}

/// Handoff is one dispatched command with the socket it arrived on
#[derive(Debug)]
pub struct Handoff {
    pub id: ConnectionId,
    pub command: Command,
    pub stream: TcpStream,
}

/// A channel sender is a relay seam that forwards every handoff to
/// whoever holds the receiver
impl RelaySeam for mpsc::UnboundedSender<Handoff> {
    fn dispatch(&self, id: ConnectionId, command: Command, stream: TcpStream) {
        if self.send(Handoff { id, command, stream }).is_err() {
            warn!(conn = %id, "relay receiver dropped, closing client");
        }
    }
}
