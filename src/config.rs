//! Decree documents.
//!
//! A decree document is a JSON array of directives:
//!
//! ```json
//! [
//!   {
//!     "decree": "launchClient",
//!     "specifics": {
//!       "serverAddress": "203.0.113.7",
//!       "serverPort": 2040,
//!       "localAddress": "127.0.0.1",
//!       "localPort": 1080
//!     }
//!   }
//! ]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Default bound on a client's greeting + request, in seconds
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Decree is one directive of a decree document
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "decree", content = "specifics", rename_all = "camelCase")]
pub enum Decree {
    /// Run a local SOCKS5 front end that relays to a remote server
    LaunchClient(ClientSpecifics),
    /// Run the remote side. Recognised, not implemented.
    LaunchServer(Value),
}

/// ClientSpecifics are the settings of a launchClient decree
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientSpecifics {
    pub server_address: String,
    pub server_port: u16,
    pub local_address: String,
    pub local_port: u16,
    /// 0 disables the handshake deadline
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

fn default_handshake_timeout_secs() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

/// ClientSpecifics implementation block
impl ClientSpecifics {
    /// listen_addr is the local endpoint clients connect to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.local_address, self.local_port)
    }

    /// upstream is the remote server the relay forwards to
    pub fn upstream(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        match self.handshake_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// parse reads a decree document from a JSON string
pub fn parse(text: &str) -> Result<Vec<Decree>> {
    serde_json::from_str(text).context("[ERR] invalid decree document")
}

/// load reads a decree document from disk
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Decree>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("[ERR] failed to read config {}", path.display()))?;
    parse(&text).with_context(|| format!("[ERR] in {}", path.display()))
}
