//! The negotiating front end of a SOCKS5 proxy
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - Greeting with "no authentication"
//!     - CONNECT / BIND / UDP ASSOCIATE requests decoded (relay attaches
//!       through [`relay::RelaySeam`])
//!     - IPv4 and domain name targets
//!     - Single-threaded event loop, one task per client
//!     - Deadline on every handshake
//!     - Proxy instances launched from a JSON decree document
//! - Not supported: username/password or GSSAPI authentication, IPv6
//!   targets, SOCKS5 failure replies (a bad client is simply dropped)
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//!
//! # Example
//! ```no_run
//! use socksfront::{ClientSettings, Registry, relay::UnattachedRelay};
//! use std::rc::Rc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = Registry::new()?;
//!     let settings = ClientSettings {
//!         listen: "127.0.0.1:1080".into(),
//!         handshake_timeout: None,
//!     };
//!     registry.launch_client(settings, Rc::new(UnattachedRelay::new("203.0.113.7:2040")))?;
//!     registry.run()
//! }
//! ```

pub mod address;
pub mod config;
pub mod connection;
pub mod context;
pub mod decree;
pub mod error;
pub mod handshake;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod relay;

// Re-export main types at crate root for convenience
pub use address::Address;
pub use connection::{Connection, ConnectionId, ConnectionState};
pub use context::{ClientContext, ClientSettings};
pub use error::{Error, Result};
pub use protocol::{AddressType, AuthMethod, Command, CommandKind, Version};
pub use registry::{GlobalObject, Registry};
