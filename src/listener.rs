use crate::context::ClientContext;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::rc::{Rc, Weak};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Listener owns the bound socket of one proxy instance
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

/// Listener implementation block
impl Listener {
    /// bind to the listen address
    pub async fn bind(listen_addr: &str) -> Result<Self> {
        let inner = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("[ERR] failed to bind {listen_addr}"))?;
        let local_addr = inner.local_addr()?;

        info!("SOCKS5 proxy listening on {}", local_addr);

        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// start_listen keeps exactly one accept outstanding. Every accepted
    /// socket is handed to the owning context, then the next accept is
    /// armed. Accept errors are logged and the loop carries on; it only
    /// ends once the context is gone.
    pub async fn start_listen(self: Rc<Self>, ctx: Weak<ClientContext>) {
        loop {
            let accepted = self.inner.accept().await;

            let Some(ctx) = ctx.upgrade() else {
                debug!(addr = %self.local_addr, "context dropped, listener stopping");
                return;
            };

            match accepted {
                Ok((stream, peer)) => {
                    let id = ctx.add_connection(stream, peer);
                    debug!(conn = %id, %peer, "new client");
                }
                Err(e) => error!(addr = %self.local_addr, "accept failed: {e}"),
            }
        }
    }
}
