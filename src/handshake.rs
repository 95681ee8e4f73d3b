//! Composed SOCKS5 operations.
//!
//! Each operation is a chain of primitive reads and writes on one stream.
//! Every `.await` is a suspend point; the first failure, from the socket or
//! from the codec, ends the chain and is returned to the caller without any
//! further I/O. Buffers are locals of the running future, so nothing
//! outside the operation can see them.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::protocol::{
    self, AddressType, Command, CommandKind, greeting_reply, parse_greeting_header,
    parse_request_header, select_method,
};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// negotiate_greeting reads the client greeting, checks that "no
/// authentication" is on offer and answers with the method selection
pub async fn negotiate_greeting<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    // Instantiate handshake buffer & read
    let mut header = [0u8; 2];
    stream.read_exact(&mut header).await?;

    // Version and method count are checked before any method byte is read
    let n_methods = parse_greeting_header(header)?;

    let mut methods = vec![0u8; n_methods];
    stream.read_exact(&mut methods).await?;

    let method = select_method(&methods)?;
    debug!(?method, offered = n_methods, "authentication method selected");

    // Write response to client
    stream.write_all(&greeting_reply()).await?;
    stream.flush().await?;

    Ok(())
}

/// decode_request reads a full SOCKS5 request: header, address, port
pub async fn decode_request<S>(stream: &mut S) -> Result<Command>
where
    S: AsyncRead + Unpin,
{
    let (kind, addr_type) = read_request_header(stream).await?;
    let target = read_address(stream, addr_type).await?;
    let port = read_port(stream).await?;

    Ok(Command::new(kind, target, port))
}

/// read_request_header reads and validates VER, CMD, RSV and ATYP.
/// Nothing past those four bytes is consumed when validation fails.
pub async fn read_request_header<S>(stream: &mut S) -> Result<(CommandKind, AddressType)>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    parse_request_header(header)
}

/// read_address reads DST.ADDR for the given address type
pub async fn read_address<S>(stream: &mut S, addr_type: AddressType) -> Result<Address>
where
    S: AsyncRead + Unpin,
{
    match addr_type {
        AddressType::IPv4 => {
            let mut octets = [0u8; 4];
            stream.read_exact(&mut octets).await?;
            Ok(Address::from_ipv4(octets))
        }
        AddressType::DomainName => {
            // First octet in DomainName contains the number of
            // octets to follow
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;

            let mut domain = vec![0u8; len[0] as usize];
            stream.read_exact(&mut domain).await?;

            Address::from_domain_bytes(&domain)
        }
        AddressType::IPv6 => Err(Address::unsupported_ipv6()),
    }
}

/// read_port reads the 2-byte DST.PORT
pub async fn read_port<S>(stream: &mut S) -> Result<u16>
where
    S: AsyncRead + Unpin,
{
    let mut port = [0u8; 2];
    stream.read_exact(&mut port).await?;

    Ok(protocol::parse_port(port))
}

/// handshake runs the greeting and then the request on the same stream
pub async fn handshake<S>(stream: &mut S) -> Result<Command>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    negotiate_greeting(stream).await?;
    decode_request(stream).await
}

/// with_deadline bounds a composed operation. When the deadline passes the
/// operation is dropped, which cancels whatever I/O it was waiting on.
/// `None` runs the operation unbounded.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, op)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => op.await,
    }
}
