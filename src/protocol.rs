//! SOCKS5 wire codec: constants, enumerations and the byte-level checks for
//! the greeting and the request. Nothing in here touches a socket.
//!
//! Every decoder is total over its input: malformed bytes give an
//! [`Error`], short input gives a "truncated" protocol error, and no decoder
//! looks past the lengths declared in the message.

use crate::address::Address;
use crate::error::{Error, Result};
use std::fmt;

// RSV: Fields marked RESERVED (RSV) must be set to X'00'.
pub const RSV: u8 = 0x00;

/// Version represents available SOCKS proxy versions. Only SOCKS5 is
/// spoken here.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    SOCKS5 = 0x05,
}

/// AuthMethod represents the SOCKS5 authentication methods we know about
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth = 0x00,
    // 0x01 GSSAPI, 0x02 username/password: not offered
    NoAcceptable = 0xFF,
}

/// AddressType represents the SOCKS5 address types:
/// IPv4, Domain Name, IPv6
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4 = 0x01,
    DomainName = 0x03,
    IPv6 = 0x04,
}

/// AddressType implementation block
impl AddressType {
    /// from_byte converts a byte to its related network address type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(AddressType::IPv4),
            0x03 => Some(AddressType::DomainName),
            0x04 => Some(AddressType::IPv6),
            _ => None,
        }
    }
}

/// CommandKind represents SOCKS5 protocol commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

/// CommandKind implementation block
impl CommandKind {
    /// from_byte converts a byte to its related SOCKS5 protocol command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandKind::Connect),
            0x02 => Some(CommandKind::Bind),
            0x03 => Some(CommandKind::UdpAssociate),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandKind::Connect => "CONNECT",
            CommandKind::Bind => "BIND",
            CommandKind::UdpAssociate => "UDP ASSOCIATE",
        })
    }
}

/// Command is a fully decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    target: Address,
    port: u16,
}

/// Command implementation block
impl Command {
    pub fn new(kind: CommandKind, target: Address, port: u16) -> Self {
        Self { kind, target, port }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn target(&self) -> &Address {
        &self.target
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// to_bytes encodes the command as a SOCKS5 request
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = vec![Version::SOCKS5 as u8, self.kind as u8, RSV];
        self.target.encode_into(&mut buf)?;
        buf.extend_from_slice(&self.port.to_be_bytes());
        Ok(buf)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.kind, self.target, self.port)
    }
}

// ==========
// GREETING
// ==========

// ClientHello format
// +----+----------+----------+
// |VER | NMETHODS | METHODS  |
// +----+----------+----------+
// | 1  |    1     | 1 to 255 |
// +----+----------+----------+

/// parse_greeting_header validates VER and NMETHODS and returns the number
/// of method bytes that follow
pub fn parse_greeting_header(header: [u8; 2]) -> Result<usize> {
    let [version, n_methods] = header;

    // Ensure version is 0x05 -> SOCKS5
    if version != Version::SOCKS5 as u8 {
        return Err(Error::VersionMismatch(version));
    }

    if n_methods == 0 {
        return Err(Error::protocol("greeting offers no authentication methods"));
    }

    Ok(n_methods as usize)
}

/// select_method picks the authentication method from the client's offer.
/// Only "no authentication" is supported.
pub fn select_method(client_methods: &[u8]) -> Result<AuthMethod> {
    if client_methods.contains(&(AuthMethod::NoAuth as u8)) {
        Ok(AuthMethod::NoAuth)
    } else {
        Err(Error::unsupported(format!(
            "no acceptable authentication method in {client_methods:02x?}"
        )))
    }
}

// ServerChoice method selection reply format
// +----+--------+
// |VER | METHOD |
// +----+--------+
// | 1  |   1    |
// +----+--------+

/// greeting_reply is the method selection sent back after a good greeting
pub fn greeting_reply() -> [u8; 2] {
    [Version::SOCKS5 as u8, AuthMethod::NoAuth as u8]
}

/// decode_greeting checks a complete greeting held in memory and returns
/// how many bytes it spans
pub fn decode_greeting(data: &[u8]) -> Result<usize> {
    let header: [u8; 2] = data
        .get(..2)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| Error::protocol("truncated greeting header"))?;
    let n_methods = parse_greeting_header(header)?;

    let methods = data
        .get(2..2 + n_methods)
        .ok_or_else(|| Error::protocol("truncated greeting method list"))?;
    select_method(methods)?;

    Ok(2 + n_methods)
}

// =========
// REQUEST
// =========

// SOCKS5 request format
// +----+-----+-------+------+----------+----------+
// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
// +----+-----+-------+------+----------+----------+
// | 1  |  1  | X'00' |  1   | Variable |    2     |
// +----+-----+-------+------+----------+----------+

/// parse_request_header validates the fixed 4-byte head of a request.
/// Checked in order: version, reserved byte, command, address type.
pub fn parse_request_header(header: [u8; 4]) -> Result<(CommandKind, AddressType)> {
    let [version, command, reserved, atyp] = header;

    if version != Version::SOCKS5 as u8 {
        return Err(Error::VersionMismatch(version));
    }

    if reserved != RSV {
        return Err(Error::protocol(format!(
            "reserved byte must be 0x00, got {reserved:#04x}"
        )));
    }

    let kind = CommandKind::from_byte(command)
        .ok_or_else(|| Error::protocol(format!("unknown command {command:#04x}")))?;

    let addr_type = AddressType::from_byte(atyp)
        .ok_or_else(|| Error::protocol(format!("unknown address type {atyp:#04x}")))?;

    Ok((kind, addr_type))
}

/// parse_port reads DST.PORT, which travels in network (big endian) order
pub fn parse_port(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// decode_request decodes a complete request held in memory, returning the
/// command and the number of bytes it spans
pub fn decode_request(data: &[u8]) -> Result<(Command, usize)> {
    let header: [u8; 4] = data
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| Error::protocol("truncated request header"))?;
    let (kind, addr_type) = parse_request_header(header)?;

    // Set offset past the header
    let mut offset = 4;

    let target = match addr_type {
        AddressType::IPv4 => {
            let octets: [u8; 4] = data
                .get(offset..offset + 4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| Error::protocol("truncated IPv4 address"))?;
            offset += 4;
            Address::from_ipv4(octets)
        }
        AddressType::DomainName => {
            // First octet in DomainName contains the number of
            // octets to follow
            let len = *data
                .get(offset)
                .ok_or_else(|| Error::protocol("truncated domain length"))?
                as usize;
            offset += 1;
            let domain = data
                .get(offset..offset + len)
                .ok_or_else(|| Error::protocol("truncated domain name"))?;
            offset += len;
            Address::from_domain_bytes(domain)?
        }
        AddressType::IPv6 => return Err(Address::unsupported_ipv6()),
    };

    let port: [u8; 2] = data
        .get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::protocol("truncated port"))?;
    offset += 2;

    Ok((Command::new(kind, target, parse_port(port)), offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_with_no_auth_is_accepted() {
        assert_eq!(decode_greeting(&[0x05, 0x02, 0x02, 0x00]).unwrap(), 4);
    }

    #[test]
    fn greeting_wrong_version() {
        let err = decode_greeting(&[0x04, 0x01, 0x00]).unwrap_err();
        assert!(matches!(err, Error::VersionMismatch(0x04)));
    }

    #[test]
    fn greeting_zero_methods() {
        let err = parse_greeting_header([0x05, 0x00]).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn greeting_without_no_auth_is_unsupported() {
        let err = decode_greeting(&[0x05, 0x02, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(_)));
    }

    #[test]
    fn greeting_truncated_methods() {
        let err = decode_greeting(&[0x05, 0x03, 0x00]).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn reply_is_version_then_no_auth() {
        assert_eq!(greeting_reply(), [0x05, 0x00]);
    }

    #[test]
    fn request_connect_ipv4() {
        let bytes = [0x05, 0x01, 0x00, 0x01, 0x5d, 0xb8, 0xd8, 0x22, 0x01, 0xbb];
        let (cmd, used) = decode_request(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(cmd.kind(), CommandKind::Connect);
        assert_eq!(cmd.target().to_string(), "93.184.216.34");
        assert_eq!(cmd.port(), 443);
    }

    #[test]
    fn request_domain() {
        let mut bytes = vec![0x05, 0x03, 0x00, 0x03, 0x05];
        bytes.extend_from_slice(b"abcde");
        bytes.extend_from_slice(&[0x00, 0x50]);
        let (cmd, used) = decode_request(&bytes).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(cmd.kind(), CommandKind::UdpAssociate);
        assert_eq!(cmd.target(), &Address::Domain("abcde".into()));
        assert_eq!(cmd.port(), 80);
    }

    #[test]
    fn request_empty_domain() {
        let bytes = [0x05, 0x01, 0x00, 0x03, 0x00, 0x00, 0x16];
        let (cmd, _) = decode_request(&bytes).unwrap();
        assert_eq!(cmd.target(), &Address::Domain(String::new()));
        assert_eq!(cmd.port(), 22);
    }

    #[test]
    fn request_header_errors() {
        assert!(matches!(
            parse_request_header([0x04, 0x01, 0x00, 0x01]),
            Err(Error::VersionMismatch(0x04))
        ));
        assert!(matches!(
            parse_request_header([0x05, 0x01, 0x01, 0x01]),
            Err(Error::ProtocolError(_))
        ));
        assert!(matches!(
            parse_request_header([0x05, 0x04, 0x00, 0x01]),
            Err(Error::ProtocolError(_))
        ));
        assert!(matches!(
            parse_request_header([0x05, 0x01, 0x00, 0x02]),
            Err(Error::ProtocolError(_))
        ));
    }

    #[test]
    fn request_ipv6_is_unsupported() {
        let mut bytes = vec![0x05, 0x01, 0x00, 0x04];
        bytes.extend_from_slice(&[0u8; 18]);
        assert!(matches!(
            decode_request(&bytes),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn port_is_big_endian() {
        assert_eq!(parse_port([0x01, 0xbb]), 443);
        assert_eq!(parse_port([0x1f, 0x90]), 8080);
    }

    #[test]
    fn command_encodes_back_to_request() {
        let cmd = Command::new(CommandKind::Bind, Address::Domain("example.com".into()), 8080);
        let bytes = cmd.to_bytes().unwrap();
        assert_eq!(&bytes[..5], &[0x05, 0x02, 0x00, 0x03, 11]);
        assert_eq!(decode_request(&bytes).unwrap().0, cmd);
    }
}
