use crate::error::{Error, Result};
use crate::protocol::AddressType;
use std::fmt;
use std::net::Ipv4Addr;

/// Address represents the SOCKS5 target of a request: either a raw IPv4
/// address or a domain name. IPv6 is a known address type on the wire but
/// is never decoded, so it has no variant here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Ipv4([u8; 4]),
    Domain(String),
}

/// Address implementation block
impl Address {
    /// from_ipv4 builds an address from the 4 raw octets of DST.ADDR
    pub fn from_ipv4(octets: [u8; 4]) -> Self {
        Address::Ipv4(octets)
    }

    /// from_domain_bytes builds a domain address from the LEN bytes that
    /// follow the length octet. Empty input is accepted and gives an empty
    /// domain; bytes that are not UTF-8 are a protocol error.
    pub fn from_domain_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > u8::MAX as usize {
            return Err(Error::protocol(format!(
                "domain name too long: {} bytes (max 255)",
                bytes.len()
            )));
        }

        let domain = std::str::from_utf8(bytes)
            .map_err(|e| Error::protocol(format!("domain name is not utf-8: {e}")))?;

        Ok(Address::Domain(domain.to_owned()))
    }

    /// unsupported_ipv6 is the outcome of every attempt to decode an IPv6
    /// target
    pub(crate) fn unsupported_ipv6() -> Error {
        Error::unsupported("IPv6 target addresses are not supported")
    }

    /// address_type gives the ATYP byte this address is encoded with
    pub fn address_type(&self) -> AddressType {
        match self {
            Address::Ipv4(_) => AddressType::IPv4,
            Address::Domain(_) => AddressType::DomainName,
        }
    }

    /// encode_into appends ATYP and DST.ADDR to buf
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(self.address_type() as u8);
        match self {
            Address::Ipv4(octets) => buf.extend_from_slice(octets),
            Address::Domain(domain) => {
                let len = u8::try_from(domain.len()).map_err(|_| {
                    Error::protocol(format!(
                        "domain name too long: {} bytes (max 255)",
                        domain.len()
                    ))
                })?;
                buf.push(len);
                buf.extend_from_slice(domain.as_bytes());
            }
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ipv4(octets) => write!(f, "{}", Ipv4Addr::from(*octets)),
            Address::Domain(domain) => f.write_str(domain),
        }
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Address::Ipv4(ip.octets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_renders_dotted_quad() {
        let addr = Address::from_ipv4([93, 184, 216, 34]);
        assert_eq!(addr.to_string(), "93.184.216.34");
    }

    #[test]
    fn domain_bytes_decode() {
        let addr = Address::from_domain_bytes(b"abcde").unwrap();
        assert_eq!(addr, Address::Domain("abcde".into()));
        assert_eq!(addr.to_string(), "abcde");
    }

    #[test]
    fn empty_domain_is_accepted() {
        let addr = Address::from_domain_bytes(&[]).unwrap();
        assert_eq!(addr, Address::Domain(String::new()));
    }

    #[test]
    fn invalid_utf8_domain_is_protocol_error() {
        let err = Address::from_domain_bytes(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::ProtocolError(_)));
    }

    #[test]
    fn oversized_domain_cannot_be_encoded() {
        let addr = Address::Domain("a".repeat(256));
        let mut buf = Vec::new();
        assert!(addr.encode_into(&mut buf).is_err());
    }
}
