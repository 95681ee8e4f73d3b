use proptest::prelude::*;
use socksfront::protocol::{decode_greeting, decode_request};
use socksfront::{Address, Command, CommandKind, Error, handshake};
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

fn greeting(methods: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0x05, methods.len() as u8];
    bytes.extend_from_slice(methods);
    bytes
}

/// negotiate runs the async greeting over an in-memory stream and returns
/// the outcome plus whatever the server wrote back
fn negotiate(bytes: Vec<u8>) -> (Result<(), Error>, Vec<u8>) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async move {
        let (mut client, mut server) = duplex(1024);
        client.write_all(&bytes).await.unwrap();

        let outcome = handshake::negotiate_greeting(&mut server).await;
        drop(server);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        (outcome, reply)
    })
}

fn methods_with_no_auth() -> impl Strategy<Value = Vec<u8>> {
    (proptest::collection::vec(any::<u8>(), 0..255), any::<prop::sample::Index>()).prop_map(
        |(mut methods, at)| {
            let at = at.index(methods.len() + 1);
            methods.insert(at, 0x00);
            methods
        },
    )
}

proptest! {
    #[test]
    fn greeting_offering_no_auth_succeeds(methods in methods_with_no_auth()) {
        let (outcome, reply) = negotiate(greeting(&methods));
        prop_assert!(outcome.is_ok());
        prop_assert_eq!(reply, vec![0x05, 0x00]);
    }

    #[test]
    fn greeting_without_no_auth_is_unsupported(methods in proptest::collection::vec(1u8..=255, 1..=255)) {
        let (outcome, reply) = negotiate(greeting(&methods));
        prop_assert!(matches!(outcome, Err(Error::UnsupportedOperation(_))));
        prop_assert!(reply.is_empty());
        prop_assert!(matches!(decode_greeting(&greeting(&methods)), Err(Error::UnsupportedOperation(_))));
    }

    #[test]
    fn bad_version_or_reserved_is_rejected(version in any::<u8>(), reserved in any::<u8>()) {
        prop_assume!(version != 0x05 || reserved != 0x00);
        let bytes = [version, 0x01, reserved, 0x01, 1, 2, 3, 4, 0, 80];
        match decode_request(&bytes) {
            Err(Error::VersionMismatch(v)) => prop_assert_eq!(v, version),
            Err(Error::ProtocolError(_)) => prop_assert_eq!(version, 0x05),
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn random_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..300)) {
        let _ = decode_greeting(&data);
        if let Ok((_, used)) = decode_request(&data) {
            prop_assert!(used <= data.len());
        }
    }

    #[test]
    fn domain_targets_decode(domain in "[a-z0-9.-]{0,255}", port in any::<u16>()) {
        let cmd = Command::new(CommandKind::Connect, Address::Domain(domain.clone()), port);
        let bytes = cmd.to_bytes().unwrap();
        let (decoded, used) = decode_request(&bytes).unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(decoded.target(), &Address::Domain(domain));
        prop_assert_eq!(decoded.port(), port);
    }
}

#[test]
fn zero_methods_is_protocol_error() {
    let (outcome, reply) = negotiate(vec![0x05, 0x00]);
    assert!(matches!(outcome, Err(Error::ProtocolError(_))));
    assert!(reply.is_empty());
}

#[test]
fn five_byte_domain() {
    let bytes = [
        0x05, 0x01, 0x00, 0x03, 5, b'a', b'b', b'c', b'd', b'e', 0x00, 0x50,
    ];
    let (cmd, _) = decode_request(&bytes).unwrap();
    assert_eq!(cmd.target(), &Address::Domain("abcde".into()));
}

#[test]
fn unknown_command_byte() {
    let bytes = [0x05, 0x04, 0x00, 0x01, 1, 2, 3, 4, 0x00, 0x50];
    assert!(matches!(decode_request(&bytes), Err(Error::ProtocolError(_))));
}
