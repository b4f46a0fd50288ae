//! Client session driven by wire bytes, as its driver feeds it.

use posync_client::{ClientSession, ClientState, PeerEvent};
use posync_protocol::{Codec, Message, TextCodec, Vec3};
use posync_transport::ConnectionId;

fn cid(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Decodes `wire` and hands it to the session; returns the encoded reply.
fn deliver(
    session: &mut ClientSession,
    events: &mut Vec<PeerEvent>,
    wire: &str,
) -> Option<Vec<u8>> {
    let codec = TextCodec::utf16();
    let msg = codec.decode(&utf16le(wire)).ok()?;
    let reply = session.handle_message(msg, events).ok()??;
    Some(codec.encode(&reply).expect("encodable"))
}

#[test]
fn test_ask_name_bootstrap_from_wire() {
    let mut session = ClientSession::new("Carol").unwrap();
    session.on_connect();
    let mut events: Vec<PeerEvent> = Vec::new();

    let reply = deliver(&mut session, &mut events, "ASKNAME|7|Alice%3|TEMP%7");

    assert_eq!(reply, Some(utf16le("NAMEIS|Carol")));
    assert_eq!(session.our_id(), Some(cid(7)));
    assert_eq!(session.peer(cid(3)).map(|p| p.name.as_str()), Some("Alice"));
    assert_eq!(session.state(), ClientState::Active);
}

#[test]
fn test_ask_position_redelivery_is_idempotent() {
    let mut session = ClientSession::new("Carol").unwrap();
    session.on_connect();
    let mut events: Vec<PeerEvent> = Vec::new();
    deliver(&mut session, &mut events, "ASKNAME|7|Alice%3|TEMP%7");
    session.set_local_position(Vec3::new(0.5, 0.0, 0.25));

    let first = deliver(&mut session, &mut events, "ASKPOSITION|3%1.5%2%3|7%9%9%9");
    let after_first = session.peer(cid(3)).cloned();
    let second = deliver(&mut session, &mut events, "ASKPOSITION|3%1.5%2%3|7%9%9%9");

    assert_eq!(first, Some(utf16le("MYPOSITION|0.5|0|0.25")));
    assert_eq!(first, second);
    assert_eq!(session.peer(cid(3)).cloned(), after_first);
    assert_eq!(session.peer(cid(3)).unwrap().position, Vec3::new(1.5, 2.0, 3.0));
}

#[test]
fn test_malformed_input_changes_nothing() {
    let mut session = ClientSession::new("Carol").unwrap();
    session.on_connect();
    let mut events: Vec<PeerEvent> = Vec::new();
    deliver(&mut session, &mut events, "ASKNAME|7|Alice%3|TEMP%7");
    events.clear();

    for bad in ["CNN|Bob", "DC|x", "ASKPOSITION|3%1%2", "HELLO|there", ""] {
        assert_eq!(deliver(&mut session, &mut events, bad), None, "{bad}");
    }

    assert!(events.is_empty());
    assert_eq!(session.peers().count(), 2);
}

#[test]
fn test_full_peer_lifecycle_hooks() {
    let mut session = ClientSession::new("Carol").unwrap();
    session.on_connect();
    let mut events: Vec<PeerEvent> = Vec::new();

    deliver(&mut session, &mut events, "ASKNAME|2|TEMP%2");
    deliver(&mut session, &mut events, "CNN|Carol|2");
    deliver(&mut session, &mut events, "CNN|TEMP|4");
    deliver(&mut session, &mut events, "CNN|Dave|4");
    deliver(&mut session, &mut events, "ASKPOSITION|2%0%0%0|4%1%0%0");
    deliver(&mut session, &mut events, "DC|4");

    assert_eq!(
        events,
        vec![
            PeerEvent::LocalIdentityAssigned { id: cid(2) },
            PeerEvent::Added { id: cid(2), name: "TEMP".into() },
            PeerEvent::Renamed { id: cid(2), name: "Carol".into() },
            PeerEvent::Added { id: cid(4), name: "TEMP".into() },
            PeerEvent::Renamed { id: cid(4), name: "Dave".into() },
            PeerEvent::PositionUpdated { id: cid(4), position: Vec3::new(1.0, 0.0, 0.0) },
            PeerEvent::Removed { id: cid(4) },
        ]
    );
    assert!(session.is_confirmed());
    assert!(matches!(
        session.handle_message(Message::NameIs { name: "x".into() }, &mut events),
        Err(posync_client::ClientError::UnexpectedMessage(_))
    ));
}
