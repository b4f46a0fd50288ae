//! Wire-format tests against exact byte sequences and the round-trip
//! contract of both text encodings.

use posync_protocol::{
    Codec, Message, PositionEntry, ProtocolError, RosterEntry, TextCodec, Vec3,
};
use posync_transport::ConnectionId;

fn id(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// One message of every kind, with tuple lists of length 0, 1, and many.
fn sample_messages() -> Vec<Message> {
    let many_roster: Vec<RosterEntry> = (1..=12)
        .map(|n| RosterEntry::new(format!("player{n}"), id(n)))
        .collect();
    let many_positions: Vec<PositionEntry> = (1..=12)
        .map(|n| {
            let f = n as f32;
            PositionEntry::new(id(n), Vec3::new(f * 0.1, -f * 1.5, f * 1000.25))
        })
        .collect();

    vec![
        Message::AskName { id: id(1), roster: vec![] },
        Message::AskName { id: id(1), roster: vec![RosterEntry::new("TEMP", id(1))] },
        Message::AskName { id: id(12), roster: many_roster },
        Message::NameIs { name: "Bob".into() },
        Message::Connected { name: "Zoë".into(), id: id(5) },
        Message::Disconnected { id: id(u64::MAX) },
        Message::AskPosition { positions: vec![] },
        Message::AskPosition {
            positions: vec![PositionEntry::new(id(2), Vec3::new(1.0e-7, 3.4e38, -0.0))],
        },
        Message::AskPosition { positions: many_positions },
        Message::MyPosition { position: Vec3::new(0.1, 0.2, 0.3) },
    ]
}

#[test]
fn test_round_trip_every_kind_utf16() {
    let codec = TextCodec::utf16();
    for msg in sample_messages() {
        let bytes = codec.encode(&msg).expect("encodable");
        assert_eq!(codec.decode(&bytes).expect("decodable"), msg);
    }
}

#[test]
fn test_round_trip_every_kind_utf8() {
    let codec = TextCodec::utf8();
    for msg in sample_messages() {
        let bytes = codec.encode(&msg).expect("encodable");
        assert_eq!(codec.decode(&bytes).expect("decodable"), msg);
    }
}

#[test]
fn test_round_trip_preserves_float_bits() {
    let codec = TextCodec::utf16();
    let awkward = [0.1f32, 1.0 / 3.0, f32::MIN_POSITIVE, f32::MAX, -123.456, 16_777_217.0];
    for value in awkward {
        let msg = Message::MyPosition { position: Vec3::new(value, -value, value / 7.0) };
        let Message::MyPosition { position } = codec.decode(&codec.encode(&msg).unwrap()).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(position.x.to_bits(), value.to_bits());
        assert_eq!(position.y.to_bits(), (-value).to_bits());
        assert_eq!(position.z.to_bits(), (value / 7.0).to_bits());
    }
}

#[test]
fn test_aggregate_position_exact_bytes() {
    let msg = Message::AskPosition {
        positions: vec![
            PositionEntry::new(id(1), Vec3::ZERO),
            PositionEntry::new(id(2), Vec3::new(1.0, 2.0, 3.0)),
        ],
    };
    assert_eq!(
        TextCodec::utf16().encode(&msg).unwrap(),
        utf16le("ASKPOSITION|1%0%0%0|2%1%2%3")
    );
}

#[test]
fn test_legacy_roster_packet_decodes() {
    let msg = TextCodec::utf16()
        .decode(&utf16le("ASKNAME|3|MUHAND%1|HUSSAM%2|TEMP%3"))
        .unwrap();
    assert_eq!(
        msg,
        Message::AskName {
            id: id(3),
            roster: vec![
                RosterEntry::new("MUHAND", id(1)),
                RosterEntry::new("HUSSAM", id(2)),
                RosterEntry::new("TEMP", id(3)),
            ],
        }
    );
}

#[test]
fn test_malformed_inputs_never_panic() {
    let codec = TextCodec::utf8();
    let inputs: &[&[u8]] = &[
        b"",
        b"|||",
        b"%%%",
        b"ASKNAME",
        b"ASKNAME|%",
        b"ASKPOSITION|%%%",
        b"CNN||",
        b"MYPOSITION|||",
        b"DC|99999999999999999999999",
    ];
    for input in inputs {
        assert!(
            matches!(codec.decode(input), Err(ProtocolError::MalformedMessage(_))),
            "{:?}",
            String::from_utf8_lossy(input)
        );
    }
}
