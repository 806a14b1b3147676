//! Routing envelopes as they travel through a router/dealer relay.

use bytes::Bytes;
use zmreactor_core::message::{render_envelope, split_envelope, Message};
use zmreactor_core::pattern::Pattern;

#[test]
fn test_request_reply_envelope_survives_relay() {
    // What a router sees from a REQ client: identity, delimiter, body.
    let inbound = Message::new()
        .push_str("request")
        .with_envelope([Bytes::from_static(&[0x00, 0x6b, 0x8b, 0x45, 0x67]), Bytes::new()])
        .into_frames();

    let (envelope, body) = split_envelope(Pattern::Router, inbound.clone());
    assert_eq!(render_envelope(&envelope), "006b8b4567|");
    assert_eq!(body, vec![Bytes::from_static(b"request")]);

    // Relayed unchanged to the dealer side and back.
    let relayed = Message::from_frames(body).with_envelope(envelope).into_frames();
    assert_eq!(relayed, inbound);

    let (back, reply) = split_envelope(Pattern::Dealer, relayed);
    assert_eq!(back.len(), 2);
    assert_eq!(reply, vec![Bytes::from_static(b"request")]);
}

#[test]
fn test_nested_hops_keep_order() {
    let raw: [&'static [u8]; 6] = [b"client", b"proxy-1", b"proxy-2", b"", b"a", b"b"];
    let frames: Vec<Bytes> = raw
        .into_iter()
        .map(Bytes::from_static)
        .collect();
    let (envelope, body) = split_envelope(Pattern::Router, frames);
    assert_eq!(
        envelope,
        vec![
            Bytes::from_static(b"client"),
            Bytes::from_static(b"proxy-1"),
            Bytes::from_static(b"proxy-2"),
            Bytes::new(),
        ]
    );
    assert_eq!(body.len(), 2);
}

#[test]
fn test_body_frames_after_delimiter_may_be_empty() {
    let frames = vec![
        Bytes::from_static(b"peer"),
        Bytes::new(),
        Bytes::new(),
        Bytes::from_static(b"x"),
    ];
    let (envelope, body) = split_envelope(Pattern::Router, frames);
    assert_eq!(envelope.len(), 2);
    assert_eq!(body, vec![Bytes::new(), Bytes::from_static(b"x")]);
}
