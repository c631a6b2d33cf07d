//! Wire-format tests: exact header bytes, pull-decoder behavior, digest and
//! identity vectors.

use splitpipe_wire::{
    encode_frame, hex_dump, stretch_header, FrameDecoder, FrameKind, RunningDigest, SessionId,
    WireError, HEADER_LEN,
};

#[test]
fn encode_produces_exact_header_bytes() {
    let mut out = Vec::new();
    encode_frame(&mut out, FrameKind::SessionUuid, &[0x11; 16]).unwrap();
    assert_eq!(&out[..HEADER_LEN], &[0x00, 0x10, 0x01]);
    assert_eq!(out.len(), HEADER_LEN + 16);

    out.clear();
    encode_frame(&mut out, FrameKind::SessionEof, &[]).unwrap();
    assert_eq!(out, vec![0x00, 0x00, 0x07]);
}

#[test]
fn data_stretch_header_is_big_endian() {
    assert_eq!(stretch_header(FrameKind::Data, 11), [0x00, 0x0b, 0x04]);
    assert_eq!(stretch_header(FrameKind::Data, 65535), [0xff, 0xff, 0x04]);
}

#[test]
fn encode_rejects_fixed_length_mismatch() {
    let mut out = Vec::new();
    let err = encode_frame(&mut out, FrameKind::SessionUuid, &[0x11; 4]).unwrap_err();
    assert_eq!(
        err,
        WireError::BadLength {
            kind: FrameKind::SessionUuid,
            expected: 16,
            got: 4
        }
    );
    assert!(out.is_empty());
}

#[test]
fn decoder_round_trips_a_frame_in_one_feed() {
    let mut encoded = Vec::new();
    encode_frame(&mut encoded, FrameKind::Data, b"hello world").unwrap();

    let mut decoder = FrameDecoder::new();
    let consumed = decoder.feed(&encoded);
    assert_eq!(consumed, encoded.len());

    let frame = decoder.take().expect("frame should be complete");
    assert_eq!(frame.kind(), Some(FrameKind::Data));
    assert_eq!(frame.payload, b"hello world");
}

#[test]
fn decoder_stops_consuming_at_a_completed_frame() {
    let mut encoded = Vec::new();
    encode_frame(&mut encoded, FrameKind::Data, b"one").unwrap();
    encode_frame(&mut encoded, FrameKind::Data, b"two").unwrap();

    let mut decoder = FrameDecoder::new();
    let consumed = decoder.feed(&encoded);
    assert_eq!(consumed, HEADER_LEN + 3);
    assert_eq!(decoder.take().unwrap().payload, b"one");

    let consumed = decoder.feed(&encoded[HEADER_LEN + 3..]);
    assert_eq!(consumed, HEADER_LEN + 3);
    assert_eq!(decoder.take().unwrap().payload, b"two");
}

#[test]
fn decoder_accepts_one_byte_at_a_time() {
    let mut encoded = Vec::new();
    encode_frame(&mut encoded, FrameKind::VolumeNumber, &7u16.to_be_bytes()).unwrap();

    let mut decoder = FrameDecoder::new();
    for byte in &encoded {
        assert!(decoder.needed() > 0);
        assert_eq!(decoder.feed(std::slice::from_ref(byte)), 1);
    }
    assert_eq!(decoder.needed(), 0);

    let frame = decoder.take().unwrap();
    assert_eq!(frame.kind(), Some(FrameKind::VolumeNumber));
    assert_eq!(frame.volume_number().unwrap(), 7);

    // Decoder resets for the next header.
    assert_eq!(decoder.needed(), HEADER_LEN);
}

#[test]
fn decoder_completes_zero_payload_frames_at_the_header() {
    let mut decoder = FrameDecoder::new();
    decoder.feed(&[0x00, 0x00, 0x03]);
    let frame = decoder.take().unwrap();
    assert_eq!(frame.kind(), Some(FrameKind::VolumeEof));
    assert!(frame.payload.is_empty());
}

#[test]
fn decoder_never_asks_past_the_current_frame() {
    let mut encoded = Vec::new();
    encode_frame(&mut encoded, FrameKind::Data, &[0xaa; 100]).unwrap();
    // Garbage after the frame must never be requested or consumed.
    encoded.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

    let mut decoder = FrameDecoder::new();
    let mut offset = 0;
    while decoder.take().is_none() {
        let want = decoder.needed();
        assert!(want > 0);
        let consumed = decoder.feed(&encoded[offset..offset + want]);
        assert_eq!(consumed, want);
        offset += consumed;

        if decoder.needed() == 0 {
            break;
        }
    }
    assert_eq!(offset, HEADER_LEN + 100);

    let frame = decoder.take().unwrap();
    assert_eq!(frame.payload.len(), 100);
}

#[test]
fn unknown_tags_survive_decoding() {
    let mut decoder = FrameDecoder::new();
    decoder.feed(&[0x00, 0x02, 0x2a]);
    decoder.feed(&[0x01, 0x02]);

    let frame = decoder.take().unwrap();
    assert_eq!(frame.tag, 0x2a);
    assert_eq!(frame.kind(), None);
    assert_eq!(frame.payload, vec![0x01, 0x02]);
}

#[test]
fn volume_number_rejects_bad_length() {
    let mut decoder = FrameDecoder::new();
    decoder.feed(&[0x00, 0x01, 0x02, 0xff]);
    let frame = decoder.take().unwrap();
    assert!(matches!(
        frame.volume_number(),
        Err(WireError::BadLength {
            kind: FrameKind::VolumeNumber,
            expected: 2,
            got: 1
        })
    ));
}

#[test]
fn running_digest_matches_known_vector() {
    let mut digest = RunningDigest::new();
    digest.update(b"hello ");
    digest.update(b"world");
    assert_eq!(digest.bytes_fed(), 11);
    assert_eq!(
        digest.snapshot(),
        [
            0x5e, 0xb6, 0x3b, 0xbb, 0xe0, 0x1e, 0xee, 0xd0, 0x93, 0xcb, 0x22, 0xbb, 0x8f, 0x5a,
            0xcd, 0xc3
        ]
    );
}

#[test]
fn digest_snapshot_does_not_disturb_the_stream() {
    let mut split = RunningDigest::new();
    split.update(b"abc");
    let _ = split.snapshot();
    split.update(b"def");

    let mut whole = RunningDigest::new();
    whole.update(b"abcdef");
    assert_eq!(split.snapshot(), whole.snapshot());
}

#[test]
fn session_ids_compare_by_bytes() {
    let a = SessionId::from_wire(&[0x01; 16]).unwrap();
    let b = SessionId::from_wire(&[0x01; 16]).unwrap();
    let c = SessionId::from_wire(&[0x02; 16]).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(SessionId::from_wire(&[0x01; 15]).is_none());

    assert_eq!(a.to_string(), hex_dump(&[0x01; 16]));
}

#[test]
fn generated_ids_are_distinct() {
    // Colliding 128-bit draws would mean the random source is broken.
    assert_ne!(SessionId::generate(), SessionId::generate());
}
