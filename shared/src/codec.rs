//! MQTT 3.1.1 packet codec
//!
//! Implements the packet subset a QoS 0 subscriber needs: CONNECT/CONNACK,
//! SUBSCRIBE/SUBACK, inbound PUBLISH, PINGREQ/PINGRESP and DISCONNECT.
//! All packets are framed as:
//! ```text
//! [ 1 byte: type + flags ][ 1-4 bytes: remaining length varint ][ body ]
//! ```
//!
//! Decoding is streaming-safe: partial packets are left in the buffer
//! until the rest arrives.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Maximum accepted remaining length (1 MB) to prevent memory exhaustion
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

const PROTOCOL_NAME: &str = "MQTT";
const PROTOCOL_LEVEL: u8 = 4;
/// CONNECT flags: clean session, no will, no auth
const CONNECT_FLAGS_CLEAN_SESSION: u8 = 0x02;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("packet too large: {0} bytes (max: {MAX_PACKET_SIZE})")]
    PacketTooLarge(usize),

    #[error("malformed remaining-length encoding")]
    MalformedLength,

    #[error("string field too long: {0} bytes")]
    StringTooLong(usize),

    #[error("truncated packet body")]
    TruncatedBody,

    #[error("invalid UTF-8 in string field")]
    InvalidString,

    #[error("unsupported packet type 0x{0:02x}")]
    UnsupportedPacket(u8),
}

/// The MQTT 3.1.1 packet subset spoken by the gateway.
///
/// Both directions are codable so tests can stand in for either peer;
/// the gateway itself only ever decodes broker-to-client packets.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect { client_id: String, keepalive_secs: u16 },
    Connack { session_present: bool, return_code: u8 },
    Subscribe { packet_id: u16, topic: String },
    Suback { packet_id: u16, return_code: u8 },
    Publish { topic: String, payload: Bytes },
    Pingreq,
    Pingresp,
    Disconnect,
}

/// Encode a packet into a framed byte buffer
pub fn encode(packet: &Packet) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::with_capacity(64);
    encode_into(packet, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a packet directly into a provided buffer
pub fn encode_into(packet: &Packet, buf: &mut BytesMut) -> Result<(), CodecError> {
    let mut body = BytesMut::with_capacity(32);

    let header: u8 = match packet {
        Packet::Connect {
            client_id,
            keepalive_secs,
        } => {
            put_string(&mut body, PROTOCOL_NAME)?;
            body.put_u8(PROTOCOL_LEVEL);
            body.put_u8(CONNECT_FLAGS_CLEAN_SESSION);
            body.put_u16(*keepalive_secs);
            put_string(&mut body, client_id)?;
            0x10
        }
        Packet::Connack {
            session_present,
            return_code,
        } => {
            body.put_u8(u8::from(*session_present));
            body.put_u8(*return_code);
            0x20
        }
        Packet::Subscribe { packet_id, topic } => {
            body.put_u16(*packet_id);
            put_string(&mut body, topic)?;
            body.put_u8(0); // requested QoS 0
            0x82
        }
        Packet::Suback {
            packet_id,
            return_code,
        } => {
            body.put_u16(*packet_id);
            body.put_u8(*return_code);
            0x90
        }
        Packet::Publish { topic, payload } => {
            put_string(&mut body, topic)?;
            body.put_slice(payload);
            0x30
        }
        Packet::Pingreq => 0xc0,
        Packet::Pingresp => 0xd0,
        Packet::Disconnect => 0xe0,
    };

    if body.len() > MAX_PACKET_SIZE {
        return Err(CodecError::PacketTooLarge(body.len()));
    }

    buf.reserve(1 + 4 + body.len());
    buf.put_u8(header);
    put_remaining_length(buf, body.len());
    buf.put_slice(&body);

    Ok(())
}

/// Try to decode one packet from a buffer
///
/// Returns:
/// - `Ok(Some(packet))` if a complete packet was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut) -> Result<Option<Packet>, CodecError> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let header = buf[0];

    let (remaining_len, varint_len) = match parse_remaining_length(&buf[1..])? {
        Some(parsed) => parsed,
        None => return Ok(None),
    };

    if remaining_len > MAX_PACKET_SIZE {
        return Err(CodecError::PacketTooLarge(remaining_len));
    }

    let total_len = 1 + varint_len + remaining_len;
    if buf.len() < total_len {
        return Ok(None);
    }

    // Consume the fixed header, then split off the body
    buf.advance(1 + varint_len);
    let mut body = buf.split_to(remaining_len).freeze();

    let packet = match header >> 4 {
        1 => {
            let protocol = get_string(&mut body)?;
            if protocol != PROTOCOL_NAME {
                return Err(CodecError::UnsupportedPacket(header));
            }
            let _level = get_u8(&mut body)?;
            let _flags = get_u8(&mut body)?;
            let keepalive_secs = get_u16(&mut body)?;
            let client_id = get_string(&mut body)?;
            Packet::Connect {
                client_id,
                keepalive_secs,
            }
        }
        2 => {
            let flags = get_u8(&mut body)?;
            let return_code = get_u8(&mut body)?;
            Packet::Connack {
                session_present: flags & 0x01 != 0,
                return_code,
            }
        }
        3 => {
            let topic = get_string(&mut body)?;
            let qos = (header >> 1) & 0x03;
            if qos > 0 {
                // QoS 1/2 deliveries carry a packet id we never ack; the
                // subscription is QoS 0 so brokers downgrade anyway.
                let _packet_id = get_u16(&mut body)?;
            }
            Packet::Publish {
                topic,
                payload: body,
            }
        }
        8 => {
            let packet_id = get_u16(&mut body)?;
            let topic = get_string(&mut body)?;
            let _qos = get_u8(&mut body)?;
            Packet::Subscribe { packet_id, topic }
        }
        9 => {
            let packet_id = get_u16(&mut body)?;
            let return_code = get_u8(&mut body)?;
            Packet::Suback {
                packet_id,
                return_code,
            }
        }
        12 => Packet::Pingreq,
        13 => Packet::Pingresp,
        14 => Packet::Disconnect,
        _ => return Err(CodecError::UnsupportedPacket(header)),
    };

    Ok(Some(packet))
}

fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), CodecError> {
    if s.len() > u16::MAX as usize {
        return Err(CodecError::StringTooLong(s.len()));
    }
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn put_remaining_length(buf: &mut BytesMut, mut len: usize) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if len == 0 {
            break;
        }
    }
}

/// Parse the remaining-length varint. `Ok(None)` means more bytes are
/// needed; the value and its encoded width are returned otherwise.
fn parse_remaining_length(buf: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut value: usize = 0;
    let mut shift = 0;

    for (i, &byte) in buf.iter().enumerate().take(4) {
        value |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
        shift += 7;
    }

    if buf.len() < 4 {
        Ok(None)
    } else {
        Err(CodecError::MalformedLength)
    }
}

fn get_u8(body: &mut Bytes) -> Result<u8, CodecError> {
    if body.remaining() < 1 {
        return Err(CodecError::TruncatedBody);
    }
    Ok(body.get_u8())
}

fn get_u16(body: &mut Bytes) -> Result<u16, CodecError> {
    if body.remaining() < 2 {
        return Err(CodecError::TruncatedBody);
    }
    Ok(body.get_u16())
}

fn get_string(body: &mut Bytes) -> Result<String, CodecError> {
    let len = get_u16(body)? as usize;
    if body.remaining() < len {
        return Err(CodecError::TruncatedBody);
    }
    let raw = body.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidString)
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct PacketDecoder {
    /// Partial packet data being accumulated
    buffer: BytesMut,
}

impl PacketDecoder {
    /// Create a new packet decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next packet from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all
    /// complete packets
    pub fn decode_next(&mut self) -> Result<Option<Packet>, CodecError> {
        decode(&mut self.buffer)
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_packet() -> Packet {
        Packet::Publish {
            topic: "mission/drone/1/command".into(),
            payload: Bytes::from_static(br#"{"cmd":"arm"}"#),
        }
    }

    #[test]
    fn test_publish_roundtrip() {
        let original = publish_packet();

        let encoded = encode(&original).expect("encode failed");
        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = decode(&mut buf).expect("decode failed").expect("no packet");

        assert_eq!(decoded, original);
        assert!(buf.is_empty(), "buffer should be empty after decode");
    }

    #[test]
    fn test_connect_wire_format() {
        let packet = Packet::Connect {
            client_id: "gw".into(),
            keepalive_secs: 30,
        };
        let encoded = encode(&packet).expect("encode failed");

        let expected = [
            0x10, 14, // CONNECT, remaining length
            0x00, 0x04, b'M', b'Q', b'T', b'T', // protocol name
            0x04, // protocol level
            0x02, // clean session
            0x00, 30,   // keepalive
            0x00, 0x02, b'g', b'w', // client id
        ];
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_subscribe_wire_format() {
        let packet = Packet::Subscribe {
            packet_id: 1,
            topic: "a/b".into(),
        };
        let encoded = encode(&packet).expect("encode failed");

        let expected = [
            0x82, 8, // SUBSCRIBE (flags 0b0010), remaining length
            0x00, 0x01, // packet id
            0x00, 0x03, b'a', b'/', b'b', // topic filter
            0x00, // requested QoS 0
        ];
        assert_eq!(&encoded[..], &expected[..]);
    }

    #[test]
    fn test_connect_subscribe_roundtrip() {
        for packet in [
            Packet::Connect {
                client_id: "skygate-1".into(),
                keepalive_secs: 30,
            },
            Packet::Subscribe {
                packet_id: 1,
                topic: "mission/drone/1/command".into(),
            },
        ] {
            let encoded = encode(&packet).expect("encode failed");
            let mut buf = BytesMut::from(&encoded[..]);
            let decoded = decode(&mut buf).expect("decode failed").expect("no packet");
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn test_connack_decode() {
        let mut buf = BytesMut::from(&[0x20u8, 0x02, 0x00, 0x00][..]);
        let packet = decode(&mut buf).expect("decode failed").expect("no packet");
        assert_eq!(
            packet,
            Packet::Connack {
                session_present: false,
                return_code: 0
            }
        );

        let mut refused = BytesMut::from(&[0x20u8, 0x02, 0x01, 0x05][..]);
        let packet = decode(&mut refused).expect("decode failed").expect("no packet");
        assert_eq!(
            packet,
            Packet::Connack {
                session_present: true,
                return_code: 5
            }
        );
    }

    #[test]
    fn test_suback_decode() {
        let mut buf = BytesMut::from(&[0x90u8, 0x03, 0x00, 0x01, 0x00][..]);
        let packet = decode(&mut buf).expect("decode failed").expect("no packet");
        assert_eq!(
            packet,
            Packet::Suback {
                packet_id: 1,
                return_code: 0
            }
        );
    }

    #[test]
    fn test_qos1_publish_skips_packet_id() {
        // header 0x32 = PUBLISH with QoS 1; body: topic "t", pid 7, payload
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x32, 0x08]);
        buf.put_slice(&[0x00, 0x01, b't']);
        buf.put_u16(7);
        buf.put_slice(b"abc");

        let packet = decode(&mut buf).expect("decode failed").expect("no packet");
        assert_eq!(
            packet,
            Packet::Publish {
                topic: "t".into(),
                payload: Bytes::from_static(b"abc"),
            }
        );
    }

    #[test]
    fn test_partial_decode() {
        let encoded = encode(&publish_packet()).expect("encode failed");

        let mut decoder = PacketDecoder::new();

        // Feed data in chunks
        decoder.extend(&encoded[..3]);
        assert!(decoder.decode_next().expect("decode error").is_none());

        decoder.extend(&encoded[3..]);
        let decoded = decoder
            .decode_next()
            .expect("decode error")
            .expect("should have packet");
        assert_eq!(decoded, publish_packet());
    }

    #[test]
    fn test_multiple_packets() {
        let mut decoder = PacketDecoder::new();
        decoder.extend(&encode(&Packet::Pingresp).expect("encode failed"));
        decoder.extend(&encode(&publish_packet()).expect("encode failed"));

        assert_eq!(
            decoder.decode_next().expect("decode error"),
            Some(Packet::Pingresp)
        );
        assert_eq!(
            decoder.decode_next().expect("decode error"),
            Some(publish_packet())
        );
        assert!(decoder.decode_next().expect("decode error").is_none());
    }

    #[test]
    fn test_packet_too_large() {
        // Remaining length 0x7FFFFFFF-encoded maximum (268 435 455 bytes)
        let mut buf = BytesMut::from(&[0x30u8, 0xff, 0xff, 0xff, 0x7f][..]);
        let result = decode(&mut buf);
        assert!(matches!(result, Err(CodecError::PacketTooLarge(_))));
    }

    #[test]
    fn test_truncated_body_rejected() {
        // CONNACK claims a 2-byte body but carries only 1
        let mut buf = BytesMut::from(&[0x20u8, 0x02, 0x00][..]);
        assert!(decode(&mut buf).expect("partial should be Ok").is_none());

        // SUBACK with a complete frame but an impossible body
        let mut buf = BytesMut::from(&[0x90u8, 0x01, 0x00][..]);
        let result = decode(&mut buf);
        assert!(matches!(result, Err(CodecError::TruncatedBody)));
    }

    #[test]
    fn test_unsupported_packet_type() {
        // PUBACK is never expected by a QoS 0 subscriber
        let mut buf = BytesMut::from(&[0x40u8, 0x02, 0x00, 0x01][..]);
        let result = decode(&mut buf);
        assert!(matches!(result, Err(CodecError::UnsupportedPacket(0x40))));
    }
}
