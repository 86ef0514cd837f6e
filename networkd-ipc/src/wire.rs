// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The helper channel's on-wire shape: a fixed 6-byte header, `{type: u32,
//! length: u16}`, followed by an opaque payload. `type` doubles as the
//! request kind on the supervisor→helper direction and as the status code
//! on the helper→supervisor direction — a single small encoding serves
//! both (see spec §6).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum payload a single frame can carry; bounded by the 16-bit length
/// field. The exec helper's 1 MiB stdout capture buffer is truncated to
/// this bound before it is framed back to the supervisor — there is no
/// multi-frame continuation defined for this channel.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

pub const HEADER_LEN: usize = 6;

pub mod request_type {
    pub const LIST_INTERFACES: u32 = 1;
    pub const LIST_PSEUDO_INTERFACES: u32 = 2;
    pub const IFCONFIG_DOWN: u32 = 3;
    pub const NETSTART: u32 = 4;
    pub const LOGEVENT: u32 = 5;
    pub const WRITE: u32 = 6;
    pub const AUTOCONFIGURE: u32 = 7;
}

pub mod status {
    pub const OK: u32 = 0;
    pub const ERROR: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u32, payload: impl Into<Bytes>) -> Self {
        Frame {
            kind,
            payload: payload.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == status::OK
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("helper channel payload of {0} bytes exceeds the {MAX_PAYLOAD} byte frame limit")]
    PayloadTooLarge(usize),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Encodes/decodes [`Frame`]s against the fixed `{u32, u16}` header. Built
/// on `tokio_util::codec`, the same length-prefix-framing toolkit used for
/// the helper channel in the upstream sidecar's `datadog-ipc` transport —
/// here driven manually (see `Channel`) rather than through an async
/// `Framed` since the helper protocol is a strict, synchronous
/// request/response call.
#[derive(Debug, Default)]
pub struct HeaderCodec;

impl Decoder for HeaderCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let kind = u32::from_be_bytes(src[0..4].try_into().unwrap());
        let length = u16::from_be_bytes(src[4..6].try_into().unwrap()) as usize;
        if src.len() < HEADER_LEN + length {
            src.reserve(HEADER_LEN + length - src.len());
            return Ok(None);
        }
        src.advance(HEADER_LEN);
        let payload = src.split_to(length).freeze();
        Ok(Some(Frame { kind, payload }))
    }
}

impl Encoder<Frame> for HeaderCodec {
    type Error = WireError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), WireError> {
        if frame.payload.len() > MAX_PAYLOAD {
            return Err(WireError::PayloadTooLarge(frame.payload.len()));
        }
        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_u32(frame.kind);
        dst.put_u16(frame.payload.len() as u16);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_frame() {
        let mut codec = HeaderCodec;
        let mut buf = BytesMut::new();
        let frame = Frame::new(request_type::NETSTART, Bytes::from_static(b"em0"));
        codec.encode(frame.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 3);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_payload() {
        let mut codec = HeaderCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(Frame::new(status::OK, Bytes::from_static(b"hello")), &mut buf)
            .unwrap();
        let mut partial = buf.split_to(HEADER_LEN + 2);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut codec = HeaderCodec;
        let mut buf = BytesMut::new();
        let huge = vec![0u8; MAX_PAYLOAD + 1];
        let err = codec
            .encode(Frame::new(status::OK, huge), &mut buf)
            .unwrap_err();
        assert!(matches!(err, WireError::PayloadTooLarge(_)));
    }
}
