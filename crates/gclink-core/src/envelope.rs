//! GC envelope framing (panic-free).
//!
//! Inside the host transport's generic forwarding message, a GC payload is
//! one of two shapes, distinguished by the proto bit on the outer type
//! field:
//!
//! - struct-framed: an 18-byte fixed header (`u16 version, u64 target_job,
//!   u64 source_job`), then the struct body;
//! - proto-framed: a `u32` echo of the typed code (proto bit set), an `i32`
//!   extension length, that many bytes of [`ProtoHeader`], then the
//!   protobuf body.
//!
//! The header skip is always computed before the body is sliced; the body
//! length is whatever remains of the payload after the skip.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;

use crate::error::{GcError, Result};
use crate::language::Language;
use crate::proto::ProtoHeader;

/// Bit 31 of the outer type field: body is protobuf-framed.
pub const PROTO_BIT: u32 = 0x8000_0000;

/// Struct header: version + two job ids.
pub const STRUCT_HEADER_LEN: usize = 18;

/// The only struct header version ever observed on the wire.
pub const STRUCT_HEADER_VERSION: u16 = 1;

/// Sentinel for "no job" in the struct header's job id slots.
pub const JOB_NONE: u64 = u64::MAX;

pub fn is_proto(raw_type: u32) -> bool {
    raw_type & PROTO_BIT != 0
}

pub fn set_proto_bit(raw_type: u32) -> u32 {
    raw_type | PROTO_BIT
}

pub fn clear_proto_bit(raw_type: u32) -> u32 {
    raw_type & !PROTO_BIT
}

/// A GC payload with its headers stripped.
#[derive(Debug, Clone)]
pub struct GcFrame {
    /// The logical message type (proto bit cleared).
    pub language: Language,
    /// Whether the body is protobuf-framed.
    pub proto: bool,
    /// The proto extension header, when proto-framed.
    pub header: Option<ProtoHeader>,
    /// The message body (zero-copy tail of the payload).
    pub body: Bytes,
}

/// Strip the GC headers from a forwarded payload.
///
/// Fails with [`GcError::UnknownType`] when the cleared type code is
/// outside the enumeration, and with [`GcError::Truncated`] /
/// [`GcError::Decode`] when the payload is shorter than its declared
/// header skip. Callers decide whether a failure is droppable.
pub fn decode_frame(raw_type: u32, mut payload: Bytes) -> Result<GcFrame> {
    let language = Language::try_from(clear_proto_bit(raw_type))?;

    if is_proto(raw_type) {
        if payload.remaining() < 8 {
            return Err(GcError::Truncated("proto frame header"));
        }
        let _echoed_type = payload.get_u32_le();
        let header_len = payload.get_i32_le();
        if header_len < 0 {
            return Err(GcError::Decode(format!(
                "negative proto header length {header_len}"
            )));
        }
        let header_len = header_len as usize;
        if payload.remaining() < header_len {
            return Err(GcError::Truncated("proto header extension"));
        }
        let header_bytes = payload.split_to(header_len);
        let header = ProtoHeader::decode(header_bytes.as_ref())?;

        Ok(GcFrame {
            language,
            proto: true,
            header: Some(header),
            body: payload,
        })
    } else {
        if payload.remaining() < STRUCT_HEADER_LEN {
            return Err(GcError::Truncated("struct frame header"));
        }
        let _version = payload.get_u16_le();
        let _target_job_id = payload.get_u64_le();
        let _source_job_id = payload.get_u64_le();

        Ok(GcFrame {
            language,
            proto: false,
            header: None,
            body: payload,
        })
    }
}

/// Frame a struct body for sending. Returns the outer type field (proto
/// bit clear) and the headered payload.
pub fn encode_struct(language: Language, body: &[u8]) -> (u32, Bytes) {
    let mut buf = BytesMut::with_capacity(STRUCT_HEADER_LEN + body.len());
    buf.put_u16_le(STRUCT_HEADER_VERSION);
    buf.put_u64_le(JOB_NONE);
    buf.put_u64_le(JOB_NONE);
    buf.put_slice(body);
    (language.code(), buf.freeze())
}

/// Frame a protobuf body for sending. Returns the outer type field with the
/// proto bit set and the headered payload.
pub fn encode_proto(language: Language, header: &ProtoHeader, body: &[u8]) -> (u32, Bytes) {
    let raw_type = set_proto_bit(language.code());
    let header_bytes = header.encode_to_vec();
    let mut buf = BytesMut::with_capacity(8 + header_bytes.len() + body.len());
    buf.put_u32_le(raw_type);
    buf.put_i32_le(header_bytes.len() as i32);
    buf.put_slice(&header_bytes);
    buf.put_slice(body);
    (raw_type, buf.freeze())
}
