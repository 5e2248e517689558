//! Length-prefixed record framing
//!
//! Each image travels as one record: a 4-byte little-endian length prefix
//! followed by exactly that many payload bytes. There is no handshake,
//! acknowledgment, heartbeat or type tag; every record is a JPEG payload.
//!
//! Little-endian matches the native order of the reference camera boards,
//! so a receiver on any architecture parses the stream the same way.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload a single record can describe
pub const MAX_RECORD_PAYLOAD: usize = u32::MAX as usize;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload of {0} bytes does not fit a 32-bit length prefix")]
    PayloadTooLarge(usize),

    #[error("record declares {len} bytes, limit is {max}")]
    FrameTooLarge { len: usize, max: usize },
}

/// Encodes the length prefix for a payload of `len` bytes
pub fn encode_length_prefix(len: usize) -> Result<[u8; LENGTH_PREFIX_SIZE], ProtocolError> {
    let len = u32::try_from(len).map_err(|_| ProtocolError::PayloadTooLarge(len))?;
    Ok(len.to_le_bytes())
}

/// Encodes a complete record into one contiguous buffer
pub fn encode_record(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let prefix = encode_length_prefix(payload.len())?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_slice(&prefix);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Incremental record decoder
///
/// Feed received bytes into a `BytesMut` and call [`RecordDecoder::decode`]
/// until it returns `Ok(None)`. The decoder keeps the declared length of a
/// partially received record between calls.
#[derive(Debug)]
pub struct RecordDecoder {
    max_payload: usize,
    pending: Option<usize>,
}

impl RecordDecoder {
    /// Creates a decoder that rejects records larger than `max_payload`
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            pending: None,
        }
    }

    /// Returns the next complete payload, if the buffer holds one
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
        let len = match self.pending {
            Some(len) => len,
            None => {
                if buf.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }

                let len = buf.get_u32_le() as usize;
                if len > self.max_payload {
                    return Err(ProtocolError::FrameTooLarge {
                        len,
                        max: self.max_payload,
                    });
                }

                self.pending = Some(len);
                len
            }
        };

        if buf.len() < len {
            buf.reserve(len - buf.len());
            return Ok(None);
        }

        self.pending = None;
        Ok(Some(buf.split_to(len).freeze()))
    }

    /// True while a record header has been read but its payload is incomplete
    pub fn is_mid_record(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for RecordDecoder {
    fn default() -> Self {
        Self::new(MAX_RECORD_PAYLOAD)
    }
}
