//! Length-prefixed MessagePack framing.
//!
//! Format: `[u32 big-endian length][MessagePack map]`. The length is checked
//! against the configured limit before the body buffer is allocated.

use std::io::{self, Read, Write};

use serde_json::Value;
use thiserror::Error;

use courier_core::ApiData;

use crate::transport::read_chunk_with_retry;

const HEADER_LEN: usize = 4;

/// Errors raised while reading, writing or decoding frames.
#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
    #[error("connection closed inside a frame header")]
    TruncatedHeader,
    #[error("frame io failed: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("message is not a map")]
    NotAMap,
}

/// Reads one frame body. Returns `None` when the peer closed the connection
/// cleanly between frames.
pub(crate) fn read_frame<R: Read>(reader: &mut R, max: usize) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0_u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let read = read_chunk_with_retry(reader, &mut header[filled..])?;
        if read == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::TruncatedHeader)
            };
        }
        filled += read;
    }

    let len = usize::try_from(u32::from_be_bytes(header)).unwrap_or(usize::MAX);
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }

    let mut body = vec![0_u8; len];
    reader.read_exact(&mut body)?;
    Ok(Some(body))
}

/// Writes one frame.
pub(crate) fn write_frame<W: Write>(writer: &mut W, body: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(body)?;
    writer.flush()?;
    Ok(())
}

/// Encodes a message as a MessagePack map with named fields.
pub(crate) fn encode_message(message: &ApiData) -> Result<Vec<u8>, FrameError> {
    Ok(rmp_serde::to_vec_named(message)?)
}

/// Decodes a frame body into a message map.
pub(crate) fn decode_message(body: &[u8]) -> Result<ApiData, FrameError> {
    match rmp_serde::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(FrameError::NotAMap),
    }
}
