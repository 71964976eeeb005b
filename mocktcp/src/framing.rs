//! Length-prefixed framing.
//!
//! A frame is a 4-byte big-endian unsigned length followed by exactly that
//! many payload bytes:
//!
//! ```text
//! +-------------------+-----------------------------+
//! | length (u32, BE)  | payload (length bytes)      |
//! +-------------------+-----------------------------+
//! ```
//!
//! Reading a frame from a cleanly closed stream (zero bytes available)
//! yields an empty payload rather than an error. Any other short read is a
//! [`ReadError::Incomplete`] carrying the bytes that did arrive.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Encoder, LengthDelimitedCodec};

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Largest payload a 4-byte length prefix can describe.
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

const READ_CHUNK: usize = 64 * 1024;

/// Failure reading a fixed amount of data.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("stream ended after {} of {expected} bytes", partial.len())]
    Incomplete { partial: Bytes, expected: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A [`LengthDelimitedCodec`] speaking this framing, for use with
/// `tokio_util::codec::Framed`.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(HEADER_LEN)
        .max_frame_length(MAX_PAYLOAD_LEN)
        .big_endian()
        .new_codec()
}

/// Encode `payload` as a single frame.
///
/// # Errors
///
/// Fails if the payload is longer than [`MAX_PAYLOAD_LEN`].
pub fn encode(payload: &[u8]) -> io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    codec().encode(Bytes::copy_from_slice(payload), &mut buf)?;
    Ok(buf.freeze())
}

/// Write `payload` to `writer` as a single frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode(payload)?).await
}

/// Read a frame and return its payload.
///
/// Returns an empty payload if the stream was closed cleanly before any
/// header byte arrived.
pub async fn read_frame<R>(reader: &mut R) -> Result<Bytes, ReadError>
where
    R: AsyncRead + Unpin,
{
    let header = match read_exactly(reader, HEADER_LEN).await {
        Ok(header) => header,
        Err(ReadError::Incomplete { partial, .. }) if partial.is_empty() => {
            return Ok(Bytes::new());
        }
        Err(e) => return Err(e),
    };
    let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    read_exactly(reader, len).await
}

/// Read exactly `n` bytes.
///
/// Unlike `AsyncReadExt::read_exact`, a premature end of stream reports the
/// bytes that were read before it. The buffer grows as data arrives, so an
/// oversized length from a peer costs nothing until the bytes show up.
pub async fn read_exactly<R>(reader: &mut R, n: usize) -> Result<Bytes, ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(n.min(READ_CHUNK));
    while buf.len() < n {
        buf.reserve((n - buf.len()).min(READ_CHUNK));
        let mut chunk = (&mut *reader).take((n - buf.len()) as u64);
        if chunk.read_buf(&mut buf).await? == 0 {
            return Err(ReadError::Incomplete {
                partial: buf.freeze(),
                expected: n,
            });
        }
    }
    Ok(buf.freeze())
}
