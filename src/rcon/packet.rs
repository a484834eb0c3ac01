//! RCON packet framing.
//!
//! ```text
//! i32 length | i32 request id | i32 type | body | 0x00 0x00
//! ```
//! All integers are little-endian; `length` counts everything after itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ControlError, Result};

pub const SERVERDATA_AUTH: i32 = 3;
pub const SERVERDATA_AUTH_RESPONSE: i32 = 2;
pub const SERVERDATA_EXECCOMMAND: i32 = 2;
pub const SERVERDATA_RESPONSE_VALUE: i32 = 0;

/// Request id the server uses to signal a rejected password.
pub const AUTH_FAILED_ID: i32 = -1;

/// Largest command body the server accepts.
pub const MAX_COMMAND_LEN: usize = 1446;

const HEADER_LEN: usize = 8;
const MIN_PACKET_LEN: i32 = 10;
const MAX_PACKET_LEN: i32 = 4096 + MIN_PACKET_LEN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: i32,
    pub body: String,
}

impl Packet {
    pub fn new(id: i32, kind: i32, body: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            body: body.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let len = HEADER_LEN + self.body.len() + 2;
        let mut buf = BytesMut::with_capacity(4 + len);
        buf.put_i32_le(len as i32);
        buf.put_i32_le(self.id);
        buf.put_i32_le(self.kind);
        buf.put_slice(self.body.as_bytes());
        buf.put_u8(0);
        buf.put_u8(0);
        buf.freeze()
    }

    /// Decode the part of a frame that follows the length prefix.
    pub fn decode(mut payload: Bytes) -> Result<Self> {
        if payload.len() < MIN_PACKET_LEN as usize {
            return Err(ControlError::unavailable(format!(
                "malformed packet: {} bytes",
                payload.len()
            )));
        }

        let id = payload.get_i32_le();
        let kind = payload.get_i32_le();
        // body is followed by two NULs; tolerate servers that send only one
        let body = payload.as_ref();
        let end = body.iter().position(|b| *b == 0).unwrap_or(body.len());

        Ok(Self {
            id,
            kind,
            body: String::from_utf8_lossy(&body[..end]).into_owned(),
        })
    }

    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncRead + Unpin,
    {
        let len = reader.read_i32_le().await?;
        if !(MIN_PACKET_LEN..=MAX_PACKET_LEN).contains(&len) {
            return Err(ControlError::unavailable(format!(
                "invalid packet length {}",
                len
            )));
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await?;
        Self::decode(Bytes::from(payload))
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await?;
        Ok(())
    }
}
