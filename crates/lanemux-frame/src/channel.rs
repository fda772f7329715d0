//! Channel block header.
//!
//! An outer datagram is a concatenation of channel blocks, each a header
//! followed by `data_size` bytes of one channel's packets. There is no
//! terminator: parsing stops when the datagram is exhausted.

use bytes::{Buf, BufMut};

use crate::error::{FrameError, Result};

/// Channel header: channel index (4) + data size (4) = 8 bytes.
pub const CHANNEL_HEADER_SIZE: usize = 8;

/// Payload budget of one outer datagram (1400 bytes minus the connection header).
pub const DATAGRAM_DATA_MAX_SIZE: usize = 1388;

/// Prefix identifying which channel owns the bytes that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelHeader {
    /// Registration index of the owning channel.
    pub channel_index: u32,
    /// Length of the channel's serialized blob.
    pub data_size: u32,
}

impl ChannelHeader {
    /// Encode this header at the start of `dst`.
    ///
    /// ```text
    /// ┌────────────────┬──────────────┬──────────────────────┐
    /// │ Channel index  │ Data size    │ Packets               │
    /// │ (4B LE)        │ (4B LE)      │ (data size bytes)     │
    /// └────────────────┴──────────────┴──────────────────────┘
    /// ```
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize> {
        if dst.len() < CHANNEL_HEADER_SIZE {
            return Err(FrameError::BufferTooSmall {
                needed: CHANNEL_HEADER_SIZE,
                available: dst.len(),
            });
        }
        let mut out = &mut dst[..CHANNEL_HEADER_SIZE];
        out.put_u32_le(self.channel_index);
        out.put_u32_le(self.data_size);
        Ok(CHANNEL_HEADER_SIZE)
    }

    /// Decode the header at the start of `src`.
    ///
    /// Only the header itself is checked here; see
    /// [`ChannelBlockReader`](crate::reader::ChannelBlockReader) for the
    /// range and size checks against the rest of the datagram.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < CHANNEL_HEADER_SIZE {
            return Err(FrameError::Truncated {
                needed: CHANNEL_HEADER_SIZE,
                available: src.len(),
            });
        }
        let mut header = &src[..CHANNEL_HEADER_SIZE];
        Ok(Self {
            channel_index: header.get_u32_le(),
            data_size: header.get_u32_le(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = ChannelHeader {
            channel_index: 2,
            data_size: 300,
        };
        let mut buf = [0u8; CHANNEL_HEADER_SIZE];
        assert_eq!(header.encode(&mut buf).unwrap(), CHANNEL_HEADER_SIZE);
        assert_eq!(buf, [2, 0, 0, 0, 0x2C, 0x01, 0, 0]);
        assert_eq!(ChannelHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn decode_short_header() {
        let err = ChannelHeader::decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, FrameError::Truncated { available: 5, .. }));
    }

    #[test]
    fn encode_into_short_slice() {
        let header = ChannelHeader {
            channel_index: 0,
            data_size: 1,
        };
        assert!(header.encode(&mut [0u8; 4]).is_err());
    }
}
