use crate::channel::{ChannelHeader, CHANNEL_HEADER_SIZE, DATAGRAM_DATA_MAX_SIZE};
use crate::codec::{decode_packet, Packet};
use crate::error::FrameError;

/// Walks the packets serialized back to back in a borrowed buffer.
///
/// Iteration ends at the end of the buffer or at the first malformed
/// packet, whichever comes first. Packets decoded before the malformed one
/// are still yielded; the failure is available from [`PacketReader::error`].
#[derive(Debug)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    error: Option<FrameError>,
}

impl<'a> PacketReader<'a> {
    /// Create a reader over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, error: None }
    }

    /// The error that stopped iteration early, if any.
    pub fn error(&self) -> Option<&FrameError> {
        self.error.as_ref()
    }

    /// Bytes not yet consumed (including any malformed tail).
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

impl Iterator for PacketReader<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        if self.buf.is_empty() || self.error.is_some() {
            return None;
        }
        match decode_packet(self.buf) {
            Ok((packet, consumed)) => {
                self.buf = &self.buf[consumed..];
                Some(packet)
            }
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}

/// One channel's slice of an outer datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBlock<'a> {
    /// Registration index of the owning channel.
    pub channel_index: usize,
    /// The channel's serialized packets.
    pub data: &'a [u8],
}

/// Walks the channel blocks of an outer datagram.
///
/// Every header is validated before its slice is handed out: the channel
/// index must be below `channel_count` and the declared size must fit both
/// the datagram budget and the bytes that are actually left.
#[derive(Debug)]
pub struct ChannelBlockReader<'a> {
    buf: &'a [u8],
    channel_count: usize,
    error: Option<FrameError>,
}

impl<'a> ChannelBlockReader<'a> {
    /// Create a reader over `buf` for a handler with `channel_count` channels.
    pub fn new(buf: &'a [u8], channel_count: usize) -> Self {
        Self {
            buf,
            channel_count,
            error: None,
        }
    }

    /// The error that stopped iteration early, if any.
    pub fn error(&self) -> Option<&FrameError> {
        self.error.as_ref()
    }

    fn next_block(&mut self) -> Result<ChannelBlock<'a>, FrameError> {
        let header = ChannelHeader::decode(self.buf)?;
        let data_size = header.data_size as usize;
        let available = self.buf.len() - CHANNEL_HEADER_SIZE;

        if data_size > DATAGRAM_DATA_MAX_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: data_size,
                max: DATAGRAM_DATA_MAX_SIZE,
            });
        }
        if data_size > available {
            return Err(FrameError::Truncated {
                needed: CHANNEL_HEADER_SIZE + data_size,
                available: self.buf.len(),
            });
        }
        let channel_index = header.channel_index as usize;
        if channel_index >= self.channel_count {
            return Err(FrameError::ChannelOutOfRange {
                index: header.channel_index,
                count: self.channel_count,
            });
        }

        let end = CHANNEL_HEADER_SIZE + data_size;
        let data = &self.buf[CHANNEL_HEADER_SIZE..end];
        self.buf = &self.buf[end..];
        Ok(ChannelBlock {
            channel_index,
            data,
        })
    }
}

impl<'a> Iterator for ChannelBlockReader<'a> {
    type Item = ChannelBlock<'a>;

    fn next(&mut self) -> Option<ChannelBlock<'a>> {
        if self.buf.is_empty() || self.error.is_some() {
            return None;
        }
        match self.next_block() {
            Ok(block) => Some(block),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }
}
