use bytes::{Buf, BufMut, Bytes};

use crate::channel::{CHANNEL_HEADER_SIZE, DATAGRAM_DATA_MAX_SIZE};
use crate::error::{FrameError, Result};
use crate::sequence::SequenceId;

/// Packet header: sequence id (2) + kind (1) + payload size (2) = 5 bytes.
pub const PACKET_HEADER_SIZE: usize = 5;

/// Largest packet that still fits a datagram next to one channel header.
pub const PACKET_MAX_SIZE: usize = DATAGRAM_DATA_MAX_SIZE - CHANNEL_HEADER_SIZE;

/// Maximum payload carried by a single packet.
pub const DATA_MAX_SIZE: usize = PACKET_MAX_SIZE - PACKET_HEADER_SIZE;

/// Maximum number of packets one message may be split into.
pub const MAX_PACKETS_PER_MESSAGE: usize = 32;

/// Largest message a channel protocol accepts.
pub const MAX_MESSAGE_SIZE: usize = MAX_PACKETS_PER_MESSAGE * DATA_MAX_SIZE;

/// Role of a packet within its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// A complete message that fits in one packet.
    Whole = 0,
    /// First piece of a fragmented message.
    FirstFragment = 1,
    /// Interior piece of a fragmented message.
    Fragment = 2,
    /// Final piece of a fragmented message.
    LastFragment = 3,
}

impl PacketKind {
    /// Short human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketKind::Whole => "whole",
            PacketKind::FirstFragment => "first_fragment",
            PacketKind::Fragment => "fragment",
            PacketKind::LastFragment => "last_fragment",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PacketKind::Whole),
            1 => Ok(PacketKind::FirstFragment),
            2 => Ok(PacketKind::Fragment),
            3 => Ok(PacketKind::LastFragment),
            other => Err(FrameError::UnknownPacketKind(other)),
        }
    }
}

/// One framing unit of a channel's serialized stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence id assigned by the sending multiplexer.
    pub id: SequenceId,
    /// Role of this packet within its message.
    pub kind: PacketKind,
    /// Carried bytes, at most [`DATA_MAX_SIZE`].
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(id: SequenceId, kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            kind,
            payload: payload.into(),
        }
    }

    /// The total wire size of this packet (header + payload).
    pub fn wire_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }
}

/// Encode a packet at the start of `dst`, returning the bytes written.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────┬──────────────┬─────────────────┐
/// │ Sequence id  │ Kind     │ Payload size │ Payload          │
/// │ (2B LE)      │ (1B)     │ (2B LE)      │ (size bytes)     │
/// └──────────────┴──────────┴──────────────┴─────────────────┘
/// ```
pub fn encode_packet(packet: &Packet, dst: &mut [u8]) -> Result<usize> {
    if packet.payload.len() > DATA_MAX_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: packet.payload.len(),
            max: DATA_MAX_SIZE,
        });
    }
    let total = packet.wire_size();
    if dst.len() < total {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            available: dst.len(),
        });
    }

    let mut out = &mut dst[..total];
    out.put_u16_le(packet.id);
    out.put_u8(packet.kind as u8);
    out.put_u16_le(packet.payload.len() as u16);
    out.put_slice(&packet.payload);
    Ok(total)
}

/// Decode the packet at the start of `src`.
///
/// Returns the packet and the number of bytes it occupied.
pub fn decode_packet(src: &[u8]) -> Result<(Packet, usize)> {
    if src.len() < PACKET_HEADER_SIZE {
        return Err(FrameError::Truncated {
            needed: PACKET_HEADER_SIZE,
            available: src.len(),
        });
    }

    let mut header = &src[..PACKET_HEADER_SIZE];
    let id = header.get_u16_le();
    let tag = header.get_u8();
    let payload_len = header.get_u16_le() as usize;

    if payload_len > DATA_MAX_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: DATA_MAX_SIZE,
        });
    }

    let total = PACKET_HEADER_SIZE + payload_len;
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: src.len(),
        });
    }

    let kind = PacketKind::try_from(tag)?;
    let payload = Bytes::copy_from_slice(&src[PACKET_HEADER_SIZE..total]);
    Ok((Packet { id, kind, payload }, total))
}
