//! Wire codec for lanemux's multiplexed datagram transport.
//!
//! Two framing levels live in this crate:
//! - A **packet** carries one message, or one fragment of a larger message,
//!   tagged with a wrapping 16-bit sequence id.
//! - A **channel block** prefixes a run of packets with the index of the
//!   channel that produced them, so several channels share one datagram.
//!
//! Decoders never read past the buffer they are handed: a short or
//! inconsistent buffer yields a [`FrameError`], and the iterators in
//! [`reader`] simply stop there.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod sequence;
pub mod writer;

pub use channel::{ChannelHeader, CHANNEL_HEADER_SIZE, DATAGRAM_DATA_MAX_SIZE};
pub use codec::{
    decode_packet, encode_packet, Packet, PacketKind, DATA_MAX_SIZE, MAX_MESSAGE_SIZE,
    MAX_PACKETS_PER_MESSAGE, PACKET_HEADER_SIZE, PACKET_MAX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::{ChannelBlock, ChannelBlockReader, PacketReader};
pub use sequence::{is_sequence_newer, sequence_diff, DatagramId, SequenceId};
pub use writer::BudgetWriter;
