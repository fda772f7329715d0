use crate::channel::{ChannelHeader, CHANNEL_HEADER_SIZE};
use crate::codec::{encode_packet, Packet};

/// Write cursor over a caller-supplied, fixed-size output buffer.
///
/// Nothing is ever written past the end of the buffer: items that do not
/// fit in the remaining budget are refused and the cursor stays where it was.
pub struct BudgetWriter<'a> {
    buf: &'a mut [u8],
    written: usize,
}

impl<'a> BudgetWriter<'a> {
    /// Create a writer starting at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, written: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.written
    }

    /// Returns true if `packet` fits in the remaining budget.
    pub fn fits(&self, packet: &Packet) -> bool {
        packet.wire_size() <= self.remaining()
    }

    /// Append `packet` if it fits. Returns false (writing nothing) otherwise.
    pub fn write_packet(&mut self, packet: &Packet) -> bool {
        if !self.fits(packet) {
            return false;
        }
        match encode_packet(packet, &mut self.buf[self.written..]) {
            Ok(n) => {
                self.written += n;
                true
            }
            Err(_) => false,
        }
    }

    /// Append one channel block.
    ///
    /// A header slot is reserved and `fill` is handed the space after it.
    /// `fill` returns how many bytes it produced; if that is zero the block
    /// is dropped entirely so idle channels cost nothing on the wire.
    /// Returns the number of payload bytes produced.
    pub fn write_channel_block<F>(&mut self, channel_index: u32, fill: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        if self.remaining() <= CHANNEL_HEADER_SIZE {
            return 0;
        }

        let (header, body) = self.buf[self.written..].split_at_mut(CHANNEL_HEADER_SIZE);
        let body_len = body.len();
        let produced = fill(body);
        assert!(
            produced <= body_len,
            "channel {channel_index} reported {produced} bytes into a {body_len}-byte slot"
        );
        if produced == 0 {
            return 0;
        }

        let block_header = ChannelHeader {
            channel_index,
            data_size: produced as u32,
        };
        if block_header.encode(header).is_err() {
            return 0;
        }
        self.written += CHANNEL_HEADER_SIZE + produced;
        produced
    }
}
