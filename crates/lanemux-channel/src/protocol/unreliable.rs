use bytes::Bytes;
use lanemux_frame::DatagramId;

use crate::demultiplexer::Demultiplexer;
use crate::multiplexer::Multiplexer;
use crate::protocol::ChannelProtocol;

/// Ordered, unreliable delivery: a [`Multiplexer`] and a [`Demultiplexer`].
///
/// Lost packets are never resent. Ack and loss reports are ignored.
#[derive(Debug, Default)]
pub struct UnreliableOrdered {
    mux: Multiplexer,
    demux: Demultiplexer,
}

impl UnreliableOrdered {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelProtocol for UnreliableOrdered {
    fn queue(&mut self, message: Bytes) {
        self.mux.queue(message);
    }

    fn serialize(&mut self, buf: &mut [u8], _datagram_id: DatagramId) -> usize {
        self.mux.serialize(buf)
    }

    fn on_data_received(&mut self, data: &[u8]) {
        self.demux.on_data_received(data);
    }

    fn on_datagram_acked(&mut self, _datagram_id: DatagramId) {}

    fn on_datagram_lost(&mut self, _datagram_id: DatagramId) {}

    fn process(&mut self) -> Vec<Bytes> {
        self.demux.process()
    }

    fn is_reliable(&self) -> bool {
        false
    }
}
