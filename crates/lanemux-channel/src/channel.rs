use bytes::Bytes;
use lanemux_frame::DatagramId;

use crate::protocol::{ChannelKind, ChannelProtocol, Protocol};

/// A numbered message lane with its own delivery policy.
#[derive(Debug)]
pub struct Channel {
    id: u8,
    protocol: Protocol,
}

impl Channel {
    /// Create a channel with a fresh protocol instance of `kind`.
    pub fn new(id: u8, kind: ChannelKind) -> Self {
        Self {
            id,
            protocol: Protocol::new(kind),
        }
    }

    /// Application-facing id of this channel.
    pub fn channel_id(&self) -> u8 {
        self.id
    }

    /// Delivery policy of this channel.
    pub fn kind(&self) -> ChannelKind {
        self.protocol.kind()
    }
}

impl ChannelProtocol for Channel {
    fn queue(&mut self, message: Bytes) {
        self.protocol.queue(message);
    }

    fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize {
        self.protocol.serialize(buf, datagram_id)
    }

    fn on_data_received(&mut self, data: &[u8]) {
        self.protocol.on_data_received(data);
    }

    fn on_datagram_acked(&mut self, datagram_id: DatagramId) {
        self.protocol.on_datagram_acked(datagram_id);
    }

    fn on_datagram_lost(&mut self, datagram_id: DatagramId) {
        self.protocol.on_datagram_lost(datagram_id);
    }

    fn process(&mut self) -> Vec<Bytes> {
        self.protocol.process()
    }

    fn is_reliable(&self) -> bool {
        self.protocol.is_reliable()
    }
}
