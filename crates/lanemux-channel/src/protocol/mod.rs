//! Channel delivery policies.
//!
//! The set of policies is closed: [`Protocol`] enumerates them and every
//! variant implements the same [`ChannelProtocol`] contract, so callers
//! never need to know which one they are talking to.

use bytes::Bytes;
use lanemux_frame::DatagramId;
use serde::{Deserialize, Serialize};

pub mod reliable;
pub mod unreliable;

use reliable::ReliableOrdered;
use unreliable::UnreliableOrdered;

/// Operations every channel policy supports.
pub trait ChannelProtocol {
    /// Queue a message for sending.
    fn queue(&mut self, message: Bytes);

    /// Write pending packets into `buf`; returns the bytes written.
    ///
    /// `datagram_id` identifies the outer datagram the bytes will travel in,
    /// so that later ack/loss reports can be matched to them.
    fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize;

    /// Feed the bytes of one channel block received from the peer.
    fn on_data_received(&mut self, data: &[u8]);

    /// The connection layer confirmed delivery of a datagram.
    fn on_datagram_acked(&mut self, datagram_id: DatagramId);

    /// The connection layer gave up on a datagram.
    fn on_datagram_lost(&mut self, datagram_id: DatagramId);

    /// Messages that are ready for the application, oldest first.
    fn process(&mut self) -> Vec<Bytes>;

    /// Whether this policy guarantees delivery.
    fn is_reliable(&self) -> bool;
}

/// Delivery policy selector used for registration and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Every message arrives, in order.
    ReliableOrdered,
    /// Messages may be lost but never arrive out of order.
    UnreliableOrdered,
}

impl ChannelKind {
    /// Short human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::ReliableOrdered => "reliable_ordered",
            ChannelKind::UnreliableOrdered => "unreliable_ordered",
        }
    }
}

/// One of the available channel policies.
#[derive(Debug)]
pub enum Protocol {
    UnreliableOrdered(UnreliableOrdered),
    ReliableOrdered(ReliableOrdered),
}

impl Protocol {
    /// Create a fresh protocol instance of the given kind.
    pub fn new(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::ReliableOrdered => Protocol::ReliableOrdered(ReliableOrdered::new()),
            ChannelKind::UnreliableOrdered => Protocol::UnreliableOrdered(UnreliableOrdered::new()),
        }
    }

    /// The kind this instance was created from.
    pub fn kind(&self) -> ChannelKind {
        match self {
            Protocol::UnreliableOrdered(_) => ChannelKind::UnreliableOrdered,
            Protocol::ReliableOrdered(_) => ChannelKind::ReliableOrdered,
        }
    }
}

impl ChannelProtocol for Protocol {
    fn queue(&mut self, message: Bytes) {
        match self {
            Protocol::UnreliableOrdered(p) => p.queue(message),
            Protocol::ReliableOrdered(p) => p.queue(message),
        }
    }

    fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize {
        match self {
            Protocol::UnreliableOrdered(p) => p.serialize(buf, datagram_id),
            Protocol::ReliableOrdered(p) => p.serialize(buf, datagram_id),
        }
    }

    fn on_data_received(&mut self, data: &[u8]) {
        match self {
            Protocol::UnreliableOrdered(p) => p.on_data_received(data),
            Protocol::ReliableOrdered(p) => p.on_data_received(data),
        }
    }

    fn on_datagram_acked(&mut self, datagram_id: DatagramId) {
        match self {
            Protocol::UnreliableOrdered(p) => p.on_datagram_acked(datagram_id),
            Protocol::ReliableOrdered(p) => p.on_datagram_acked(datagram_id),
        }
    }

    fn on_datagram_lost(&mut self, datagram_id: DatagramId) {
        match self {
            Protocol::UnreliableOrdered(p) => p.on_datagram_lost(datagram_id),
            Protocol::ReliableOrdered(p) => p.on_datagram_lost(datagram_id),
        }
    }

    fn process(&mut self) -> Vec<Bytes> {
        match self {
            Protocol::UnreliableOrdered(p) => p.process(),
            Protocol::ReliableOrdered(p) => p.process(),
        }
    }

    fn is_reliable(&self) -> bool {
        match self {
            Protocol::UnreliableOrdered(p) => p.is_reliable(),
            Protocol::ReliableOrdered(p) => p.is_reliable(),
        }
    }
}
