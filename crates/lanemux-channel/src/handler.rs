use bytes::Bytes;
use lanemux_frame::{BudgetWriter, ChannelBlockReader, DatagramId, DATAGRAM_DATA_MAX_SIZE};
use tracing::debug;

use crate::channel::Channel;
use crate::config::ChannelsConfig;
use crate::error::{ChannelError, Result};
use crate::protocol::{ChannelKind, ChannelProtocol};

/// Dispatches messages across an ordered set of channels sharing one datagram stream.
///
/// Channels are addressed on the wire by registration index, so both peers
/// must register the same channels in the same order, and must do so
/// before any traffic flows.
///
/// When serializing, channels are visited in registration order every
/// time. Earlier channels therefore get first claim on the datagram budget
/// and a busy early channel can starve later ones for a tick.
#[derive(Debug, Default)]
pub struct ChannelsHandler {
    channels: Vec<Channel>,
}

impl ChannelsHandler {
    /// Create a handler with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler with every channel of `config` registered in order.
    pub fn from_config(config: &ChannelsConfig) -> Result<Self> {
        if config.channels.is_empty() {
            return Err(ChannelError::NoChannels);
        }
        let mut handler = Self::new();
        for spec in &config.channels {
            handler.register(spec.id, spec.kind)?;
        }
        Ok(handler)
    }

    /// Register a channel, returning its index.
    pub fn register(&mut self, channel_id: u8, kind: ChannelKind) -> Result<usize> {
        if self.index_of(channel_id).is_some() {
            return Err(ChannelError::DuplicateChannelId(channel_id));
        }
        let index = self.channels.len();
        self.channels.push(Channel::new(channel_id, kind));
        debug!(index, channel_id, kind = kind.as_str(), "channel registered");
        Ok(index)
    }

    /// Registered channels, in registration order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Registration index of the channel with id `channel_id`.
    pub fn index_of(&self, channel_id: u8) -> Option<usize> {
        self.channels
            .iter()
            .position(|channel| channel.channel_id() == channel_id)
    }

    /// Queue a message on the channel at `channel_index`.
    ///
    /// # Panics
    ///
    /// Panics if `channel_index` is not a registered index, or if the
    /// message is longer than [`MAX_MESSAGE_SIZE`](lanemux_frame::MAX_MESSAGE_SIZE).
    pub fn queue(&mut self, channel_index: usize, message: impl Into<Bytes>) {
        assert!(
            channel_index < self.channels.len(),
            "channel index {channel_index} out of range ({} channels registered)",
            self.channels.len()
        );
        self.channels[channel_index].queue(message.into());
    }

    /// Fill `buf` with channel blocks for datagram `datagram_id`.
    ///
    /// Returns the bytes written, never more than `buf.len()` and never more
    /// than [`DATAGRAM_DATA_MAX_SIZE`], the largest datagram a receiver
    /// accepts. Channels with nothing to send contribute no bytes at all.
    pub fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize {
        let budget = buf.len().min(DATAGRAM_DATA_MAX_SIZE);
        let mut writer = BudgetWriter::new(&mut buf[..budget]);
        for (index, channel) in self.channels.iter_mut().enumerate() {
            writer.write_channel_block(index as u32, |body| channel.serialize(body, datagram_id));
        }
        writer.written()
    }

    /// Route every channel block of a received datagram to its channel.
    ///
    /// A malformed block stops routing; blocks before it are delivered.
    pub fn on_data_received(&mut self, data: &[u8]) {
        let mut reader = ChannelBlockReader::new(data, self.channels.len());
        for block in reader.by_ref() {
            self.channels[block.channel_index].on_data_received(block.data);
        }
        if let Some(err) = reader.error() {
            debug!(%err, size = data.len(), "malformed datagram, dropping remainder");
        }
    }

    /// Tell every channel that datagram `datagram_id` was delivered.
    pub fn on_datagram_acked(&mut self, datagram_id: DatagramId) {
        for channel in &mut self.channels {
            channel.on_datagram_acked(datagram_id);
        }
    }

    /// Tell every channel that datagram `datagram_id` was lost.
    pub fn on_datagram_lost(&mut self, datagram_id: DatagramId) {
        for channel in &mut self.channels {
            channel.on_datagram_lost(datagram_id);
        }
    }

    /// Collect ready messages from every channel, tagged with the channel id.
    ///
    /// Until the connection is established only reliable channels may
    /// surface messages; unreliable ones are processed and discarded.
    pub fn process(&mut self, is_connected: bool) -> Vec<(u8, Bytes)> {
        let mut messages = Vec::new();
        for channel in &mut self.channels {
            let ready = channel.process();
            if ready.is_empty() {
                continue;
            }
            if !channel.is_reliable() && !is_connected {
                debug!(
                    channel_id = channel.channel_id(),
                    dropped = ready.len(),
                    "discarding unreliable messages received before connection"
                );
                continue;
            }
            let id = channel.channel_id();
            messages.extend(ready.into_iter().map(|message| (id, message)));
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use lanemux_frame::{ChannelHeader, CHANNEL_HEADER_SIZE, DATA_MAX_SIZE, PACKET_HEADER_SIZE};

    use super::*;

    fn with_channels(kinds: &[ChannelKind]) -> ChannelsHandler {
        let mut handler = ChannelsHandler::new();
        for (id, &kind) in kinds.iter().enumerate() {
            handler.register(id as u8, kind).unwrap();
        }
        handler
    }

    #[test]
    fn duplicate_channel_id_is_rejected() {
        let mut handler = ChannelsHandler::new();
        assert_eq!(handler.register(4, ChannelKind::ReliableOrdered).unwrap(), 0);
        assert_eq!(handler.register(9, ChannelKind::UnreliableOrdered).unwrap(), 1);
        assert!(matches!(
            handler.register(4, ChannelKind::UnreliableOrdered),
            Err(ChannelError::DuplicateChannelId(4))
        ));
        assert_eq!(handler.index_of(9), Some(1));
    }

    #[test]
    fn empty_config_is_rejected() {
        let config = ChannelsConfig { channels: vec![] };
        assert!(matches!(
            ChannelsHandler::from_config(&config),
            Err(ChannelError::NoChannels)
        ));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn queue_on_unknown_index_panics() {
        let mut handler = with_channels(&[ChannelKind::UnreliableOrdered]);
        handler.queue(1, Bytes::from_static(b"nowhere"));
    }

    #[test]
    fn idle_channels_emit_no_headers() {
        let mut handler = with_channels(&[
            ChannelKind::UnreliableOrdered,
            ChannelKind::UnreliableOrdered,
            ChannelKind::UnreliableOrdered,
        ]);
        handler.queue(1, Bytes::from_static(b"only me"));

        let mut buf = [0u8; 128];
        let written = handler.serialize(&mut buf, 0);
        assert_eq!(written, CHANNEL_HEADER_SIZE + PACKET_HEADER_SIZE + 7);

        let header = ChannelHeader::decode(&buf).unwrap();
        assert_eq!(header.channel_index, 1);
        assert_eq!(header.data_size as usize, PACKET_HEADER_SIZE + 7);

        let mut empty = with_channels(&[ChannelKind::ReliableOrdered]);
        assert_eq!(empty.serialize(&mut buf, 1), 0);
    }

    #[test]
    fn three_channels_roundtrip_in_isolation() {
        let kinds = [
            ChannelKind::ReliableOrdered,
            ChannelKind::UnreliableOrdered,
            ChannelKind::UnreliableOrdered,
        ];
        let mut sender = with_channels(&kinds);
        let mut receiver = with_channels(&kinds);
        sender.queue(0, Bytes::from_static(b"zero"));
        sender.queue(1, Bytes::from_static(b"one"));
        sender.queue(2, Bytes::from_static(b"two"));

        let mut buf = [0u8; DATAGRAM_DATA_MAX_SIZE];
        let written = sender.serialize(&mut buf, 0);
        receiver.on_data_received(&buf[..written]);

        assert_eq!(
            receiver.process(true),
            vec![
                (0, Bytes::from_static(b"zero")),
                (1, Bytes::from_static(b"one")),
                (2, Bytes::from_static(b"two")),
            ]
        );
    }

    #[test]
    fn unreliable_messages_are_dropped_before_connection() {
        let kinds = [ChannelKind::ReliableOrdered, ChannelKind::UnreliableOrdered];
        let mut sender = with_channels(&kinds);
        let mut receiver = with_channels(&kinds);
        sender.queue(0, Bytes::from_static(b"handshake"));
        sender.queue(1, Bytes::from_static(b"state"));

        let mut buf = [0u8; 256];
        let written = sender.serialize(&mut buf, 0);
        receiver.on_data_received(&buf[..written]);

        assert_eq!(
            receiver.process(false),
            vec![(0, Bytes::from_static(b"handshake"))]
        );
        assert!(receiver.process(true).is_empty());
    }

    #[test]
    fn earlier_channels_claim_budget_first() {
        let kinds = [ChannelKind::UnreliableOrdered, ChannelKind::UnreliableOrdered];
        let mut sender = with_channels(&kinds);
        sender.queue(0, vec![0u8; DATA_MAX_SIZE]);
        sender.queue(1, Bytes::from_static(b"late"));

        let mut buf = [0u8; DATAGRAM_DATA_MAX_SIZE];
        let written = sender.serialize(&mut buf, 0);
        let blocks: Vec<_> = ChannelBlockReader::new(&buf[..written], 2).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].channel_index, 0);

        let written = sender.serialize(&mut buf, 1);
        let blocks: Vec<_> = ChannelBlockReader::new(&buf[..written], 2).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].channel_index, 1);
    }

    #[test]
    fn serialize_respects_small_budgets() {
        let kinds = [ChannelKind::ReliableOrdered, ChannelKind::UnreliableOrdered];
        let mut sender = with_channels(&kinds);
        for size in [3usize, 300, DATA_MAX_SIZE * 2 + 1] {
            sender.queue(0, vec![1u8; size]);
            sender.queue(1, vec![2u8; size]);
        }

        for budget in [0usize, CHANNEL_HEADER_SIZE, CHANNEL_HEADER_SIZE + 4, 64, 700] {
            let mut buf = vec![0u8; budget + 8];
            let written = sender.serialize(&mut buf[..budget], budget as u16);
            assert!(written <= budget);
            assert!(buf[budget..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn oversized_buffers_are_capped_to_one_datagram() {
        let kinds = [ChannelKind::UnreliableOrdered];
        let mut sender = with_channels(&kinds);
        let mut receiver = with_channels(&kinds);
        let message: Vec<u8> = (0..3000).map(|i| i as u8).collect();
        sender.queue(0, message.clone());

        let mut buf = vec![0u8; 4096];
        let mut delivered = Vec::new();
        for datagram_id in 0..4 {
            let written = sender.serialize(&mut buf, datagram_id);
            assert!(written <= DATAGRAM_DATA_MAX_SIZE);
            assert!(buf[DATAGRAM_DATA_MAX_SIZE..].iter().all(|&b| b == 0));
            receiver.on_data_received(&buf[..written]);
            delivered.extend(receiver.process(true));
        }

        assert_eq!(delivered, vec![(0, Bytes::from(message))]);
    }

    #[test]
    fn registered_kinds_are_kept_in_order() {
        let kinds = [ChannelKind::UnreliableOrdered, ChannelKind::ReliableOrdered];
        let handler = with_channels(&kinds);
        let registered: Vec<_> = handler
            .channels()
            .iter()
            .map(|channel| (channel.channel_id(), channel.kind()))
            .collect();
        assert_eq!(
            registered,
            vec![(0, ChannelKind::UnreliableOrdered), (1, ChannelKind::ReliableOrdered)]
        );
    }

    #[test]
    fn malformed_datagram_keeps_valid_prefix() {
        let kinds = [ChannelKind::UnreliableOrdered, ChannelKind::UnreliableOrdered];
        let mut sender = with_channels(&kinds);
        let mut receiver = with_channels(&kinds);
        sender.queue(0, Bytes::from_static(b"kept"));

        let mut buf = [0u8; 128];
        let mut written = sender.serialize(&mut buf, 0);
        ChannelHeader {
            channel_index: 7,
            data_size: 4,
        }
        .encode(&mut buf[written..])
        .unwrap();
        written += CHANNEL_HEADER_SIZE + 4;

        receiver.on_data_received(&buf[..written]);
        assert_eq!(receiver.process(true), vec![(0, Bytes::from_static(b"kept"))]);
    }

    #[test]
    fn ack_and_loss_reach_every_channel() {
        let kinds = [ChannelKind::ReliableOrdered, ChannelKind::ReliableOrdered];
        let mut sender = with_channels(&kinds);
        sender.queue(0, Bytes::from_static(b"a"));
        sender.queue(1, Bytes::from_static(b"b"));

        let mut buf = [0u8; 128];
        let first = sender.serialize(&mut buf, 5);
        assert!(first > 0);
        sender.on_datagram_lost(5);
        assert_eq!(sender.serialize(&mut buf, 6), first);
        sender.on_datagram_acked(6);
        assert_eq!(sender.serialize(&mut buf, 7), 0);
    }
}
