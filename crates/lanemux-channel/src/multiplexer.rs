use std::collections::VecDeque;

use bytes::Bytes;
use lanemux_frame::{
    BudgetWriter, Packet, PacketKind, SequenceId, DATA_MAX_SIZE, MAX_MESSAGE_SIZE,
};
use tracing::trace;

/// Send half of an unreliable-ordered channel.
///
/// Messages are split into packets when queued. [`Multiplexer::serialize`]
/// drains the queue front to back into whatever budget the caller offers;
/// packets that do not fit wait for a later call, in order.
#[derive(Debug, Default)]
pub struct Multiplexer {
    queue: VecDeque<Packet>,
    next_id: SequenceId,
}

impl Multiplexer {
    /// Create an empty multiplexer. The first packet gets sequence id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for sending.
    ///
    /// # Panics
    ///
    /// Panics if the message is longer than [`MAX_MESSAGE_SIZE`].
    pub fn queue(&mut self, message: impl Into<Bytes>) {
        let packets = split_message(&mut self.next_id, message.into());
        self.queue.extend(packets);
    }

    /// Write as many queued packets as fit into `buf`, returning the bytes written.
    ///
    /// Packets are atomic: one that does not fit stops the drain and stays
    /// at the front of the queue.
    pub fn serialize(&mut self, buf: &mut [u8]) -> usize {
        let mut writer = BudgetWriter::new(buf);
        while let Some(packet) = self.queue.front() {
            if !writer.write_packet(packet) {
                break;
            }
            trace!(
                id = packet.id,
                kind = ?packet.kind,
                size = packet.payload.len(),
                "packet serialized"
            );
            self.queue.pop_front();
        }
        writer.written()
    }

    /// Number of packets waiting to be serialized.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Sequence id the next packet will receive.
    pub fn next_id(&self) -> SequenceId {
        self.next_id
    }
}

/// Split `message` into packets with consecutive ids starting at `*next_id`.
///
/// A message longer than one packet becomes a `FirstFragment`, zero or more
/// `Fragment`s and a `LastFragment`; payloads are zero-copy slices of
/// `message`. Messages that are an exact multiple of [`DATA_MAX_SIZE`] never
/// produce an empty trailing fragment.
pub(crate) fn split_message(next_id: &mut SequenceId, message: Bytes) -> Vec<Packet> {
    assert!(
        message.len() <= MAX_MESSAGE_SIZE,
        "message of {} bytes exceeds MAX_MESSAGE_SIZE ({MAX_MESSAGE_SIZE})",
        message.len()
    );

    if message.len() <= DATA_MAX_SIZE {
        let id = allocate_id(next_id);
        trace!(id, size = message.len(), "queued whole message");
        return vec![Packet::new(id, PacketKind::Whole, message)];
    }

    let mut packets = Vec::with_capacity(message.len().div_ceil(DATA_MAX_SIZE));
    let mut offset = 0;
    while offset < message.len() {
        let end = (offset + DATA_MAX_SIZE).min(message.len());
        let kind = if offset == 0 {
            PacketKind::FirstFragment
        } else {
            PacketKind::Fragment
        };
        packets.push(Packet::new(
            allocate_id(next_id),
            kind,
            message.slice(offset..end),
        ));
        offset = end;
    }
    if let Some(last) = packets.last_mut() {
        last.kind = PacketKind::LastFragment;
    }
    trace!(
        first = packets[0].id,
        fragments = packets.len(),
        size = message.len(),
        "queued fragmented message"
    );
    packets
}

fn allocate_id(next_id: &mut SequenceId) -> SequenceId {
    let id = *next_id;
    *next_id = next_id.wrapping_add(1);
    id
}

#[cfg(test)]
mod tests {
    use lanemux_frame::{PacketReader, PACKET_HEADER_SIZE, PACKET_MAX_SIZE};

    use super::*;

    fn drain_all(mux: &mut Multiplexer) -> Vec<Packet> {
        let mut buf = vec![0u8; 64 * 1024];
        let written = mux.serialize(&mut buf);
        PacketReader::new(&buf[..written]).collect()
    }

    #[test]
    fn small_message_is_one_whole_packet() {
        let mut mux = Multiplexer::new();
        mux.queue(&b"hello"[..]);

        let packets = drain_all(&mut mux);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].id, 0);
        assert_eq!(packets[0].kind, PacketKind::Whole);
        assert_eq!(packets[0].payload.as_ref(), b"hello");
        assert_eq!(mux.next_id(), 1);
    }

    #[test]
    fn message_of_data_max_size_is_not_fragmented() {
        let mut next_id = 0;
        let packets = split_message(&mut next_id, Bytes::from(vec![7u8; DATA_MAX_SIZE]));
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].kind, PacketKind::Whole);
    }

    #[test]
    fn three_and_a_bit_packets_fragment_into_four() {
        let mut next_id = 40;
        let message: Vec<u8> = (0..3 * DATA_MAX_SIZE + 1).map(|i| i as u8).collect();
        let packets = split_message(&mut next_id, Bytes::from(message.clone()));

        let kinds: Vec<PacketKind> = packets.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PacketKind::FirstFragment,
                PacketKind::Fragment,
                PacketKind::Fragment,
                PacketKind::LastFragment
            ]
        );
        let ids: Vec<SequenceId> = packets.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![40, 41, 42, 43]);
        assert_eq!(packets[3].payload.len(), 1);

        let joined: Vec<u8> = packets.iter().flat_map(|p| p.payload.to_vec()).collect();
        assert_eq!(joined, message);
        assert_eq!(next_id, 44);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let mut next_id = 0;
        let packets = split_message(&mut next_id, Bytes::from(vec![1u8; 2 * DATA_MAX_SIZE]));

        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].kind, PacketKind::FirstFragment);
        assert_eq!(packets[1].kind, PacketKind::LastFragment);
        assert!(packets.iter().all(|p| p.payload.len() == DATA_MAX_SIZE));
    }

    #[test]
    fn fragment_ids_wrap_around() {
        let mut next_id = u16::MAX - 1;
        let packets = split_message(&mut next_id, Bytes::from(vec![0u8; 3 * DATA_MAX_SIZE]));
        let ids: Vec<SequenceId> = packets.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![u16::MAX - 1, u16::MAX, 0]);
        assert_eq!(next_id, 1);
    }

    #[test]
    #[should_panic(expected = "exceeds MAX_MESSAGE_SIZE")]
    fn oversized_message_panics() {
        let mut mux = Multiplexer::new();
        mux.queue(vec![0u8; MAX_MESSAGE_SIZE + 1]);
    }

    #[test]
    fn serialize_keeps_packets_that_do_not_fit() {
        let mut mux = Multiplexer::new();
        mux.queue(vec![1u8; 10]);
        mux.queue(vec![2u8; 10]);
        mux.queue(vec![3u8; 10]);

        let mut buf = vec![0u8; 2 * (PACKET_HEADER_SIZE + 10) + 3];
        let written = mux.serialize(&mut buf);
        assert_eq!(written, 2 * (PACKET_HEADER_SIZE + 10));
        assert_eq!(mux.pending(), 1);

        let rest = drain_all(&mut mux);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, 2);
        assert!(mux.is_empty());
    }

    #[test]
    fn serialize_stops_at_first_packet_that_does_not_fit() {
        let mut mux = Multiplexer::new();
        mux.queue(vec![0u8; 50]);
        mux.queue(vec![0u8; 1]);

        let mut buf = [0u8; 20];
        assert_eq!(mux.serialize(&mut buf), 0);
        assert_eq!(mux.pending(), 2);
    }

    #[test]
    fn serialize_never_exceeds_budget() {
        let mut mux = Multiplexer::new();
        for size in [0usize, 1, 17, DATA_MAX_SIZE, DATA_MAX_SIZE + 5, 4 * DATA_MAX_SIZE] {
            mux.queue(vec![0x5Au8; size]);
        }

        for budget in [0usize, 4, PACKET_HEADER_SIZE, 100, PACKET_MAX_SIZE, 3000] {
            let mut buf = vec![0u8; budget + 16];
            let written = mux.serialize(&mut buf[..budget]);
            assert!(written <= budget);
            assert!(buf[budget..].iter().all(|&b| b == 0));
        }
    }
}
