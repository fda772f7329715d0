use bytes::{Bytes, BytesMut};
use lanemux_frame::{
    is_sequence_newer, Packet, PacketKind, PacketReader, SequenceId, MAX_PACKETS_PER_MESSAGE,
};
use tracing::{debug, trace};

/// Receive half of an unreliable-ordered channel.
///
/// Received packets wait in a list kept sorted by sequence id (wraparound
/// aware). [`Demultiplexer::process`] releases every message that is
/// complete, oldest first, and then forgets everything up to the newest
/// packet it released. Anything older than that, including fragment runs
/// that were still missing pieces, is abandoned for good.
#[derive(Debug)]
pub struct Demultiplexer {
    pending: Vec<Packet>,
    last_processed: SequenceId,
}

impl Default for Demultiplexer {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            // Sequence 0 is newer than u16::MAX, so the first packet is accepted.
            last_processed: SequenceId::MAX,
        }
    }
}

/// Outcome of trying to reassemble the fragment run starting at one index.
enum Run {
    /// The run is complete; holds the message and the index of its `LastFragment`.
    Complete(Bytes, usize),
    /// The run cannot complete yet; scanning resumes at this index.
    Stalled(usize),
}

impl Demultiplexer {
    /// Create an empty demultiplexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every packet in `data` and file it for reassembly.
    ///
    /// A malformed packet stops decoding; packets before it are kept.
    pub fn on_data_received(&mut self, data: &[u8]) {
        let mut reader = PacketReader::new(data);
        for packet in reader.by_ref() {
            self.on_packet_received(packet);
        }
        if let Some(err) = reader.error() {
            debug!(
                %err,
                dropped = reader.remaining(),
                "malformed channel data, dropping remainder"
            );
        }
    }

    /// File one packet, dropping it if it is stale or a duplicate.
    pub fn on_packet_received(&mut self, packet: Packet) {
        if !is_sequence_newer(packet.id, self.last_processed) {
            trace!(id = packet.id, last_processed = self.last_processed, "dropping stale packet");
            return;
        }

        let newest = self.pending.last().map(|p| p.id);
        if newest.is_none_or(|newest| is_sequence_newer(packet.id, newest)) {
            self.pending.push(packet);
            return;
        }

        let at = self
            .pending
            .partition_point(|p| is_sequence_newer(packet.id, p.id));
        if self.pending.get(at).is_some_and(|p| p.id == packet.id) {
            trace!(id = packet.id, "dropping duplicate packet");
            return;
        }
        self.pending.insert(at, packet);
    }

    /// Release every message that is fully received, oldest first.
    pub fn process(&mut self) -> Vec<Bytes> {
        let mut messages = Vec::new();
        let mut newest_released = None;
        let mut released_packets = 0;

        let mut index = 0;
        while index < self.pending.len() {
            match self.pending[index].kind {
                PacketKind::Whole => {
                    messages.push(self.pending[index].payload.clone());
                    newest_released = Some(index);
                    released_packets += 1;
                    index += 1;
                }
                PacketKind::FirstFragment => match self.reassemble(index) {
                    Run::Complete(message, last) => {
                        messages.push(message);
                        newest_released = Some(last);
                        released_packets += last - index + 1;
                        index = last + 1;
                    }
                    Run::Stalled(resume) => index = resume,
                },
                // Belongs to a run whose first fragment is missing or was rejected.
                PacketKind::Fragment | PacketKind::LastFragment => index += 1,
            }
        }

        if let Some(last) = newest_released {
            self.last_processed = self.pending[last].id;
            let abandoned = last + 1 - released_packets;
            if abandoned > 0 {
                debug!(
                    abandoned,
                    last_processed = self.last_processed,
                    "abandoning incomplete fragments older than released messages"
                );
            }
            self.pending.drain(..=last);
        }

        messages
    }

    fn reassemble(&self, first: usize) -> Run {
        let mut message = BytesMut::from(self.pending[first].payload.as_ref());
        let mut expected = self.pending[first].id.wrapping_add(1);
        let mut index = first + 1;

        while let Some(packet) = self.pending.get(index) {
            if packet.id != expected || index - first >= MAX_PACKETS_PER_MESSAGE {
                break;
            }
            match packet.kind {
                PacketKind::LastFragment => {
                    message.extend_from_slice(&packet.payload);
                    return Run::Complete(message.freeze(), index);
                }
                PacketKind::Fragment => message.extend_from_slice(&packet.payload),
                PacketKind::Whole | PacketKind::FirstFragment => break,
            }
            index += 1;
            expected = expected.wrapping_add(1);
        }

        trace!(first = self.pending[first].id, stalled_at = index, "fragment run incomplete");
        Run::Stalled(index)
    }

    /// Id of the newest packet released so far.
    pub fn last_processed(&self) -> SequenceId {
        self.last_processed
    }

    /// Number of packets waiting for reassembly.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Ids of the waiting packets, in the order they are kept.
    pub fn pending_ids(&self) -> impl Iterator<Item = SequenceId> + '_ {
        self.pending.iter().map(|p| p.id)
    }
}
