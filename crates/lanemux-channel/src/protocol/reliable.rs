//! Ordered, reliable delivery.
//!
//! The sender keeps every packet until a datagram that carried it is
//! acknowledged, and resends it when such a datagram is reported lost. To
//! bound receiver memory it only ever has [`RELIABLE_WINDOW`] sequence ids in
//! flight, counted from the oldest unacknowledged packet. The receiver
//! holds one slot per id in that window and releases messages strictly in
//! sequence order.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use lanemux_frame::{
    is_sequence_newer, sequence_diff, BudgetWriter, DatagramId, Packet, PacketKind,
    PacketReader, SequenceId, MAX_PACKETS_PER_MESSAGE,
};
use tracing::{debug, trace, warn};

use crate::multiplexer::split_message;
use crate::protocol::ChannelProtocol;

/// Number of sequence ids that may be in flight at once.
pub const RELIABLE_WINDOW: usize = 2 * MAX_PACKETS_PER_MESSAGE;

/// Slots held by the receiver.
///
/// The sender's window starts at its oldest unacked packet, but the receiver
/// can lag behind that by one incomplete fragment run whose leading packets
/// were already acked. Slots are indexed by `id % RECEIVE_WINDOW`, so the
/// count must divide the sequence space or ids collide after the wrap.
const RECEIVE_WINDOW: usize = (RELIABLE_WINDOW + MAX_PACKETS_PER_MESSAGE).next_power_of_two();

const _: () = assert!((SequenceId::MAX as usize + 1) % RECEIVE_WINDOW == 0);

#[derive(Debug)]
struct RetainedPacket {
    packet: Packet,
    datagrams: Vec<DatagramId>,
    should_send: bool,
}

impl RetainedPacket {
    fn carried_by(&self, datagram_id: DatagramId) -> bool {
        self.datagrams.contains(&datagram_id)
    }
}

/// Send half of a reliable-ordered channel.
#[derive(Debug, Default)]
pub struct ReliableMultiplexer {
    queue: VecDeque<RetainedPacket>,
    next_id: SequenceId,
    first_allowed: SequenceId,
}

impl ReliableMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for sending.
    ///
    /// # Panics
    ///
    /// Panics if the message is longer than
    /// [`MAX_MESSAGE_SIZE`](lanemux_frame::MAX_MESSAGE_SIZE).
    pub fn queue(&mut self, message: impl Into<Bytes>) {
        let packets = split_message(&mut self.next_id, message.into());
        self.queue.extend(packets.into_iter().map(|packet| RetainedPacket {
            packet,
            datagrams: Vec::new(),
            should_send: true,
        }));
    }

    /// Write every packet that is due and fits into `buf`.
    ///
    /// Packets outside the in-flight window wait for acks. A due packet that
    /// does not fit is skipped so that smaller ones behind it can still go.
    pub fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize {
        let first_allowed = self.first_allowed;
        let mut writer = BudgetWriter::new(buf);

        for entry in self.queue.iter_mut() {
            if usize::from(sequence_diff(entry.packet.id, first_allowed)) >= RELIABLE_WINDOW {
                break;
            }
            if !entry.should_send || !writer.write_packet(&entry.packet) {
                continue;
            }
            entry.should_send = false;
            entry.datagrams.push(datagram_id);
            trace!(id = entry.packet.id, datagram_id, "reliable packet serialized");
        }
        writer.written()
    }

    /// Release every packet that datagram `datagram_id` carried.
    pub fn on_datagram_acked(&mut self, datagram_id: DatagramId) {
        let before = self.queue.len();
        self.queue.retain(|entry| !entry.carried_by(datagram_id));
        self.first_allowed = self
            .queue
            .front()
            .map_or(self.next_id, |entry| entry.packet.id);
        trace!(
            datagram_id,
            released = before - self.queue.len(),
            first_allowed = self.first_allowed,
            "datagram acked"
        );
    }

    /// Schedule every packet that datagram `datagram_id` carried for resending.
    pub fn on_datagram_lost(&mut self, datagram_id: DatagramId) {
        let mut resend = 0;
        for entry in self.queue.iter_mut().filter(|e| e.carried_by(datagram_id)) {
            entry.datagrams.retain(|&d| d != datagram_id);
            entry.should_send = true;
            resend += 1;
        }
        if resend > 0 {
            debug!(datagram_id, resend, "datagram lost, packets rescheduled");
        }
    }

    /// Number of packets not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.queue.len()
    }
}

/// Receive half of a reliable-ordered channel.
#[derive(Debug)]
pub struct ReliableDemultiplexer {
    slots: Vec<Option<Packet>>,
    last_processed: SequenceId,
}

impl Default for ReliableDemultiplexer {
    fn default() -> Self {
        Self {
            slots: vec![None; RECEIVE_WINDOW],
            last_processed: SequenceId::MAX,
        }
    }
}

enum Run {
    /// All `n` packets of the run are present.
    Complete(usize),
    /// Waiting for a missing packet.
    Pending,
    /// The first `n` packets form a run that can never complete.
    Broken(usize),
}

impl ReliableDemultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every packet in `data` and store it in its window slot.
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

    /// Store one packet unless it is stale, outside the window or a duplicate.
    pub fn on_packet_received(&mut self, packet: Packet) {
        if !is_sequence_newer(packet.id, self.last_processed) {
            trace!(id = packet.id, last_processed = self.last_processed, "dropping stale packet");
            return;
        }
        if usize::from(sequence_diff(packet.id, self.last_processed)) > RECEIVE_WINDOW {
            debug!(
                id = packet.id,
                last_processed = self.last_processed,
                "dropping packet beyond window"
            );
            return;
        }

        let slot = &mut self.slots[slot_index(packet.id)];
        if slot.as_ref().is_some_and(|held| held.id == packet.id) {
            trace!(id = packet.id, "dropping duplicate packet");
            return;
        }
        *slot = Some(packet);
    }

    /// Release messages in strict sequence order, stopping at the first gap.
    pub fn process(&mut self) -> Vec<Bytes> {
        let mut messages = Vec::new();
        loop {
            let head_id = self.last_processed.wrapping_add(1);
            let Some(kind) = self.peek(head_id).map(|head| head.kind) else {
                break;
            };

            match kind {
                PacketKind::Whole => {
                    if let Some(packet) = self.take(head_id) {
                        messages.push(packet.payload);
                    }
                    self.last_processed = head_id;
                }
                PacketKind::FirstFragment => match self.scan_run(head_id) {
                    Run::Complete(count) => {
                        let mut message = BytesMut::new();
                        for offset in 0..count {
                            if let Some(packet) = self.take(head_id.wrapping_add(offset as u16)) {
                                message.extend_from_slice(&packet.payload);
                            }
                        }
                        messages.push(message.freeze());
                        self.last_processed = head_id.wrapping_add(count as u16 - 1);
                    }
                    Run::Pending => break,
                    Run::Broken(count) => {
                        warn!(first = head_id, count, "discarding malformed fragment run");
                        self.discard(head_id, count);
                    }
                },
                PacketKind::Fragment | PacketKind::LastFragment => {
                    warn!(id = head_id, "discarding fragment without a first fragment");
                    self.discard(head_id, 1);
                }
            }
        }
        messages
    }

    fn scan_run(&self, first: SequenceId) -> Run {
        let mut count = 1;
        loop {
            if count >= MAX_PACKETS_PER_MESSAGE {
                return Run::Broken(count);
            }
            let Some(packet) = self.peek(first.wrapping_add(count as u16)) else {
                return Run::Pending;
            };
            match packet.kind {
                PacketKind::Fragment => count += 1,
                PacketKind::LastFragment => return Run::Complete(count + 1),
                PacketKind::Whole | PacketKind::FirstFragment => return Run::Broken(count),
            }
        }
    }

    fn discard(&mut self, first: SequenceId, count: usize) {
        for offset in 0..count {
            self.take(first.wrapping_add(offset as u16));
        }
        self.last_processed = first.wrapping_add(count as u16 - 1);
    }

    fn peek(&self, id: SequenceId) -> Option<&Packet> {
        self.slots[slot_index(id)]
            .as_ref()
            .filter(|packet| packet.id == id)
    }

    fn take(&mut self, id: SequenceId) -> Option<Packet> {
        let slot = &mut self.slots[slot_index(id)];
        if slot.as_ref().is_some_and(|packet| packet.id == id) {
            slot.take()
        } else {
            None
        }
    }

    /// Id of the newest packet released or discarded so far.
    pub fn last_processed(&self) -> SequenceId {
        self.last_processed
    }
}

fn slot_index(id: SequenceId) -> usize {
    usize::from(id) % RECEIVE_WINDOW
}

/// Ordered, reliable delivery: a [`ReliableMultiplexer`] and a [`ReliableDemultiplexer`].
#[derive(Debug, Default)]
pub struct ReliableOrdered {
    mux: ReliableMultiplexer,
    demux: ReliableDemultiplexer,
}

impl ReliableOrdered {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sent packets still waiting for an ack.
    pub fn unacked(&self) -> usize {
        self.mux.unacked()
    }
}

impl ChannelProtocol for ReliableOrdered {
    fn queue(&mut self, message: Bytes) {
        self.mux.queue(message);
    }

    fn serialize(&mut self, buf: &mut [u8], datagram_id: DatagramId) -> usize {
        self.mux.serialize(buf, datagram_id)
    }

    fn on_data_received(&mut self, data: &[u8]) {
        self.demux.on_data_received(data);
    }

    fn on_datagram_acked(&mut self, datagram_id: DatagramId) {
        self.mux.on_datagram_acked(datagram_id);
    }

    fn on_datagram_lost(&mut self, datagram_id: DatagramId) {
        self.mux.on_datagram_lost(datagram_id);
    }

    fn process(&mut self) -> Vec<Bytes> {
        self.demux.process()
    }

    fn is_reliable(&self) -> bool {
        true
    }
}
