//! Two handlers talking over an in-memory link that loses datagrams.

use bytes::Bytes;
use lanemux_channel::{ChannelKind, ChannelSpec, ChannelsConfig, ChannelsHandler};
use lanemux_frame::{DatagramId, DATAGRAM_DATA_MAX_SIZE};

struct Link {
    sender: ChannelsHandler,
    receiver: ChannelsHandler,
    next_datagram: DatagramId,
    buf: Vec<u8>,
}

impl Link {
    fn new(config: &ChannelsConfig) -> Self {
        Self {
            sender: ChannelsHandler::from_config(config).unwrap(),
            receiver: ChannelsHandler::from_config(config).unwrap(),
            next_datagram: 0,
            buf: vec![0u8; DATAGRAM_DATA_MAX_SIZE],
        }
    }

    /// Send one datagram; `lose` decides whether it reaches the receiver.
    fn tick(&mut self, lose: bool) -> Vec<(u8, Bytes)> {
        let id = self.next_datagram;
        self.next_datagram = self.next_datagram.wrapping_add(1);

        let written = self.sender.serialize(&mut self.buf, id);
        assert!(written <= DATAGRAM_DATA_MAX_SIZE);
        if lose {
            self.sender.on_datagram_lost(id);
        } else {
            self.receiver.on_data_received(&self.buf[..written]);
            self.sender.on_datagram_acked(id);
        }
        self.receiver.process(true)
    }
}

fn payload(seed: u8, len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| seed.wrapping_add(i as u8)).collect::<Vec<_>>())
}

fn only(channel_id: u8, delivered: &[(u8, Bytes)]) -> Vec<Bytes> {
    delivered
        .iter()
        .filter(|(id, _)| *id == channel_id)
        .map(|(_, message)| message.clone())
        .collect()
}

#[test]
fn reliable_channel_survives_heavy_loss() {
    let mut link = Link::new(&ChannelsConfig::default());
    let sent: Vec<Bytes> = (0..25u8).map(|n| payload(n, 50 + usize::from(n) * 411)).collect();
    for message in &sent {
        link.sender.queue(0, message.clone());
    }

    let mut delivered = Vec::new();
    for tick in 0..2000u32 {
        delivered.extend(link.tick(tick % 2 == 0));
    }

    assert_eq!(only(0, &delivered), sent);
}

#[test]
fn unreliable_channel_never_reorders() {
    let mut link = Link::new(&ChannelsConfig::default());
    for n in 0..60u8 {
        link.sender.queue(1, payload(n, 300 + usize::from(n) * 37));
    }

    let mut delivered = Vec::new();
    for tick in 0..200u32 {
        delivered.extend(link.tick(tick % 4 == 1));
    }

    let received = only(1, &delivered);
    assert!(!received.is_empty());
    assert!(received.len() < 60);
    let seeds: Vec<u8> = received.iter().map(|m| m[0]).collect();
    assert!(seeds.windows(2).all(|w| w[0] < w[1]), "out of order: {seeds:?}");
    for message in &received {
        assert_eq!(*message, payload(message[0], message.len()));
    }
}

#[test]
fn channels_do_not_interfere() {
    let config = ChannelsConfig {
        channels: vec![
            ChannelSpec {
                id: 10,
                kind: ChannelKind::ReliableOrdered,
            },
            ChannelSpec {
                id: 20,
                kind: ChannelKind::UnreliableOrdered,
            },
            ChannelSpec {
                id: 30,
                kind: ChannelKind::ReliableOrdered,
            },
        ],
    };
    let mut link = Link::new(&config);
    let first: Vec<Bytes> = (0..8u8).map(|n| payload(n, 900)).collect();
    let third: Vec<Bytes> = (0..8u8).map(|n| payload(n + 100, 3000)).collect();
    for (a, c) in first.iter().zip(&third) {
        link.sender.queue(0, a.clone());
        link.sender.queue(2, c.clone());
    }
    link.sender.queue(1, Bytes::from_static(b"side note"));

    let mut delivered = Vec::new();
    for _ in 0..100 {
        delivered.extend(link.tick(false));
    }

    assert_eq!(only(10, &delivered), first);
    assert_eq!(only(30, &delivered), third);
    assert_eq!(only(20, &delivered), vec![Bytes::from_static(b"side note")]);
}

#[test]
fn garbage_datagrams_are_ignored() {
    let mut receiver = ChannelsHandler::from_config(&ChannelsConfig::default()).unwrap();
    let garbage: [&[u8]; 4] = [
        &[],
        &[0xFF; 3],
        &[0, 0, 0, 0, 0xFF, 0xFF, 0, 0],
        &[9, 0, 0, 0, 1, 0, 0, 0, 0],
    ];
    for datagram in garbage {
        receiver.on_data_received(datagram);
    }
    assert!(receiver.process(true).is_empty());
}
