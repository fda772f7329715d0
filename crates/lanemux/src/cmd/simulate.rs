use bytes::{BufMut, Bytes, BytesMut};
use lanemux_channel::{ChannelKind, ChannelsConfig, ChannelsHandler};
use lanemux_frame::{DatagramId, DATAGRAM_DATA_MAX_SIZE, MAX_MESSAGE_SIZE};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::cmd::SimulateArgs;
use crate::exit::{channel_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_json, table, OutputFormat};

/// Bytes at the start of every simulated message that carry its index.
const INDEX_TAG_SIZE: usize = 4;

#[derive(Debug, Serialize)]
struct ChannelReport {
    id: u8,
    kind: &'static str,
    sent: usize,
    delivered: usize,
    violations: usize,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    complete: bool,
    ticks: u64,
    datagrams_sent: u64,
    datagrams_dropped: u64,
    bytes_sent: u64,
    channels: Vec<ChannelReport>,
}

/// Receive-side bookkeeping for one channel.
struct Lane {
    id: u8,
    kind: ChannelKind,
    size: usize,
    sent: usize,
    delivered: usize,
    violations: usize,
    next_index: usize,
}

impl Lane {
    fn is_done(&self) -> bool {
        self.kind != ChannelKind::ReliableOrdered || self.delivered == self.sent
    }

    fn record(&mut self, message: &[u8]) {
        self.delivered += 1;
        let Some(index) = message_index(message) else {
            if message.len() != self.size {
                self.violations += 1;
            }
            return;
        };

        let in_order = match self.kind {
            ChannelKind::ReliableOrdered => index == self.next_index,
            ChannelKind::UnreliableOrdered => index >= self.next_index,
        };
        if !in_order || message != test_message(self.id, index, self.size).as_ref() {
            debug!(channel_id = self.id, index, expected = self.next_index, "unexpected delivery");
            self.violations += 1;
        }
        self.next_index = index + 1;
    }

    fn report(&self) -> ChannelReport {
        ChannelReport {
            id: self.id,
            kind: self.kind.as_str(),
            sent: self.sent,
            delivered: self.delivered,
            violations: self.violations,
        }
    }
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let report = simulate(&args)?;
    print_report(&report, format);

    let clean = report.channels.iter().all(|c| c.violations == 0);
    Ok(if report.complete && clean {
        SUCCESS
    } else {
        FAILURE
    })
}

fn simulate(args: &SimulateArgs) -> CliResult<SimulationReport> {
    if args.size > MAX_MESSAGE_SIZE {
        return Err(CliError::usage(format!(
            "--size {} exceeds the maximum message size of {MAX_MESSAGE_SIZE} bytes",
            args.size
        )));
    }
    if args.datagram_size == 0 || args.datagram_size > DATAGRAM_DATA_MAX_SIZE {
        return Err(CliError::usage(format!(
            "--datagram-size must be between 1 and {DATAGRAM_DATA_MAX_SIZE}"
        )));
    }

    let config = match &args.config {
        Some(path) => ChannelsConfig::from_path(path)
            .map_err(|err| channel_error(&format!("loading {}", path.display()), err))?,
        None => ChannelsConfig::default(),
    };
    let mut sender = ChannelsHandler::from_config(&config)
        .map_err(|err| channel_error("building sender channels", err))?;
    let mut receiver = ChannelsHandler::from_config(&config)
        .map_err(|err| channel_error("building receiver channels", err))?;

    let mut lanes: Vec<Lane> = config
        .channels
        .iter()
        .map(|spec| Lane {
            id: spec.id,
            kind: spec.kind,
            size: args.size,
            sent: args.messages,
            delivered: 0,
            violations: 0,
            next_index: 0,
        })
        .collect();
    for (channel_index, lane) in lanes.iter().enumerate() {
        for index in 0..args.messages {
            sender.queue(channel_index, test_message(lane.id, index, args.size));
        }
    }

    let mut report = SimulationReport {
        complete: false,
        ticks: 0,
        datagrams_sent: 0,
        datagrams_dropped: 0,
        bytes_sent: 0,
        channels: Vec::new(),
    };
    let mut next_datagram: DatagramId = 0;
    let mut buf = vec![0u8; args.datagram_size];

    while report.ticks < args.max_ticks {
        report.ticks += 1;
        let written = sender.serialize(&mut buf, next_datagram);
        if written == 0 {
            if lanes.iter().all(Lane::is_done) {
                break;
            }
            continue;
        }

        let datagram_id = next_datagram;
        next_datagram = next_datagram.wrapping_add(1);
        report.datagrams_sent += 1;
        report.bytes_sent += written as u64;

        if args.drop_every > 0 && report.datagrams_sent % args.drop_every == 0 {
            trace!(datagram_id, written, "datagram dropped");
            report.datagrams_dropped += 1;
            sender.on_datagram_lost(datagram_id);
        } else {
            trace!(datagram_id, written, "datagram delivered");
            receiver.on_data_received(&buf[..written]);
            sender.on_datagram_acked(datagram_id);
        }

        let connected = report.ticks > args.connect_after;
        for (channel_id, message) in receiver.process(connected) {
            if let Some(index) = receiver.index_of(channel_id) {
                lanes[index].record(&message);
            }
        }
    }

    report.complete = lanes.iter().all(Lane::is_done);
    report.channels = lanes.iter().map(Lane::report).collect();
    info!(
        ticks = report.ticks,
        datagrams_sent = report.datagrams_sent,
        datagrams_dropped = report.datagrams_dropped,
        complete = report.complete,
        "simulation finished"
    );
    Ok(report)
}

/// Message `index` of channel `channel_id`: a little-endian index tag followed by a
/// pattern derived from both, truncated to `size` bytes.
fn test_message(channel_id: u8, index: usize, size: usize) -> Bytes {
    let tag = (index as u32).to_le_bytes();
    let mut message = BytesMut::with_capacity(size);
    for i in 0..size {
        if i < INDEX_TAG_SIZE {
            message.put_u8(tag[i]);
        } else {
            message.put_u8(channel_id ^ (i as u8) ^ (index as u8));
        }
    }
    message.freeze()
}

fn message_index(message: &[u8]) -> Option<usize> {
    let tag: [u8; INDEX_TAG_SIZE] = message.get(..INDEX_TAG_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(tag) as usize)
}

fn print_report(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut t = table(["CHANNEL", "KIND", "SENT", "DELIVERED", "VIOLATIONS"]);
            for channel in &report.channels {
                t.add_row(vec![
                    channel.id.to_string(),
                    channel.kind.to_string(),
                    channel.sent.to_string(),
                    channel.delivered.to_string(),
                    channel.violations.to_string(),
                ]);
            }
            println!("{t}");
            println!(
                "ticks={} datagrams={} dropped={} bytes={} complete={}",
                report.ticks,
                report.datagrams_sent,
                report.datagrams_dropped,
                report.bytes_sent,
                report.complete
            );
        }
        OutputFormat::Pretty => {
            println!(
                "simulation {} after {} ticks",
                if report.complete { "complete" } else { "incomplete" },
                report.ticks
            );
            println!(
                "  datagrams: {} sent, {} dropped, {} bytes",
                report.datagrams_sent, report.datagrams_dropped, report.bytes_sent
            );
            for channel in &report.channels {
                println!(
                    "  channel {:>3} {:<20} {}/{} delivered, {} violations",
                    channel.id, channel.kind, channel.delivered, channel.sent, channel.violations
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    fn args() -> SimulateArgs {
        SimulateArgs {
            config: None,
            messages: 16,
            size: 2000,
            drop_every: 0,
            datagram_size: DATAGRAM_DATA_MAX_SIZE,
            connect_after: 0,
            max_ticks: 10_000,
        }
    }

    fn lane<'a>(report: &'a SimulationReport, id: u8) -> &'a ChannelReport {
        report.channels.iter().find(|c| c.id == id).unwrap()
    }

    #[test]
    fn lossless_link_delivers_everything() {
        let report = simulate(&args()).unwrap();
        assert!(report.complete);
        assert_eq!(report.datagrams_dropped, 0);
        for channel in &report.channels {
            assert_eq!(channel.delivered, 16);
            assert_eq!(channel.violations, 0);
        }
    }

    #[test]
    fn lossy_link_keeps_reliable_complete() {
        let report = simulate(&SimulateArgs {
            drop_every: 3,
            ..args()
        })
        .unwrap();

        assert!(report.complete);
        assert!(report.datagrams_dropped > 0);
        assert_eq!(lane(&report, 0).delivered, 16);
        let unreliable = lane(&report, 1);
        assert!(unreliable.delivered > 0);
        assert!(unreliable.delivered < 16);
        assert!(report.channels.iter().all(|c| c.violations == 0));
    }

    #[test]
    fn unreliable_data_before_connection_is_discarded() {
        let report = simulate(&SimulateArgs {
            messages: 2,
            size: 10,
            connect_after: 1,
            ..args()
        })
        .unwrap();

        assert!(report.complete);
        assert_eq!(lane(&report, 0).delivered, 2);
        assert_eq!(lane(&report, 1).delivered, 0);
    }

    #[test]
    fn tick_limit_leaves_simulation_incomplete() {
        let report = simulate(&SimulateArgs {
            drop_every: 1,
            max_ticks: 50,
            ..args()
        })
        .unwrap();

        assert!(!report.complete);
        assert_eq!(report.ticks, 50);
        assert_eq!(lane(&report, 0).delivered, 0);
    }

    #[test]
    fn rejects_oversized_messages() {
        let err = simulate(&SimulateArgs {
            size: MAX_MESSAGE_SIZE + 1,
            ..args()
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn test_messages_carry_their_index() {
        let message = test_message(3, 258, 12);
        assert_eq!(message.len(), 12);
        assert_eq!(message_index(&message), Some(258));
        assert_eq!(message_index(&message[..3]), None);
    }
}
