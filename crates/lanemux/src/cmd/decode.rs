use lanemux_frame::{ChannelBlockReader, FrameError, PacketReader};
use serde::Serialize;
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, hex_error, CliResult, SUCCESS};
use crate::output::{payload_preview, print_json, table, OutputFormat};

const PREVIEW_LIMIT: usize = 24;

#[derive(Debug, Serialize)]
struct PacketReport {
    sequence_id: u16,
    kind: &'static str,
    payload_size: usize,
    preview: String,
}

#[derive(Debug, Serialize)]
struct BlockReport {
    channel_index: usize,
    data_size: usize,
    packets: Vec<PacketReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct DecodeReport {
    size: usize,
    blocks: Vec<BlockReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let datagram = parse_hex(&args.hex)?;
    let (report, first_error) = dissect(&datagram, args.channels);
    print_report(&report, format);

    match first_error {
        Some(err) if args.strict => Err(frame_error("malformed datagram", err)),
        _ => Ok(SUCCESS),
    }
}

fn parse_hex(text: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = text.split_whitespace().collect();
    let digits = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
        .unwrap_or(&cleaned);
    hex::decode(digits).map_err(|err| hex_error("parsing datagram hex", err))
}

/// Walk every channel block and packet of `datagram`, keeping going past
/// malformed packets inside a block but stopping at a malformed block header.
fn dissect(datagram: &[u8], channel_count: usize) -> (DecodeReport, Option<FrameError>) {
    let mut first_error = None;
    let mut blocks = Vec::new();

    let mut reader = ChannelBlockReader::new(datagram, channel_count);
    for block in reader.by_ref() {
        let mut packets = PacketReader::new(block.data);
        let decoded = packets
            .by_ref()
            .map(|packet| PacketReport {
                sequence_id: packet.id,
                kind: packet.kind.as_str(),
                payload_size: packet.payload.len(),
                preview: payload_preview(&packet.payload, PREVIEW_LIMIT),
            })
            .collect();
        let error = packets.error().cloned();
        if let Some(err) = &error {
            debug!(channel_index = block.channel_index, %err, "malformed packet data");
        }
        blocks.push(BlockReport {
            channel_index: block.channel_index,
            data_size: block.data.len(),
            packets: decoded,
            error: error.as_ref().map(ToString::to_string),
        });
        if first_error.is_none() {
            first_error = error;
        }
    }

    let error = reader.error().cloned();
    if let Some(err) = &error {
        debug!(%err, "malformed channel block");
    }
    let report = DecodeReport {
        size: datagram.len(),
        blocks,
        error: error.as_ref().map(ToString::to_string),
    };
    (report, first_error.or(error))
}

fn print_report(report: &DecodeReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut t = table(["CHANNEL", "SEQ", "KIND", "SIZE", "PAYLOAD"]);
            for block in &report.blocks {
                for packet in &block.packets {
                    t.add_row(vec![
                        block.channel_index.to_string(),
                        packet.sequence_id.to_string(),
                        packet.kind.to_string(),
                        packet.payload_size.to_string(),
                        packet.preview.clone(),
                    ]);
                }
                if let Some(err) = &block.error {
                    t.add_row(vec![
                        block.channel_index.to_string(),
                        "-".to_string(),
                        "malformed".to_string(),
                        "-".to_string(),
                        err.clone(),
                    ]);
                }
            }
            println!("{t}");
            if let Some(err) = &report.error {
                println!("malformed tail: {err}");
            }
        }
        OutputFormat::Pretty => {
            println!("datagram: {} bytes, {} blocks", report.size, report.blocks.len());
            for block in &report.blocks {
                println!("  channel {} ({} bytes)", block.channel_index, block.data_size);
                for packet in &block.packets {
                    println!(
                        "    #{:<5} {:<14} {:>4} bytes  {}",
                        packet.sequence_id, packet.kind, packet.payload_size, packet.preview
                    );
                }
                if let Some(err) = &block.error {
                    println!("    malformed: {err}");
                }
            }
            if let Some(err) = &report.error {
                println!("  malformed tail: {err}");
            }
        }
    }
}
