use clap::{Args, Subcommand};
use std::path::PathBuf;

use lanemux_frame::DATAGRAM_DATA_MAX_SIZE;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod envinfo;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Push messages through a pair of handlers over a lossy in-memory link.
    Simulate(SimulateArgs),
    /// Dissect one datagram payload given as hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Channel configuration (JSON). Default: channel 0 reliable, channel 1 unreliable.
    #[arg(long, value_name = "FILE", env = "LANEMUX_CONFIG")]
    pub config: Option<PathBuf>,
    /// Messages queued on every channel.
    #[arg(long, short = 'n', default_value = "16")]
    pub messages: usize,
    /// Size of every message in bytes.
    #[arg(long, short = 's', default_value = "2000")]
    pub size: usize,
    /// Drop every Kth datagram (0 = lossless link).
    #[arg(long, value_name = "K", default_value = "0")]
    pub drop_every: u64,
    /// Payload budget of each datagram.
    #[arg(long, value_name = "BYTES", default_value_t = DATAGRAM_DATA_MAX_SIZE)]
    pub datagram_size: usize,
    /// Ticks before the receiver considers the connection established.
    #[arg(long, value_name = "TICKS", default_value = "0")]
    pub connect_after: u64,
    /// Give up after this many ticks.
    #[arg(long, value_name = "TICKS", default_value = "10000")]
    pub max_ticks: u64,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Datagram payload as hex (whitespace ignored).
    pub hex: String,
    /// Number of channels registered on the receiving handler.
    #[arg(long, default_value = "256")]
    pub channels: usize,
    /// Exit with an error if the datagram has a malformed tail.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}
