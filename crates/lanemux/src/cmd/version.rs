use lanemux_channel::RELIABLE_WINDOW;
use lanemux_frame::{DATAGRAM_DATA_MAX_SIZE, MAX_MESSAGE_SIZE, MAX_PACKETS_PER_MESSAGE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("lanemux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: lanemux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "profile: {}",
        option_env!("LANEMUX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("datagram_data_max_size: {DATAGRAM_DATA_MAX_SIZE}");
    println!("max_message_size: {MAX_MESSAGE_SIZE}");
    println!("max_packets_per_message: {MAX_PACKETS_PER_MESSAGE}");
    println!("reliable_window: {RELIABLE_WINDOW}");

    Ok(SUCCESS)
}
