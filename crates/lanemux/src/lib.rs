//! Message channels over an unreliable datagram stream.
//!
//! lanemux lets several independent message lanes share one datagram per
//! network tick. Each lane fragments large messages, and either drops late
//! data (unreliable-ordered) or retransmits it until acknowledged
//! (reliable-ordered). Receivers never see a message out of order.
//!
//! The connection layer stays yours: it owns sockets, datagram ids and
//! ack/loss detection, and drives a [`channel::ChannelsHandler`] once per tick.
//!
//! # Crate Structure
//!
//! - [`frame`]: packet and channel-block wire codec, sequence comparison, size limits
//! - [`channel`]: per-channel protocols and the multi-channel handler
//!
//! # Example
//!
//! ```
//! use lanemux::channel::{ChannelsConfig, ChannelsHandler};
//! use lanemux::frame::DATAGRAM_DATA_MAX_SIZE;
//!
//! let config = ChannelsConfig::default();
//! let mut client = ChannelsHandler::from_config(&config).unwrap();
//! let mut server = ChannelsHandler::from_config(&config).unwrap();
//!
//! client.queue(0, &b"hello"[..]);
//!
//! let mut datagram = [0u8; DATAGRAM_DATA_MAX_SIZE];
//! let written = client.serialize(&mut datagram, 0);
//! server.on_data_received(&datagram[..written]);
//! client.on_datagram_acked(0);
//!
//! let messages = server.process(true);
//! assert_eq!(messages[0].0, 0);
//! assert_eq!(messages[0].1.as_ref(), b"hello");
//! ```

/// Re-export frame types.
pub mod frame {
    pub use lanemux_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use lanemux_channel::*;
}
