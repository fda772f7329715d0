//! Multiplexed, partially-reliable message lanes over unreliable datagrams.
//!
//! Applications queue whole messages on numbered channels. Each channel
//! fragments its messages into packets ([`Multiplexer`]), and the
//! [`ChannelsHandler`] packs every channel's packets into one shared
//! datagram budget per tick. On the receiving side the handler routes each
//! channel block back to its channel, which reorders, deduplicates and
//! reassembles ([`Demultiplexer`]) before releasing messages.
//!
//! Two delivery policies are provided:
//! - unreliable-ordered: late packets are dropped, never delivered out of order;
//! - reliable-ordered: packets are retained until the datagram carrying them
//!   is acknowledged, and resent when it is reported lost.
//!
//! Everything here is synchronous and single-threaded; drive it from one
//! network tick loop.

pub mod channel;
pub mod config;
pub mod demultiplexer;
pub mod error;
pub mod handler;
pub mod multiplexer;
pub mod protocol;

pub use channel::Channel;
pub use config::{ChannelSpec, ChannelsConfig};
pub use demultiplexer::Demultiplexer;
pub use error::{ChannelError, Result};
pub use handler::ChannelsHandler;
pub use multiplexer::Multiplexer;
pub use protocol::reliable::{
    ReliableDemultiplexer, ReliableMultiplexer, ReliableOrdered, RELIABLE_WINDOW,
};
pub use protocol::unreliable::UnreliableOrdered;
pub use protocol::{ChannelKind, ChannelProtocol, Protocol};
