/// Errors that can occur while encoding or decoding packets and channel blocks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer ends before the declared header or payload does.
    #[error("truncated input ({available} bytes available, {needed} needed)")]
    Truncated { needed: usize, available: usize },

    /// A declared payload exceeds what one packet or one datagram may carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The packet kind tag is not one of the known values.
    #[error("unknown packet kind tag {0}")]
    UnknownPacketKind(u8),

    /// A channel block names a channel that is not registered.
    #[error("channel index {index} out of range ({count} channels registered)")]
    ChannelOutOfRange { index: u32, count: usize },

    /// The destination slice cannot hold the encoded item.
    #[error("buffer too small ({available} bytes available, {needed} needed)")]
    BufferTooSmall { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
