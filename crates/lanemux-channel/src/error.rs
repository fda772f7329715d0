/// Errors raised while building a channel set.
///
/// Traffic handling never fails: malformed network input is dropped and
/// logged instead of being reported here.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Two channels were registered with the same id.
    #[error("channel id {0} registered twice")]
    DuplicateChannelId(u8),

    /// The configuration does not declare any channel.
    #[error("channel configuration declares no channels")]
    NoChannels,

    /// The channel configuration could not be parsed.
    #[error("invalid channel configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// The channel configuration file could not be read.
    #[error("failed reading channel configuration: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
