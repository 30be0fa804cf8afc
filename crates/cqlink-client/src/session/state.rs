/// The two sockets a client keeps: server-pushed events and API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Event,
    Api,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Event, Channel::Api];

    /// Segment used in `socket.<channel>.*` observation paths.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Event => "event",
            Channel::Api => "api",
        }
    }

    /// Endpoint path appended to the base URL.
    pub fn endpoint_path(self) -> &'static str {
        match self {
            Channel::Event => "/",
            Channel::Api => "/api",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SocketState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    /// Peer started the closing handshake; nothing more is sent.
    Closing,
}
