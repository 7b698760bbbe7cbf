use std::io;

use thiserror::Error;

/// Everything that can go wrong inside the plotting client.
///
/// The variants follow the kinds of failure the operator can see: a command
/// or value that does not parse, a value outside what the data or server
/// allows, a broken server connection, a graphics device that cannot be
/// opened or written, and a malformed frame from the server.
#[derive(Debug, Error)]
pub enum NspdError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl NspdError {
    pub fn parse(msg: impl Into<String>) -> Self {
        NspdError::Parse(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        NspdError::OutOfRange(msg.into())
    }

    pub fn device(msg: impl Into<String>) -> Self {
        NspdError::Device(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        NspdError::Protocol(msg.into())
    }

    /// True when the error means the server went away and the session should end.
    pub fn is_fatal_network(&self) -> bool {
        match self {
            NspdError::Network(_) | NspdError::Protocol(_) => true,
            NspdError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, NspdError>;
