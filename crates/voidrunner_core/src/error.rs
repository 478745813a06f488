//! Error types for the core.
//!
//! Recoverable errors (malformed frames, decode failures, authorization and
//! precondition failures) are handled entirely at the codec/dispatch
//! boundary: logged, counted, and dropped. They never propagate into the
//! simulation. Only [`CoreError::FatalTransport`] escapes to the process.

use thiserror::Error;

/// Errors surfaced at the wire/dispatch boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Header magic or version did not match the protocol contract.
    #[error("malformed frame: magic/version mismatch or header underread")]
    MalformedFrame,

    /// A packed game payload did not match its fixed size exactly.
    #[error("payload size mismatch")]
    PayloadSizeMismatch,

    /// Not enough bytes remained in the buffer for the requested primitive.
    #[error("decode underflow")]
    DecodeUnderflow,

    /// A length-prefixed string declared more bytes than remained.
    #[error("string length overruns remaining buffer")]
    OverrunString,

    /// The packet type byte did not match any known variant.
    #[error("unknown packet type {type_id:#06x}")]
    UnknownPacketType {
        /// The raw, unrecognized type value.
        type_id: u16,
    },

    /// The sender was not authorized to perform the requested action.
    #[error("not authorized")]
    NotAuthorized,

    /// A precondition for the requested action was not satisfied.
    #[error("precondition failed: {reason}")]
    PreconditionFailed {
        /// Human-readable reason, for logging only.
        reason: &'static str,
    },

    /// A session exceeded the keep-alive timeout and was reaped.
    #[error("session for player {player_id} timed out")]
    SessionTimeout {
        /// The player whose session was reaped.
        player_id: u8,
    },

    /// An unrecoverable transport failure; surfaces to process exit.
    #[error("fatal transport error: {0}")]
    FatalTransport(#[from] std::io::Error),
}

/// Errors from loading the process-level configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file was not valid TOML, or did not match the
    /// expected shape.
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field was present and well-typed but outside its documented range.
    #[error("config field {field} is out of range")]
    OutOfRange {
        /// The offending field's name.
        field: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_transport_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy");
        let err: CoreError = io_err.into();
        assert!(matches!(err, CoreError::FatalTransport(_)));
    }

    #[test]
    fn unknown_packet_type_carries_the_offending_value() {
        let err = CoreError::UnknownPacketType { type_id: 0x99 };
        assert_eq!(err.to_string(), "unknown packet type 0x0099");
    }
}
