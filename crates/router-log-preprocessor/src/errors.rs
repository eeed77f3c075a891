// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;

use crate::sink::SinkError;

/// Errors raised while turning a datagram into a [`crate::rfc3164::LogRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line does not match `<PRI>MMM D HH:MM:SS HOST [PROC[PID]: ]MSG`: {0:?}")]
    Malformed(String),
    #[error("priority {0} is outside of 0..=191")]
    PriorityOutOfRange(u16),
    #[error("unknown month abbreviation {0:?}")]
    InvalidMonth(String),
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Errors raised when a six-byte hardware address can't be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacAddressError {
    #[error("expected 12 hexadecimal digits in {0:?}")]
    InvalidLength(String),
    #[error("unexpected character {1:?} in {0:?}")]
    InvalidCharacter(String, char),
}

/// Errors raised by a producer preprocessor for a record it is registered for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreprocessError {
    #[error("unknown event kind {0:?}")]
    UnknownEventKind(String),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value {value:?} for field `{field}`")]
    InvalidValue { field: &'static str, value: String },
    #[error(transparent)]
    InvalidMacAddress(#[from] MacAddressError),
}

/// Errors raised while handling one datagram end to end.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("datagram is not ASCII text")]
    Decode,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to preprocess {producer} record: {source}")]
    Preprocess {
        producer: String,
        #[source]
        source: PreprocessError,
    },
    #[error("failed to forward {producer} message of {identifier} from {hostname}: {source}")]
    Forward {
        hostname: String,
        producer: String,
        identifier: String,
        #[source]
        source: SinkError,
    },
}

/// Errors raised while setting up the syslog listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("could not resolve {0}")]
    Resolve(String),
    #[error("couldn't bind to address {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while reading or validating [`crate::config::Settings`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
