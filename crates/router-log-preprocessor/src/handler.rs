// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-datagram pipeline: decode, parse, preprocess and forward.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::errors::{HandlerError, PreprocessError};
use crate::hook::Hook;
use crate::preprocessors::PreprocessorRegistry;
use crate::rfc3164;

/// Target of the raw line log, filter it with `RUST_LOG=rlp::echo=debug`.
pub const ECHO_TARGET: &str = "rlp::echo";

pub struct LogHandler {
    registry: PreprocessorRegistry,
    hook: Arc<dyn Hook>,
}

impl LogHandler {
    #[must_use]
    pub fn new(registry: PreprocessorRegistry, hook: Arc<dyn Hook>) -> Self {
        Self { registry, hook }
    }

    /// Handle one datagram received from `source`.
    pub async fn handle(&self, packet: &[u8], source: SocketAddr) -> Result<(), HandlerError> {
        let line = decode(packet)?;
        debug!(target: ECHO_TARGET, "{source}: {line}");

        let record = rfc3164::parse(line)?;
        let message = self
            .registry
            .preprocess(&record)
            .map_err(|source| HandlerError::Preprocess {
                producer: record.process.clone().unwrap_or_default(),
                source,
            })?;

        self.hook
            .send(&record, message.as_ref())
            .await
            .map_err(|source| HandlerError::Forward {
                hostname: record.hostname.clone(),
                producer: record.process.clone().unwrap_or_default(),
                identifier: message
                    .as_ref()
                    .map(|m| m.mac_address().to_string())
                    .unwrap_or_default(),
                source,
            })
    }

    /// Handle one datagram and log the failure, if any. Errors never leave the task.
    pub async fn handle_and_log(&self, packet: &[u8], source: SocketAddr) {
        if let Err(e) = self.handle(packet, source).await {
            log_handler_error(&e, source);
        }
    }
}

fn decode(packet: &[u8]) -> Result<&str, HandlerError> {
    if !packet.is_ascii() {
        return Err(HandlerError::Decode);
    }
    std::str::from_utf8(packet).map_err(|_| HandlerError::Decode)
}

fn log_handler_error(e: &HandlerError, source: SocketAddr) {
    match e {
        HandlerError::Decode | HandlerError::Parse(_) => {
            warn!("Dropping datagram from {source}: {e}");
        }
        HandlerError::Preprocess {
            source: PreprocessError::UnknownEventKind(_),
            ..
        } => error!("{e}"),
        HandlerError::Preprocess { .. } => warn!("{e}"),
        HandlerError::Forward {
            hostname,
            producer,
            identifier,
            source,
        } => error!(
            hostname = %hostname,
            producer = %producer,
            identifier = %identifier,
            "Failed to forward message: {source}"
        ),
    }
}
