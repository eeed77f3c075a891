// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destination of measurement batches.

use std::ops::AddAssign;
use std::sync::Arc;

use async_trait::async_trait;

use crate::measurement::Measurement;

/// Summary returned by the collector for a submitted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SinkResponse {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
    pub seconds_spent: f64,
}

impl AddAssign for SinkResponse {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.total += other.total;
        self.seconds_spent += other.seconds_spent;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Connection reset by {peer}: {source}")]
    ConnectionReset {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection refused by {peer}: {source}")]
    ConnectionRefused {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error talking to {peer}: {source}")]
    Io {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Timed out talking to {0}")]
    Timeout(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The batch these values were bundled into failed.
    #[error("Bundled submission failed: {0}")]
    Bundled(Arc<SinkError>),
    #[error("Bundle was dropped before it was sent")]
    BundleDropped,
}

impl SinkError {
    /// Classify an I/O error raised while talking to `peer`.
    pub fn from_io(peer: impl Into<String>, source: std::io::Error) -> Self {
        let peer = peer.into();
        match source.kind() {
            std::io::ErrorKind::ConnectionReset => Self::ConnectionReset { peer, source },
            std::io::ErrorKind::ConnectionRefused => Self::ConnectionRefused { peer, source },
            _ => Self::Io { peer, source },
        }
    }

    /// Whether a second attempt of the same batch may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionReset { .. } | Self::ConnectionRefused { .. }
        )
    }
}

#[async_trait]
pub trait MeasurementSink: Send + Sync {
    /// Submit a batch of measurements.
    async fn send(&self, measurements: &[Measurement]) -> Result<SinkResponse, SinkError>;
}
