// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Hooks acting on preprocessed messages.
//!
//! [`ZabbixTrapper`] forwards client messages to Zabbix trapper items. A client seen for the
//! first time is announced through the `client_discovery` item, and its values are held back
//! until Zabbix had the configured time to create the items from the prototypes:
//!
//! 1. unknown client: send the discovery value and wait the full wait time
//! 2. recently discovered client: wait the remaining part of the wait time
//! 3. discovered long ago: send right away
//!
//! Every collector gets each batch through its own sender, so a retry only goes to the
//! collector that failed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::known_clients::KnownClients;
use crate::mapper::{map_client_discovery, map_client_message};
use crate::measurement::Measurement;
use crate::message::Message;
use crate::rfc3164::LogRecord;
use crate::sink::{MeasurementSink, SinkError, SinkResponse};

pub const DEFAULT_NAMESPACE: &str = "rlp";
pub const DEFAULT_CLIENT_DISCOVERY_WAIT_TIME: Duration = Duration::from_secs(60);

#[async_trait]
pub trait Hook: Send + Sync {
    /// Act on a record and its preprocessed message. `None` is a no-op.
    async fn send(&self, record: &LogRecord, message: Option<&Message>) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct ZabbixTrapperConfig {
    /// Prefix of every item key.
    pub namespace: String,
    pub client_discovery_wait_time: Duration,
    /// Collect values for this long and send them as one batch. Zero sends every message on
    /// its own.
    pub measurement_bundle_window: Duration,
}

impl Default for ZabbixTrapperConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            client_discovery_wait_time: DEFAULT_CLIENT_DISCOVERY_WAIT_TIME,
            measurement_bundle_window: Duration::ZERO,
        }
    }
}

/// Outcome of a bundle, `None` until it was submitted.
type FlushResult = Option<Result<(), Arc<SinkError>>>;

/// Values collected during a bundle window.
struct Bundle {
    measurements: Vec<Measurement>,
    flushed: watch::Sender<FlushResult>,
}

enum Discovery {
    Known(Duration),
    New(Duration),
}

pub struct ZabbixTrapper {
    senders: Vec<Arc<dyn MeasurementSink>>,
    namespace: String,
    bundle_window: Duration,
    known_clients: Mutex<KnownClients>,
    // Held from building a discovery value until it is submitted, so a later roster
    // never arrives before an earlier, smaller one.
    discovery_order: tokio::sync::Mutex<()>,
    // `Some` while a bundle is collecting values
    bundle: Mutex<Option<Bundle>>,
}

impl ZabbixTrapper {
    /// Trapper sending to a single collector.
    #[must_use]
    pub fn new(sender: Arc<dyn MeasurementSink>, config: ZabbixTrapperConfig) -> Self {
        Self::with_senders(vec![sender], config)
    }

    /// Trapper sending every batch to each of the senders.
    #[must_use]
    pub fn with_senders(senders: Vec<Arc<dyn MeasurementSink>>, config: ZabbixTrapperConfig) -> Self {
        let known_clients = KnownClients::new(config.client_discovery_wait_time);
        Self::build(senders, config, known_clients)
    }

    /// Use a prepared cache, e.g. one with its own clock. The cache's wait time wins over
    /// the one in `config`.
    #[must_use]
    pub fn with_known_clients(
        sender: Arc<dyn MeasurementSink>,
        config: ZabbixTrapperConfig,
        known_clients: KnownClients,
    ) -> Self {
        Self::build(vec![sender], config, known_clients)
    }

    fn build(
        senders: Vec<Arc<dyn MeasurementSink>>,
        config: ZabbixTrapperConfig,
        known_clients: KnownClients,
    ) -> Self {
        Self {
            senders,
            namespace: config.namespace,
            bundle_window: config.measurement_bundle_window,
            known_clients: Mutex::new(known_clients),
            discovery_order: tokio::sync::Mutex::new(()),
            bundle: Mutex::new(None),
        }
    }

    /// Number of clients discovered so far, over all producers.
    #[must_use]
    pub fn known_client_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        let known_clients = self.known_clients.lock().expect("lock poisoned");
        known_clients.len()
    }

    /// Announce the client of the message if it is new, and return how long to wait before
    /// its values can be sent.
    pub async fn discover_client(
        &self,
        record: &LogRecord,
        message: &Message,
    ) -> Result<Duration, SinkError> {
        let producer = record.process.as_deref().unwrap_or_default();
        let mac_address = message.mac_address();

        // Check and add under one lock so a client is announced once
        let discovery = {
            #[allow(clippy::expect_used)]
            let mut known_clients = self.known_clients.lock().expect("lock poisoned");
            if known_clients.is_known(producer, &mac_address) {
                Discovery::Known(known_clients.remaining_wait(producer, &mac_address))
            } else {
                known_clients.add(producer, mac_address);
                Discovery::New(known_clients.wait_time())
            }
        };

        match discovery {
            Discovery::Known(remaining) => {
                if !remaining.is_zero() {
                    debug!(
                        "Another task has issued a discovery event of {mac_address}. Waiting {:.3} seconds",
                        remaining.as_secs_f64()
                    );
                }
                Ok(remaining)
            }
            Discovery::New(wait_time) => {
                let _ordered = self.discovery_order.lock().await;
                // The roster is read after the previous discovery went out, so it only grows
                let measurement = {
                    #[allow(clippy::expect_used)]
                    let known_clients = self.known_clients.lock().expect("lock poisoned");
                    map_client_discovery(&self.namespace, record, &known_clients, producer)
                        .map_err(|e| SinkError::Protocol(format!("failed to encode discovery: {e}")))?
                };
                info!("Discovering: {measurement:?}");
                let measurements = [measurement];
                let response = self.submit(&measurements).await?;
                debug!("Response: {response:?}");
                check_processed(&response, &measurements);
                Ok(wait_time)
            }
        }
    }

    async fn send_measurements(&self, measurements: &[Measurement]) -> Result<(), SinkError> {
        if measurements.is_empty() {
            return Ok(());
        }
        info!("Sending data: {measurements:?}");
        let response = self.submit(measurements).await?;
        debug!("Response: {response:?}");
        check_processed(&response, measurements);
        Ok(())
    }

    /// Add the values to the open bundle, or open one and send it when the window closes.
    /// Either way the result is the outcome of the bundle submission.
    async fn bundle_measurements(&self, measurements: Vec<Measurement>) -> Result<(), SinkError> {
        let contributed = {
            #[allow(clippy::expect_used)]
            let mut bundle = self.bundle.lock().expect("lock poisoned");
            match bundle.as_mut() {
                Some(pending) => {
                    pending.measurements.extend(measurements);
                    Some(pending.flushed.subscribe())
                }
                None => {
                    let (flushed, _) = watch::channel(None);
                    *bundle = Some(Bundle {
                        measurements,
                        flushed,
                    });
                    None
                }
            }
        };

        if let Some(mut flushed) = contributed {
            let outcome: FlushResult = match flushed.wait_for(Option::is_some).await {
                Ok(result) => (*result).clone(),
                Err(_) => None,
            };
            return match outcome {
                Some(Ok(())) => Ok(()),
                Some(Err(e)) => Err(SinkError::Bundled(e)),
                None => Err(SinkError::BundleDropped),
            };
        }

        tokio::time::sleep(self.bundle_window).await;

        let bundle = {
            #[allow(clippy::expect_used)]
            let mut bundle = self.bundle.lock().expect("lock poisoned");
            bundle.take()
        };
        let Some(Bundle {
            measurements,
            flushed,
        }) = bundle
        else {
            return Ok(());
        };
        match self.send_measurements(&measurements).await {
            Ok(()) => {
                flushed.send_replace(Some(Ok(())));
                Ok(())
            }
            Err(e) => {
                let e = Arc::new(e);
                flushed.send_replace(Some(Err(Arc::clone(&e))));
                Err(SinkError::Bundled(e))
            }
        }
    }

    /// Submit a batch to every collector. A failed collector does not stop the others, the
    /// first failure is returned once all were tried.
    async fn submit(&self, measurements: &[Measurement]) -> Result<SinkResponse, SinkError> {
        let mut total = SinkResponse::default();
        let mut failure = None;
        for sender in &self.senders {
            match submit_with_retry(sender.as_ref(), measurements).await {
                Ok(response) => total += response,
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => error!("Collector failed as well: {e}"),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }
}

/// Submit a batch to one collector, trying once more if the connection was reset or refused.
async fn submit_with_retry(
    sender: &dyn MeasurementSink,
    measurements: &[Measurement],
) -> Result<SinkResponse, SinkError> {
    match sender.send(measurements).await {
        Err(e) if e.is_transient() => {
            warn!("Connection error to collector: {e}");
            sender.send(measurements).await
        }
        result => result,
    }
}

fn check_processed(response: &SinkResponse, measurements: &[Measurement]) {
    if response.processed < measurements.len() {
        warn!(
            "Collector processed {} of {} values ({} failed)",
            response.processed,
            measurements.len(),
            response.failed
        );
    }
}

#[async_trait]
impl Hook for ZabbixTrapper {
    async fn send(&self, record: &LogRecord, message: Option<&Message>) -> Result<(), SinkError> {
        let Some(message) = message else {
            return Ok(());
        };

        let wait = self.discover_client(record, message).await?;
        if !wait.is_zero() {
            // Give Zabbix time to create the items from the prototypes
            tokio::time::sleep(wait).await;
        }

        let measurements = map_client_message(&self.namespace, record, message);
        if self.bundle_window.is_zero() {
            self.send_measurements(&measurements).await
        } else {
            self.bundle_measurements(measurements).await
        }
    }
}
