// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mapping of records and messages to Zabbix trapper measurements.
//!
//! Item keys follow the low-level discovery conventions:
//! - `<namespace>.<producer>[<field>,<mac>]` for client values
//! - `<namespace>.client_discovery[<producer>]` for the discovery value, a JSON array of
//!   `{"mac": "<mac>"}` objects

use serde::Serialize;

use crate::known_clients::KnownClients;
use crate::mac::MacAddress;
use crate::measurement::{Measurement, MeasurementValue};
use crate::message::Message;
use crate::rfc3164::LogRecord;
use crate::util::normalize_producer;

#[derive(Serialize)]
struct DiscoveredClient<'a> {
    mac: &'a MacAddress,
}

/// The fields reported for a message, in reporting order. The MAC address is part of the
/// key instead.
fn fields(message: &Message) -> Vec<(&'static str, MeasurementValue)> {
    match message {
        Message::WirelessEvent(event) => vec![
            ("location", event.location.clone().into()),
            ("event", event.event.code().into()),
            ("status", event.status.into()),
            ("rssi", event.rssi.into()),
            ("reason", event.reason.clone().into()),
        ],
        Message::DhcpAcknowledge(ack) => vec![
            ("ip_address", ack.ip_address.to_string().into()),
            ("hostname", ack.hostname.clone().into()),
        ],
    }
}

/// One measurement per field of the message.
pub fn map_client_message(
    namespace: &str,
    record: &LogRecord,
    message: &Message,
) -> Vec<Measurement> {
    let producer = normalize_producer(record.process.as_deref().unwrap_or_default());
    let mac_address = message.mac_address();
    let clock = record.clock();

    fields(message)
        .into_iter()
        .map(|(field, value)| {
            Measurement::new(
                record.hostname.as_str(),
                format!("{namespace}.{producer}[{field},{mac_address}]"),
                value,
                clock,
            )
        })
        .collect()
}

/// The discovery measurement listing every known client of the producer.
pub fn map_client_discovery(
    namespace: &str,
    record: &LogRecord,
    known_clients: &KnownClients,
    producer: &str,
) -> Result<Measurement, serde_json::Error> {
    let clients: Vec<DiscoveredClient<'_>> = known_clients
        .clients(producer)
        .map(|mac| DiscoveredClient { mac })
        .collect();
    let value = serde_json::to_string(&clients)?;

    Ok(Measurement::new(
        record.hostname.as_str(),
        format!(
            "{namespace}.client_discovery[{}]",
            normalize_producer(producer)
        ),
        value,
        record.clock(),
    ))
}
