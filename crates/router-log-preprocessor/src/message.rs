// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed messages extracted from the log lines of known producers.

use std::net::IpAddr;

use crate::errors::PreprocessError;
use crate::mac::MacAddress;

/// Association state changes reported by the wireless LAN controller.
///
/// The discriminant is the value reported to Zabbix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WlcEvent {
    Disassociation = 0,
    Deauthentication = 1,
    Authenticate = 2,
    Association = 3,
    Reassociation = 4,
}

// Checked in order; `reassoc` must come before `assoc`.
const EVENT_PREFIXES: [(&str, WlcEvent); 5] = [
    ("disassoc", WlcEvent::Disassociation),
    ("deauth_ind", WlcEvent::Deauthentication),
    ("reassoc", WlcEvent::Reassociation),
    ("assoc", WlcEvent::Association),
    ("auth", WlcEvent::Authenticate),
];

impl WlcEvent {
    /// Classify the event token of a `wlceventd` line, e.g. `Auth` or `Deauth_ind`.
    pub fn from_event(event: &str) -> Result<Self, PreprocessError> {
        let token = event.trim().to_ascii_lowercase();
        EVENT_PREFIXES
            .iter()
            .find(|(prefix, _)| token.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| PreprocessError::UnknownEventKind(event.trim().to_string()))
    }

    #[must_use]
    pub fn code(self) -> i64 {
        i64::from(self as u8)
    }
}

/// A `wlceventd` event for a single client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessEvent {
    pub mac_address: MacAddress,
    /// Interface the event happened on, e.g. `eth7` or `wl0.1`.
    pub location: String,
    pub event: WlcEvent,
    pub status: i64,
    pub rssi: i64,
    pub reason: String,
}

/// A `dnsmasq-dhcp` lease acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpAcknowledge {
    pub mac_address: MacAddress,
    pub ip_address: IpAddr,
    /// Empty when the client didn't send a hostname.
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    WirelessEvent(WirelessEvent),
    DhcpAcknowledge(DhcpAcknowledge),
}

impl Message {
    /// The client the message is about.
    #[must_use]
    pub fn mac_address(&self) -> MacAddress {
        match self {
            Self::WirelessEvent(event) => event.mac_address,
            Self::DhcpAcknowledge(ack) => ack.mac_address,
        }
    }
}

impl From<WirelessEvent> for Message {
    fn from(event: WirelessEvent) -> Self {
        Self::WirelessEvent(event)
    }
}

impl From<DhcpAcknowledge> for Message {
    fn from(ack: DhcpAcknowledge) -> Self {
        Self::DhcpAcknowledge(ack)
    }
}
