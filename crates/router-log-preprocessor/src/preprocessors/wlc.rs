// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;

use crate::errors::PreprocessError;
use crate::mac::MacAddress;
use crate::message::{Message, WirelessEvent, WlcEvent};
use crate::rfc3164::LogRecord;

pub const PRODUCER: &str = "wlceventd";

/// Length of a colon separated hardware address.
const MAC_ADDRESS_LENGTH: usize = 17;

/// Extract the client event of a wireless LAN controller line.
///
/// The message looks like
/// `wlceventd_proc_event(511): eth7: Disassoc AB:CD:EF:01:23:45, status: 0, reason: ..., rssi:0`
/// where `reason` is missing for some events (e.g. `Auth`).
pub fn preprocess_wireless_lan_controller_event(
    record: &LogRecord,
) -> Result<Option<Message>, PreprocessError> {
    debug!("Received WLC event daemon log: {:?}", record);

    // Drop the message type, i.e. `wlceventd_proc_event(511): `
    let (_, message) = record
        .message
        .split_once(": ")
        .ok_or(PreprocessError::MissingField("location"))?;
    let mut segments = message.split(", ");

    let (location, event) = segments
        .next()
        .and_then(|first| first.split_once(':'))
        .ok_or(PreprocessError::MissingField("event"))?;
    let split_at = event
        .len()
        .checked_sub(MAC_ADDRESS_LENGTH)
        .filter(|at| event.is_char_boundary(*at))
        .ok_or(PreprocessError::MissingField("mac_address"))?;
    let (event, mac_address) = event.split_at(split_at);
    let mac_address: MacAddress = mac_address.parse()?;
    let event = WlcEvent::from_event(event)?;

    let mut status = None;
    let mut rssi = None;
    let mut reason: Option<String> = None;
    let mut in_reason = false;
    for segment in segments {
        match segment.split_once(':').map(|(key, value)| (key.trim(), value)) {
            Some(("status", value)) => {
                status = Some(parse_code("status", value)?);
                in_reason = false;
            }
            Some(("rssi", value)) => {
                rssi = Some(parse_code("rssi", value)?);
                in_reason = false;
            }
            Some(("reason", value)) => {
                reason = Some(value.trim().to_string());
                in_reason = true;
            }
            _ => match reason.as_mut() {
                // the reason text itself may contain ", "
                Some(text) if in_reason => {
                    text.push_str(", ");
                    text.push_str(segment);
                }
                _ => debug!("Ignoring unexpected WLC event segment {segment:?}"),
            },
        }
    }

    Ok(Some(
        WirelessEvent {
            mac_address,
            location: location.trim().to_string(),
            event,
            status: status.ok_or(PreprocessError::MissingField("status"))?,
            rssi: rssi.ok_or(PreprocessError::MissingField("rssi"))?,
            reason: reason.unwrap_or_default(),
        }
        .into(),
    ))
}

/// Read `0`, `-70` or a described code such as `successful (0)`.
fn parse_code(field: &'static str, value: &str) -> Result<i64, PreprocessError> {
    let value = value.trim();
    if let Ok(code) = value.parse() {
        return Ok(code);
    }
    value
        .strip_suffix(')')
        .and_then(|v| v.rsplit_once('('))
        .and_then(|(_, code)| code.trim().parse().ok())
        .ok_or_else(|| PreprocessError::InvalidValue {
            field,
            value: value.to_string(),
        })
}
