// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::net::IpAddr;

use tracing::debug;

use crate::errors::PreprocessError;
use crate::mac::MacAddress;
use crate::message::{DhcpAcknowledge, Message};
use crate::rfc3164::LogRecord;

pub const PRODUCER: &str = "dnsmasq-dhcp";

/// Extract lease acknowledgements, e.g. `DHCPACK(br1) 192.168.101.149 ab:cd:ef:01:23:45 laptop`.
///
/// DISCOVER, OFFER and REQUEST lines yield `Ok(None)`.
pub fn preprocess_dnsmasq_dhcp_event(
    record: &LogRecord,
) -> Result<Option<Message>, PreprocessError> {
    debug!("Received dnsmasq-dhcp event log: {:?}", record);

    if !record.message.starts_with("DHCPACK") {
        return Ok(None);
    }
    let mut parts = record.message.split_whitespace().skip(1);
    let ip_address = parts
        .next()
        .ok_or(PreprocessError::MissingField("ip_address"))?;
    let ip_address: IpAddr = ip_address
        .parse()
        .map_err(|_| PreprocessError::InvalidValue {
            field: "ip_address",
            value: ip_address.to_string(),
        })?;
    let mac_address: MacAddress = parts
        .next()
        .ok_or(PreprocessError::MissingField("mac_address"))?
        .parse()?;
    let hostname = parts.next().unwrap_or_default().to_string();

    Ok(Some(
        DhcpAcknowledge {
            mac_address,
            ip_address,
            hostname,
        }
        .into(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::rfc3164::timestamp_to_datetime;
    use std::net::Ipv4Addr;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            facility: 1,
            severity: 5,
            timestamp: timestamp_to_datetime(2023, "Feb", "2", "13", "02", "51").unwrap(),
            hostname: "GT-AX11000-ABCD-1234567-E".to_string(),
            process: Some(PRODUCER.to_string()),
            process_id: Some(2971),
            message: message.to_string(),
        }
    }

    fn acknowledge(message: Option<Message>) -> DhcpAcknowledge {
        match message {
            Some(Message::DhcpAcknowledge(ack)) => ack,
            other => panic!("expected a DHCP acknowledge, got {other:?}"),
        }
    }

    #[test]
    fn test_dhcp_ack() {
        let record = record("DHCPACK(br1) 192.168.101.149 ab:cd:ef:01:23:45 fake-client");

        let ack = acknowledge(preprocess_dnsmasq_dhcp_event(&record).unwrap());

        assert_eq!(ack.mac_address, "AB:CD:EF:01:23:45".parse().unwrap());
        assert_eq!(ack.ip_address, IpAddr::V4(Ipv4Addr::new(192, 168, 101, 149)));
        assert_eq!(ack.hostname, "fake-client");
    }

    #[test]
    fn test_dhcp_ack_without_hostname() {
        let record = record("DHCPACK(br1) 192.168.101.216 01:23:45:67:89:AB");

        let ack = acknowledge(preprocess_dnsmasq_dhcp_event(&record).unwrap());

        assert_eq!(ack.mac_address, "01:23:45:67:89:AB".parse().unwrap());
        assert_eq!(ack.ip_address, IpAddr::V4(Ipv4Addr::new(192, 168, 101, 216)));
        assert_eq!(ack.hostname, "");
    }

    #[test]
    fn test_dhcp_other_events() {
        for message in [
            "DHCPDISCOVER(br1) ab:cd:ef:01:23:45",
            "DHCPOFFER(br1) 192.168.101.149 ab:cd:ef:01:23:45",
            "DHCPREQUEST(br1) 192.168.101.149 ab:cd:ef:01:23:45",
        ] {
            assert_eq!(preprocess_dnsmasq_dhcp_event(&record(message)), Ok(None));
        }
    }

    #[test]
    fn test_dhcp_ack_malformed() {
        assert_eq!(
            preprocess_dnsmasq_dhcp_event(&record("DHCPACK(br1)")),
            Err(PreprocessError::MissingField("ip_address"))
        );
        assert_eq!(
            preprocess_dnsmasq_dhcp_event(&record("DHCPACK(br1) 192.168.101.149")),
            Err(PreprocessError::MissingField("mac_address"))
        );
        assert!(matches!(
            preprocess_dnsmasq_dhcp_event(&record("DHCPACK(br1) 192.168.1 ab:cd:ef:01:23:45")),
            Err(PreprocessError::InvalidValue { field: "ip_address", .. })
        ));
        assert!(matches!(
            preprocess_dnsmasq_dhcp_event(&record("DHCPACK(br1) 192.168.1.2 ab:cd")),
            Err(PreprocessError::InvalidMacAddress(_))
        ));
    }
}
