// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Zabbix sender protocol client.
//!
//! Every batch is sent on a fresh TCP connection as one `sender data` request:
//!
//! ```text
//! "ZBXD" | 0x01 | u32 LE body length | u32 LE reserved | JSON body
//! ```
//!
//! and answered with a frame of the same layout whose body reads
//! `{"response":"success","info":"processed: 1; failed: 0; total: 1; seconds spent: 0.000055"}`.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::measurement::Measurement;
use crate::sink::{MeasurementSink, SinkError, SinkResponse};

pub const DEFAULT_ZABBIX_PORT: u16 = 10051;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const PROTOCOL: &[u8; 4] = b"ZBXD";
const FLAG_ZABBIX_PROTOCOL: u8 = 0x01;
const FLAG_COMPRESSED: u8 = 0x02;
pub const HEADER_LENGTH: usize = 13;
// Responses are a single short JSON object
const MAX_RESPONSE_LENGTH: u32 = 64 * 1024;

#[derive(Serialize)]
struct SenderRequest<'a> {
    request: &'static str,
    data: Vec<SenderItem<'a>>,
}

#[derive(Serialize)]
struct SenderItem<'a> {
    host: &'a str,
    key: &'a str,
    value: String,
    clock: i64,
}

#[derive(Deserialize)]
struct SenderResponse {
    response: String,
    #[serde(default)]
    info: String,
}

fn info_regex() -> &'static Regex {
    static INFO: OnceLock<Regex> = OnceLock::new();
    INFO.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let regex = Regex::new(
            r"processed: (\d+); failed: (\d+); total: (\d+); seconds spent: (\d+(?:\.\d+)?)",
        )
        .expect("sender info regex is valid");
        regex
    })
}

/// Frame a request body.
pub fn encode_frame(body: &[u8]) -> Result<Vec<u8>, SinkError> {
    let length = u32::try_from(body.len())
        .map_err(|_| SinkError::Protocol(format!("payload of {} bytes is too large", body.len())))?;
    let mut frame = Vec::with_capacity(HEADER_LENGTH + body.len());
    frame.extend_from_slice(PROTOCOL);
    frame.push(FLAG_ZABBIX_PROTOCOL);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&0u32.to_le_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Validate a frame header and return the body length.
pub fn decode_header(header: &[u8; HEADER_LENGTH]) -> Result<u32, SinkError> {
    if &header[..4] != PROTOCOL {
        return Err(SinkError::Protocol(format!(
            "unexpected header {:?}",
            &header[..4]
        )));
    }
    let flags = header[4];
    if flags & FLAG_ZABBIX_PROTOCOL == 0 || flags & FLAG_COMPRESSED != 0 {
        return Err(SinkError::Protocol(format!("unsupported flags {flags:#04x}")));
    }
    let mut length = [0u8; 4];
    length.copy_from_slice(&header[5..9]);
    Ok(u32::from_le_bytes(length))
}

/// Read the counters out of a response `info` string.
pub fn parse_info(info: &str) -> Result<SinkResponse, SinkError> {
    let invalid = || SinkError::Protocol(format!("unexpected response info {info:?}"));
    let captures = info_regex().captures(info).ok_or_else(invalid)?;
    Ok(SinkResponse {
        processed: captures[1].parse().map_err(|_| invalid())?,
        failed: captures[2].parse().map_err(|_| invalid())?,
        total: captures[3].parse().map_err(|_| invalid())?,
        seconds_spent: captures[4].parse().map_err(|_| invalid())?,
    })
}

#[derive(Debug, Clone)]
pub struct ZabbixSenderConfig {
    /// Trapper as `host:port`
    pub collector: String,
    pub timeout: Duration,
}

/// Sender for one Zabbix server or proxy. Several collectors take one sender each.
#[derive(Debug, Clone)]
pub struct ZabbixSender {
    collector: String,
    timeout: Duration,
}

impl ZabbixSender {
    #[must_use]
    pub fn new(config: ZabbixSenderConfig) -> Self {
        Self {
            collector: config.collector,
            timeout: config.timeout,
        }
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<SinkResponse, SinkError> {
        let collector = self.collector.as_str();
        let io_error = |e| SinkError::from_io(collector, e);

        let mut stream = TcpStream::connect(collector).await.map_err(io_error)?;
        stream.write_all(frame).await.map_err(io_error)?;

        let mut header = [0u8; HEADER_LENGTH];
        stream.read_exact(&mut header).await.map_err(io_error)?;
        let length = decode_header(&header)?;
        if length > MAX_RESPONSE_LENGTH {
            return Err(SinkError::Protocol(format!(
                "response of {length} bytes is too large"
            )));
        }
        let mut body = vec![0u8; length as usize];
        stream.read_exact(&mut body).await.map_err(io_error)?;

        let response: SenderResponse = serde_json::from_slice(&body)
            .map_err(|e| SinkError::Protocol(format!("invalid response body: {e}")))?;
        if response.response != "success" {
            return Err(SinkError::Protocol(format!(
                "{collector} answered {:?}: {}",
                response.response, response.info
            )));
        }
        parse_info(&response.info)
    }
}

#[async_trait]
impl MeasurementSink for ZabbixSender {
    async fn send(&self, measurements: &[Measurement]) -> Result<SinkResponse, SinkError> {
        let request = SenderRequest {
            request: "sender data",
            data: measurements
                .iter()
                .map(|m| SenderItem {
                    host: &m.host,
                    key: &m.key,
                    value: m.value.to_string(),
                    clock: m.clock,
                })
                .collect(),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| SinkError::Protocol(format!("failed to serialize request: {e}")))?;
        let frame = encode_frame(&body)?;

        let response = tokio::time::timeout(self.timeout, self.send_frame(&frame))
            .await
            .map_err(|_| SinkError::Timeout(self.collector.clone()))??;
        debug!("{} answered {response:?}", self.collector);
        Ok(response)
    }
}
