// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::Serialize;

/// Value of a trapper item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for MeasurementValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<String> for MeasurementValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MeasurementValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One timestamped value for a Zabbix host and item key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Measurement {
    pub host: String,
    pub key: String,
    pub value: MeasurementValue,
    /// Unix timestamp in seconds.
    pub clock: i64,
}

impl Measurement {
    pub fn new(
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<MeasurementValue>,
        clock: i64,
    ) -> Self {
        Self {
            host: host.into(),
            key: key.into(),
            value: value.into(),
            clock,
        }
    }
}
