// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::hook::{ZabbixTrapperConfig, DEFAULT_NAMESPACE};
use crate::util::parse_namespace;
use crate::zabbix::{ZabbixSenderConfig, DEFAULT_TIMEOUT, DEFAULT_ZABBIX_PORT};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Settings of the preprocessor, read once at start from `RLP_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// IP address or host name of the local interface to bind to
    pub log_server_host: String,
    pub log_server_port: u16,
    /// Allow several sockets to bind the same address and port (unix only)
    pub log_server_reuse_port: bool,
    /// Zabbix servers or proxies, `host` or `host:port`
    pub zabbix_hosts: Vec<String>,
    /// Port of the collectors that don't name one
    pub zabbix_port: u16,
    pub client_discovery_wait_time: Duration,
    /// Zero disables bundling
    pub measurement_bundle_window: Duration,
    pub namespace: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_server_host: "0.0.0.0".to_string(),
            log_server_port: 8514,
            log_server_reuse_port: false,
            zabbix_hosts: Vec::new(),
            zabbix_port: DEFAULT_ZABBIX_PORT,
            client_discovery_wait_time: Duration::from_secs(60),
            measurement_bundle_window: Duration::ZERO,
            namespace: DEFAULT_NAMESPACE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Create settings from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create settings from any variable source, unset variables keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let lookup = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let log_server_host = lookup("RLP_LOG_SERVER_HOST").unwrap_or(defaults.log_server_host);
        let log_server_port =
            parse_var(&lookup, "RLP_LOG_SERVER_PORT")?.unwrap_or(defaults.log_server_port);
        let log_server_reuse_port = lookup("RLP_LOG_SERVER_REUSE_PORT")
            .map(|val| parse_bool("RLP_LOG_SERVER_REUSE_PORT", &val))
            .transpose()?
            .unwrap_or(defaults.log_server_reuse_port);
        let zabbix_hosts = lookup("RLP_ZABBIX_HOST")
            .map(|val| {
                val.split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or(defaults.zabbix_hosts);
        let zabbix_port = parse_var(&lookup, "RLP_ZABBIX_PORT")?.unwrap_or(defaults.zabbix_port);
        let client_discovery_wait_time = parse_var(&lookup, "RLP_CLIENT_DISCOVERY_WAIT_TIME")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.client_discovery_wait_time);
        let measurement_bundle_window = parse_var(&lookup, "RLP_MEASUREMENT_BUNDLE_WINDOW")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.measurement_bundle_window);
        let namespace = match lookup("RLP_NAMESPACE") {
            Some(val) => parse_namespace(&val).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("RLP_NAMESPACE '{val}' is not a valid namespace"))
            })?,
            None => defaults.namespace,
        };
        let log_level = lookup("RLP_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let settings = Self {
            log_server_host,
            log_server_port,
            log_server_reuse_port,
            zabbix_hosts,
            zabbix_port,
            client_discovery_wait_time,
            measurement_bundle_window,
            namespace,
            log_level,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_server_host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "RLP_LOG_SERVER_HOST cannot be empty".to_string(),
            ));
        }

        if self.zabbix_hosts.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "RLP_ZABBIX_HOST must name at least one collector".to_string(),
            ));
        }

        if self.zabbix_port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Zabbix port must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Collector addresses as `host:port`, completed with [`Settings::zabbix_port`].
    #[must_use]
    pub fn collectors(&self) -> Vec<String> {
        self.zabbix_hosts
            .iter()
            .map(|host| with_default_port(host, self.zabbix_port))
            .collect()
    }

    /// One sender configuration per collector.
    #[must_use]
    pub fn zabbix_sender_configs(&self) -> Vec<ZabbixSenderConfig> {
        self.collectors()
            .into_iter()
            .map(|collector| ZabbixSenderConfig {
                collector,
                timeout: DEFAULT_TIMEOUT,
            })
            .collect()
    }

    #[must_use]
    pub fn zabbix_trapper_config(&self) -> ZabbixTrapperConfig {
        ZabbixTrapperConfig {
            namespace: self.namespace.clone(),
            client_discovery_wait_time: self.client_discovery_wait_time,
            measurement_bundle_window: self.measurement_bundle_window,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|val| {
            val.trim().parse::<T>().map_err(|_| {
                ConfigError::InvalidConfig(format!("{key} has an invalid value '{val}'"))
            })
        })
        .transpose()
}

fn parse_bool(key: &str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidConfig(format!(
            "{key} has an invalid value '{val}'"
        ))),
    }
}

/// Append `port` unless `host` already carries one. IPv6 literals need brackets to carry one.
fn with_default_port(host: &str, port: u16) -> String {
    match host.rsplit_once(':') {
        Some((name, explicit))
            if explicit.parse::<u16>().is_ok() && (!name.contains(':') || name.ends_with(']')) =>
        {
            host.to_string()
        }
        _ if host.contains(':') && !host.starts_with('[') => format!("[{host}]:{port}"),
        _ => format!("{host}:{port}"),
    }
}
