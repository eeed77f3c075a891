// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{filter::ParseError, EnvFilter};

use router_log_preprocessor::{
    config::Settings,
    handler::LogHandler,
    hook::ZabbixTrapper,
    preprocessors::PreprocessorRegistry,
    server::{LogServer, LogServerConfig},
    sink::MeasurementSink,
    zabbix::ZabbixSender,
};

use tokio_util::sync::CancellationToken;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter for the configured level, falling back to `info` if it does not parse.
fn env_filter(log_level: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(log_level) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_LOG_LEVEL), Some(e)),
    }
}

#[tokio::main]
pub async fn main() {
    let settings = Settings::from_env();
    let log_level = settings
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |settings| settings.log_level.as_str());
    let (filter, filter_error) = env_filter(log_level);

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");
    if let Some(e) = filter_error {
        warn!("Invalid log level {log_level:?}, using {DEFAULT_LOG_LEVEL}: {e}");
    }

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            error!("{e}. Shutting down router log preprocessor.");
            return;
        }
    };
    debug!("Settings: {settings:?}");

    let senders: Vec<Arc<dyn MeasurementSink>> = settings
        .zabbix_sender_configs()
        .into_iter()
        .map(|config| {
            info!("Forwarding to Zabbix at {}", config.collector);
            Arc::new(ZabbixSender::new(config)) as Arc<dyn MeasurementSink>
        })
        .collect();
    let trapper = ZabbixTrapper::with_senders(senders, settings.zabbix_trapper_config());
    let handler = LogHandler::new(PreprocessorRegistry::default(), Arc::new(trapper));

    let server_config = LogServerConfig {
        host: settings.log_server_host.clone(),
        port: settings.log_server_port,
        reuse_port: settings.log_server_reuse_port,
    };
    let cancel_token = CancellationToken::new();
    let server = match LogServer::new(&server_config, Arc::new(handler), cancel_token.clone()).await
    {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start syslog server: {e}");
            return;
        }
    };
    let server_task = tokio::spawn(server.spin());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }
    info!("Shutting down router log preprocessor");
    cancel_token.cancel();
    if let Err(e) = server_task.await {
        error!("Syslog server task failed: {e}");
    }
}
