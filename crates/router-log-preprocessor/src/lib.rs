// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Router log preprocessor.
//!
//! Receives RFC 3164 syslog datagrams from a router, turns the lines of known producers
//! (`wlceventd`, `dnsmasq-dhcp`) into typed client messages and forwards them as
//! measurements to one or more Zabbix trappers. Clients are announced through a low-level
//! discovery item before their first measurement is sent.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod errors;
pub mod handler;
pub mod hook;
pub mod known_clients;
pub mod mac;
pub mod mapper;
pub mod measurement;
pub mod message;
pub mod preprocessors;
pub mod rfc3164;
pub mod server;
pub mod sink;
pub mod util;
pub mod zabbix;
