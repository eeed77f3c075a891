// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bookkeeping of the clients announced to Zabbix through low-level discovery.
//!
//! Zabbix needs some time after a discovery value arrives before it has created the item
//! prototypes for the new client; values sent before that are rejected. The cache remembers
//! when each client was discovered so callers know how long to hold back their data.
//! Entries never expire: a client is discovered once per process lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::mac::MacAddress;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct KnownClients {
    wait_time: Duration,
    clock: Arc<dyn Clock>,
    clients: HashMap<String, HashMap<MacAddress, DateTime<Utc>>>,
}

impl KnownClients {
    #[must_use]
    pub fn new(wait_time: Duration) -> Self {
        Self::with_clock(wait_time, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(wait_time: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            wait_time,
            clock,
            clients: HashMap::new(),
        }
    }

    #[must_use]
    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }

    #[must_use]
    pub fn is_known(&self, producer: &str, mac_address: &MacAddress) -> bool {
        self.clients
            .get(producer)
            .is_some_and(|clients| clients.contains_key(mac_address))
    }

    /// Mark the client as discovered now.
    pub fn add(&mut self, producer: &str, mac_address: MacAddress) {
        let now = self.clock.now();
        self.clients
            .entry(producer.to_string())
            .or_default()
            .insert(mac_address, now);
    }

    /// Time left before Zabbix is expected to accept data for the client.
    ///
    /// Unknown clients get the full wait time, as if discovered right now.
    #[must_use]
    pub fn remaining_wait(&self, producer: &str, mac_address: &MacAddress) -> Duration {
        let Some(discovered_at) = self
            .clients
            .get(producer)
            .and_then(|clients| clients.get(mac_address))
        else {
            return self.wait_time;
        };
        // A clock going backwards counts as no time elapsed
        let elapsed = (self.clock.now() - *discovered_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.wait_time.saturating_sub(elapsed)
    }

    /// All clients discovered for the producer.
    pub fn clients<'a>(&'a self, producer: &str) -> impl Iterator<Item = &'a MacAddress> + 'a {
        self.clients
            .get(producer)
            .into_iter()
            .flat_map(HashMap::keys)
    }

    /// Number of discovered clients over all producers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KnownClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownClients")
            .field("wait_time", &self.wait_time)
            .field("clients", &self.clients)
            .finish_non_exhaustive()
    }
}
