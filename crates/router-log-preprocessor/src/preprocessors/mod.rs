// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Producer specific preprocessors.
//!
//! Each producer (the `PROC` part of a syslog line) maps to a function turning its records
//! into a [`Message`]. Records of any other producer are dropped without side effects.

use std::collections::HashMap;

use tracing::trace;

use crate::errors::PreprocessError;
use crate::message::Message;
use crate::rfc3164::LogRecord;

pub mod dnsmasq_dhcp;
pub mod wlc;

/// Turns a record into a message, `Ok(None)` when the record is not of interest.
pub type Preprocessor = fn(&LogRecord) -> Result<Option<Message>, PreprocessError>;

#[derive(Debug, Clone)]
pub struct PreprocessorRegistry {
    preprocessors: HashMap<String, Preprocessor>,
}

impl PreprocessorRegistry {
    /// A registry without any producer.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            preprocessors: HashMap::new(),
        }
    }

    pub fn register(&mut self, producer: impl Into<String>, preprocessor: Preprocessor) {
        self.preprocessors.insert(producer.into(), preprocessor);
    }

    #[must_use]
    pub fn get(&self, producer: &str) -> Option<Preprocessor> {
        self.preprocessors.get(producer).copied()
    }

    /// Run the preprocessor registered for the record's producer, if any.
    pub fn preprocess(&self, record: &LogRecord) -> Result<Option<Message>, PreprocessError> {
        let Some(process) = record.process.as_deref() else {
            return Ok(None);
        };
        match self.get(process) {
            Some(preprocessor) => preprocessor(record),
            None => {
                trace!("No preprocessor registered for {process}");
                Ok(None)
            }
        }
    }
}

impl Default for PreprocessorRegistry {
    /// Registry with all known router producers.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(wlc::PRODUCER, wlc::preprocess_wireless_lan_controller_event);
        registry.register(dnsmasq_dhcp::PRODUCER, dnsmasq_dhcp::preprocess_dnsmasq_dhcp_event);
        registry
    }
}
