// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Six-byte link-layer addresses of wireless and DHCP clients.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::errors::MacAddressError;

/// Characters accepted between the hexadecimal digits of an address.
const SEPARATORS: [char; 4] = [':', '-', '.', ' '];

/// A validated hardware address.
///
/// Parsing accepts any mix of case and the usual separators (`ab:cd:ef:01:23:45`,
/// `AB-CD-EF-01-23-45`, `abcd.ef01.2345`); equality and hashing only look at the bytes.
/// It is always displayed in upper-case colon form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = MacAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut digits = 0usize;
        for ch in s.trim().chars() {
            if SEPARATORS.contains(&ch) {
                continue;
            }
            let nibble = ch
                .to_digit(16)
                .ok_or_else(|| MacAddressError::InvalidCharacter(s.to_string(), ch))?;
            if digits == 12 {
                return Err(MacAddressError::InvalidLength(s.to_string()));
            }
            // digit is at most 0xF, so the cast is lossless
            octets[digits / 2] = (octets[digits / 2] << 4) | nibble as u8;
            digits += 1;
        }
        if digits != 12 {
            return Err(MacAddressError::InvalidLength(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
