// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Naming helpers for Zabbix item keys.

/// Normalize a producer name for use in an item key, as Zabbix recommends:
/// lower case with `-` replaced by `_` (`dnsmasq-dhcp` becomes `dnsmasq_dhcp`).
#[must_use]
pub fn normalize_producer(producer: &str) -> String {
    producer.to_lowercase().replace('-', "_")
}

/// Parses and validates an item key namespace.
///
/// A valid namespace must:
/// - Start with an ASCII letter
/// - Contain only ASCII alphanumerics, underscores, or periods
/// - Not be empty or contain only whitespace
///
/// Whitespace is automatically trimmed from the input.
///
/// # Examples
///
/// ```
/// use router_log_preprocessor::util::parse_namespace;
///
/// assert_eq!(parse_namespace("rlp"), Some("rlp".to_string()));
/// assert_eq!(parse_namespace("home.router"), Some("home.router".to_string()));
/// assert_eq!(parse_namespace("1invalid"), None);
/// assert_eq!(parse_namespace("my-app"), None);
/// ```
pub fn parse_namespace(namespace: &str) -> Option<String> {
    let trimmed = namespace.trim();
    let mut chars = trimmed.chars();

    match chars.next() {
        Some(first_char) if first_char.is_ascii_alphabetic() => {}
        Some(_) => {
            tracing::error!(
                "RLP_NAMESPACE must start with a letter, got: '{}'.",
                trimmed
            );
            return None;
        }
        None => return None,
    }

    if let Some(invalid_char) =
        chars.find(|&ch| !ch.is_ascii_alphanumeric() && ch != '_' && ch != '.')
    {
        tracing::error!(
            "RLP_NAMESPACE contains invalid character '{}' in '{}'. Only ASCII alphanumerics, underscores, and periods are allowed.",
            invalid_char, trimmed
        );
        return None;
    }

    Some(trimmed.to_string())
}
