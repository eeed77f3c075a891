// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod common;

use common::mocks::MockTrapper;
use router_log_preprocessor::{
    handler::LogHandler,
    hook::{ZabbixTrapper, ZabbixTrapperConfig},
    preprocessors::PreprocessorRegistry,
    server::{LogServer, LogServerConfig},
    zabbix::{ZabbixSender, ZabbixSenderConfig},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{
    net::UdpSocket,
    time::{timeout, Duration, Instant},
};
use tokio_util::sync::CancellationToken;

const WLC_LINE: &str = "<13>Feb  2 13:02:51 GT-AX11000-ABCD-1234567-E wlceventd: \
    wlceventd_proc_event(527): eth6: Deauth_ind AB:CD:EF:01:23:45, status: 0, \
    reason: Unspecified reason (1), rssi:0";

const AUTH_LINE: &str = "<6>Oct 18 14:02:56 HOST wlceventd: \
    wlceventd_proc_event(431): eth1: Auth ab:cd:ef:01:23:45, status: successful (0), rssi:-70";

const DHCP_LINE: &str = "<30>Feb 12 13:02:57 GT-AX11000-ABCD-1234567-E dnsmasq-dhcp[23568]: \
    DHCPACK(br1) 192.168.101.149 ab:cd:ef:01:23:45 fake-client";

async fn start_preprocessor(
    trapper: &MockTrapper,
    wait: Duration,
) -> (SocketAddr, CancellationToken) {
    let sender = ZabbixSender::new(ZabbixSenderConfig {
        collector: trapper.addr.clone(),
        timeout: Duration::from_secs(5),
    });
    let hook = ZabbixTrapper::new(
        Arc::new(sender),
        ZabbixTrapperConfig {
            client_discovery_wait_time: wait,
            ..Default::default()
        },
    );
    let handler = LogHandler::new(PreprocessorRegistry::default(), Arc::new(hook));

    let cancel_token = CancellationToken::new();
    let server = LogServer::new(
        &LogServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            reuse_port: false,
        },
        Arc::new(handler),
        cancel_token.clone(),
    )
    .await
    .expect("failed to start log server");
    let addr = server.local_addr().expect("no local address");
    tokio::spawn(server.spin());

    (addr, cancel_token)
}

async fn send_line(addr: SocketAddr, line: &str) {
    let socket = UdpSocket::bind("127.0.0.1:0")
        .await
        .expect("unable to bind UDP socket");
    socket
        .send_to(line.as_bytes(), addr)
        .await
        .expect("unable to send datagram");
}

async fn next_batch(trapper: &mut MockTrapper) -> common::mocks::Batch {
    timeout(Duration::from_secs(5), trapper.batches.recv())
        .await
        .expect("timed out waiting for the trapper")
        .expect("trapper stopped")
}

#[tokio::test]
async fn wireless_event_is_discovered_then_sent() {
    let mut trapper = MockTrapper::start().await;
    let wait = Duration::from_millis(500);
    let (addr, cancel_token) = start_preprocessor(&trapper, wait).await;

    send_line(addr, WLC_LINE).await;

    let discovery = next_batch(&mut trapper).await;
    let discovered_at = Instant::now();
    assert_eq!(discovery.len(), 1);
    assert_eq!(discovery[0]["host"], "GT-AX11000-ABCD-1234567-E");
    assert_eq!(discovery[0]["key"], "rlp.client_discovery[wlceventd]");
    assert_eq!(discovery[0]["value"], r#"[{"mac":"AB:CD:EF:01:23:45"}]"#);

    let batch = next_batch(&mut trapper).await;
    assert!(discovered_at.elapsed() >= wait - Duration::from_millis(50));
    let keys: Vec<&str> = batch.iter().filter_map(|item| item["key"].as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "rlp.wlceventd[location,AB:CD:EF:01:23:45]",
            "rlp.wlceventd[event,AB:CD:EF:01:23:45]",
            "rlp.wlceventd[status,AB:CD:EF:01:23:45]",
            "rlp.wlceventd[rssi,AB:CD:EF:01:23:45]",
            "rlp.wlceventd[reason,AB:CD:EF:01:23:45]",
        ]
    );
    assert_eq!(batch[0]["value"], "eth6");
    assert_eq!(batch[1]["value"], "1");
    assert_eq!(batch[4]["value"], "Unspecified reason (1)");

    cancel_token.cancel();
}

#[tokio::test]
async fn authentication_without_reason_is_sent_with_empty_reason() {
    let mut trapper = MockTrapper::start().await;
    let (addr, cancel_token) = start_preprocessor(&trapper, Duration::ZERO).await;

    send_line(addr, AUTH_LINE).await;

    let discovery = next_batch(&mut trapper).await;
    assert_eq!(discovery.len(), 1);
    assert_eq!(discovery[0]["host"], "HOST");
    assert_eq!(discovery[0]["key"], "rlp.client_discovery[wlceventd]");

    let batch = next_batch(&mut trapper).await;
    assert_eq!(batch.len(), 5);
    let values: Vec<&str> = batch.iter().filter_map(|item| item["value"].as_str()).collect();
    assert_eq!(values, vec!["eth1", "2", "0", "-70", ""]);
    assert_eq!(batch[4]["key"], "rlp.wlceventd[reason,AB:CD:EF:01:23:45]");

    cancel_token.cancel();
}

#[tokio::test]
async fn known_client_is_not_discovered_twice() {
    let mut trapper = MockTrapper::start().await;
    let (addr, cancel_token) = start_preprocessor(&trapper, Duration::ZERO).await;

    send_line(addr, DHCP_LINE).await;
    let discovery = next_batch(&mut trapper).await;
    assert_eq!(discovery[0]["key"], "rlp.client_discovery[dnsmasq_dhcp]");
    let first = next_batch(&mut trapper).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0]["key"], "rlp.dnsmasq_dhcp[ip_address,AB:CD:EF:01:23:45]");
    assert_eq!(first[0]["value"], "192.168.101.149");
    assert_eq!(first[1]["value"], "fake-client");

    send_line(addr, DHCP_LINE).await;
    let second = next_batch(&mut trapper).await;
    assert_eq!(second, first);

    cancel_token.cancel();
}

#[tokio::test]
async fn unrelated_and_malformed_datagrams_are_dropped() {
    let mut trapper = MockTrapper::start().await;
    let (addr, cancel_token) = start_preprocessor(&trapper, Duration::ZERO).await;

    send_line(addr, "<6>Oct 18 14:02:56 GT-AX11000-ABCD-1234567-E kernel: link up").await;
    send_line(addr, "garbage").await;

    let nothing = timeout(Duration::from_millis(300), trapper.batches.recv()).await;
    assert!(nothing.is_err(), "nothing should reach the trapper");

    // The listener survives bad input
    send_line(addr, DHCP_LINE).await;
    let discovery = next_batch(&mut trapper).await;
    assert_eq!(discovery[0]["key"], "rlp.client_discovery[dnsmasq_dhcp]");

    cancel_token.cancel();
}
