// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock Zabbix trapper for integration tests

use router_log_preprocessor::zabbix::{decode_header, encode_frame, HEADER_LENGTH};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Items of one `sender data` request.
pub type Batch = Vec<Value>;

/// Trapper answering every request with success, forwarding the received items.
pub struct MockTrapper {
    pub addr: String,
    pub batches: mpsc::UnboundedReceiver<Batch>,
}

impl MockTrapper {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock trapper");
        let addr = listener.local_addr().expect("no local address").to_string();
        let (tx, batches) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut header = [0u8; HEADER_LENGTH];
                    stream.read_exact(&mut header).await.expect("no header");
                    let length = decode_header(&header).expect("invalid header");
                    let mut body = vec![0u8; length as usize];
                    stream.read_exact(&mut body).await.expect("no body");

                    let request: Value = serde_json::from_slice(&body).expect("invalid JSON");
                    assert_eq!(request["request"], "sender data");
                    let items = request["data"].as_array().cloned().unwrap_or_default();
                    let count = items.len();
                    let _ = tx.send(items);

                    let response = format!(
                        r#"{{"response":"success","info":"processed: {count}; failed: 0; total: {count}; seconds spent: 0.000055"}}"#
                    );
                    let frame = encode_frame(response.as_bytes()).expect("frame");
                    stream.write_all(&frame).await.expect("failed to respond");
                });
            }
        });

        Self { addr, batches }
    }
}
