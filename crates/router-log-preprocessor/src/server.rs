// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog server receiving router logs over UDP.
//!
//! Every datagram is handed to its own task, so a slow collector never holds up the
//! listener, and a datagram that fails to decode, parse or forward only affects itself.

use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::errors::ServerError;
use crate::handler::LogHandler;

// RFC 3164 caps a syslog datagram at 1024 bytes, leave room for chatty devices
const BUFFER_SIZE: usize = 8192;

/// Configuration for the syslog server
#[derive(Debug, Clone)]
pub struct LogServerConfig {
    /// Host to bind the UDP socket to (e.g., "0.0.0.0")
    pub host: String,
    /// Port to bind the UDP socket to, 0 picks a free one
    pub port: u16,
    /// Set `SO_REUSEPORT` so several servers can share the port (unix only)
    pub reuse_port: bool,
}

// BufferReader abstracts where datagrams come from.
enum BufferReader {
    UdpSocket(tokio::net::UdpSocket),

    /// Mirror reader for testing - replays a fixed buffer
    #[allow(dead_code)]
    MirrorTest(Vec<u8>, SocketAddr),
}

impl BufferReader {
    async fn read(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        match self {
            BufferReader::UdpSocket(socket) => {
                let mut buf = [0; BUFFER_SIZE];
                let (amt, src) = socket.recv_from(&mut buf).await?;
                Ok((buf[..amt].to_owned(), src))
            }
            BufferReader::MirrorTest(data, src) => Ok((data.clone(), *src)),
        }
    }
}

/// Syslog server to receive datagrams and dispatch them to the handler.
pub struct LogServer {
    cancel_token: CancellationToken,
    handler: Arc<LogHandler>,
    buffer_reader: BufferReader,
}

impl LogServer {
    /// Bind the UDP socket described by `config`.
    pub async fn new(
        config: &LogServerConfig,
        handler: Arc<LogHandler>,
        cancel_token: CancellationToken,
    ) -> Result<LogServer, ServerError> {
        let addr = resolve(&config.host, config.port).await?;
        let socket =
            bind(addr, config.reuse_port).map_err(|source| ServerError::Bind { addr, source })?;
        if let Ok(local_addr) = socket.local_addr() {
            info!("Listening for syslog datagrams on {local_addr}");
        }

        Ok(LogServer {
            cancel_token,
            handler,
            buffer_reader: BufferReader::UdpSocket(socket),
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match &self.buffer_reader {
            BufferReader::UdpSocket(socket) => socket.local_addr(),
            BufferReader::MirrorTest(_, src) => Ok(*src),
        }
    }

    /// Receive datagrams until the cancel token fires.
    pub async fn spin(self) {
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => break,
                _ = self.consume_datagram() => {}
            }
        }
        debug!("Syslog server stopped");
    }

    /// Receive one datagram and spawn its handling task.
    async fn consume_datagram(&self) -> Option<JoinHandle<()>> {
        match self.buffer_reader.read().await {
            Ok((packet, src)) => {
                let handler = Arc::clone(&self.handler);
                Some(tokio::spawn(async move {
                    handler.handle_and_log(&packet, src).await;
                }))
            }
            Err(e) => {
                error!("Failed to receive datagram: {e}");
                None
            }
        }
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| ServerError::Resolve(format!("{host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| ServerError::Resolve(format!("{host}:{port}")))
}

fn bind(addr: SocketAddr, reuse_port: bool) -> std::io::Result<tokio::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(reuse_port)?;
    set_reuse_port(&socket, reuse_port)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    tokio::net::UdpSocket::from_std(socket.into())
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn set_reuse_port(socket: &Socket, reuse_port: bool) -> std::io::Result<()> {
    socket.set_reuse_port(reuse_port)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn set_reuse_port(_socket: &Socket, reuse_port: bool) -> std::io::Result<()> {
    if reuse_port {
        tracing::warn!("Port reuse is not supported on this platform, ignoring it");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hook::Hook;
    use crate::message::Message;
    use crate::preprocessors::PreprocessorRegistry;
    use crate::rfc3164::LogRecord;
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelHook(mpsc::UnboundedSender<(LogRecord, Option<Message>)>);

    #[async_trait]
    impl Hook for ChannelHook {
        async fn send(
            &self,
            record: &LogRecord,
            message: Option<&Message>,
        ) -> Result<(), SinkError> {
            self.0.send((record.clone(), message.cloned())).unwrap();
            Ok(())
        }
    }

    /// Hook holding every message until released.
    struct BlockingHook {
        release: tokio::sync::Notify,
        received: Mutex<usize>,
    }

    #[async_trait]
    impl Hook for BlockingHook {
        async fn send(&self, _: &LogRecord, _: Option<&Message>) -> Result<(), SinkError> {
            *self.received.lock().unwrap() += 1;
            self.release.notified().await;
            Ok(())
        }
    }

    const WLC_LINE: &str = "<13>Feb  2 13:02:51 GT-AX11000-ABCD-1234567-E wlceventd: \
        wlceventd_proc_event(494): wl0.1: ReAssoc 01:23:45:67:89:AB, status: 0, rssi:-55";

    fn local_config() -> LogServerConfig {
        LogServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            reuse_port: false,
        }
    }

    fn mirror_server(data: &[u8], hook: Arc<dyn Hook>) -> LogServer {
        LogServer {
            cancel_token: CancellationToken::new(),
            handler: Arc::new(LogHandler::new(PreprocessorRegistry::default(), hook)),
            buffer_reader: BufferReader::MirrorTest(
                data.to_vec(),
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(111, 112, 113, 114)), 0),
            ),
        }
    }

    #[tokio::test]
    async fn test_consume_datagram() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let server = mirror_server(WLC_LINE.as_bytes(), Arc::new(ChannelHook(tx)));

        server.consume_datagram().await.unwrap().await.unwrap();

        let (record, message) = rx.recv().await.unwrap();
        assert_eq!(record.process.as_deref(), Some("wlceventd"));
        assert!(message.is_some());
    }

    #[tokio::test]
    async fn test_malformed_datagram_is_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let server = mirror_server(b"not a syslog line", Arc::new(ChannelHook(tx)));

        server.consume_datagram().await.unwrap().await.unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spin_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let handler = Arc::new(LogHandler::new(
            PreprocessorRegistry::default(),
            Arc::new(ChannelHook(tx)),
        ));
        let server = LogServer::new(&local_config(), handler, cancel_token.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let spin = tokio::spawn(server.spin());

        let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(WLC_LINE.as_bytes(), addr).await.unwrap();
        let (record, _) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.hostname, "GT-AX11000-ABCD-1234567-E");

        cancel_token.cancel();
        tokio::time::timeout(Duration::from_secs(5), spin)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_datagrams_are_handled_concurrently() {
        let hook = Arc::new(BlockingHook {
            release: tokio::sync::Notify::new(),
            received: Mutex::new(0),
        });
        let cancel_token = CancellationToken::new();
        let handler = Arc::new(LogHandler::new(PreprocessorRegistry::default(), hook.clone()));
        let server = LogServer::new(&local_config(), handler, cancel_token.clone())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.spin());

        let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(WLC_LINE.as_bytes(), addr).await.unwrap();
        client.send_to(WLC_LINE.as_bytes(), addr).await.unwrap();

        // Both reach the hook while the first one is still blocked
        tokio::time::timeout(Duration::from_secs(5), async {
            while *hook.received.lock().unwrap() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        hook.release.notify_waiters();
        cancel_token.cancel();
    }

    #[tokio::test]
    async fn test_bind_error() {
        let first = LogServer::new(
            &local_config(),
            Arc::new(LogHandler::new(
                PreprocessorRegistry::default(),
                Arc::new(BlockingHook {
                    release: tokio::sync::Notify::new(),
                    received: Mutex::new(0),
                }),
            )),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        let taken = LogServerConfig {
            port: first.local_addr().unwrap().port(),
            ..local_config()
        };

        let second = LogServer::new(
            &taken,
            Arc::clone(&first.handler),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reuse_port() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handler = Arc::new(LogHandler::new(
            PreprocessorRegistry::default(),
            Arc::new(ChannelHook(tx)),
        ));
        let config = LogServerConfig {
            reuse_port: true,
            ..local_config()
        };
        let first = LogServer::new(&config, Arc::clone(&handler), CancellationToken::new())
            .await
            .unwrap();
        let shared = LogServerConfig {
            port: first.local_addr().unwrap().port(),
            ..config
        };

        let second = LogServer::new(&shared, handler, CancellationToken::new()).await;

        assert!(second.is_ok());
    }
}
