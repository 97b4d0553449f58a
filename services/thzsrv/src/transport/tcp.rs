//! TCP Transport Implementation
//!
//! Reaches the controller through a serial-to-network bridge (ser2net or
//! similar) that forwards the raw byte stream unchanged.

use async_trait::async_trait;
use common::hex::format_hex_pretty;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::traits::{ConnectionState, Transport, TransportError, TransportStats};

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    pub host: String,
    pub port: u16,
    /// Connection timeout
    pub timeout: Duration,
    /// Default wait for incoming data
    pub read_timeout: Duration,
    /// TCP no-delay (Nagle algorithm)
    pub no_delay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2323,
            timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(1000),
            no_delay: true,
        }
    }
}

impl TcpTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.host.is_empty() {
            return Err(TransportError::ConfigError(
                "Host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(TransportError::ConfigError(
                "Port cannot be zero".to_string(),
            ));
        }

        if self.timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        // Hostnames are resolved at connect time
        Ok(())
    }

    fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// TCP transport implementation
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpTransportConfig,
    connection: Arc<RwLock<Option<TcpStream>>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl TcpTransport {
    pub fn new(config: TcpTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(TransportStats::new())),
        })
    }

    pub fn config(&self) -> &TcpTransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn transport_type(&self) -> &str {
        "tcp"
    }

    fn name(&self) -> &str {
        "TCP Transport"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.stats.write().await.record_connection_attempt();

        let addr = self.config.socket_addr();
        debug!("Connecting to TCP endpoint: {addr}");

        match timeout(self.config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(self.config.no_delay) {
                    warn!("Failed to set TCP_NODELAY: {e}");
                }

                *self.connection.write().await = Some(stream);
                self.stats.write().await.record_successful_connection();

                info!("Connected to TCP endpoint: {addr}");
                Ok(())
            },
            Ok(Err(e)) => {
                let error_msg = format!("Failed to connect to {addr}: {e}");
                error!("{error_msg}");
                self.stats.write().await.record_failed_connection();
                Err(TransportError::ConnectionFailed(error_msg))
            },
            Err(_) => {
                let error_msg = format!("Connection to {addr} timed out");
                warn!("{error_msg}");
                self.stats.write().await.record_failed_connection();
                Err(TransportError::Timeout(error_msg))
            },
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut conn = self.connection.write().await;
        if let Some(mut stream) = conn.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Error during TCP shutdown: {e}");
            }
            self.stats.write().await.record_disconnection();
            info!("Disconnected from TCP endpoint {}", self.config.socket_addr());
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut conn = self.connection.write().await;
        let Some(stream) = conn.as_mut() else {
            return Err(TransportError::SendFailed("Not connected".to_string()));
        };

        match stream.write_all(data).await {
            Ok(()) => {
                drop(conn);
                self.stats.write().await.record_bytes_sent(data.len());

                debug!(hex_data = %format_hex_pretty(data), length = data.len(), direction = "send", "[TCP Transport] Raw packet");
                Ok(data.len())
            },
            Err(e) => {
                let error_msg = format!("Failed to send data: {e}");
                error!("{error_msg}");

                *conn = None;
                drop(conn);
                self.stats.write().await.connection_state = ConnectionState::Error;

                Err(TransportError::SendFailed(error_msg))
            },
        }
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout_duration: Option<Duration>,
    ) -> Result<usize, TransportError> {
        let mut conn = self.connection.write().await;
        let Some(stream) = conn.as_mut() else {
            return Err(TransportError::ReceiveFailed("Not connected".to_string()));
        };

        let receive_timeout = timeout_duration.unwrap_or(self.config.read_timeout);
        match timeout(receive_timeout, stream.read(buffer)).await {
            Ok(Ok(0)) => {
                warn!("TCP connection closed by peer");
                *conn = None;
                drop(conn);
                self.stats.write().await.record_disconnection();

                Err(TransportError::ConnectionLost(
                    "Connection closed by peer".to_string(),
                ))
            },
            Ok(Ok(bytes_read)) => {
                drop(conn);
                self.stats.write().await.record_bytes_received(bytes_read);

                debug!(hex_data = %format_hex_pretty(&buffer[..bytes_read]), length = bytes_read, direction = "recv", "[TCP Transport] Raw packet");
                Ok(bytes_read)
            },
            Ok(Err(e)) => {
                let error_msg = format!("Failed to receive data: {e}");
                error!("{error_msg}");

                *conn = None;
                drop(conn);
                self.stats.write().await.connection_state = ConnectionState::Error;

                Err(TransportError::ReceiveFailed(error_msg))
            },
            Err(_) => {
                let error_msg = format!("Receive operation timed out after {receive_timeout:?}");
                debug!("{error_msg}");
                Err(TransportError::Timeout(error_msg))
            },
        }
    }

    async fn reset_input(&mut self) -> Result<usize, TransportError> {
        let conn = self.connection.read().await;
        let Some(stream) = conn.as_ref() else {
            return Err(TransportError::ReceiveFailed("Not connected".to_string()));
        };

        // Drain whatever the socket already holds without waiting
        let mut scratch = [0u8; 256];
        let mut discarded = 0;
        loop {
            match stream.try_read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => discarded += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TransportError::IoError(format!(
                        "Failed to drain input: {e}"
                    )))
                },
            }
        }
        drop(conn);

        if discarded > 0 {
            debug!("Discarded {} stale bytes from TCP input", discarded);
            self.stats.write().await.record_bytes_discarded(discarded);
        }
        Ok(discarded)
    }

    async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    async fn connection_state(&self) -> ConnectionState {
        self.stats.read().await.connection_state
    }

    async fn stats(&self) -> TransportStats {
        self.stats.read().await.clone()
    }

    async fn reset_stats(&mut self) {
        self.stats.write().await.reset();
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_tcp_config_validation() {
        let mut config = TcpTransportConfig::default();
        assert!(config.validate().is_ok());

        config.host = "".to_string();
        assert!(config.validate().is_err());

        config.host = "thz-bridge.local".to_string();
        config.port = 0;
        assert!(config.validate().is_err());

        config.port = 2323;
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_tcp_round_trip_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Minimal bridge: acknowledge every greeting byte with DLE
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf[0], 0x02);
            socket.write_all(&[0x10]).await.unwrap();
        });

        let mut transport = TcpTransport::new(TcpTransportConfig {
            port,
            ..Default::default()
        })
        .unwrap();
        transport.connect().await.expect("connect to local listener");
        assert!(transport.is_connected().await);

        transport.send(&[0x02]).await.unwrap();
        let mut buf = [0u8; 4];
        let n = transport
            .receive(&mut buf, Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(&buf[..n], &[0x10]);

        server.await.unwrap();
        let stats = transport.stats().await;
        assert_eq!(stats.bytes_sent, 1);
        assert_eq!(stats.bytes_received, 1);

        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
    }

    #[tokio::test]
    async fn test_receive_without_connection_fails() {
        let mut transport = TcpTransport::new(TcpTransportConfig::default()).unwrap();
        let mut buf = [0u8; 4];
        let result = transport.receive(&mut buf, None).await;
        assert!(matches!(result, Err(TransportError::ReceiveFailed(_))));
    }
}
