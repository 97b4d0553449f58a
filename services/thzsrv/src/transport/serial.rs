//! Serial Transport Implementation
//!
//! USB/RS232 link to the controller's service interface. The THZ speaks
//! 8N1 without flow control, at 115200 baud on current firmware and
//! 57600 on some older units.

use async_trait::async_trait;
use common::hex::format_hex_pretty;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info, warn};

use super::traits::{ConnectionState, Transport, TransportError, TransportStats};

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialTransportConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity ("None", "Even", "Odd")
    pub parity: String,
    /// Default wait for incoming data
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for SerialTransportConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: 1,
            parity: "None".to_string(),
            read_timeout: Duration::from_millis(1000),
            write_timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialTransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.port.is_empty() {
            return Err(TransportError::ConfigError(
                "Port path cannot be empty".to_string(),
            ));
        }

        if self.baud_rate == 0 {
            return Err(TransportError::ConfigError(
                "Baud rate must be greater than zero".to_string(),
            ));
        }

        if ![5, 6, 7, 8].contains(&self.data_bits) {
            return Err(TransportError::ConfigError(
                "Data bits must be 5, 6, 7, or 8".to_string(),
            ));
        }

        if ![1, 2].contains(&self.stop_bits) {
            return Err(TransportError::ConfigError(
                "Stop bits must be 1 or 2".to_string(),
            ));
        }

        if !["None", "Even", "Odd"].contains(&self.parity.as_str()) {
            return Err(TransportError::ConfigError(
                "Parity must be None, Even, or Odd".to_string(),
            ));
        }

        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(TransportError::ConfigError(
                "Timeouts must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Serial transport implementation
#[derive(Debug)]
pub struct SerialTransport {
    config: SerialTransportConfig,
    connection: Arc<RwLock<Option<SerialStream>>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl SerialTransport {
    pub fn new(config: SerialTransportConfig) -> Result<Self, TransportError> {
        config.validate()?;

        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(TransportStats::new())),
        })
    }

    pub fn config(&self) -> &SerialTransportConfig {
        &self.config
    }

    fn parse_parity(&self) -> tokio_serial::Parity {
        match self.config.parity.as_str() {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        }
    }

    fn parse_data_bits(&self) -> tokio_serial::DataBits {
        match self.config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        }
    }

    fn parse_stop_bits(&self) -> tokio_serial::StopBits {
        match self.config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        }
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn transport_type(&self) -> &str {
        "serial"
    }

    fn name(&self) -> &str {
        "Serial Transport"
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.stats.write().await.record_connection_attempt();

        debug!("Opening serial port: {}", self.config.port);

        let port_result = tokio_serial::new(&self.config.port, self.config.baud_rate)
            .data_bits(self.parse_data_bits())
            .parity(self.parse_parity())
            .stop_bits(self.parse_stop_bits())
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(self.config.read_timeout)
            .open_native_async();

        match port_result {
            Ok(mut port) => {
                #[cfg(unix)]
                port.set_exclusive(false).map_err(|e| {
                    TransportError::IoError(format!("Failed to set exclusive mode: {e}"))
                })?;

                *self.connection.write().await = Some(port);
                self.stats.write().await.record_successful_connection();

                info!(
                    "Opened serial port {} @ {} baud",
                    self.config.port, self.config.baud_rate
                );
                Ok(())
            },
            Err(e) => {
                let error_msg = format!("Failed to open serial port {}: {e}", self.config.port);
                error!("{error_msg}");
                self.stats.write().await.record_failed_connection();
                Err(TransportError::ConnectionFailed(error_msg))
            },
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut conn = self.connection.write().await;
        if conn.take().is_some() {
            // Port is closed on drop
            self.stats.write().await.record_disconnection();
            info!("Closed serial port: {}", self.config.port);
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        use tokio::io::AsyncWriteExt;

        let mut conn = self.connection.write().await;
        let Some(port) = conn.as_mut() else {
            return Err(TransportError::SendFailed(
                "Serial port not connected".to_string(),
            ));
        };

        let send_operation = async {
            port.write_all(data).await?;
            port.flush().await?;
            Ok::<_, std::io::Error>(data.len())
        };

        match timeout(self.config.write_timeout, send_operation).await {
            Ok(Ok(bytes_sent)) => {
                drop(conn);
                self.stats.write().await.record_bytes_sent(bytes_sent);

                debug!(hex_data = %format_hex_pretty(data), length = bytes_sent, direction = "send", "[Serial Transport] Raw packet");
                Ok(bytes_sent)
            },
            Ok(Err(e)) => {
                let error_msg = format!("Failed to send data: {e}");
                error!("{error_msg}");

                // Port is unusable after a write error
                *conn = None;
                drop(conn);
                self.stats.write().await.connection_state = ConnectionState::Error;

                Err(TransportError::SendFailed(error_msg))
            },
            Err(_) => {
                let error_msg = format!(
                    "Send operation timed out after {:?}",
                    self.config.write_timeout
                );
                warn!("{error_msg}");
                Err(TransportError::Timeout(error_msg))
            },
        }
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout_duration: Option<Duration>,
    ) -> Result<usize, TransportError> {
        use tokio::io::AsyncReadExt;

        let mut conn = self.connection.write().await;
        let Some(port) = conn.as_mut() else {
            return Err(TransportError::ReceiveFailed(
                "Serial port not connected".to_string(),
            ));
        };

        let receive_timeout = timeout_duration.unwrap_or(self.config.read_timeout);
        match timeout(receive_timeout, port.read(buffer)).await {
            Ok(Ok(0)) => Ok(0),
            Ok(Ok(bytes_read)) => {
                drop(conn);
                self.stats.write().await.record_bytes_received(bytes_read);

                debug!(hex_data = %format_hex_pretty(&buffer[..bytes_read]), length = bytes_read, direction = "recv", "[Serial Transport] Raw packet");
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
                // Expected while waiting on a silent device
                debug!("{error_msg}");
                Err(TransportError::Timeout(error_msg))
            },
        }
    }

    async fn reset_input(&mut self) -> Result<usize, TransportError> {
        let conn = self.connection.read().await;
        let Some(port) = conn.as_ref() else {
            return Err(TransportError::ReceiveFailed(
                "Serial port not connected".to_string(),
            ));
        };

        let pending = port.bytes_to_read().unwrap_or(0) as usize;
        port.clear(ClearBuffer::Input)
            .map_err(|e| TransportError::IoError(format!("Failed to clear input buffer: {e}")))?;
        drop(conn);

        if pending > 0 {
            debug!("Discarded {} stale bytes from serial input", pending);
            self.stats.write().await.record_bytes_discarded(pending);
        }
        Ok(pending)
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
