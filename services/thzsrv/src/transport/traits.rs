//! Transport Layer Traits
//!
//! Core trait and types for the byte channel between the client and the
//! heat pump controller. The handshake layer only ever talks to a
//! `dyn Transport`, so serial, TCP and mock links are interchangeable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Transport layer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection lost
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Send operation failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Receive operation failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Connection state for transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Transport is disconnected
    Disconnected,
    /// Transport is attempting to connect
    Connecting,
    /// Transport is connected and ready
    Connected,
    /// Transport has encountered an error
    Error,
}

/// Transport statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Bytes thrown away by input resets
    pub bytes_discarded: u64,
    /// Number of connection attempts
    pub connection_attempts: u64,
    /// Number of successful connections
    pub successful_connections: u64,
    /// Number of failed connections
    pub failed_connections: u64,
    /// Number of disconnections
    pub disconnections: u64,
    /// Last successful connection time
    pub last_connection: Option<SystemTime>,
    /// Current connection state
    pub connection_state: ConnectionState,
}

impl TransportStats {
    pub fn new() -> Self {
        Self {
            bytes_sent: 0,
            bytes_received: 0,
            bytes_discarded: 0,
            connection_attempts: 0,
            successful_connections: 0,
            failed_connections: 0,
            disconnections: 0,
            last_connection: None,
            connection_state: ConnectionState::Disconnected,
        }
    }

    /// Record a connection attempt
    pub fn record_connection_attempt(&mut self) {
        self.connection_attempts += 1;
        self.connection_state = ConnectionState::Connecting;
    }

    /// Record a successful connection
    pub fn record_successful_connection(&mut self) {
        self.successful_connections += 1;
        self.last_connection = Some(SystemTime::now());
        self.connection_state = ConnectionState::Connected;
    }

    /// Record a failed connection
    pub fn record_failed_connection(&mut self) {
        self.failed_connections += 1;
        self.connection_state = ConnectionState::Error;
    }

    /// Record a disconnection
    pub fn record_disconnection(&mut self) {
        self.disconnections += 1;
        self.connection_state = ConnectionState::Disconnected;
    }

    pub fn record_bytes_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
    }

    pub fn record_bytes_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
    }

    pub fn record_bytes_discarded(&mut self, bytes: usize) {
        self.bytes_discarded += bytes as u64;
    }

    /// Reset all statistics, keeping the current connection state
    pub fn reset(&mut self) {
        let state = self.connection_state;
        *self = Self::new();
        self.connection_state = state;
    }
}

impl Default for TransportStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Half-duplex byte channel to the controller
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Get transport type identifier
    fn transport_type(&self) -> &str;

    /// Get human-readable transport name
    fn name(&self) -> &str;

    /// Open the underlying port or socket
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Close the underlying port or socket
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Write all of `data`, returning the number of bytes sent
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read whatever is available into `buffer`
    ///
    /// Waits up to `timeout` for the first byte. Returns `Ok(0)` when the
    /// link had nothing to deliver and `TransportError::Timeout` when the
    /// wait ran out.
    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransportError>;

    /// Drop any unread input, returning the number of bytes discarded
    async fn reset_input(&mut self) -> Result<usize, TransportError>;

    async fn is_connected(&self) -> bool;

    async fn connection_state(&self) -> ConnectionState;

    async fn stats(&self) -> TransportStats;

    async fn reset_stats(&mut self);

    /// Close the transport and release its resources
    async fn close(&mut self) -> Result<(), TransportError> {
        self.disconnect().await
    }
}
