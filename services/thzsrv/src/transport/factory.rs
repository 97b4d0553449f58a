//! Transport selection from connection settings

use std::time::Duration;
use tracing::debug;

use super::serial::{SerialTransport, SerialTransportConfig};
use super::tcp::{TcpTransport, TcpTransportConfig};
use super::traits::{Transport, TransportError};
use crate::config::{ConnectionConfig, ConnectionKind};

/// Builds the transport for a connection kind, once, at device construction
pub struct TransportFactory;

impl TransportFactory {
    /// Serial for `usb`, TCP for `ip`; the returned transport is not yet connected
    pub fn create(
        config: &ConnectionConfig,
        read_timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match config.kind {
            ConnectionKind::Usb => {
                debug!(
                    "Creating serial transport on {} @ {} baud",
                    config.device, config.baud_rate
                );
                let serial = SerialTransport::new(SerialTransportConfig {
                    port: config.device.clone(),
                    baud_rate: config.baud_rate,
                    read_timeout,
                    ..Default::default()
                })?;
                Ok(Box::new(serial))
            },
            ConnectionKind::Ip => {
                debug!("Creating TCP transport to {}:{}", config.host, config.port);
                let tcp = TcpTransport::new(TcpTransportConfig {
                    host: config.host.clone(),
                    port: config.port,
                    timeout: config.connect_timeout(),
                    read_timeout,
                    ..Default::default()
                })?;
                Ok(Box::new(tcp))
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_usb_selects_serial() {
        let transport =
            TransportFactory::create(&ConnectionConfig::default(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(transport.transport_type(), "serial");
    }

    #[test]
    fn test_ip_selects_tcp() {
        let config = ConnectionConfig {
            kind: ConnectionKind::Ip,
            host: "thz-bridge.local".to_string(),
            ..Default::default()
        };
        let transport = TransportFactory::create(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(transport.transport_type(), "tcp");
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = ConnectionConfig {
            kind: ConnectionKind::Ip,
            port: 0,
            ..Default::default()
        };
        let result = TransportFactory::create(&config, Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::ConfigError(_))));
    }
}
