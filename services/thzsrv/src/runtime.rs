//! Periodic polling of every block in the read map

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::device::ThzDevice;

/// Outcome of one pass over the read map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub blocks_read: usize,
    pub fields_decoded: usize,
    pub failed_blocks: Vec<String>,
}

/// Read and decode every block once, through the cache
///
/// A failing block is logged and recorded; the pass continues.
pub async fn poll_once(device: &ThzDevice) -> PollReport {
    let register_map = device.register_map();
    let mut report = PollReport::default();

    for block in register_map.blocks() {
        match device.read_fields(block).await {
            Ok(readings) => {
                for reading in &readings {
                    debug!("{}/{} = {}", block, reading.name, reading.value);
                }
                report.blocks_read += 1;
                report.fields_decoded += readings.len();
            },
            Err(e) => {
                warn!("Poll of block {} failed: {}", block, e);
                report.failed_blocks.push(block.to_string());
            },
        }
    }
    report
}

/// Spawn the polling task
///
/// Returns the task handle and a token that stops it.
pub fn start_poller(
    device: Arc<ThzDevice>,
    interval: Duration,
) -> (JoinHandle<()>, CancellationToken) {
    let token = CancellationToken::new();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = poll_once(&device).await;
                    info!(
                        "Poll: blocks={}, fields={}, failed={}",
                        report.blocks_read,
                        report.fields_decoded,
                        report.failed_blocks.len()
                    );
                }
                () = task_token.cancelled() => {
                    info!("Poller received cancellation signal, shutting down");
                    break;
                }
            }
        }
    });

    (handle, token)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::config::DeviceSettings;
    use crate::transport::{MockHandle, MockTransport};
    use tempfile::TempDir;

    const SCHEMA: &str = r#"
blocks:
  FD:
    - { name: version, offset: 4, length: 4, decode: hexdate }
  FB:
    - { name: outsideTemp, offset: 8, length: 4, decode: hex2int, factor: 10 }
    - { name: flowTemp, offset: 12, length: 4, decode: hex2int, factor: 10 }
  F2:
    - { name: heatRequest, offset: 4, length: 2, decode: hex }
"#;

    async fn device(dir: &TempDir) -> (Arc<ThzDevice>, MockHandle) {
        std::fs::write(dir.path().join("register_map_all.yaml"), SCHEMA).unwrap();
        std::fs::write(dir.path().join("register_map_206.yaml"), "blocks: {}\n").unwrap();

        let mock = MockTransport::connected()
            .with_block(&[0xFD], &[0xFD, 0x00, 0xCE])
            .with_block(&[0xFB], &[0xFB, 0x00, 0x00, 0xFF, 0xE2, 0x01, 0x5E]);
        let handle = mock.handle();
        let settings = DeviceSettings {
            read_timeout_ms: 50,
            register_map_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let device = ThzDevice::with_transport(Box::new(mock), &settings)
            .await
            .unwrap();
        (Arc::new(device), handle)
    }

    #[tokio::test]
    async fn test_poll_once_reports_each_block() {
        let dir = TempDir::new().unwrap();
        let (device, _handle) = device(&dir).await;

        let report = poll_once(&device).await;
        assert_eq!(report.blocks_read, 2);
        assert_eq!(report.fields_decoded, 3);
        // The mock controller has no F2 block
        assert_eq!(report.failed_blocks, vec!["F2".to_string()]);
    }

    #[tokio::test]
    async fn test_poller_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let (device, handle) = device(&dir).await;

        let (task, token) = start_poller(Arc::clone(&device), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();

        // Later passes are served from the cache
        assert_eq!(handle.fetch_count(&[0xFB]), 1);
    }
}
