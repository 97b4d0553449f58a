//! Device facade
//!
//! `ThzDevice` owns the link, the handshake driver, the block cache and the
//! register catalogs of the connected controller. It is the only type
//! adapters above this crate need.
//!
//! ```text
//! read_field("FB", "outsideTemp")
//!   -> RegisterMapManager   (block, offset, length, decode)
//!   -> BlockCache           (hit: no link access)
//!   -> HandshakeProtocol    (miss: link lock held for the exchange)
//!   -> decoder              (typed value)
//! ```

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::BlockCache;
use crate::config::{AppConfig, DeviceSettings};
use crate::decoder::DecodedValue;
use crate::error::{ProtocolError, Result, ThzError};
use crate::protocol::constants::{FIRMWARE_LENGTH, FIRMWARE_OFFSET, FIRMWARE_REGISTER};
use crate::protocol::{build_telegram, HandshakeProtocol};
use crate::register_map::{
    block_address, RegisterMapManager, SettingValue, WriteRegisterMapManager,
};
use crate::transport::{Transport, TransportFactory, TransportStats};

/// One decoded field of a block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldReading {
    pub name: String,
    pub value: DecodedValue,
}

/// Slice of block bytes, `Truncated` when it reaches past the end
fn slice_block(block: &Bytes, offset: usize, length: usize) -> Result<Bytes> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= block.len())
        .ok_or(ProtocolError::Truncated {
            offset,
            length,
            available: block.len(),
        })?;
    Ok(block.slice(offset..end))
}

fn cache_key(address: &[u8]) -> String {
    hex::encode_upper(address)
}

/// One full read exchange, returning the block bytes
async fn exchange_block(
    handshake: &HandshakeProtocol,
    link: &mut dyn Transport,
    address: &[u8],
) -> Result<Bytes> {
    let telegram = build_telegram(address, false);
    match handshake.request(link, &telegram).await {
        Ok(response) => Ok(response.block_bytes()),
        Err(e) => {
            if e.is_link_failure() {
                warn!("Read of {} failed on the link: {}", cache_key(address), e);
            } else {
                debug!("Read of {} rejected: {}", cache_key(address), e);
            }
            Err(e)
        },
    }
}

/// Connected THZ controller
pub struct ThzDevice {
    link: Mutex<Box<dyn Transport>>,
    handshake: HandshakeProtocol,
    cache: BlockCache,
    firmware_version: String,
    register_map: Arc<RegisterMapManager>,
    write_register_map: Arc<WriteRegisterMapManager>,
}

impl std::fmt::Debug for ThzDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThzDevice")
            .field("firmware_version", &self.firmware_version)
            .field("cache_ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

impl ThzDevice {
    /// Open the configured link and bootstrap the device
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let transport =
            TransportFactory::create(&config.connection, config.device.read_timeout())?;
        Self::with_transport(transport, &config.device).await
    }

    /// Bootstrap over an existing transport, connecting it if needed
    ///
    /// Reads the firmware version uncached, then builds both register
    /// catalogs for it.
    pub async fn with_transport(
        mut transport: Box<dyn Transport>,
        settings: &DeviceSettings,
    ) -> Result<Self> {
        if !transport.is_connected().await {
            transport.connect().await?;
        }
        info!(
            "Connected to THZ controller via {} ({})",
            transport.name(),
            transport.transport_type()
        );

        let handshake = HandshakeProtocol::new(settings.read_timeout());
        let block = exchange_block(&handshake, transport.as_mut(), &[FIRMWARE_REGISTER]).await?;
        let firmware_version = parse_firmware(&block)?;
        info!("Controller firmware version {}", firmware_version);

        let schema_dir = settings.register_map_dir.as_deref();
        let register_map = Arc::new(RegisterMapManager::load(&firmware_version, schema_dir)?);
        let write_register_map =
            Arc::new(WriteRegisterMapManager::load(&firmware_version, schema_dir)?);

        Ok(Self {
            link: Mutex::new(transport),
            handshake,
            cache: BlockCache::new(settings.cache_ttl()),
            firmware_version,
            register_map,
            write_register_map,
        })
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn register_map(&self) -> Arc<RegisterMapManager> {
        Arc::clone(&self.register_map)
    }

    pub fn write_register_map(&self) -> Arc<WriteRegisterMapManager> {
        Arc::clone(&self.write_register_map)
    }

    /// Fresh block bytes, bypassing the cache
    ///
    /// A successful read also refreshes the cached entry for `address`.
    pub async fn read_block(&self, address: &[u8]) -> Result<Bytes> {
        let block = {
            let mut link = self.link.lock().await;
            exchange_block(&self.handshake, &mut **link, address).await?
        };
        self.cache.insert(&cache_key(address), block.clone());
        Ok(block)
    }

    /// `length` bytes at `offset` of a freshly read block
    pub async fn read_value(&self, address: &[u8], offset: usize, length: usize) -> Result<Bytes> {
        let block = self.read_block(address).await?;
        slice_block(&block, offset, length)
    }

    /// Block bytes no older than the cache TTL
    pub async fn read_block_cached(&self, address: &[u8]) -> Result<Bytes> {
        let key = cache_key(address);
        if let Some(block) = self.cache.get_fresh(&key) {
            return Ok(block);
        }

        // A concurrent caller may have filled the entry while we waited
        let mut guard = self.link.lock().await;
        let link: &mut dyn Transport = &mut **guard;
        self.cache
            .get_or_fetch(&key, move || exchange_block(&self.handshake, link, address))
            .await
    }

    /// Send `value` to the register at `address`
    ///
    /// The cached block for `address` is dropped whether or not the device
    /// accepts the write.
    pub async fn write_value(&self, address: &[u8], value: &[u8]) -> Result<()> {
        let mut data = Vec::with_capacity(address.len() + value.len());
        data.extend_from_slice(address);
        data.extend_from_slice(value);
        let telegram = build_telegram(&data, true);

        let result = {
            let mut link = self.link.lock().await;
            self.handshake.request(&mut **link, &telegram).await
        };
        self.cache.invalidate(&cache_key(address));

        let response = result?;
        debug!(
            "Write to {} acknowledged with status {:02X}{:02X}",
            cache_key(address),
            response.status[0],
            response.status[1]
        );
        Ok(())
    }

    /// Decode one named field of a block
    pub async fn read_field(&self, block_id: &str, name: &str) -> Result<DecodedValue> {
        let entry = self
            .register_map
            .find(block_id, name)
            .ok_or_else(|| ThzError::not_found(format!("field {block_id}/{name}")))?;
        let address = block_address(block_id)?;
        let block = self.read_block_cached(&address).await?;
        Ok(entry.decode(&block)?)
    }

    /// Decode every field of a block
    ///
    /// Fields that do not fit the returned block are skipped.
    pub async fn read_fields(&self, block_id: &str) -> Result<Vec<FieldReading>> {
        let entries = self.register_map.get_registers_for_block(block_id);
        if entries.is_empty() {
            return Err(ThzError::not_found(format!("block {block_id}")));
        }
        let address = block_address(block_id)?;
        let block = self.read_block_cached(&address).await?;

        let mut readings = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.decode(&block) {
                Ok(value) => readings.push(FieldReading {
                    name: entry.name.clone(),
                    value,
                }),
                Err(e) => warn!("Skipping {}/{}: {}", block_id, entry.name, e),
            }
        }
        Ok(readings)
    }

    /// Current value of a writable setting, read fresh
    pub async fn read_setting(&self, name: &str) -> Result<SettingValue> {
        let entry = self
            .write_register_map
            .get(name)
            .ok_or_else(|| ThzError::not_found(format!("setting {name}")))?;
        let command = entry.command_bytes()?;

        // Block bytes: checksum, echoed command, value
        let raw = self.read_value(&command, 1 + command.len(), 2).await?;
        Ok(entry.decode([raw[0], raw[1]]))
    }

    /// Parse, encode and write a setting; returns the value written
    pub async fn write_setting(&self, name: &str, input: &str) -> Result<SettingValue> {
        let entry = self
            .write_register_map
            .get(name)
            .ok_or_else(|| ThzError::not_found(format!("setting {name}")))?;
        let command = entry.command_bytes()?;
        let value = entry.parse_value(input)?;
        let encoded = entry.encode(&value)?;

        self.write_value(&command, &encoded).await?;
        info!("Set {} to {}", name, value);
        Ok(value)
    }

    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }

    pub async fn link_stats(&self) -> TransportStats {
        self.link.lock().await.stats().await
    }

    /// Zero the link byte counters, keeping the connection state
    pub async fn reset_link_stats(&self) {
        self.link.lock().await.reset_stats().await;
    }

    /// Close the link; later requests fail until reconnected
    pub async fn close(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        link.close().await?;
        info!("Disconnected from THZ controller");
        Ok(())
    }
}

/// Version number from the firmware block, e.g. `00 CE` -> "206"
fn parse_firmware(block: &Bytes) -> Result<String> {
    let raw = slice_block(block, FIRMWARE_OFFSET, FIRMWARE_LENGTH)?;
    Ok(u16::from_be_bytes([raw[0], raw[1]]).to_string())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::{DeviceError, HandshakeError};
    use crate::protocol::codec::build_response;
    use crate::protocol::constants::{DLE, ETX, HEADER_GET, STATUS_UNKNOWN_REGISTER, STX};
    use crate::transport::MockTransport;
    use std::time::Duration;

    const FIRMWARE_206: [u8; 3] = [0xFD, 0x00, 0xCE];

    fn settings() -> DeviceSettings {
        DeviceSettings {
            read_timeout_ms: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_firmware() {
        let block = Bytes::from_static(&[0xCB, 0xFD, 0x00, 0xCE]);
        assert_eq!(parse_firmware(&block).unwrap(), "206");

        let short = Bytes::from_static(&[0xCB, 0xFD, 0x00]);
        assert!(matches!(
            parse_firmware(&short),
            Err(ThzError::Protocol(ProtocolError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_cache_key_matches_block_id() {
        assert_eq!(cache_key(&[0xFB]), "FB");
        assert_eq!(cache_key(&[0x0A, 0x01, 0x76]), "0A0176");
        assert_eq!(
            cache_key(&block_address("0a0176").unwrap()),
            cache_key(&[0x0A, 0x01, 0x76])
        );
    }

    #[tokio::test]
    async fn test_bootstrap_connects_and_reads_firmware() {
        let mock = MockTransport::new().with_block(&[0xFD], &FIRMWARE_206);
        let handle = mock.handle();

        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        assert_eq!(device.firmware_version(), "206");
        assert_eq!(device.register_map().get_firmware_version(), "206");
        assert_eq!(device.write_register_map().get_firmware_version(), "206");
        assert_eq!(handle.fetch_count(&[0xFD]), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_reported() {
        let mut mock = MockTransport::connected();
        mock.push_reply(vec![0x15]);

        let err = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, ThzError::Handshake(HandshakeError::Step1(_))));
    }

    #[tokio::test]
    async fn test_read_value_slices_block_bytes() {
        let mock = MockTransport::connected()
            .with_block(&[0xFD], &FIRMWARE_206)
            .with_block(&[0xFB], &[0xFB, 0x00, 0x64, 0xFF, 0xE2]);
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        let value = device.read_value(&[0xFB], 2, 2).await.unwrap();
        assert_eq!(value.as_ref(), &[0x00, 0x64]);

        let err = device.read_value(&[0xFB], 4, 4).await.unwrap_err();
        assert!(matches!(err, ThzError::Protocol(ProtocolError::Truncated { .. })));

        let err = device.read_value(&[0xFB], usize::MAX, 2).await.unwrap_err();
        assert!(matches!(
            err,
            ThzError::Protocol(ProtocolError::Truncated {
                offset: usize::MAX,
                length: 2,
                available: 6,
            })
        ));
    }

    #[tokio::test]
    async fn test_cached_reads_share_one_fetch() {
        let mock = MockTransport::connected()
            .with_block(&[0xFD], &FIRMWARE_206)
            .with_block(&[0xFB], &[0xFB, 0x01, 0x02]);
        let handle = mock.handle();
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        let first = device.read_block_cached(&[0xFB]).await.unwrap();
        let second = device.read_block_cached(&[0xFB]).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(handle.fetch_count(&[0xFB]), 1);

        device.invalidate_cache();
        device.read_block_cached(&[0xFB]).await.unwrap();
        assert_eq!(handle.fetch_count(&[0xFB]), 2);

        // Uncached reads always go to the device
        device.read_block(&[0xFB]).await.unwrap();
        assert_eq!(handle.fetch_count(&[0xFB]), 3);
    }

    #[tokio::test]
    async fn test_fresh_read_refreshes_cached_block() {
        let mock = MockTransport::connected()
            .with_block(&[0xFD], &FIRMWARE_206)
            .with_block(&[0xFB], &[0xFB, 0x01, 0x02]);
        let handle = mock.handle();
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        device.read_block_cached(&[0xFB]).await.unwrap();
        handle.set_block(&[0xFB], &[0xFB, 0x03, 0x04]);

        let fresh = device.read_block(&[0xFB]).await.unwrap();
        let cached = device.read_block_cached(&[0xFB]).await.unwrap();
        assert_eq!(cached, fresh);
        assert_eq!(&cached[1..], &[0xFB, 0x03, 0x04]);
        assert_eq!(handle.fetch_count(&[0xFB]), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch() {
        let mock = MockTransport::connected()
            .with_block(&[0xFD], &FIRMWARE_206)
            .with_block(&[0xFB], &[0xFB, 0x01, 0x02]);
        let handle = mock.handle();
        let device = Arc::new(
            ThzDevice::with_transport(Box::new(mock), &settings())
                .await
                .unwrap(),
        );

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let device = Arc::clone(&device);
                tokio::spawn(async move { device.read_block_cached(&[0xFB]).await })
            })
            .collect();
        for task in tasks {
            let block = task.await.unwrap().unwrap();
            assert_eq!(&block[1..], &[0xFB, 0x01, 0x02]);
        }
        assert_eq!(handle.fetch_count(&[0xFB]), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_handshakes_never_interleave() {
        let mock = MockTransport::connected()
            .with_block(&[0xFD], &FIRMWARE_206)
            .with_block(&[0xFB], &[0xFB, 0x01, 0x02])
            .with_block(&[0xF4], &[0xF4, 0x03, 0x04]);
        let handle = mock.handle();
        let device = Arc::new(
            ThzDevice::with_transport(Box::new(mock), &settings())
                .await
                .unwrap(),
        );

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let device = Arc::clone(&device);
                let address = if i % 2 == 0 { 0xFB } else { 0xF4 };
                tokio::spawn(async move { device.read_block(&[address]).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // Greeting, telegram, confirm, close: one group per exchange
        let sent = handle.sent();
        assert_eq!(sent.len(), 4 * 7);
        for group in sent.chunks(4) {
            assert_eq!(group[0], vec![STX]);
            assert_eq!(&group[1][..2], &HEADER_GET);
            assert_eq!(&group[1][group[1].len() - 2..], &[DLE, ETX]);
            assert_eq!(group[2], vec![DLE]);
            assert_eq!(group[3], vec![STX]);
        }
        assert_eq!(handle.fetch_count(&[0xFB]), 3);
        assert_eq!(handle.fetch_count(&[0xF4]), 3);
    }

    #[tokio::test]
    async fn test_device_rejection_surfaces() {
        let mut mock = MockTransport::connected();
        mock.script_exchange(&build_response(HEADER_GET, &FIRMWARE_206));
        // Shorter frames never complete the receive loop
        mock.script_exchange(&build_response(STATUS_UNKNOWN_REGISTER, &[0x99, 0x00, 0x00]));
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        let err = device.read_block(&[0x99]).await.unwrap_err();
        assert!(matches!(err, ThzError::Device(DeviceError::UnknownRegister)));
    }

    #[tokio::test]
    async fn test_unknown_names_are_not_found() {
        let mock = MockTransport::connected().with_block(&[0xFD], &FIRMWARE_206);
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        assert!(matches!(
            device.read_field("FB", "noSuchField").await,
            Err(ThzError::NotFound(_))
        ));
        assert!(matches!(
            device.read_fields("77").await,
            Err(ThzError::NotFound(_))
        ));
        assert!(matches!(
            device.read_setting("pNoSuchSetting").await,
            Err(ThzError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_close_disconnects_link() {
        let mock = MockTransport::connected().with_block(&[0xFD], &FIRMWARE_206);
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();

        device.close().await.unwrap();
        let err = tokio::time::timeout(Duration::from_secs(1), device.read_block(&[0xFD]))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ThzError::Transport(_)));
        assert!(device.link_stats().await.bytes_sent > 0);
    }

    #[tokio::test]
    async fn test_reset_link_stats() {
        let mock = MockTransport::connected().with_block(&[0xFD], &FIRMWARE_206);
        let device = ThzDevice::with_transport(Box::new(mock), &settings())
            .await
            .unwrap();
        assert!(device.link_stats().await.bytes_sent > 0);

        device.reset_link_stats().await;
        let stats = device.link_stats().await;
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.bytes_received, 0);
        assert!(device.read_block(&[0xFD]).await.is_ok());
    }
}
