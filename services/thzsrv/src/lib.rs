//! THZ Heat Pump Client Library (thzsrv)
//!
//! Talks to Stiebel Eltron / Tecalor THZ controllers over their half-duplex
//! service protocol, either on a serial adapter or through a serial-to-TCP
//! bridge, and exposes the register blocks as typed values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   ThzDevice     │───►│ HandshakeProto  │───►│   Transport     │
//! │   (facade)      │    │ + codec         │    │ (serial/TCP)    │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐    ┌─────────────────┐
//! │  BlockCache     │    │ RegisterMaps    │──► decoder
//! │  (TTL, DashMap) │    │ (per firmware)  │
//! └─────────────────┘    └─────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use thzsrv::config::AppConfig;
//! use thzsrv::device::ThzDevice;
//!
//! # async fn run() -> thzsrv::error::Result<()> {
//! let config = AppConfig::load(None)?;
//! let device = ThzDevice::connect(&config).await?;
//! println!("firmware {}", device.firmware_version());
//! for reading in device.read_fields("FB").await? {
//!     println!("{} = {}", reading.name, reading.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod protocol;
pub mod register_map;
pub mod runtime;
pub mod transport;

pub use device::{FieldReading, ThzDevice};
pub use error::{Result, ThzError};
