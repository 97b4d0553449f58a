//! Request/response handshake
//!
//! ```text
//! client  02                       greeting
//! device  10                       ack1
//! client  <telegram>               request
//! device  10 02                    ack2
//! client  10                       confirm
//! device  <status crc payload 10 03>
//! client  02                       close
//! ```
//!
//! One exchange at a time; the caller holds the link for the whole
//! sequence. Every wait is bounded by the read timeout, and a failed step
//! ends the exchange without retrying.

use bytes::Bytes;
use common::hex::format_hex_pretty;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

use super::codec::{decode_response, is_frame_complete, Response, Telegram};
use super::constants::{DLE, IDLE_BACKOFF, STX};
use crate::error::{HandshakeError, Result};
use crate::transport::{Transport, TransportError};

const ACK2: [u8; 2] = [DLE, STX];

/// Drives one greeting/telegram/data exchange over a transport
#[derive(Debug, Clone)]
pub struct HandshakeProtocol {
    read_timeout: Duration,
}

impl HandshakeProtocol {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Run the exchange and verify the returned frame
    pub async fn request(
        &self,
        link: &mut dyn Transport,
        telegram: &Telegram,
    ) -> Result<Response> {
        let raw = self.exchange(link, telegram).await?;
        decode_response(&raw)
    }

    /// Run the exchange and return the raw, still escaped data frame
    pub async fn exchange(&self, link: &mut dyn Transport, telegram: &Telegram) -> Result<Bytes> {
        // Idle -> AwaitAck1
        link.send(&[STX]).await?;
        trace!("Greeting sent");

        let ack1 = self.read_exact(link, 1).await?;
        if ack1 != [DLE] {
            warn!("Handshake step 1 failed: [{}]", format_hex_pretty(&ack1));
            return Err(HandshakeError::Step1(format_hex_pretty(&ack1)).into());
        }

        // AwaitAck1 -> AwaitAck2
        link.reset_input().await?;
        link.send(telegram.as_bytes()).await?;
        debug!("Request sent: {}", telegram);

        let ack2 = self.read_exact(link, ACK2.len()).await?;
        if ack2 != ACK2 {
            warn!("Handshake step 2 failed: [{}]", format_hex_pretty(&ack2));
            return Err(HandshakeError::Step2(format_hex_pretty(&ack2)).into());
        }

        // AwaitAck2 -> Receiving
        link.send(&[DLE]).await?;
        trace!("Confirmation sent");

        let frame = self.read_frame(link).await?;
        debug!("Response received: {}", format_hex_pretty(&frame));

        // Closing byte, the device expects it before the next greeting
        link.send(&[STX]).await?;

        Ok(Bytes::from(frame))
    }

    /// Read up to `len` bytes before the read timeout; short on timeout
    async fn read_exact(
        &self,
        link: &mut dyn Transport,
        len: usize,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.read_timeout;
        let mut buf = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match link.receive(&mut buf[filled..], Some(remaining)).await {
                Ok(0) => sleep(IDLE_BACKOFF.min(remaining)).await,
                Ok(n) => filled += n,
                Err(TransportError::Timeout(_)) => break,
                Err(e) => return Err(e),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    /// Accumulate the data frame until it is complete or the timeout passes
    async fn read_frame(&self, link: &mut dyn Transport) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.read_timeout;
        let mut frame = Vec::with_capacity(64);
        let mut chunk = [0u8; 256];

        while !is_frame_complete(&frame) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    "No valid response within {:?}: [{}]",
                    self.read_timeout,
                    format_hex_pretty(&frame)
                );
                return Err(HandshakeError::NoValidResponse(frame.len()).into());
            }
            match link.receive(&mut chunk, Some(remaining)).await {
                Ok(0) => sleep(IDLE_BACKOFF.min(remaining)).await,
                Ok(n) => frame.extend_from_slice(&chunk[..n]),
                // Deadline check above decides
                Err(TransportError::Timeout(_)) => {},
                Err(e) => return Err(e.into()),
            }
        }

        Ok(frame)
    }
}
