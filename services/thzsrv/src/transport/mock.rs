//! Mock Transport for Testing
//!
//! Plays the controller side of the link without hardware. Two modes:
//!
//! - scripted: every `send` releases the next queued reply into the
//!   receive buffer, for exercising malformed or hostile devices;
//! - simulated: once blocks are registered and the script is empty, the
//!   mock answers the handshake like a real controller and serves the
//!   registered payloads, counting fetches and applying writes.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::traits::{ConnectionState, Transport, TransportError, TransportStats};
use crate::protocol::codec::build_response;
use crate::protocol::constants::{DLE, FOOTER, HEADER_GET, HEADER_SET, STX};

/// Wait used by `receive` when no timeout is given and nothing is buffered
const DEFAULT_RECEIVE_WAIT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    AwaitTelegram,
    AwaitConfirm,
    Closing,
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    fail_connect: bool,
    rx: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    stats: TransportStats,

    blocks: HashMap<Vec<u8>, Vec<u8>>,
    phase: Phase,
    pending: Option<(bool, Vec<u8>)>,
    fetches: HashMap<Vec<u8>, usize>,
    writes: Vec<Vec<u8>>,
}

impl MockState {
    fn on_send(&mut self, data: &[u8]) {
        self.sent.push(data.to_vec());

        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
            return;
        }
        if !self.blocks.is_empty() {
            self.simulate(data);
        }
    }

    fn simulate(&mut self, data: &[u8]) {
        self.phase = match (self.phase, data) {
            (Phase::Closing, [STX]) => Phase::Idle,
            (_, [STX]) => {
                self.rx.push_back(DLE);
                Phase::AwaitTelegram
            },
            (Phase::AwaitTelegram, telegram) if is_telegram(telegram) => {
                let address = telegram[3..telegram.len() - FOOTER.len()].to_vec();
                self.pending = Some((telegram[1] == HEADER_SET[1], address));
                self.rx.extend([DLE, STX]);
                Phase::AwaitConfirm
            },
            (Phase::AwaitConfirm, [DLE]) => {
                let answered = match self.pending.take() {
                    Some((is_write, address)) => self.answer(is_write, address),
                    None => false,
                };
                // A silent device gets no closing byte from the client
                if answered {
                    Phase::Closing
                } else {
                    Phase::Idle
                }
            },
            _ => Phase::Idle,
        };
    }

    fn answer(&mut self, is_write: bool, address: Vec<u8>) -> bool {
        if is_write {
            // Longest registered command that prefixes the written bytes
            let command = self
                .blocks
                .keys()
                .filter(|key| address.len() > key.len() && address.starts_with(key))
                .max_by_key(|key| key.len())
                .cloned();
            let echo = match command {
                Some(command) => {
                    self.blocks.insert(command.clone(), address.clone());
                    command
                },
                None => address.clone(),
            };
            self.writes.push(address);
            self.rx.extend(build_response(HEADER_SET, &echo));
            return true;
        }

        match self.blocks.get(&address) {
            Some(payload) => {
                *self.fetches.entry(address.clone()).or_default() += 1;
                let frame = build_response(HEADER_GET, payload);
                self.rx.extend(frame);
                true
            },
            // Unknown registers get no answer
            None => {
                debug!("Mock device has no block {:02X?}", address);
                false
            },
        }
    }
}

fn is_telegram(data: &[u8]) -> bool {
    data.len() >= 5 && data[0] == HEADER_GET[0] && data.ends_with(&FOOTER)
}

/// Shared view into a mock transport that has been moved into a device
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    /// Every buffer passed to `send`, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent.clone()
    }

    /// Number of read responses served for `address`
    pub fn fetch_count(&self, address: &[u8]) -> usize {
        self.state
            .lock()
            .fetches
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    /// Address-plus-value bytes of every write telegram
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub fn block(&self, address: &[u8]) -> Option<Vec<u8>> {
        self.state.lock().blocks.get(address).cloned()
    }

    pub fn set_block(&self, address: &[u8], payload: &[u8]) {
        self.state
            .lock()
            .blocks
            .insert(address.to_vec(), payload.to_vec());
    }

    pub fn push_reply(&self, reply: Vec<u8>) {
        self.state.lock().replies.push_back(reply);
    }
}

/// Mock transport implementation
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Disconnected mock; `connect` opens it
    pub fn new() -> Self {
        Self {
            name: "Mock Transport".to_string(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Mock that is already open
    pub fn connected() -> Self {
        let mock = Self::new();
        {
            let mut state = mock.state.lock();
            state.connected = true;
            state.stats.record_successful_connection();
        }
        mock
    }

    /// Register a block payload for the simulated controller
    pub fn with_block(self, address: &[u8], payload: &[u8]) -> Self {
        self.handle().set_block(address, payload);
        self
    }

    /// Queue one reply, released by the next `send`
    pub fn push_reply(&mut self, reply: Vec<u8>) {
        self.state.lock().replies.push_back(reply);
    }

    /// Queue the replies for one complete exchange ending in `frame`
    pub fn script_exchange(&mut self, frame: &[u8]) {
        let mut state = self.state.lock();
        state.replies.push_back(vec![DLE]);
        state.replies.push_back(vec![DLE, STX]);
        state.replies.push_back(frame.to_vec());
        // Closing STX gets no answer
        state.replies.push_back(Vec::new());
    }

    pub fn set_connection_failure(&mut self, should_fail: bool) {
        self.state.lock().fail_connect = should_fail;
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_type(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.stats.record_connection_attempt();

        if state.fail_connect {
            state.stats.record_failed_connection();
            return Err(TransportError::ConnectionFailed(
                "Mock connection failure".to_string(),
            ));
        }

        state.connected = true;
        state.stats.record_successful_connection();
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.connected {
            state.connected = false;
            state.stats.record_disconnection();
        }
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(TransportError::SendFailed("Not connected".to_string()));
        }

        state.on_send(data);
        state.stats.record_bytes_sent(data.len());
        Ok(data.len())
    }

    async fn receive(
        &mut self,
        buffer: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, TransportError> {
        let delivered = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(TransportError::ReceiveFailed("Not connected".to_string()));
            }

            let n = buffer.len().min(state.rx.len());
            for (slot, byte) in buffer.iter_mut().zip(state.rx.drain(..n)) {
                *slot = byte;
            }
            if n > 0 {
                state.stats.record_bytes_received(n);
            }
            n
        };

        if delivered > 0 {
            return Ok(delivered);
        }

        // Behave like a silent line: wait out the timeout
        let wait = timeout.unwrap_or(DEFAULT_RECEIVE_WAIT);
        tokio::time::sleep(wait).await;
        Err(TransportError::Timeout(format!(
            "Mock receive timed out after {wait:?}"
        )))
    }

    async fn reset_input(&mut self) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        let discarded = state.rx.len();
        state.rx.clear();
        state.stats.record_bytes_discarded(discarded);
        Ok(discarded)
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn connection_state(&self) -> ConnectionState {
        self.state.lock().stats.connection_state
    }

    async fn stats(&self) -> TransportStats {
        self.state.lock().stats.clone()
    }

    async fn reset_stats(&mut self) {
        self.state.lock().stats.reset();
    }
}
