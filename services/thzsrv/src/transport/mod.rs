//! Transport Layer Module
//!
//! Separates the physical link from the THZ handshake.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │   HandshakeProtocol / ThzDevice      │
//! └──────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌──────────────────────────────────────┐
//! │        Transport (trait)             │
//! │ connect, send, receive, reset_input  │
//! └──────────────────────────────────────┘
//!          │            │           │
//!          ▼            ▼           ▼
//!     ┌────────┐   ┌────────┐  ┌────────┐
//!     │ Serial │   │  TCP   │  │  Mock  │
//!     └────────┘   └────────┘  └────────┘
//! ```

pub mod factory;
pub mod mock;
pub mod serial;
pub mod tcp;
pub mod traits;

pub use factory::TransportFactory;
pub use mock::{MockHandle, MockTransport};
pub use serial::{SerialTransport, SerialTransportConfig};
pub use tcp::{TcpTransport, TcpTransportConfig};
pub use traits::{ConnectionState, Transport, TransportError, TransportStats};
