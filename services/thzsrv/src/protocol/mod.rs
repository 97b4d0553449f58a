//! THZ serial protocol: telegram framing and the handshake state machine

pub mod codec;
pub mod constants;
pub mod handshake;

pub use codec::{build_telegram, checksum, decode_response, unescape, Response, Telegram};
pub use handshake::HandshakeProtocol;
