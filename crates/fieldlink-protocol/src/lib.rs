pub mod datablock;
pub mod envelope;
pub mod error;
pub mod handshake;
pub mod lv;

pub use datablock::DataBlock;
pub use envelope::{pack, pack_at, unpack, unpack_at, EnvelopeConfig};
pub use error::ProtocolError;
pub use handshake::{ClientHandshake, Credentials, HandshakeConfig, HandshakeServer};
pub use lv::Lv;
