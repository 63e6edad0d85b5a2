//! Relay wire protocol: message types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_host_message, decode_message, encode_host_message, encode_message, ProtocolError,
};
pub use messages::*;
