//! Base-128 varint framing and the control-channel message catalog.
//!
//! This crate owns the wire format shared by every socket in a session: the
//! LEB128-style integer encoding, the fixed-layout video packet header, and
//! the tagged [`ControlMessage`] union exchanged over the control socket.

pub mod error;
pub mod message;
pub mod varint;
pub mod video_packet;

pub use error::WireError;
pub use message::{ControlMessage, DeviceState, PointerEvent, PointerAxis, MessageType};
pub use varint::{Reader, Writer};
pub use video_packet::VideoPacketHeader;
