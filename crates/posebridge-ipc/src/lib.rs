//! Posebridge IPC - Local socket transport to the body-tracking server
//!
//! Messages travel as length-prefixed CBOR frames over a unix stream socket.
//! The socket bridge reconnects on its own and reports each fresh connection
//! so the feeder can re-announce every tracker.

pub mod codec;
#[cfg(unix)]
pub mod socket;

pub use codec::{encode_frame, FrameDecoder, FrameError, HEADER_LEN, MAX_FRAME_LEN};
#[cfg(unix)]
pub use socket::{default_socket_path, SocketBridge, SocketBridgeConfig, SOCKET_NAME};
