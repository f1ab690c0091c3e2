//! Non-blocking local socket bridge

use posebridge_core::{Bridge, Message};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::codec::{encode_frame, FrameDecoder};

/// Socket name the body-tracking server listens on
pub const SOCKET_NAME: &str = "SlimeVRInput";

/// Default socket path: `$XDG_RUNTIME_DIR/SlimeVRInput`, else `/tmp/SlimeVRInput`
pub fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

#[derive(Debug, Clone)]
pub struct SocketBridgeConfig {
    pub path: PathBuf,
    /// Minimum delay between connection attempts
    pub reconnect_interval: Duration,
    /// Frames buffered while the peer is not reading
    pub queue_limit: usize,
}

impl Default for SocketBridgeConfig {
    fn default() -> Self {
        Self {
            path: default_socket_path(),
            reconnect_interval: Duration::from_secs(1),
            queue_limit: 1024,
        }
    }
}

/// Bridge over a unix stream socket
pub struct SocketBridge {
    config: SocketBridgeConfig,
    stream: Option<UnixStream>,
    last_attempt: Option<Instant>,
    outbound: VecDeque<Vec<u8>>,
    /// Bytes of the front frame already written
    write_offset: usize,
    decoder: FrameDecoder,
    inbound: VecDeque<Message>,
}

impl SocketBridge {
    pub fn new(config: SocketBridgeConfig) -> Self {
        Self {
            config,
            stream: None,
            last_attempt: None,
            outbound: VecDeque::new(),
            write_offset: 0,
            decoder: FrameDecoder::new(),
            inbound: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn queued_frames(&self) -> usize {
        self.outbound.len()
    }

    fn try_connect(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_attempt {
            if now.duration_since(last) < self.config.reconnect_interval {
                return false;
            }
        }
        self.last_attempt = Some(now);

        let stream = match UnixStream::connect(&self.config.path) {
            Ok(stream) => stream,
            Err(e) => {
                debug!(path = %self.config.path.display(), error = %e, "Server not reachable");
                return false;
            }
        };
        if let Err(e) = stream.set_nonblocking(true) {
            warn!(error = %e, "Failed to make bridge socket non-blocking");
            return false;
        }

        info!(path = %self.config.path.display(), "Connected to server");
        self.stream = Some(stream);
        true
    }

    fn disconnect(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            warn!(
                reason = reason,
                dropped = self.outbound.len(),
                "Disconnected from server"
            );
        }
        self.outbound.clear();
        self.write_offset = 0;
        self.decoder.clear();
        self.last_attempt = Some(Instant::now());
    }

    /// Write as much queued output as the socket accepts
    fn flush(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let mut failure = None;
        while let Some(front) = self.outbound.front() {
            match stream.write(&front[self.write_offset..]) {
                Ok(0) => {
                    failure = Some("write returned zero bytes".to_string());
                    break;
                }
                Ok(n) => {
                    self.write_offset += n;
                    if self.write_offset == front.len() {
                        self.outbound.pop_front();
                        self.write_offset = 0;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        if let Some(reason) = failure {
            self.disconnect(&reason);
        }
    }

    /// Read everything available and decode complete frames
    fn read_available(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        let mut buf = [0u8; 4096];
        let mut failure = None;
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    failure = Some("connection closed by server".to_string());
                    break;
                }
                Ok(n) => self.decoder.extend(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        loop {
            match self.decoder.next_frame() {
                Ok(Some(message)) => self.inbound.push_back(message),
                Ok(None) => break,
                Err(e) if e.is_fatal() => {
                    failure = Some(e.to_string());
                    break;
                }
                Err(e) => warn!(error = %e, "Dropping undecodable frame"),
            }
        }

        if let Some(reason) = failure {
            self.disconnect(&reason);
        }
    }
}

impl Bridge for SocketBridge {
    fn send_message(&mut self, message: Message) {
        if self.stream.is_none() {
            trace!(kind = message.kind(), "Not connected, dropping message");
            return;
        }

        let frame = match encode_frame(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to encode message");
                return;
            }
        };

        if self.outbound.len() >= self.config.queue_limit {
            // The front frame may be partially written and must stay intact
            let victim = if self.write_offset > 0 { 1 } else { 0 };
            self.outbound.remove(victim);
            warn!(limit = self.config.queue_limit, "Outbound queue full, dropped oldest frame");
        }
        self.outbound.push_back(frame);
        self.flush();
    }

    fn run_frame(&mut self) -> bool {
        let just_connected = self.stream.is_none() && self.try_connect();
        self.flush();
        self.read_available();
        just_connected && self.is_connected()
    }

    fn next_message(&mut self) -> Option<Message> {
        self.inbound.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use posebridge_core::{DeviceIndex, TrackerStatus};
    use std::os::unix::net::UnixListener;

    fn config(path: PathBuf) -> SocketBridgeConfig {
        SocketBridgeConfig {
            path,
            reconnect_interval: Duration::ZERO,
            queue_limit: 4,
        }
    }

    fn read_frame(stream: &mut UnixStream) -> Message {
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).unwrap();
        let len = u32::from_le_bytes(header) as usize;
        let mut body = vec![0u8; len - 4];
        stream.read_exact(&mut body).unwrap();
        serde_cbor::from_slice(&body).unwrap()
    }

    #[test]
    fn test_connect_and_send() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut bridge = SocketBridge::new(config(path));
        assert!(bridge.run_frame());
        assert!(!bridge.run_frame());

        let (mut server, _) = listener.accept().unwrap();
        let message = Message::TrackerStatus {
            tracker_id: DeviceIndex(3),
            status: TrackerStatus::Ok,
        };
        bridge.send_message(message.clone());
        assert_eq!(read_frame(&mut server), message);
    }

    #[test]
    fn test_inbound_messages_queued() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut bridge = SocketBridge::new(config(path));
        bridge.run_frame();
        let (mut server, _) = listener.accept().unwrap();

        let message = Message::UserAction { name: "hello".to_string() };
        server.write_all(&encode_frame(&message).unwrap()).unwrap();

        assert!(!bridge.run_frame());
        assert_eq!(bridge.next_message(), Some(message));
        assert_eq!(bridge.next_message(), None);
    }

    #[test]
    fn test_reconnect_reported_after_server_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut bridge = SocketBridge::new(config(path));
        assert!(bridge.run_frame());
        let (server, _) = listener.accept().unwrap();
        drop(server);

        assert!(!bridge.run_frame());
        assert!(!bridge.is_connected());
        assert!(bridge.run_frame());
        assert!(bridge.is_connected());
    }

    #[test]
    fn test_send_while_disconnected_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut bridge = SocketBridge::new(config(dir.path().join("missing.sock")));

        assert!(!bridge.run_frame());
        bridge.send_message(Message::UserAction { name: "calibrate".to_string() });
        assert_eq!(bridge.queued_frames(), 0);
    }
}
