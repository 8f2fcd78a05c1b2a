//! Trace segment forwarding
//!
//! Fire-and-forget emission of subsegments to the local trace daemon over
//! UDP. Nothing here ever fails a caller: errors are logged and dropped.

use autobuilder_core::dto::trace::TraceSegment;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Header line the daemon expects before each segment document
pub const DAEMON_HEADER: &str = r#"{"format": "json", "version": 1}"#;

/// Best-effort sink for trace segments
pub trait TraceForwarder: Send + Sync {
    /// Sends `segment` without waiting for the result
    fn forward(&self, segment: TraceSegment);
}

/// Forwards segments to a trace daemon listening on UDP
#[derive(Debug, Clone)]
pub struct UdpTraceForwarder {
    daemon_address: String,
}

impl UdpTraceForwarder {
    pub fn new(daemon_address: impl Into<String>) -> Self {
        Self {
            daemon_address: daemon_address.into(),
        }
    }
}

impl TraceForwarder for UdpTraceForwarder {
    fn forward(&self, segment: TraceSegment) {
        let datagram = match encode_datagram(&segment) {
            Ok(datagram) => datagram,
            Err(e) => {
                warn!("Failed to encode trace segment: {}", e);
                return;
            }
        };
        let address = self.daemon_address.clone();

        tokio::spawn(async move {
            let socket = match UdpSocket::bind("0.0.0.0:0").await {
                Ok(socket) => socket,
                Err(e) => {
                    warn!("Failed to open trace socket: {}", e);
                    return;
                }
            };
            match socket.send_to(datagram.as_bytes(), &address).await {
                Ok(_) => debug!("Sent trace segment {} to {}", segment.id, address),
                Err(e) => warn!("Failed to send trace segment to {}: {}", address, e),
            }
        });
    }
}

/// Header line, newline, segment JSON
pub fn encode_datagram(segment: &TraceSegment) -> serde_json::Result<String> {
    Ok(format!("{}\n{}", DAEMON_HEADER, serde_json::to_string(segment)?))
}
