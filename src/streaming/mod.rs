//! Streaming module - viewer registry, wire messages, WebSocket transport

mod message;
mod registry;
mod websocket;

pub use message::{Envelope, MessageType};
pub use registry::{ChannelViewer, ConnectionId, ConnectionRegistry, Viewer};
pub use websocket::WebSocketServer;
