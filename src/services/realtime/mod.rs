pub mod connections;
pub mod heartbeat;

pub use connections::{ConnectionManager, Outbound};
pub use heartbeat::{HeartbeatHandle, HeartbeatMonitor};
