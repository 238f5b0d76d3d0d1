//! PSI/VHT Bridge Relay Library
//!
//! Process-level pieces of the relay:
//! - TCP JSON-lines transport (reader task feeding the queues, writer task
//!   draining outbound text)
//! - Bridge composition: router, queues, forwarder, launcher control

pub mod bridge;
pub mod transport;
