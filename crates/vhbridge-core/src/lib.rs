//! PSI ↔ VHT bridge core library
//!
//! Relays messages from the PSI dialogue/perception side to the virtual
//! human toolkit:
//! - Marker-delimited wire codec and VHMsg templates
//! - Blocking delivery queue between transport callbacks and consumer loops
//! - Topic router with capability-tagged subscribers
//! - Translator from parsed messages to speech acts and gaze commands
//! - Relay pipeline and launcher control protocol
//! - Configuration resolution and common error types

pub mod codec;
pub mod config;
pub mod error;
pub mod launcher;
pub mod queue;
pub mod relay;
pub mod router;
pub mod tracing_init;
pub mod translator;
pub mod transport;

pub use config::Config;
pub use error::{Error, ParseError, Result, RouteError, TransportError, TranslateError};
pub use queue::BlockingQueue;
pub use relay::{InboundSink, VhtForwarder, run_consumer};
pub use router::{Handler, Payload, TopicRouter};
pub use translator::Translator;
pub use transport::{RawMessage, Transport};
