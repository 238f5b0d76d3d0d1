//! Relay pipeline: queue → router → forwarder → transport.
//!
//! Data flow:
//! ```text
//! transport callback → InboundSink → BlockingQueue<RawMessage>
//!   → run_consumer (blocking_pop) → TopicRouter::publish
//!   → VhtForwarder: parse → resolve target → translate → Transport::send
//! ```
//!
//! Every inbound message walks `Received → Parsed → Routed → Translated →
//! Sent`. A failing step ends that message only; the consumer loop keeps
//! polling.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, OutboundMessage};
use crate::config::TopicConfig;
use crate::error::{Error, HandlerError, ParseError};
use crate::launcher::ActiveCharacter;
use crate::queue::BlockingQueue;
use crate::router::{Subscriber, TextSubscriber, TopicRouter};
use crate::transport::{RawMessage, Transport};
use crate::translator::Translator;

/// Steps of the per-message state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelayStage {
    Received,
    Parsed,
    Routed,
    Translated,
    Sent,
}

/// A message that could not be relayed. `stage` is the step that failed.
#[derive(Debug, Error)]
#[error("relay failed at {stage:?} on topic {topic}: {reason}")]
pub struct RelayFailure {
    pub stage: RelayStage,
    pub topic: String,
    pub payload: String,
    #[source]
    pub reason: Error,
}

#[derive(Debug)]
pub enum RelayOutcome {
    Sent(OutboundMessage),
    Failed(RelayFailure),
}

/// Receives the terminal state of every relayed message.
pub trait RelayObserver: Send + Sync {
    fn on_sent(&self, _topic: &str, _outbound: &OutboundMessage) {}

    fn on_failure(&self, failure: &RelayFailure);
}

/// Default observer: one log line per outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_sent(&self, topic: &str, outbound: &OutboundMessage) {
        debug!(topic, target = %outbound.target_actor, "Message relayed");
    }

    fn on_failure(&self, failure: &RelayFailure) {
        warn!(
            stage = ?failure.stage,
            topic = %failure.topic,
            payload = %failure.payload,
            error = %failure.reason,
            "Dropping message"
        );
    }
}

/// Subscriber that turns PSI text into VHMsg for the active character.
pub struct VhtForwarder {
    name: String,
    translator: Arc<Translator>,
    character: Arc<ActiveCharacter>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn RelayObserver>,
}

impl VhtForwarder {
    pub fn new(
        name: impl Into<String>,
        translator: Arc<Translator>,
        character: Arc<ActiveCharacter>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            name: name.into(),
            translator,
            character,
            transport,
            observer: Arc::new(TracingObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn RelayObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one message through the state machine and report the outcome
    /// to the observer.
    pub fn relay(&self, topic: &str, content: &str) -> RelayOutcome {
        let outcome = self.advance(topic, content);
        match &outcome {
            RelayOutcome::Sent(outbound) => self.observer.on_sent(topic, outbound),
            RelayOutcome::Failed(failure) => self.observer.on_failure(failure),
        }
        outcome
    }

    fn advance(&self, topic: &str, content: &str) -> RelayOutcome {
        let fail = |stage, reason: Error| {
            RelayOutcome::Failed(RelayFailure {
                stage,
                topic: topic.to_string(),
                payload: content.to_string(),
                reason,
            })
        };

        debug!(topic, stage = ?RelayStage::Received, "Relaying message");

        let parsed = match codec::parse(content) {
            Ok(parsed) => parsed,
            Err(e) => return fail(RelayStage::Parsed, e.into()),
        };
        debug!(
            topic,
            kind = ?parsed.kind(),
            source = parsed.source_identity(),
            stage = ?RelayStage::Parsed,
            "Parsed message"
        );

        let target = self.character.get();
        if !self.translator.actors().contains(&target) {
            return fail(
                RelayStage::Routed,
                ParseError::UnknownTarget(target).into(),
            );
        }
        debug!(topic, target = %target, stage = ?RelayStage::Routed, "Resolved target");

        let outbound = match self.translator.translate(&parsed, &target) {
            Ok(outbound) => outbound,
            Err(e) => return fail(RelayStage::Translated, e.into()),
        };

        if let Err(e) = self.transport.send(&outbound.encoded_text) {
            return fail(RelayStage::Sent, e.into());
        }
        debug!(topic, target = %outbound.target_actor, stage = ?RelayStage::Sent, "Sent");

        RelayOutcome::Sent(outbound)
    }
}

impl Subscriber for VhtForwarder {
    fn name(&self) -> &str {
        &self.name
    }
}

impl TextSubscriber for VhtForwarder {
    fn on_text(&self, topic: &str, content: &str) -> Result<(), HandlerError> {
        match self.relay(topic, content) {
            RelayOutcome::Sent(_) => Ok(()),
            RelayOutcome::Failed(failure) => Err(Box::new(failure)),
        }
    }
}

/// Counters returned when a consumer loop ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub published: usize,
    pub failed: usize,
    /// Messages no subscriber accepted: unknown topic or mismatched payload.
    pub unrouted: usize,
}

/// Drain `queue` into `router` until the queue is closed.
///
/// Fan-out failures are logged and counted; they never end the loop.
pub fn run_consumer(queue: &BlockingQueue<RawMessage>, router: &TopicRouter) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    while let Some(raw) = queue.blocking_pop() {
        stats.published += 1;
        let report = router.publish(&raw.topic, &raw.payload);
        if report.is_ok() && report.delivered == 0 {
            stats.unrouted += 1;
            info!(
                topic = %raw.topic,
                skipped = report.skipped,
                "No subscriber accepted message, dropping"
            );
        } else if let Err(e) = report.into_result() {
            stats.failed += 1;
            warn!(topic = %raw.topic, error = %e, "Fan-out completed with failures");
        }
    }
    info!(
        published = stats.published,
        failed = stats.failed,
        unrouted = stats.unrouted,
        "Inbound queue closed, consumer stopping"
    );
    stats
}

/// Transport callback target: sorts inbound messages into the relay queue
/// or the launcher control queue by topic.
#[derive(Clone)]
pub struct InboundSink {
    messages: Arc<BlockingQueue<RawMessage>>,
    control: Arc<BlockingQueue<RawMessage>>,
    topics: TopicConfig,
}

impl InboundSink {
    pub const fn new(
        messages: Arc<BlockingQueue<RawMessage>>,
        control: Arc<BlockingQueue<RawMessage>>,
        topics: TopicConfig,
    ) -> Self {
        Self {
            messages,
            control,
            topics,
        }
    }

    /// Enqueue one inbound message. Never blocks.
    pub fn accept(&self, raw: RawMessage) {
        let queue = if self.topics.is_control(&raw.topic) {
            &self.control
        } else {
            &self.messages
        };
        if let Err(raw) = queue.push(raw) {
            warn!(topic = %raw.topic, "Queue closed, dropping inbound message");
        }
    }

    /// Close both queues so their consumers wind down.
    pub fn close(&self) {
        self.messages.close();
        self.control.close();
    }
}
