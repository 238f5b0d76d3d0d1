//! Topic router: publish/subscribe fan-out with capability-tagged handlers.
//!
//! Handlers are registered per topic and invoked in registration order. Each
//! registration carries a [`Capability`] chosen at subscribe time; a payload
//! whose shape the handler cannot take is skipped, not failed.
//!
//! The router never owns a subscriber: it keeps a `Weak` reference and
//! silently prunes registrations whose owner has dropped the handler.
//!
//! Unsubscribe uses snapshot semantics. `publish` copies the topic's
//! registration list under the lock and invokes handlers after releasing it,
//! so a fan-out already in flight may still reach a handler removed
//! concurrently; every `publish` that starts after `unsubscribe` returns will
//! not.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use tracing::{debug, info};

use crate::error::{Error, HandlerError, RouteError};

/// A published message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// Common identity of every subscriber.
pub trait Subscriber: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;
}

/// Receives text payloads as `(topic, content)`.
pub trait TextSubscriber: Subscriber {
    fn on_text(&self, topic: &str, content: &str) -> Result<(), HandlerError>;
}

/// Receives binary payloads as `(topic, bytes)`.
pub trait ByteSubscriber: Subscriber {
    fn on_bytes(&self, topic: &str, bytes: &[u8]) -> Result<(), HandlerError>;
}

/// Receives both shapes.
pub trait HybridSubscriber: TextSubscriber + ByteSubscriber {}

impl<T: TextSubscriber + ByteSubscriber> HybridSubscriber for T {}

/// Payload shapes a registration accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Text,
    Binary,
    Both,
}

impl Capability {
    pub const fn accepts(self, payload: &Payload) -> bool {
        matches!(
            (self, payload),
            (Self::Text | Self::Both, Payload::Text(_)) | (Self::Binary | Self::Both, Payload::Binary(_))
        )
    }
}

/// Capability-tagged, non-owning handler reference.
#[derive(Clone)]
pub enum Handler {
    Text(Weak<dyn TextSubscriber>),
    Binary(Weak<dyn ByteSubscriber>),
    Both(Weak<dyn HybridSubscriber>),
}

impl Handler {
    pub fn text<S: TextSubscriber + 'static>(subscriber: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        Self::Text(weak)
    }

    pub fn binary<S: ByteSubscriber + 'static>(subscriber: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        Self::Binary(weak)
    }

    pub fn both<S: HybridSubscriber + 'static>(subscriber: &Arc<S>) -> Self {
        let weak: Weak<S> = Arc::downgrade(subscriber);
        Self::Both(weak)
    }

    pub const fn capability(&self) -> Capability {
        match self {
            Self::Text(_) => Capability::Text,
            Self::Binary(_) => Capability::Binary,
            Self::Both(_) => Capability::Both,
        }
    }

    fn invoke(&self, topic: &str, payload: &Payload) -> Delivery {
        if !self.capability().accepts(payload) {
            return Delivery::Skipped;
        }
        match (self, payload) {
            (Self::Text(w), Payload::Text(text)) => match w.upgrade() {
                Some(s) => guarded(s.name(), || s.on_text(topic, text)),
                None => Delivery::Gone,
            },
            (Self::Binary(w), Payload::Binary(bytes)) => match w.upgrade() {
                Some(s) => guarded(s.name(), || s.on_bytes(topic, bytes)),
                None => Delivery::Gone,
            },
            (Self::Both(w), Payload::Text(text)) => match w.upgrade() {
                Some(s) => guarded(s.name(), || s.on_text(topic, text)),
                None => Delivery::Gone,
            },
            (Self::Both(w), Payload::Binary(bytes)) => match w.upgrade() {
                Some(s) => guarded(s.name(), || s.on_bytes(topic, bytes)),
                None => Delivery::Gone,
            },
            _ => Delivery::Skipped,
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handler").field(&self.capability()).finish()
    }
}

enum Delivery {
    Delivered,
    Skipped,
    Gone,
    Failed { subscriber: String, cause: HandlerError },
}

/// Run a handler, turning both `Err` and panics into a failure.
fn guarded<F>(name: &str, call: F) -> Delivery
where
    F: FnOnce() -> Result<(), HandlerError>,
{
    let cause = match catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => return Delivery::Delivered,
        Ok(Err(e)) => e,
        Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())).into(),
    };
    Delivery::Failed {
        subscriber: name.to_string(),
        cause,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Returned by [`TopicRouter::subscribe`]; pass to
/// [`TopicRouter::unsubscribe`] to remove exactly this registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    topic: String,
}

impl SubscriptionHandle {
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[derive(Debug, Clone)]
struct Registration {
    id: u64,
    handler: Handler,
}

/// Outcome of one fan-out.
#[derive(Debug)]
pub struct PublishReport {
    pub topic: String,
    /// Handlers that ran to completion.
    pub delivered: usize,
    /// Handlers whose capability did not match the payload.
    pub skipped: usize,
    /// Handlers that returned an error or panicked, in invocation order.
    pub failures: Vec<RouteError>,
}

impl PublishReport {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            delivered: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of delivered handlers, or every failure aggregated into one error.
    pub fn into_result(self) -> Result<usize, Error> {
        if self.failures.is_empty() {
            Ok(self.delivered)
        } else {
            Err(Error::Route {
                topic: self.topic,
                failures: self.failures,
            })
        }
    }
}

/// Thread-safe topic → subscriber table.
#[derive(Default)]
pub struct TopicRouter {
    topics: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Registration>>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Registration>>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` under `topic`. The same subscriber may be
    /// registered under any number of topics, or several times under one.
    pub fn subscribe(&self, topic: &str, handler: Handler) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let capability = handler.capability();
        self.write()
            .entry(topic.to_string())
            .or_default()
            .push(Registration { id, handler });
        info!(topic, id, ?capability, "Subscriber registered");
        SubscriptionHandle {
            id,
            topic: topic.to_string(),
        }
    }

    /// Remove one registration. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut topics = self.write();
        let Some(list) = topics.get_mut(&handle.topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|r| r.id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            topics.remove(&handle.topic);
        }
        drop(topics);

        if removed {
            info!(topic = %handle.topic, id = handle.id, "Subscriber removed");
        }
        removed
    }

    /// Deliver `payload` to every handler registered under `topic`, in
    /// registration order. Failures never stop the fan-out; they are
    /// collected in the returned report.
    pub fn publish(&self, topic: &str, payload: &Payload) -> PublishReport {
        let snapshot = self.read().get(topic).cloned().unwrap_or_default();
        let mut report = PublishReport::new(topic);

        if snapshot.is_empty() {
            debug!(topic, "No subscribers for topic");
            return report;
        }

        let mut gone = Vec::new();
        for registration in &snapshot {
            match registration.handler.invoke(topic, payload) {
                Delivery::Delivered => report.delivered += 1,
                Delivery::Skipped => report.skipped += 1,
                Delivery::Gone => gone.push(registration.id),
                Delivery::Failed { subscriber, cause } => {
                    debug!(topic, subscriber = %subscriber, error = %cause, "Subscriber failed");
                    report.failures.push(RouteError::HandlerFailed {
                        topic: topic.to_string(),
                        subscriber,
                        cause,
                    });
                }
            }
        }

        if !gone.is_empty() {
            self.prune(topic, &gone);
        }

        debug!(
            topic,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Publish complete"
        );
        report
    }

    fn prune(&self, topic: &str, ids: &[u64]) {
        let mut topics = self.write();
        if let Some(list) = topics.get_mut(topic) {
            list.retain(|r| !ids.contains(&r.id));
            if list.is_empty() {
                topics.remove(topic);
            }
        }
        drop(topics);
        debug!(topic, pruned = ids.len(), "Dropped registrations of released subscribers");
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.read().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }
}
