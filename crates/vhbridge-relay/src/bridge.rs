//! Wires the core pieces into a running relay.
//!
//! One [`Bridge`] owns the router, both queues, the active character and the
//! forwarder subscription. Blocking loops (the relay consumer, the launcher
//! controller, a character query) run on tokio's blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use vhbridge_core::config::{Config, TopicConfig};
use vhbridge_core::launcher::{self, ActiveCharacter, LauncherController, LauncherExit};
use vhbridge_core::relay::{ConsumerStats, InboundSink, RelayObserver, VhtForwarder, run_consumer};
use vhbridge_core::router::{Handler, SubscriptionHandle, TopicRouter};
use vhbridge_core::transport::{RawMessage, Transport};
use vhbridge_core::{BlockingQueue, Translator};

/// Name the forwarder registers under.
pub const FORWARDER_NAME: &str = "vht-forwarder";

pub struct Bridge {
    topics: TopicConfig,
    transport: Arc<dyn Transport>,
    router: Arc<TopicRouter>,
    messages: Arc<BlockingQueue<RawMessage>>,
    control: Arc<BlockingQueue<RawMessage>>,
    character: Arc<ActiveCharacter>,
    // The router only keeps weak references.
    forwarder: Arc<VhtForwarder>,
    subscriptions: Vec<SubscriptionHandle>,
}

impl Bridge {
    /// Build the relay and subscribe the forwarder to the text and location
    /// topics.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self::build(config, transport, None)
    }

    /// Like [`Bridge::new`], reporting relay outcomes to `observer`.
    pub fn with_observer(
        config: &Config,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn RelayObserver>,
    ) -> Self {
        Self::build(config, transport, Some(observer))
    }

    fn build(
        config: &Config,
        transport: Arc<dyn Transport>,
        observer: Option<Arc<dyn RelayObserver>>,
    ) -> Self {
        let router = Arc::new(TopicRouter::new());
        let character = Arc::new(ActiveCharacter::new(
            config.launcher.default_character.clone(),
        ));
        let translator = Arc::new(Translator::from_config(config));

        let mut forwarder = VhtForwarder::new(
            FORWARDER_NAME,
            translator,
            Arc::clone(&character),
            Arc::clone(&transport),
        );
        if let Some(observer) = observer {
            forwarder = forwarder.with_observer(observer);
        }
        let forwarder = Arc::new(forwarder);

        let subscriptions = [&config.topics.text, &config.topics.location]
            .into_iter()
            .map(|topic| router.subscribe(topic, Handler::text(&forwarder)))
            .collect();

        info!(
            character = %config.launcher.default_character,
            text_topic = %config.topics.text,
            location_topic = %config.topics.location,
            "Bridge ready"
        );

        Self {
            topics: config.topics.clone(),
            transport,
            router,
            messages: Arc::new(BlockingQueue::new()),
            control: Arc::new(BlockingQueue::new()),
            character,
            forwarder,
            subscriptions,
        }
    }

    /// Transport callback target for inbound messages.
    pub fn sink(&self) -> InboundSink {
        InboundSink::new(
            Arc::clone(&self.messages),
            Arc::clone(&self.control),
            self.topics.clone(),
        )
    }

    pub fn router(&self) -> &Arc<TopicRouter> {
        &self.router
    }

    pub fn character(&self) -> &Arc<ActiveCharacter> {
        &self.character
    }

    pub fn forwarder(&self) -> &Arc<VhtForwarder> {
        &self.forwarder
    }

    pub fn subscriptions(&self) -> &[SubscriptionHandle] {
        &self.subscriptions
    }

    /// Start the relay consumer loop. Finishes once the inbound queue is
    /// closed and drained.
    pub fn spawn_consumer(&self) -> JoinHandle<ConsumerStats> {
        let queue = Arc::clone(&self.messages);
        let router = Arc::clone(&self.router);
        tokio::task::spawn_blocking(move || run_consumer(&queue, &router))
    }

    /// Start answering launcher control messages.
    pub fn spawn_launcher(&self, working_dir: PathBuf) -> JoinHandle<LauncherExit> {
        let controller = LauncherController::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.character),
            working_dir,
        );
        let queue = Arc::clone(&self.control);
        tokio::task::spawn_blocking(move || controller.run(&queue))
    }

    /// Ask the launcher for the loaded character and make it the active one.
    ///
    /// Must finish before [`Bridge::spawn_launcher`]; both read the control
    /// queue.
    pub async fn query_character(&self, timeout: Duration) -> anyhow::Result<String> {
        let transport = Arc::clone(&self.transport);
        let queue = Arc::clone(&self.control);
        let name = tokio::task::spawn_blocking(move || {
            launcher::query_character(transport.as_ref(), &queue, timeout)
        })
        .await??;
        self.character.set(name.clone());
        Ok(name)
    }

    /// Close both queues. Already queued messages are still delivered.
    pub fn close(&self) {
        self.messages.close();
        self.control.close();
    }
}
