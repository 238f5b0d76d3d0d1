//! Launcher control protocol.
//!
//! The animation runtime's launcher answers two questions over VHMsg:
//! which character is loaded (`launcher requestChar` → `launcher char
//! <name>`) and where the runtime lives (`launcher requestPath` → `launcher
//! path <dir>`). When the renderer exits (`vrProcEnd renderer`) every
//! component is told to stop with `vrKillComponent all`.
//!
//! Control traffic has its own [`BlockingQueue`], separate from the PSI relay
//! queue.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Error, Result, TransportError};
use crate::queue::BlockingQueue;
use crate::transport::{RawMessage, Transport};

pub const REQUEST_CHARACTER: &str = "launcher requestChar";
pub const REQUEST_PATH: &str = "launcher requestPath";
pub const RENDERER_ENDED: &str = "vrProcEnd renderer";
pub const KILL_ALL: &str = "vrKillComponent all";

/// A decoded control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    RequestCharacter,
    RequestPath,
    CharacterReply(String),
    PathReply(String),
    RendererEnded,
    Other,
}

impl ControlEvent {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some("launcher"), Some("requestChar"), _) => Self::RequestCharacter,
            (Some("launcher"), Some("requestPath"), _) => Self::RequestPath,
            (Some("launcher"), Some("char"), Some(name)) => Self::CharacterReply(name.to_string()),
            (Some("launcher"), Some("path"), Some(path)) => Self::PathReply(path.to_string()),
            (Some("vrProcEnd"), Some("renderer"), _) => Self::RendererEnded,
            _ => Self::Other,
        }
    }
}

/// The character currently addressed by outbound messages.
#[derive(Debug)]
pub struct ActiveCharacter(RwLock<String>);

impl ActiveCharacter {
    pub fn new(name: impl Into<String>) -> Self {
        Self(RwLock::new(name.into()))
    }

    pub fn get(&self) -> String {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, name: impl Into<String>) {
        let name = name.into();
        info!(character = %name, "Active character changed");
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = name;
    }
}

/// Why a [`LauncherController`] loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherExit {
    /// `vrProcEnd renderer` was received and the kill broadcast sent.
    RendererEnded,
    /// The control queue was closed.
    QueueClosed,
}

/// Answers launcher queries on behalf of the running character.
pub struct LauncherController {
    transport: Arc<dyn Transport>,
    character: Arc<ActiveCharacter>,
    working_dir: PathBuf,
}

impl LauncherController {
    pub fn new(
        transport: Arc<dyn Transport>,
        character: Arc<ActiveCharacter>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            transport,
            character,
            working_dir,
        }
    }

    /// React to one control event. Returns `true` when the loop should stop.
    pub fn handle(&self, event: &ControlEvent) -> std::result::Result<bool, TransportError> {
        match event {
            ControlEvent::RequestCharacter => {
                let name = self.character.get();
                info!(character = %name, "Answering character request");
                self.transport.send(&format!("launcher char {name}"))?;
            }
            ControlEvent::RequestPath => {
                info!(path = %self.working_dir.display(), "Answering path request");
                self.transport
                    .send(&format!("launcher path {}", self.working_dir.display()))?;
            }
            ControlEvent::RendererEnded => {
                info!("Renderer ended, stopping all components");
                self.transport.send(KILL_ALL)?;
                return Ok(true);
            }
            ControlEvent::CharacterReply(_) | ControlEvent::PathReply(_) | ControlEvent::Other => {
                debug!(?event, "Ignoring control event");
            }
        }
        Ok(false)
    }

    /// Serve control events until the renderer ends or the queue closes.
    /// A failed reply is logged and the loop carries on.
    pub fn run(&self, queue: &BlockingQueue<RawMessage>) -> LauncherExit {
        while let Some(raw) = queue.blocking_pop() {
            let Some(text) = raw.as_text() else {
                debug!(topic = %raw.topic, "Ignoring binary control message");
                continue;
            };
            let event = ControlEvent::parse(text);
            match self.handle(&event) {
                Ok(true) => return LauncherExit::RendererEnded,
                Ok(false) => {}
                Err(e) => warn!(?event, error = %e, "Failed to answer control event"),
            }
        }
        info!("Control queue closed, launcher controller stopping");
        LauncherExit::QueueClosed
    }
}

/// Ask the launcher which character is loaded.
///
/// Sends `launcher requestChar` and waits up to `timeout` for a `launcher
/// char` reply on `queue`. Unrelated control traffic is discarded.
pub fn query_character(
    transport: &dyn Transport,
    queue: &BlockingQueue<RawMessage>,
    timeout: Duration,
) -> Result<String> {
    transport.send(REQUEST_CHARACTER)?;
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining =
            deadline.map_or(Duration::MAX, |d| d.saturating_duration_since(Instant::now()));
        let Some(raw) = queue.pop_timeout(remaining) else {
            warn!(?timeout, "No launcher reply for character request");
            return Err(Error::Timeout("launcher char reply"));
        };
        match raw.as_text().map(ControlEvent::parse) {
            Some(ControlEvent::CharacterReply(name)) => {
                info!(character = %name, "Launcher reported character");
                return Ok(name);
            }
            other => debug!(?other, "Discarding control message while waiting for character"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::thread;

    use super::*;
    use crate::transport::MemoryTransport;

    fn controller(transport: &Arc<MemoryTransport>, name: &str) -> LauncherController {
        LauncherController::new(
            Arc::clone(transport) as Arc<dyn Transport>,
            Arc::new(ActiveCharacter::new(name)),
            PathBuf::from("/opt/vhtoolkit"),
        )
    }

    #[test]
    fn parse_control_events() {
        assert_eq!(
            ControlEvent::parse("launcher requestChar"),
            ControlEvent::RequestCharacter
        );
        assert_eq!(
            ControlEvent::parse("launcher requestPath"),
            ControlEvent::RequestPath
        );
        assert_eq!(
            ControlEvent::parse("launcher char Rachel"),
            ControlEvent::CharacterReply("Rachel".into())
        );
        assert_eq!(
            ControlEvent::parse("launcher path C:\\vhtoolkit"),
            ControlEvent::PathReply("C:\\vhtoolkit".into())
        );
        assert_eq!(
            ControlEvent::parse("vrProcEnd renderer"),
            ControlEvent::RendererEnded
        );
        assert_eq!(ControlEvent::parse("launcher char"), ControlEvent::Other);
        assert_eq!(ControlEvent::parse("vrAllCall"), ControlEvent::Other);
    }

    #[test]
    fn controller_answers_and_stops_on_renderer_end() {
        let transport = Arc::new(MemoryTransport::new());
        let controller = controller(&transport, "Brad");
        let queue = BlockingQueue::new();
        for line in [
            "launcher requestChar",
            "vrAllCall",
            "launcher requestPath",
            "vrProcEnd renderer",
            "launcher requestChar",
        ] {
            queue.push(RawMessage::text("launcher", line)).unwrap();
        }

        assert_eq!(controller.run(&queue), LauncherExit::RendererEnded);
        assert_eq!(
            transport.sent(),
            vec![
                "launcher char Brad",
                "launcher path /opt/vhtoolkit",
                "vrKillComponent all",
            ]
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn controller_stops_when_queue_closes() {
        let transport = Arc::new(MemoryTransport::new());
        let controller = controller(&transport, "Brad");
        let queue = BlockingQueue::new();
        queue.close();
        assert_eq!(controller.run(&queue), LauncherExit::QueueClosed);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn controller_survives_transport_failure() {
        let transport = Arc::new(MemoryTransport::new());
        transport.close();
        let controller = controller(&transport, "Brad");
        let queue = BlockingQueue::new();
        queue.push(RawMessage::text("launcher", "launcher requestChar")).unwrap();
        queue.push(RawMessage::text("launcher", "vrProcEnd renderer")).unwrap();
        queue.close();

        // The kill broadcast fails too, so the loop drains to the end.
        assert_eq!(controller.run(&queue), LauncherExit::QueueClosed);
    }

    #[test]
    fn controller_reports_updated_character() {
        let transport = Arc::new(MemoryTransport::new());
        let character = Arc::new(ActiveCharacter::new("Brad"));
        let controller = LauncherController::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&character),
            PathBuf::from("."),
        );
        character.set("Rachel");
        controller.handle(&ControlEvent::RequestCharacter).unwrap();
        assert_eq!(transport.sent(), vec!["launcher char Rachel"]);
    }

    #[test]
    fn query_character_skips_unrelated_messages() {
        let transport = MemoryTransport::new();
        let queue = Arc::new(BlockingQueue::new());
        let replier = {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                q.push(RawMessage::text("launcher", "launcher path /x")).unwrap();
                q.push(RawMessage::text("launcher", "launcher char Rachel")).unwrap();
            })
        };

        let name = query_character(&transport, &queue, Duration::from_secs(5)).unwrap();
        replier.join().unwrap();

        assert_eq!(name, "Rachel");
        assert_eq!(transport.sent(), vec![REQUEST_CHARACTER]);
    }

    #[test]
    fn query_character_accepts_unbounded_timeout() {
        let transport = MemoryTransport::new();
        let queue = BlockingQueue::new();
        queue.push(RawMessage::text("launcher", "launcher char Brad")).unwrap();
        let name = query_character(&transport, &queue, Duration::MAX).unwrap();
        assert_eq!(name, "Brad");
    }

    #[test]
    fn query_character_times_out() {
        let transport = MemoryTransport::new();
        let queue = BlockingQueue::new();
        queue.push(RawMessage::text("launcher", "vrAllCall")).unwrap();
        let err = query_character(&transport, &queue, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[test]
    fn query_character_fails_on_closed_transport() {
        let transport = MemoryTransport::new();
        transport.close();
        let queue = BlockingQueue::new();
        let err = query_character(&transport, &queue, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Closed)));
    }
}
