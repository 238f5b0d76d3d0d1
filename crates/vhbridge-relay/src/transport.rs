//! TCP JSON-lines transport.
//!
//! Each line on the socket is one JSON frame. Inbound frames carry a topic
//! and either text or raw bytes:
//!
//! ```text
//! {"topic": "PSI_VHT_Text", "text": "multimodal:false;%;identity:A;%;text:Hi"}
//! {"topic": "PSI_Raw", "bytes": [1, 2, 3]}
//! ```
//!
//! Outbound frames carry only the VHMsg text: `{"text": "..."}`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vhbridge_core::error::TransportError;
use vhbridge_core::relay::InboundSink;
use vhbridge_core::transport::{RawMessage, Transport};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FrameBody {
    Text { text: String },
    Bytes { bytes: Vec<u8> },
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    topic: String,
    #[serde(flatten)]
    body: FrameBody,
}

#[derive(Debug, Serialize)]
struct OutboundFrame<'a> {
    text: &'a str,
}

/// Decode one inbound line into a [`RawMessage`].
pub fn decode_frame(line: &str) -> Result<RawMessage, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(line)?;
    Ok(match frame.body {
        FrameBody::Text { text } => RawMessage::text(frame.topic, text),
        FrameBody::Bytes { bytes } => RawMessage::binary(frame.topic, bytes),
    })
}

/// Encode one outbound message as a newline-terminated frame.
pub fn encode_frame(text: &str) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(&OutboundFrame { text })?;
    line.push('\n');
    Ok(line)
}

/// Sending half. Cheap to call from any thread; the socket write happens on
/// a dedicated task.
#[derive(Debug)]
pub struct TcpTransport {
    outbound: mpsc::UnboundedSender<String>,
}

impl Transport for TcpTransport {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        let line = encode_frame(text).map_err(|e| TransportError::Io(e.into()))?;
        self.outbound
            .send(line)
            .map_err(|_| TransportError::Closed)
    }
}

/// Receiving half. Feeds decoded frames into an [`InboundSink`].
#[derive(Debug)]
pub struct InboundReader {
    reader: OwnedReadHalf,
}

impl InboundReader {
    /// Read frames until the peer hangs up, then close the sink so the
    /// consumer loops wind down. Returns the number of frames accepted.
    pub async fn run(self, sink: InboundSink) -> usize {
        let mut lines = BufReader::new(self.reader).lines();
        let mut accepted = 0;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_frame(&line) {
                        Ok(raw) => {
                            debug!(topic = %raw.topic, "Inbound frame");
                            sink.accept(raw);
                            accepted += 1;
                        }
                        Err(e) => warn!(error = %e, line = %line, "Dropping malformed frame"),
                    }
                }
                Ok(None) => {
                    info!(accepted, "Connection closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Connection read failed");
                    break;
                }
            }
        }
        sink.close();
        accepted
    }
}

/// Split a connected stream into its sending and receiving halves.
///
/// Spawns the writer task, so this must be called inside a tokio runtime.
pub fn split(stream: TcpStream) -> (Arc<TcpTransport>, InboundReader) {
    let (reader, writer) = stream.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(writer, rx));
    (Arc::new(TcpTransport { outbound: tx }), InboundReader { reader })
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(error = %e, "Connection write failed, dropping outbound channel");
            return;
        }
    }
    debug!("Outbound channel closed, writer stopping");
    let _ = writer.shutdown().await;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tokio::net::TcpListener;

    use vhbridge_core::BlockingQueue;
    use vhbridge_core::config::TopicConfig;
    use vhbridge_core::router::Payload;

    use super::*;

    #[test]
    fn decodes_text_and_binary_frames() {
        let raw = decode_frame(r#"{"topic":"PSI_VHT_Text","text":"hello"}"#).unwrap();
        assert_eq!(raw, RawMessage::text("PSI_VHT_Text", "hello"));

        let raw = decode_frame(r#"{"topic":"raw","bytes":[1,2,255]}"#).unwrap();
        assert_eq!(raw.payload, Payload::Binary(vec![1, 2, 255]));
    }

    #[test]
    fn rejects_frames_without_body() {
        assert!(decode_frame(r#"{"topic":"t"}"#).is_err());
        assert!(decode_frame(r#"{"text":"no topic"}"#).is_err());
        assert!(decode_frame("not json").is_err());
    }

    #[test]
    fn outbound_frame_is_one_line() {
        let line = encode_frame("sbm bml char Brad <gaze/>\nsecond").unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["text"], "sbm bml char Brad <gaze/>\nsecond");
    }

    #[tokio::test]
    async fn relays_frames_in_both_directions() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.split();
            let mut lines = BufReader::new(read).lines();
            let first = lines.next_line().await.unwrap().unwrap();
            write
                .write_all(b"{\"topic\":\"PSI_VHT_Text\",\"text\":\"hi\"}\n")
                .await
                .unwrap();
            write.write_all(b"garbage\n").await.unwrap();
            write
                .write_all(b"{\"topic\":\"launcher\",\"text\":\"launcher requestChar\"}\n")
                .await
                .unwrap();
            first
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (transport, reader) = split(stream);
        transport.send("vrAllCall").unwrap();

        let messages = Arc::new(BlockingQueue::new());
        let control = Arc::new(BlockingQueue::new());
        let sink = InboundSink::new(
            Arc::clone(&messages),
            Arc::clone(&control),
            TopicConfig::default(),
        );

        let first = peer.await.unwrap();
        assert_eq!(first, r#"{"text":"vrAllCall"}"#);

        let accepted = reader.run(sink).await;
        assert_eq!(accepted, 2);
        assert_eq!(
            messages.try_pop(),
            Some(RawMessage::text("PSI_VHT_Text", "hi"))
        );
        assert_eq!(
            control.try_pop(),
            Some(RawMessage::text("launcher", "launcher requestChar"))
        );
        assert!(messages.is_closed());
        assert!(control.is_closed());
    }

    #[test]
    fn send_fails_once_writer_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let transport = TcpTransport { outbound: tx };
        assert!(matches!(
            transport.send("vrAllCall"),
            Err(TransportError::Closed)
        ));
    }
}
