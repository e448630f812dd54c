//! Length-framed TCP transport.
//!
//! TCP is a byte stream, so each frame is wrapped in a small envelope that
//! restores message boundaries:
//!
//! ```text
//! +0  Kind    (1 byte: 0x01 text, 0x02 binary, 0x08 close)
//! +1  Length  (4 bytes LE32)
//! +5  Payload (close: LE16 code + UTF-8 reason)
//! ```

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::constants::{CLOSE_NORMAL, MAX_TRANSPORT_FRAME};

use super::error::TransportError;
use super::frame::{CloseReason, Frame, TransportEvent};
use super::{ConnectFuture, Connector, Link};

const KIND_TEXT: u8 = 0x01;
const KIND_BINARY: u8 = 0x02;
const KIND_CLOSE: u8 = 0x08;
const ENVELOPE_SIZE: usize = 5;

/// Dials `host:port` (optionally prefixed with `tcp://`).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    max_frame_size: usize,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpConnector {
    /// Create a connector with the default frame limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_TRANSPORT_FRAME,
        }
    }

    /// Override the largest inbound frame accepted.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

fn parse_endpoint(endpoint: &str) -> Result<&str, TransportError> {
    let addr = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    if addr.is_empty() || !addr.contains(':') {
        return Err(TransportError::InvalidEndpoint(endpoint.to_string()));
    }
    Ok(addr)
}

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &str) -> ConnectFuture<'_> {
        let endpoint = endpoint.to_string();
        let max_frame_size = self.max_frame_size;
        Box::pin(async move {
            let addr = parse_endpoint(&endpoint)?;
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            debug!(%endpoint, "tcp link established");

            let (read_half, write_half) = stream.into_split();
            let (sender, outbound) = mpsc::unbounded_channel();
            let (events_tx, events) = mpsc::unbounded_channel();
            tokio::spawn(write_loop(write_half, outbound));
            tokio::spawn(read_loop(read_half, events_tx, max_frame_size));
            Ok(Link { sender, events })
        })
    }
}

/// Write one enveloped frame.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let close_body;
    let (kind, body): (u8, &[u8]) = match frame {
        Frame::Text(text) => (KIND_TEXT, text.as_bytes()),
        Frame::Binary(bytes) => (KIND_BINARY, bytes.as_slice()),
        Frame::Close(reason) => {
            let mut body = reason.code.to_le_bytes().to_vec();
            body.extend_from_slice(reason.reason.as_bytes());
            close_body = body;
            (KIND_CLOSE, close_body.as_slice())
        }
    };

    let mut envelope = [0u8; ENVELOPE_SIZE];
    envelope[0] = kind;
    envelope[1..].copy_from_slice(&(body.len() as u32).to_le_bytes());
    writer.write_all(&envelope).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Read one enveloped frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Frame>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut envelope = [0u8; ENVELOPE_SIZE];
    match reader.read_exact(&mut envelope).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes([envelope[1], envelope[2], envelope[3], envelope[4]]) as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;

    match envelope[0] {
        KIND_BINARY => Ok(Some(Frame::Binary(body))),
        KIND_TEXT => String::from_utf8(body)
            .map(|text| Some(Frame::Text(text)))
            .map_err(|_| TransportError::InvalidText),
        KIND_CLOSE => {
            let reason = match body.as_slice() {
                [lo, hi, rest @ ..] => CloseReason::new(
                    u16::from_le_bytes([*lo, *hi]),
                    String::from_utf8_lossy(rest),
                ),
                _ => CloseReason::new(CLOSE_NORMAL, ""),
            };
            Ok(Some(Frame::Close(reason)))
        }
        other => Err(TransportError::UnknownFrameKind(other)),
    }
}

async fn write_loop(mut writer: OwnedWriteHalf, mut outbound: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = outbound.recv().await {
        let closing = matches!(frame, Frame::Close(_));
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!(error = %e, "tcp write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<TransportEvent>,
    max_frame_size: usize,
) {
    loop {
        match read_frame(&mut reader, max_frame_size).await {
            Ok(Some(Frame::Close(reason))) => {
                let _ = events.send(TransportEvent::Closed(reason));
                return;
            }
            Ok(Some(frame)) => {
                if events.send(TransportEvent::Frame(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => {
                let _ = events.send(TransportEvent::Closed(CloseReason::abnormal()));
                return;
            }
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "tcp link failed");
                let _ = events.send(TransportEvent::Error(e));
                let _ = events.send(TransportEvent::Closed(CloseReason::abnormal()));
                return;
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed tcp frame");
                let _ = events.send(TransportEvent::Error(e));
            }
        }
    }
}
