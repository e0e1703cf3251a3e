//! Per-client connection: framed line I/O over the TCP stream.

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use pokerd_shared::{codec, Message, PlayerId};

/// Outcome of reading one line from a client.
#[derive(Debug)]
pub enum Received {
    /// A well-formed protocol message.
    Message(Message),
    /// A line arrived but did not parse; the client should be told and
    /// re-solicited rather than dropped.
    Invalid(String),
}

/// One connected player agent. The socket is split so the session can keep
/// broadcasting while a read is pending elsewhere; closing happens exactly
/// once, when the connection is dropped.
pub struct Connection {
    pub id: PlayerId,
    pub addr: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    pub fn new(id: PlayerId, addr: SocketAddr, stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Connection {
            id,
            addr,
            reader: BufReader::new(read),
            writer: write,
        }
    }

    /// Send one framed message. A failed write means the client is gone.
    pub async fn send(&mut self, msg: &Message) -> Result<()> {
        let mut line = codec::encode(msg).context("encoding message")?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("writing to player {}", self.id))?;
        Ok(())
    }

    /// Receive the next protocol message. Empty lines and frames with
    /// unknown type codes are skipped (the latter with a warning); malformed
    /// lines surface as [`Received::Invalid`]. Err means the transport
    /// failed or the peer closed.
    pub async fn recv(&mut self) -> Result<Received> {
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .with_context(|| format!("reading from player {}", self.id))?;
            if n == 0 {
                bail!("connection closed by player {}", self.id);
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match codec::decode(line) {
                Ok(Some(msg)) => return Ok(Received::Message(msg)),
                Ok(None) => {
                    tracing::warn!(player = %self.id, "ignoring message with unknown type");
                    continue;
                }
                Err(err) => return Ok(Received::Invalid(err.to_string())),
            }
        }
    }

    /// Discard whatever complete lines are already buffered, e.g. an answer
    /// that arrived after its turn timed out.
    pub async fn drain(&mut self) {
        loop {
            match tokio::time::timeout(Duration::from_millis(5), self.recv()).await {
                Ok(Ok(_)) => continue,
                Ok(Err(_)) | Err(_) => break,
            }
        }
    }
}
