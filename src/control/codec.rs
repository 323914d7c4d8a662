use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::warn;

use super::ControlMessage;
use crate::error::BotfleetError;

/// Serializes a message as one newline-terminated JSON line.
pub fn encode_line(message: &ControlMessage) -> Result<String, BotfleetError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line(line: &str) -> Result<ControlMessage, BotfleetError> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Reads control messages from a line-oriented stream.
pub struct ControlReader<R> {
    lines: Lines<R>,
}

impl<R> ControlReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Next well-formed message; blank and undecodable lines are skipped. `Ok(None)` on EOF.
    pub async fn next_message(&mut self) -> Result<Option<ControlMessage>, BotfleetError> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match decode_line(&line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    warn!(error = %e, line = %line, "Discarding undecodable control line");
                }
            }
        }
        Ok(None)
    }
}

/// Writes control messages to a byte sink, flushing after each one.
pub struct ControlWriter<W> {
    writer: W,
}

impl<W> ControlWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send(&mut self, message: &ControlMessage) -> Result<(), BotfleetError> {
        let line = encode_line(message)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
