//! Live source adapters.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::application::ports::{EventSource, RawRecord, SourceMessage};

/// Adapts any stream of [`SourceMessage`]s into an [`EventSource`].
///
/// An exhausted stream reports [`SourceMessage::EndOfStream`].
pub struct StreamSource<St> {
    stream: St,
    name: &'static str,
}

impl<St> std::fmt::Debug for StreamSource<St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<St> StreamSource<St>
where
    St: Stream<Item = SourceMessage> + Send + Unpin,
{
    /// Wrap `stream` under `name`.
    pub const fn new(name: &'static str, stream: St) -> Self {
        Self { stream, name }
    }
}

#[async_trait]
impl<St> EventSource for StreamSource<St>
where
    St: Stream<Item = SourceMessage> + Send + Unpin,
{
    async fn next_message(&mut self) -> SourceMessage {
        self.stream.next().await.unwrap_or(SourceMessage::EndOfStream)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Reads one JSON wire record per line from an async reader, such as stdin.
///
/// Blank lines are skipped. End of input reports
/// [`SourceMessage::EndOfStream`]; a read error reports
/// [`SourceMessage::Disconnected`].
pub struct LineSource<R> {
    lines: Lines<R>,
    name: &'static str,
}

impl<R> std::fmt::Debug for LineSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    /// Read records from `reader` under `name`.
    pub fn new(name: &'static str, reader: R) -> Self {
        Self {
            lines: reader.lines(),
            name,
        }
    }
}

#[async_trait]
impl<R> EventSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_message(&mut self) -> SourceMessage {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => return SourceMessage::Raw(RawRecord::Json(line)),
                Ok(None) => return SourceMessage::EndOfStream,
                Err(e) => {
                    return SourceMessage::Disconnected {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
