//! Token streaming
//!
//! Streaming generation arrives as newline-delimited JSON. Byte chunks do
//! not line up with records, so [`NdjsonDecoder`] buffers partial lines
//! (and with them partial UTF-8 sequences) until the newline arrives.

use async_stream::stream;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::warn;

use crate::error::{RagError, RagResult};

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
}

/// Incremental decoder for newline-delimited generation records
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    pending: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte chunk, returning the fragments of every line it
    /// completed. Malformed lines are logged and skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(fragment) = decode_line(&line[..pos]) {
                fragments.push(fragment);
            }
        }
        fragments
    }

    /// Decode whatever is left after the last newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode_line(&rest)
    }
}

fn decode_line(line: &[u8]) -> Option<String> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            warn!(error = %e, "Skipping stream line with invalid UTF-8");
            return None;
        }
    };

    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateChunk>(text) {
        Ok(chunk) => chunk.response.filter(|r| !r.is_empty()),
        Err(e) => {
            warn!(error = %e, line = %text, "Skipping malformed stream line");
            None
        }
    }
}

/// Decode a body byte stream into a [`TokenStream`].
///
/// A transport error is yielded once as [`RagError::Generation`] and ends
/// the stream.
pub fn decode_ndjson<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: fmt::Display + Send,
{
    TokenStream::new(stream! {
        let mut decoder = NdjsonDecoder::new();

        for await chunk in body {
            match chunk {
                Ok(bytes) => {
                    for fragment in decoder.push(bytes.as_ref()) {
                        yield Ok(fragment);
                    }
                }
                Err(e) => {
                    yield Err(RagError::Generation(format!("stream interrupted: {}", e)));
                    return;
                }
            }
        }

        if let Some(fragment) = decoder.finish() {
            yield Ok(fragment);
        }
    })
}

/// Finite, single-use sequence of generated text fragments.
///
/// Pull with [`TokenStream::next_fragment`] or as a [`Stream`].
/// [`TokenStream::close`] drops the underlying source (and with it any
/// open HTTP body); a closed stream yields nothing further.
pub struct TokenStream {
    inner: Option<BoxStream<'static, RagResult<String>>>,
}

impl TokenStream {
    pub fn new<S>(source: S) -> Self
    where
        S: Stream<Item = RagResult<String>> + Send + 'static,
    {
        Self {
            inner: Some(source.boxed()),
        }
    }

    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(fragments.into_iter().map(Ok)))
    }

    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub async fn next_fragment(&mut self) -> Option<RagResult<String>> {
        self.next().await
    }

    /// Drain the stream into one string, stopping at the first error
    pub async fn collect_text(mut self) -> RagResult<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    pub fn close(&mut self) {
        self.inner = None;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for TokenStream {
    type Item = RagResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl fmt::Debug for TokenStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        futures::stream::iter(parts.into_iter().map(Ok))
    }

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.push(br#"{"response":"Hel"#).is_empty());
        assert_eq!(decoder.push(b"lo\"}\n{\"response\":\" world\"}\n"), vec!["Hello", " world"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_decoder_buffers_partial_utf8() {
        let line = "{\"response\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xc3).unwrap() + 1;

        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec!["caf\u{e9}"]);
    }

    #[test]
    fn test_decoder_skips_malformed_and_empty() {
        let mut decoder = NdjsonDecoder::new();
        let fragments = decoder.push(
            b"{\"response\":\"a\"}\n\nnot json\n{\"response\":\"\"}\n{\"done\":true}\n{\"response\":\"b\"}\n",
        );
        assert_eq!(fragments, vec!["a", "b"]);
    }

    #[test]
    fn test_decoder_flushes_trailing_line() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(br#"{"response":"tail"}"#).is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
    }

    #[tokio::test]
    async fn test_decode_ndjson_matches_buffered_concatenation() {
        let body = b"{\"response\":\"The sky\"}\n{bad}\n{\"response\":\" is blue\"}\n{\"response\":\".\",\"done\":true}";
        let expected = "The sky is blue.";

        for split in 1..body.len() {
            let stream = decode_ndjson(chunks(vec![body[..split].to_vec(), body[split..].to_vec()]));
            assert_eq!(stream.collect_text().await.unwrap(), expected, "split at {split}");
        }
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let body = futures::stream::iter(vec![
            Ok(b"{\"response\":\"partial\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"{\"response\":\"never\"}\n".to_vec()),
        ]);

        let mut stream = decode_ndjson(body);
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "partial");
        assert!(matches!(
            stream.next_fragment().await,
            Some(Err(RagError::Generation(_)))
        ));
        assert!(stream.next_fragment().await.is_none());
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn test_close_stops_enumeration() {
        let mut stream = TokenStream::from_fragments(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stream.next_fragment().await.unwrap().unwrap(), "a");

        stream.close();
        assert!(stream.next_fragment().await.is_none());
    }
}
