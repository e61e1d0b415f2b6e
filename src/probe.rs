//! Running real responses through the engine.
//!
//! [`probe_url`] fetches a URL and streams its body through a
//! [`SniffEngine`] the way a browser navigation would; [`probe_bytes`] does
//! the same for a body already in memory. Both record what the engine would
//! have dispatched instead of acting on it.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::engine::{
    DispatchAction, RecordingDispatcher, RequestId, ResponseHead, SniffEngine, SniffOutcome,
};
use crate::sniff::{classify_headers, ChunkSink, HeaderVerdict};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Errors that can occur while probing a URL.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The URL is not an absolute http(s) URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request or body exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
}

/// What the engine decided for one probed response.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// Final URL (after redirects) or file path
    pub source: String,
    /// HTTP status, when the body came from the network
    pub status: Option<u16>,
    /// Media type from `Content-Type`, when it made the response a candidate
    pub mime: Option<String>,
    pub outcome: SniffOutcome,
    /// Actions the engine dispatched, in order
    pub actions: Vec<DispatchAction>,
    /// Bytes that reached the page
    pub delivered_bytes: usize,
}

/// Page stand-in that only counts what it receives.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub bytes: usize,
    pub finished: bool,
}

impl ChunkSink for CountingSink {
    fn write(&mut self, chunk: Bytes) {
        self.bytes += chunk.len();
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

/// Fetches `url` and runs the response through the engine.
///
/// # Errors
///
/// - [`ProbeError::InvalidUrl`] - not an absolute http(s) URL
/// - [`ProbeError::Network`] - connection or TLS errors
/// - [`ProbeError::HttpStatus`] - non-2xx response
/// - [`ProbeError::Timeout`] - headers or body took longer than `timeout`
pub async fn probe_url(
    client: &reqwest::Client,
    url: &str,
    preview_path: &str,
    timeout: Duration,
) -> Result<ProbeReport, ProbeError> {
    let parsed = url::Url::parse(url).map_err(|e| ProbeError::InvalidUrl(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProbeError::InvalidUrl(format!(
            "unsupported scheme: {}",
            parsed.scheme()
        )));
    }

    let response = tokio::time::timeout(timeout, client.get(parsed).send())
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(ProbeError::Network)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::HttpStatus(status.as_u16()));
    }

    let mut head = ResponseHead::main_frame(next_request_id(), response.url().as_str());
    for (name, value) in response.headers() {
        match value.to_str() {
            Ok(value) => head.headers.push((name.as_str().to_owned(), value.to_owned())),
            Err(_) => {
                tracing::debug!(header = %name, "Skipping non-ASCII header value");
            }
        }
    }

    let engine = SniffEngine::new(RecordingDispatcher::new(), preview_path);
    let mime = candidate_mime(&head);
    let mut sink = CountingSink::default();

    let outcome = tokio::time::timeout(
        timeout,
        engine.sniff_stream(&head, response.bytes_stream(), &mut sink),
    )
    .await
    .map_err(|_| ProbeError::Timeout)?;

    tracing::info!(
        url = %head.url,
        outcome = ?outcome,
        delivered = sink.bytes,
        "Probe finished"
    );

    Ok(ProbeReport {
        source: head.url,
        status: Some(status.as_u16()),
        mime,
        outcome,
        actions: engine.dispatcher().actions(),
        delivered_bytes: sink.bytes,
    })
}

/// Runs an in-memory body through the engine in `chunk_size` pieces.
///
/// `source` only labels the report and the preview URL; it is not checked
/// for an http(s) scheme, so local files can be sniffed too. A known feed
/// type yields [`SniffOutcome::KnownFeed`] without reading `body`.
pub async fn probe_bytes(
    source: &str,
    content_type: &str,
    body: &[u8],
    chunk_size: usize,
    preview_path: &str,
) -> ProbeReport {
    let head = ResponseHead::main_frame(next_request_id(), source)
        .with_header("Content-Type", content_type);
    let engine = SniffEngine::new(RecordingDispatcher::new(), preview_path);
    let mime = candidate_mime(&head);
    let mut sink = CountingSink::default();

    let chunks = body
        .chunks(chunk_size.max(1))
        .map(|chunk| Ok::<_, Infallible>(Bytes::copy_from_slice(chunk)));
    let outcome = engine
        .sniff_local_stream(&head, futures::stream::iter(chunks), &mut sink)
        .await;

    tracing::debug!(
        source,
        outcome = ?outcome,
        delivered = sink.bytes,
        "Local probe finished"
    );

    ProbeReport {
        source: head.url,
        status: None,
        mime,
        outcome,
        actions: engine.dispatcher().actions(),
        delivered_bytes: sink.bytes,
    }
}

fn candidate_mime(head: &ResponseHead) -> Option<String> {
    let verdict = classify_headers(
        head.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str())),
    );
    match verdict {
        HeaderVerdict::KnownFeed { mime } | HeaderVerdict::MaybeFeed { mime, .. } => Some(mime),
        HeaderVerdict::Skip => None,
    }
}
