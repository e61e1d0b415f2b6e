//! Per-request sniffing with side effects.
//!
//! [`SniffEngine`] is created once per process and shared between requests.
//! Each response gets its own [`RequestSniffer`]; nothing mutable is shared
//! between them. Side effects go through a [`Dispatcher`], either a direct
//! implementation or [`ChannelDispatcher`] which forwards them as messages.
//!
//! The two feed paths act differently on purpose:
//!
//! - **Known feed** (feed media type): the request is cancelled before any
//!   body byte reaches the page, then the tab navigates to the preview.
//! - **Sniffed feed**: the body has been flowing to the page all along, so
//!   the only action left is the navigation, which replaces whatever the
//!   page has rendered so far.

use std::fmt::Display;
use std::pin::pin;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::sniff::{
    classify_headers, sniff_body, ChunkSink, HeaderVerdict, SniffTrigger,
    StreamBudgetAccumulator,
};
use crate::util::{is_preview_url, preview_url};

/// Correlates header, body and dispatch events of one request.
pub type RequestId = u64;

/// What kind of load a response belongs to. Only top-level navigations are sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Other,
}

/// Response metadata available before the body arrives.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub request_id: RequestId,
    pub url: String,
    pub resource_type: ResourceType,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// A top-level navigation response.
    pub fn main_frame(request_id: RequestId, url: impl Into<String>) -> Self {
        Self {
            request_id,
            url: url.into(),
            resource_type: ResourceType::MainFrame,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A side effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchAction {
    /// Abort the in-flight request.
    Cancel { request_id: RequestId },
    /// Navigate the tab that owns the request.
    Navigate { request_id: RequestId, url: String },
}

/// Performs request cancellation and tab navigation on the engine's behalf.
///
/// Called synchronously from the body pipeline, so implementations must not
/// block.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, action: DispatchAction);

    /// Dispatches `actions` as one unit: either all of them or none.
    ///
    /// The default forwards them one by one, which is only all-or-nothing
    /// for implementations whose `dispatch` cannot fail.
    fn dispatch_all(&self, actions: Vec<DispatchAction>) {
        for action in actions {
            self.dispatch(action);
        }
    }
}

/// Forwards actions over a bounded channel without waiting.
///
/// A full or closed channel drops the action with a warning rather than
/// stalling the response stream.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::Sender<DispatchAction>,
}

impl ChannelDispatcher {
    pub fn new(tx: mpsc::Sender<DispatchAction>) -> Self {
        Self { tx }
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, action: DispatchAction) {
        if let Err(e) = self.tx.try_send(action) {
            tracing::warn!(error = %e, "Dispatch channel send failed, action dropped");
        }
    }

    /// Reserves a slot for every action before sending any of them.
    fn dispatch_all(&self, actions: Vec<DispatchAction>) {
        if actions.is_empty() {
            return;
        }
        match self.tx.try_reserve_many(actions.len()) {
            Ok(permits) => {
                for (permit, action) in permits.zip(actions) {
                    permit.send(action);
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    count = actions.len(),
                    "Dispatch channel has no room, actions dropped"
                );
            }
        }
    }
}

/// Keeps every action in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    actions: Mutex<Vec<DispatchAction>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions dispatched so far.
    pub fn actions(&self) -> Vec<DispatchAction> {
        self.actions
            .lock()
            .map(|actions| actions.clone())
            .unwrap_or_default()
    }
}

impl Dispatcher for RecordingDispatcher {
    fn dispatch(&self, action: DispatchAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }

    fn dispatch_all(&self, batch: Vec<DispatchAction>) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.extend(batch);
        }
    }
}

/// Result of the header stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderDecision {
    /// Feed media type: cancel and preview were dispatched.
    Redirected,
    /// The body must be sniffed.
    Sniff(SniffTicket),
    /// Nothing to do.
    Skip,
}

/// Everything the body stage needs to know about a candidate response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffTicket {
    pub request_id: RequestId,
    pub url: String,
    pub mime: String,
    pub encoding: String,
}

/// Final state of one response as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SniffOutcome {
    /// Feed media type; request cancelled, body never read.
    KnownFeed,
    /// Body sniffed as a feed; preview navigation dispatched.
    Feed,
    /// Body sniffed, not a feed.
    NotFeed,
    /// Not a candidate; body passed through untouched.
    Skipped,
    /// Body failed before a verdict could be made.
    Aborted,
}

impl SniffOutcome {
    fn from_verdict(is_feed: bool) -> Self {
        if is_feed {
            Self::Feed
        } else {
            Self::NotFeed
        }
    }
}

/// Shared, read-only sniffing configuration plus the dispatcher.
#[derive(Debug)]
pub struct SniffEngine<D> {
    dispatcher: Arc<D>,
    preview_path: Arc<str>,
}

impl<D> Clone for SniffEngine<D> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            preview_path: Arc::clone(&self.preview_path),
        }
    }
}

impl<D: Dispatcher> SniffEngine<D> {
    pub fn new(dispatcher: D, preview_path: &str) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            preview_path: Arc::from(preview_path),
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn preview_path(&self) -> &str {
        &self.preview_path
    }

    /// Header stage. Dispatches cancel + preview right away for a known feed.
    ///
    /// Only `http`/`https` main-frame responses are considered, and never the
    /// preview page itself.
    pub fn on_headers(&self, head: &ResponseHead) -> HeaderDecision {
        self.header_stage(head, true)
    }

    /// Header stage for a body that did not come from the network.
    ///
    /// Same as [`on_headers`](Self::on_headers) except that `head.url` may be
    /// any label, such as a file path.
    pub fn on_local_headers(&self, head: &ResponseHead) -> HeaderDecision {
        self.header_stage(head, false)
    }

    fn header_stage(&self, head: &ResponseHead, require_http: bool) -> HeaderDecision {
        if head.resource_type != ResourceType::MainFrame
            || is_preview_url(&head.url, &self.preview_path)
            || (require_http && !is_http_url(&head.url))
        {
            return HeaderDecision::Skip;
        }

        let verdict = classify_headers(
            head.headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );

        match verdict {
            HeaderVerdict::KnownFeed { mime } => {
                tracing::debug!(
                    request_id = head.request_id,
                    url = %head.url,
                    mime = %mime,
                    "Feed media type, cancelling request and redirecting to preview"
                );
                self.dispatcher.dispatch_all(vec![
                    DispatchAction::Cancel {
                        request_id: head.request_id,
                    },
                    DispatchAction::Navigate {
                        request_id: head.request_id,
                        url: preview_url(&self.preview_path, &head.url),
                    },
                ]);
                HeaderDecision::Redirected
            }
            HeaderVerdict::MaybeFeed { mime, encoding } => {
                tracing::debug!(
                    request_id = head.request_id,
                    mime = %mime,
                    encoding = %encoding,
                    "Possible feed, sniffing body"
                );
                HeaderDecision::Sniff(SniffTicket {
                    request_id: head.request_id,
                    url: head.url.clone(),
                    mime,
                    encoding,
                })
            }
            HeaderVerdict::Skip => HeaderDecision::Skip,
        }
    }

    /// Starts observing the body of a candidate response.
    pub fn observe<S: ChunkSink>(&self, ticket: SniffTicket, sink: S) -> RequestSniffer<S, D> {
        RequestSniffer {
            accumulator: StreamBudgetAccumulator::new(sink),
            ticket,
            engine: self.clone(),
        }
    }

    /// Runs one response end to end.
    ///
    /// Chunks from `body` are delivered to `sink` as they arrive, whether or
    /// not the response is being sniffed, until the stream ends or yields an
    /// error. A known feed is cancelled instead: `body` is dropped unread.
    pub async fn sniff_stream<St, E, S>(&self, head: &ResponseHead, body: St, sink: S) -> SniffOutcome
    where
        St: Stream<Item = Result<Bytes, E>>,
        E: Display,
        S: ChunkSink,
    {
        let decision = self.on_headers(head);
        self.drive(decision, head.request_id, body, sink).await
    }

    /// [`sniff_stream`](Self::sniff_stream) for a local body, using
    /// [`on_local_headers`](Self::on_local_headers).
    pub async fn sniff_local_stream<St, E, S>(
        &self,
        head: &ResponseHead,
        body: St,
        sink: S,
    ) -> SniffOutcome
    where
        St: Stream<Item = Result<Bytes, E>>,
        E: Display,
        S: ChunkSink,
    {
        let decision = self.on_local_headers(head);
        self.drive(decision, head.request_id, body, sink).await
    }

    async fn drive<St, E, S>(
        &self,
        decision: HeaderDecision,
        request_id: RequestId,
        body: St,
        sink: S,
    ) -> SniffOutcome
    where
        St: Stream<Item = Result<Bytes, E>>,
        E: Display,
        S: ChunkSink,
    {
        let mut body = pin!(body);

        let ticket = match decision {
            HeaderDecision::Redirected => return SniffOutcome::KnownFeed,
            HeaderDecision::Sniff(ticket) => ticket,
            HeaderDecision::Skip => {
                pass_through(body, sink).await;
                return SniffOutcome::Skipped;
            }
        };

        let mut sniffer = self.observe(ticket, sink);
        let mut verdict = None;

        while let Some(item) = body.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(is_feed) = sniffer.on_chunk(chunk) {
                        verdict = Some(is_feed);
                    }
                }
                Err(e) => {
                    tracing::debug!(request_id, error = %e, "Response body failed");
                    sniffer.on_abort();
                    return verdict.map_or(SniffOutcome::Aborted, SniffOutcome::from_verdict);
                }
            }
        }

        if let Some(is_feed) = sniffer.on_end() {
            verdict = Some(is_feed);
        }
        verdict.map_or(SniffOutcome::Aborted, SniffOutcome::from_verdict)
    }
}

fn is_http_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

async fn pass_through<St, E, S>(mut body: std::pin::Pin<&mut St>, mut sink: S)
where
    St: Stream<Item = Result<Bytes, E>>,
    S: ChunkSink,
{
    while let Some(item) = body.next().await {
        match item {
            Ok(chunk) => sink.write(chunk),
            Err(_) => return,
        }
    }
    sink.finish();
}

/// Body observer for one candidate response.
///
/// Each event method returns the verdict on the call that produced it and
/// `None` on every other call, so a verdict is reported at most once.
pub struct RequestSniffer<S, D> {
    accumulator: StreamBudgetAccumulator<S>,
    ticket: SniffTicket,
    engine: SniffEngine<D>,
}

impl<S: ChunkSink, D: Dispatcher> RequestSniffer<S, D> {
    pub fn on_chunk(&mut self, chunk: Bytes) -> Option<bool> {
        let trigger = self.accumulator.on_chunk(chunk)?;
        Some(self.classify(trigger))
    }

    pub fn on_end(&mut self) -> Option<bool> {
        let trigger = self.accumulator.on_end()?;
        Some(self.classify(trigger))
    }

    pub fn on_abort(&mut self) {
        if self.accumulator.is_observing() {
            tracing::trace!(request_id = self.ticket.request_id, "Sniffing aborted");
        }
        self.accumulator.on_abort();
    }

    pub fn ticket(&self) -> &SniffTicket {
        &self.ticket
    }

    pub fn into_sink(self) -> S {
        self.accumulator.into_sink()
    }

    fn classify(&self, trigger: SniffTrigger) -> bool {
        let request_id = self.ticket.request_id;
        tracing::trace!(
            request_id,
            reason = ?trigger.reason,
            bytes = trigger.len(),
            "Sniff triggered"
        );

        let is_feed = match sniff_body(&trigger.chunks, &self.ticket.encoding) {
            Ok(is_feed) => is_feed,
            Err(e) => {
                tracing::debug!(
                    request_id,
                    encoding = %self.ticket.encoding,
                    error = %e,
                    "Body not decodable, treating as not a feed"
                );
                false
            }
        };

        tracing::debug!(request_id, is_feed, "Body sniffed");
        if is_feed {
            self.engine.dispatcher.dispatch(DispatchAction::Navigate {
                request_id,
                url: preview_url(&self.engine.preview_path, &self.ticket.url),
            });
        }
        is_feed
    }
}
