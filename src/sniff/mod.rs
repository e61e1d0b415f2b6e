//! Feed content sniffing for in-flight HTTP responses.
//!
//! Decides whether a response is an RSS/Atom/RDF feed from its headers and,
//! when the headers are inconclusive, from a bounded prefix of its body:
//!
//! - **Headers**: [`classify_headers`] sorts a response into known feed,
//!   maybe feed, or skip
//! - **Accumulation**: [`StreamBudgetAccumulator`] watches body chunks and
//!   fires exactly once, at [`SNIFF_BUDGET`] bytes or at end of stream
//! - **Decoding**: [`decode_chunks`] turns the buffered bytes into text with
//!   the declared charset, strictly
//! - **Prolog**: [`root_element_name`] matches the XML prolog and extracts
//!   the root tag
//! - **Verdict**: [`is_feed_root`] and [`sniff_body`] map the root tag to a
//!   feed / not-a-feed decision
//!
//! Every function here is pure and synchronous. Side effects (cancelling a
//! request, navigating a tab) belong to [`crate::engine`].

mod accumulator;
mod classify;
mod decoder;
mod headers;
mod prolog;

pub use accumulator::{ChunkSink, FireReason, SniffTrigger, StreamBudgetAccumulator};
pub use classify::{is_feed_root, sniff_body};
pub use decoder::{decode_chunks, DecodeError};
pub use headers::{classify_headers, parse_content_type, ContentType, HeaderVerdict};
pub use prolog::{match_prolog, root_element_name};

/// Maximum number of body bytes inspected before a decision is made.
pub const SNIFF_BUDGET: usize = 512;

/// Media types that are feeds without looking at the body.
pub const KNOWN_FEED_MIME_TYPES: [&str; 2] = ["application/atom+xml", "application/rss+xml"];

/// Media types whose body must be sniffed. Any `*/*+xml` type is sniffed too.
pub const MAYBE_FEED_MIME_TYPES: [&str; 3] = ["application/xml", "text/html", "text/xml"];

/// Root element names that identify a feed document.
pub const FEED_ROOT_TAGS: [&str; 3] = ["rss", "feed", "rdf:RDF"];

/// Namespace that an `rdf:RDF` root must mention to count as RSS 1.0.
pub const RSS1_NAMESPACE: &str = "http://purl.org/rss/1.0/";

/// RDF syntax namespace that an `rdf:RDF` root must mention.
pub const RDF_SYNTAX_NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// Fallback media type for responses without a usable `Content-Type`.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Fallback charset label for responses without a `charset` parameter.
pub const DEFAULT_ENCODING: &str = "utf-8";
