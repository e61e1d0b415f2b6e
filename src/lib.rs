//! Feed content sniffing for browser navigations.
//!
//! Classifies an in-flight HTTP response as an RSS/Atom/RDF feed so the
//! navigation can be redirected to a feed preview instead of showing raw XML.
//!
//! - [`sniff`] - header classification, body accumulation, decoding, prolog
//!   matching and root-tag classification (pure, synchronous)
//! - [`engine`] - per-request event handling and dispatch of cancel/navigate
//! - [`probe`] - running live URLs and local bodies through the engine
//! - [`config`] - optional TOML configuration
//! - [`util`] - preview URL helpers

pub mod config;
pub mod engine;
pub mod probe;
pub mod sniff;
pub mod util;
