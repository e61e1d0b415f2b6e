//! Utility functions for common operations.
//!
//! - **Preview URLs**: building the `?preview=` redirect target for a feed
//!   navigation and reading the original URL back out of it
//!
//! # Examples
//!
//! ```
//! use feed_sniff::util::{preview_target, preview_url};
//!
//! let url = preview_url("about:feed-preview", "https://example.com/rss");
//! assert_eq!(preview_target(&url).as_deref(), Some("https://example.com/rss"));
//! ```

mod preview;

pub use preview::{is_preview_url, preview_target, preview_url};
