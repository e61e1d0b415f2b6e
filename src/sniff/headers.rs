use super::{DEFAULT_ENCODING, DEFAULT_MIME_TYPE, KNOWN_FEED_MIME_TYPES, MAYBE_FEED_MIME_TYPES};

/// Media type and charset label taken from a `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`
    pub mime: String,
    /// Charset label as sent by the server, or `utf-8`
    pub encoding: String,
}

impl Default for ContentType {
    fn default() -> Self {
        Self {
            mime: DEFAULT_MIME_TYPE.to_owned(),
            encoding: DEFAULT_ENCODING.to_owned(),
        }
    }
}

/// Outcome of looking at a response's headers alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderVerdict {
    /// Served with a feed media type; the body is never inspected.
    KnownFeed { mime: String },
    /// Could be a feed; the body prefix must be sniffed.
    MaybeFeed { mime: String, encoding: String },
    /// Not a feed candidate.
    Skip,
}

/// Classifies a response from its header name/value pairs.
///
/// Header names are matched case-insensitively. When several `Content-Type`
/// headers are present the last one wins. Never fails: a missing or garbled
/// `Content-Type` degrades to `application/octet-stream`, which is skipped.
///
/// # Examples
///
/// ```
/// use feed_sniff::sniff::{classify_headers, HeaderVerdict};
///
/// let verdict = classify_headers([("content-type", "application/rss+xml")]);
/// assert!(matches!(verdict, HeaderVerdict::KnownFeed { .. }));
///
/// let verdict = classify_headers([("Content-Type", " Text/XML ; CHARSET = iso-8859-1 ")]);
/// assert_eq!(
///     verdict,
///     HeaderVerdict::MaybeFeed { mime: "text/xml".into(), encoding: "iso-8859-1".into() }
/// );
/// ```
pub fn classify_headers<'a, I>(headers: I) -> HeaderVerdict
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let content_type = headers
        .into_iter()
        .filter(|(name, _)| name.trim().eq_ignore_ascii_case("content-type"))
        .last()
        .map(|(_, value)| parse_content_type(value))
        .unwrap_or_default();

    classify_content_type(content_type)
}

fn classify_content_type(content_type: ContentType) -> HeaderVerdict {
    let ContentType { mime, encoding } = content_type;

    if KNOWN_FEED_MIME_TYPES.contains(&mime.as_str()) {
        return HeaderVerdict::KnownFeed { mime };
    }

    let xml_subtype = mime
        .split_once('/')
        .is_some_and(|(_, subtype)| subtype.ends_with("+xml"));

    if MAYBE_FEED_MIME_TYPES.contains(&mime.as_str()) || xml_subtype {
        return HeaderVerdict::MaybeFeed { mime, encoding };
    }

    HeaderVerdict::Skip
}

/// Splits a `Content-Type` value into media type and charset.
///
/// Parameters are read left to right, so a later `charset` overrides an
/// earlier one. Parameter keys compare case-insensitively and surrounding
/// whitespace is ignored. A value without a `type/subtype` media type falls
/// back to the defaults.
pub fn parse_content_type(value: &str) -> ContentType {
    let mut parts = value.split(';');
    let mime = parts.next().unwrap_or("").trim().to_ascii_lowercase();

    let mut content_type = ContentType::default();
    if !is_media_type(&mime) {
        return content_type;
    }
    content_type.mime = mime;

    for param in parts {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let value = unquote(value.trim());
        if !value.is_empty() {
            content_type.encoding = value.to_owned();
        }
    }

    content_type
}

fn is_media_type(mime: &str) -> bool {
    match mime.split_once('/') {
        Some((kind, subtype)) => !kind.is_empty() && !subtype.is_empty(),
        None => false,
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
