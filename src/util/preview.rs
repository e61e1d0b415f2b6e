use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes left unescaped in a URI component: ASCII alphanumerics and `-_.!~*'()`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const PREVIEW_PARAM: &str = "preview=";

/// Builds the preview URL a feed navigation is redirected to.
///
/// # Examples
///
/// ```
/// use feed_sniff::util::preview_url;
///
/// assert_eq!(
///     preview_url("about:feed-preview", "https://example.com/feed?a=1&b=2"),
///     "about:feed-preview?preview=https%3A%2F%2Fexample.com%2Ffeed%3Fa%3D1%26b%3D2"
/// );
/// ```
pub fn preview_url(preview_path: &str, original_url: &str) -> String {
    format!(
        "{preview_path}?{PREVIEW_PARAM}{}",
        utf8_percent_encode(original_url, URI_COMPONENT)
    )
}

/// Recovers the original URL from a preview URL built by [`preview_url`].
///
/// Returns `None` when there is no `preview` query parameter or it does not
/// decode to UTF-8.
pub fn preview_target(url: &str) -> Option<String> {
    let without_fragment = url.split_once('#').map_or(url, |(head, _)| head);
    let (_, query) = without_fragment.split_once('?')?;
    let encoded = query
        .split('&')
        .find_map(|pair| pair.strip_prefix(PREVIEW_PARAM))?;
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// True when `url` is a preview page under `preview_path`.
pub fn is_preview_url(url: &str, preview_path: &str) -> bool {
    url.strip_prefix(preview_path)
        .is_some_and(|rest| rest.starts_with('?'))
}
