use super::{
    decode_chunks, root_element_name, DecodeError, RDF_SYNTAX_NAMESPACE, RSS1_NAMESPACE,
    SNIFF_BUDGET,
};

/// Decides whether a root element name identifies a feed.
///
/// `rss` and `feed` always do. `rdf:RDF` only does when `sniffed_text`
/// mentions both the RSS 1.0 and the RDF syntax namespaces somewhere; the
/// search is a plain substring match over the whole text, comments included.
pub fn is_feed_root(root: Option<&str>, sniffed_text: &str) -> bool {
    match root {
        Some("rss") | Some("feed") => true,
        Some("rdf:RDF") => {
            sniffed_text.contains(RSS1_NAMESPACE) && sniffed_text.contains(RDF_SYNTAX_NAMESPACE)
        }
        _ => false,
    }
}

/// Runs the body pipeline over buffered chunks: decode, match the prolog,
/// classify the root element.
///
/// At most [`SNIFF_BUDGET`] bytes are looked at.
///
/// # Errors
///
/// Returns the [`DecodeError`] when the bytes cannot be decoded with
/// `encoding`. Callers treat that as "not a feed".
pub fn sniff_body<B: AsRef<[u8]>>(chunks: &[B], encoding: &str) -> Result<bool, DecodeError> {
    let text = decode_chunks(chunks, encoding, SNIFF_BUDGET)?;
    Ok(is_feed_root(root_element_name(&text), &text))
}
