use encoding_rs::{Decoder, DecoderResult, Encoding};
use thiserror::Error;

/// Errors that stop the buffered body from becoming text.
///
/// Either one means "not a feed" to the caller; they are kept apart so the
/// engine can log which one happened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The charset label is not one a browser would decode with
    #[error("unsupported encoding label: {0:?}")]
    UnsupportedEncoding(String),
    /// The bytes are not valid in the declared encoding
    #[error("malformed input near byte {offset}")]
    Malformed { offset: usize },
}

/// Decodes buffered body chunks as one logical stream, capped at `budget` bytes.
///
/// Chunks are fed to a single streaming decoder, so a multi-byte sequence
/// split across two chunks decodes the same as if it arrived whole. Input past
/// `budget` bytes is dropped before decoding. A leading byte order mark that
/// matches the encoding is removed.
///
/// Decoding is strict: there is no replacement character. An incomplete
/// sequence left over at the cut is malformed too.
///
/// # Errors
///
/// - [`DecodeError::UnsupportedEncoding`] if `label` is unknown or maps to the
///   `replacement` encoding
/// - [`DecodeError::Malformed`] on any invalid byte sequence
pub fn decode_chunks<B: AsRef<[u8]>>(
    chunks: &[B],
    label: &str,
    budget: usize,
) -> Result<String, DecodeError> {
    let encoding = Encoding::for_label_no_replacement(label.trim().as_bytes())
        .ok_or_else(|| DecodeError::UnsupportedEncoding(label.to_owned()))?;

    let mut decoder = encoding.new_decoder_with_bom_removal();
    let mut text = String::new();
    let mut consumed = 0;

    for chunk in chunks {
        let remaining = budget.saturating_sub(consumed);
        if remaining == 0 {
            break;
        }
        let chunk = chunk.as_ref();
        let take = &chunk[..chunk.len().min(remaining)];
        decode_into(&mut decoder, take, false, &mut text, consumed)?;
        consumed += take.len();
    }

    decode_into(&mut decoder, &[], true, &mut text, consumed)?;
    Ok(text)
}

fn decode_into(
    decoder: &mut Decoder,
    mut src: &[u8],
    last: bool,
    text: &mut String,
    mut offset: usize,
) -> Result<(), DecodeError> {
    loop {
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(src.len())
            .unwrap_or(src.len().saturating_mul(3).saturating_add(16));
        text.reserve(needed);

        let (result, read) = decoder.decode_to_string_without_replacement(src, text, last);
        offset += read;
        src = &src[read..];

        match result {
            DecoderResult::InputEmpty => return Ok(()),
            DecoderResult::OutputFull => continue,
            DecoderResult::Malformed(_, _) => return Err(DecodeError::Malformed { offset }),
        }
    }
}
