//! Charset normalization for fetched documents.
//!
//! # Data Flow
//! ```text
//! raw bytes + Content-Type header
//!     → charset_from_content_type (charset=<label>)
//!     → decode (declared label, else UTF-8; malformed input falls back to UTF-8)
//!     → rewrite_meta_charset (first <meta ... charset=...> now declares utf-8)
//!     → NormalizedDocument
//! ```
//!
//! Decoding never fails; the worst case is a lossy UTF-8 decode.

use std::borrow::Cow;
use std::sync::LazyLock;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;

static CONTENT_TYPE_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)charset\s*=\s*["']?([^;"'\s]+)"#).expect("static regex")
});

/// First `charset=` inside a `<meta>` tag, either a standalone attribute or
/// the tail of an http-equiv `content` value.
static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta\b[^>]*?\b(charset\s*=\s*(["']?)([^"'\s;/>]*)(["']?))"#)
        .expect("static regex")
});

const CANONICAL_ATTRIBUTE: &str = r#"charset="utf-8""#;
const CANONICAL_LABEL: &str = "utf-8";

/// A document decoded to UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub html: String,
    /// True when the source was not UTF-8 or its meta declaration was rewritten.
    pub charset_normalized: bool,
}

/// Extract the charset label of a `Content-Type` value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    CONTENT_TYPE_CHARSET
        .captures(content_type)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decode `bytes` with the declared charset, falling back to UTF-8.
///
/// Returns the text and the encoding that produced it.
pub fn decode<'a>(bytes: &'a [u8], declared: Option<&str>) -> (Cow<'a, str>, &'static Encoding) {
    let encoding = match declared {
        Some(label) => match Encoding::for_label(label.trim().as_bytes()) {
            Some(encoding) => encoding,
            None => {
                tracing::debug!(charset = %label, "Unknown charset label, assuming utf-8");
                UTF_8
            }
        },
        None => UTF_8,
    };

    if encoding != UTF_8 {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return (text, encoding);
        }
        tracing::debug!(charset = encoding.name(), "Malformed input for declared charset, falling back to utf-8");
    }

    // A BOM must not switch the decoder away from the encoding reported here.
    (UTF_8.decode_with_bom_removal(bytes).0, UTF_8)
}

/// Point the first meta charset declaration at utf-8, leaving the rest of
/// the tag alone. Documents already declaring utf-8, or without a
/// declaration, come back borrowed.
///
/// A standalone `charset` attribute becomes `charset="utf-8"`. Inside an
/// http-equiv `content` value only the label is replaced, so the
/// attribute's own quoting survives.
pub fn rewrite_meta_charset(html: &str) -> Cow<'_, str> {
    let Some(caps) = META_CHARSET.captures(html) else {
        return Cow::Borrowed(html);
    };
    let (Some(tag), Some(attribute), Some(label)) = (caps.get(0), caps.get(1), caps.get(3)) else {
        return Cow::Borrowed(html);
    };
    if label.as_str().eq_ignore_ascii_case(CANONICAL_LABEL) {
        return Cow::Borrowed(html);
    }

    let (span, replacement) = if inside_attribute_value(&html[tag.start()..attribute.start()]) {
        (label.range(), CANONICAL_LABEL)
    } else {
        (attribute.range(), CANONICAL_ATTRIBUTE)
    };

    let mut out = String::with_capacity(html.len() + replacement.len());
    out.push_str(&html[..span.start]);
    out.push_str(replacement);
    out.push_str(&html[span.end..]);
    Cow::Owned(out)
}

/// True when `tag_prefix` ends inside an open quoted attribute value.
fn inside_attribute_value(tag_prefix: &str) -> bool {
    let mut open: Option<char> = None;
    for c in tag_prefix.chars() {
        match (open, c) {
            (None, '"' | '\'') => open = Some(c),
            (Some(q), c) if c == q => open = None,
            _ => {}
        }
    }
    open.is_some()
}

/// Decode and normalize a fetched document.
pub fn normalize(bytes: &[u8], content_type: Option<&str>) -> NormalizedDocument {
    let declared = content_type.and_then(charset_from_content_type);
    let (text, encoding) = decode(bytes, declared);

    let rewritten = rewrite_meta_charset(&text);
    let meta_changed = matches!(rewritten, Cow::Owned(_));
    let html = rewritten.into_owned();

    NormalizedDocument {
        html,
        charset_normalized: meta_changed || encoding != UTF_8,
    }
}
