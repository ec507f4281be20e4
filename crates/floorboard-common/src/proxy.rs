//! Proxy-path conventions shared with the archive server.
//!
//! Cross-origin assets are served through the local archive service under
//! `/view/{token}/...` paths. A proxied attachment embeds its original URL in
//! the path, so the URL has to survive one round of routing through
//! intermediary proxies that eagerly decode standard percent-encoding.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::ViewError;

/// Floor label used in proxy paths when no floor heading precedes the node.
pub const FLOOR_UNKNOWN: u32 = 0;

/// Everything a JS `encodeURIComponent` would escape.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single path/query component.
pub fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Escape a source URL for embedding in an `at_{floor}_{src}` proxy path.
///
/// `%2F` is mapped to the private `_2F` token: intermediary proxies pre-decode
/// standard percent-encoding, and a decoded `/` would misroute the request.
/// The server applies the reverse mapping before decoding.
pub fn escape_src(src: &str) -> String {
    encode_component(src).replace("%2F", "_2F")
}

/// Reverse of [`escape_src`].
pub fn unescape_src(escaped: &str) -> Result<String, ViewError> {
    percent_decode_str(&escaped.replace("_2F", "%2F"))
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| ViewError::ProxyDecode(escaped.to_owned()))
}
