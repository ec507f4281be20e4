//! Error types for floorboard.
//!
//! Content anomalies (malformed tags, unparseable heading shapes) are not
//! errors: the pipeline degrades them to literal rendering. What remains here
//! are the failures a caller can actually observe.

use miette::Diagnostic;

/// Main error type for floorboard operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum ViewError {
    /// A floor jump targeted a floor the document does not contain.
    #[error("no such floor: {0}")]
    #[diagnostic(code(floorboard::floors::lookup))]
    FloorNotFound(u32),

    /// The net-disk status collaborator failed or returned unusable data.
    #[error("net-disk status exchange failed: {0}")]
    #[diagnostic(code(floorboard::netdisk))]
    Netdisk(String),

    /// A proxied source path could not be decoded back to its original URL.
    #[error("undecodable proxy path: {0}")]
    #[diagnostic(code(floorboard::proxy::decode))]
    ProxyDecode(String),

    /// Serialization/deserialization error
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
