//! The error kinds the core distinguishes (per the error handling design):
//! transport closure, malformed wire data, codec failure, and capture
//! failure. `TransportClosed`/`ProtocolError` are represented by
//! `mirror_protocol::ProtocolError` plus the session loop's own plumbing;
//! the other two get dedicated wrapper types so call sites can log with the
//! right vocabulary without losing the underlying `anyhow::Error` chain.

/// Monitor grab failed. Host: log, skip this tick, retry next interval —
/// the previous-hash map is left untouched so comparisons stay meaningful
/// once capture recovers.
#[derive(Debug, thiserror::Error)]
#[error("{0:#}")]
pub struct CaptureError(pub anyhow::Error);

/// Image compress/decompress failed. Host: skip this frame or tile. Viewer:
/// skip the paste for that tile only; the buffer stays consistent elsewhere.
#[derive(Debug, thiserror::Error)]
#[error("{0:#}")]
pub struct CodecError(pub anyhow::Error);
