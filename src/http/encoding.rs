//! Transport-level response compression
//!
//! The engine gzips a response body when the client lists `gzip` in
//! `Accept-Encoding` and the [`SessionHandler`](super::server::SessionHandler)
//! agrees. The stock heuristic only compresses textual MIME types.

use super::Response;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use tracing::trace;

pub const GZIP: &str = "gzip";

/// Default compression heuristic: `text/*` and `*/json` bodies only
pub fn use_gzip_by_default(response: &Response) -> bool {
    let mime_type = response.mime_type().to_ascii_lowercase();
    mime_type.contains("text/") || mime_type.contains("/json")
}

/// Compresses `data` into a complete gzip member.
pub fn gzip(data: &[u8]) -> io::Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    let encoded = encoder.finish()?;
    trace!(original = data.len(), encoded = encoded.len(), "gzip encoded body");
    Ok(Bytes::from(encoded))
}

/// Replaces the body with its gzip encoding and declares it.
pub(crate) fn apply_gzip(response: &mut Response) -> io::Result<()> {
    let encoded = gzip(response.body())?;
    response.set_body(encoded);
    response.add_header("Content-Encoding", GZIP);
    Ok(())
}
