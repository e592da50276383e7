//! Content encodings: gzip for outgoing responses, gzip/deflate decoding of
//! received bodies.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::message::Message;
use crate::http::request::Request;
use crate::http::response::Response;

/// Bodies up to this size are not worth compressing (about one TCP segment).
pub const GZIP_THRESHOLD: usize = 1400;

pub fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|source| Error::Decompress { source })?;
    Ok(out)
}

/// Inflates a zlib-wrapped ("deflate" in HTTP terms) body.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|source| Error::Decompress { source })?;
    Ok(out)
}

/// Compresses the response body with gzip when it is large enough and the
/// request accepts it. Leaves responses that already carry an encoding alone.
pub fn compress_response(request: &Request, response: &mut Response) {
    if response.body.len() <= GZIP_THRESHOLD
        || !request.accepts_gzip()
        || response.headers.contains("Content-Encoding")
    {
        return;
    }

    match gzip(&response.body) {
        Ok(compressed) => {
            debug!(
                original = response.body.len(),
                compressed = compressed.len(),
                "Compressed response body"
            );
            response.headers.set("Content-Encoding", "gzip");
            response.set_body(compressed);
        }
        Err(e) => warn!(error = %e, "Failed to gzip response body, sending it as is"),
    }
}

/// Replaces an encoded body with its decoded form and drops the
/// Content-Encoding header. Unknown encodings are left untouched.
pub fn decode_body<M: Message>(message: &mut M) -> Result<()> {
    let Some(encoding) = message.header("Content-Encoding").map(str::to_ascii_lowercase) else {
        return Ok(());
    };

    let decoded = match encoding.trim() {
        "gzip" | "x-gzip" => gunzip(message.body())?,
        "deflate" => inflate(message.body())?,
        "identity" => return Ok(()),
        other => {
            warn!(encoding = other, "Leaving body with unsupported content encoding untouched");
            return Ok(());
        }
    };

    message.headers_mut().remove("Content-Encoding");
    message.set_body(decoded);
    Ok(())
}
