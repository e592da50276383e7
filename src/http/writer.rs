use crate::error::Result;
use crate::http::message::Message;
use crate::transport::{Socket, Transport};

/// Renders a message in wire format.
///
/// Content-Length is always written from the actual body, so a stale header
/// value can never desynchronise the peer's framing.
pub fn serialize<M: Message>(message: &M) -> Vec<u8> {
    render(message, true)
}

/// Like [`serialize`] but stops after the header block, as a response to
/// HEAD must. Content-Length still announces the full body.
pub fn serialize_head<M: Message>(message: &M) -> Vec<u8> {
    render(message, false)
}

fn render<M: Message>(message: &M, include_body: bool) -> Vec<u8> {
    let body = message.body();
    let mut buf = Vec::with_capacity(256 + body.len());

    // Start line
    buf.extend_from_slice(message.start_line().as_bytes());
    buf.extend_from_slice(b"\r\n");

    // Headers
    for (k, v) in message.headers().iter() {
        if k.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    if include_body {
        buf.extend_from_slice(body);
    }

    buf
}

/// A serialized message waiting to be written to a transport.
pub struct MessageWriter {
    buffer: Vec<u8>,
}

impl MessageWriter {
    pub fn new<M: Message>(message: &M) -> Self {
        Self {
            buffer: serialize(message),
        }
    }

    pub fn without_body<M: Message>(message: &M) -> Self {
        Self {
            buffer: serialize_head(message),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub async fn write_to(&self, transport: &mut Transport) -> Result<usize> {
        transport.write(&[&self.buffer]).await
    }
}
