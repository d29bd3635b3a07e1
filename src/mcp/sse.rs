//! Server-sent event body decoding.
//!
//! MCP servers may answer a POST with either a raw JSON body or a
//! `text/event-stream` body whose `data:` lines carry the JSON-RPC response.

/// Media type of SSE-framed responses.
pub const EVENT_STREAM: &str = "text/event-stream";

/// Whether a `Content-Type` header value denotes an event stream.
#[must_use]
pub fn is_event_stream(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        ct.split(';')
            .next()
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(EVENT_STREAM))
    })
}

/// Reassemble the JSON payload carried by an SSE body.
///
/// Concatenates the payload of every `data:` line in order. Other SSE fields
/// (`event:`, `id:`, `retry:`, comments) are ignored. An empty result yields
/// `{}`.
#[must_use]
pub fn extract_data(body: &str) -> String {
    let mut out = String::new();
    // `\r\n`, `\n` and a bare `\r` all end a line; the empty pieces a
    // `\r\n` leaves behind carry no field.
    for line in body.split(['\r', '\n']) {
        if let Some(data) = line.strip_prefix("data:") {
            out.push_str(data.strip_prefix(' ').unwrap_or(data));
        }
    }

    if out.trim().is_empty() {
        "{}".to_string()
    } else {
        out
    }
}

/// Return the JSON text of a response body given its content type.
#[must_use]
pub fn decode_body(content_type: Option<&str>, body: String) -> String {
    if is_event_stream(content_type) {
        extract_data(&body)
    } else {
        body
    }
}
