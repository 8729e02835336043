//! RTSP wire protocol (RFC 2326).
//!
//! This module handles the two kinds of message that share one RTSP TCP
//! connection: text requests/responses and binary interleaved frames.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! ## Interleaved frames (RFC 2326 §10.12)
//!
//! ```text
//! '$' | channel (1 byte) | length (2 bytes, BE) | payload
//! ```
//!
//! A text message line never starts with `$`, so one byte of lookahead is
//! enough to tell the two apart (see [`crate::conn::Conn`]).

pub mod frame;
pub mod request;
pub mod response;
pub mod sdp;

use std::io::{BufRead, Read};

pub use frame::{
    INTERLEAVED_FRAME_HEADER_SIZE, INTERLEAVED_FRAME_MAGIC_BYTE, InterleavedFrame, MAX_PACKET_SIZE,
    encode_frame,
};
pub use request::RtspRequest;
pub use response::RtspResponse;

use crate::error::{ParseErrorKind, Result, RtspError};

/// Longest accepted start or header line, in bytes.
const MAX_LINE_LENGTH: usize = 4096;
/// Maximum number of headers in one message.
const MAX_HEADER_COUNT: usize = 255;
/// Largest accepted message body.
const MAX_CONTENT_LENGTH: usize = 128 * 1024;

/// Read one CRLF- (or LF-) terminated line, without the terminator.
///
/// EOF before the terminator is reported as [`RtspError::Io`].
pub(crate) fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    let n = reader
        .by_ref()
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut buf)?;

    if buf.last() != Some(&b'\n') {
        if n > MAX_LINE_LENGTH {
            return Err(RtspError::parse(ParseErrorKind::HeaderTooLong));
        }
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    String::from_utf8(buf).map_err(|_| RtspError::parse(ParseErrorKind::InvalidUtf8))
}

/// Read header lines up to and including the blank separator line.
pub(crate) fn read_headers<R: BufRead>(reader: &mut R) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();

    loop {
        let line = read_line(reader)?;
        if line.is_empty() {
            return Ok(headers);
        }

        if headers.len() >= MAX_HEADER_COUNT {
            return Err(RtspError::parse(ParseErrorKind::TooManyHeaders));
        }

        let colon_pos = line
            .find(':')
            .ok_or(RtspError::parse(ParseErrorKind::InvalidHeader))?;

        let name = line[..colon_pos].trim().to_string();
        let value = line[colon_pos + 1..].trim().to_string();

        headers.push((name, value));
    }
}

/// Read the body announced by `Content-Length`, if any.
pub(crate) fn read_body<R: BufRead>(
    reader: &mut R,
    headers: &[(String, String)],
) -> Result<Vec<u8>> {
    let len = match find_header(headers, "Content-Length") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| RtspError::parse(ParseErrorKind::InvalidContentLength))?,
        None => return Ok(Vec::new()),
    };

    if len > MAX_CONTENT_LENGTH {
        return Err(RtspError::parse(ParseErrorKind::InvalidContentLength));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Case-insensitive header lookup (RFC 2326 §4.2).
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Append headers and body; `Content-Length` is always recomputed.
pub(crate) fn write_headers_and_body(out: &mut Vec<u8>, headers: &[(String, String)], body: &[u8]) {
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }

    if !body.is_empty() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
}
