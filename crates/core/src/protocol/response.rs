use std::io::BufRead;

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::{find_header, read_body, read_headers, read_line, write_headers_and_body};

/// An RTSP response (RFC 2326 §7).
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Uses a builder pattern: chain [`add_header`](Self::add_header) and
/// [`with_body`](Self::with_body), then call [`serialize`](Self::serialize).
/// `Content-Length` is computed automatically when a body is present.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Server identification string included in every RTSP response
/// per RFC 2326 §12.36.
pub const SERVER_AGENT: &str = "rtsp-interleaved/0.1";

impl RtspResponse {
    pub fn new(status_code: u16, status_text: &str) -> Self {
        RtspResponse {
            status_code,
            status_text: status_text.to_string(),
            headers: vec![("Server".to_string(), SERVER_AGENT.to_string())],
            body: Vec::new(),
        }
    }

    /// 200 OK, success (RFC 2326 §7.1.1).
    pub fn ok() -> Self {
        Self::new(200, "OK")
    }

    /// 404 Not Found: the requested resource does not exist.
    pub fn not_found() -> Self {
        Self::new(404, "Not Found")
    }

    /// 400 Bad Request: malformed or missing required header.
    pub fn bad_request() -> Self {
        Self::new(400, "Bad Request")
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Read one response from a buffered byte source.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let status_line = read_line(reader)?;
        if status_line.is_empty() {
            return Err(RtspError::parse(ParseErrorKind::InvalidStatusLine));
        }

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("RTSP/") {
            return Err(RtspError::parse(ParseErrorKind::InvalidStatusLine));
        }

        let status_code = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or(RtspError::parse(ParseErrorKind::InvalidStatusLine))?;
        let status_text = parts.next().unwrap_or_default().trim().to_string();

        let headers = read_headers(reader)?;
        let body = read_body(reader, &headers)?;

        Ok(RtspResponse {
            status_code,
            status_text,
            headers,
            body,
        })
    }

    /// Serialize to the RTSP wire format.
    ///
    /// If a body is present, `Content-Length` is appended automatically
    /// (RFC 2326 §12.14).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("RTSP/1.0 {} {}\r\n", self.status_code, self.status_text).into_bytes();
        write_headers_and_body(&mut out, &self.headers, &self.body);
        out
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(resp: &RtspResponse) -> String {
        String::from_utf8(resp.serialize()).unwrap()
    }

    #[test]
    fn serialize_no_body() {
        let resp = RtspResponse::ok()
            .add_header("CSeq", "1")
            .add_header("Public", "OPTIONS");
        let s = as_text(&resp);
        assert!(s.starts_with("RTSP/1.0 200 OK\r\n"));
        assert!(s.contains("Server: rtsp-interleaved/0.1\r\n"));
        assert!(s.contains("CSeq: 1\r\n"));
        assert!(s.contains("Public: OPTIONS\r\n"));
        assert!(!s.contains("Content-Length"));
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn serialize_with_body() {
        let resp = RtspResponse::ok()
            .add_header("CSeq", "2")
            .with_body("v=0\r\n");
        let s = as_text(&resp);
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("v=0\r\n"));
    }

    #[test]
    fn not_found_response() {
        let resp = RtspResponse::not_found().add_header("CSeq", "5");
        assert_eq!(resp.status_code, 404);
        assert!(as_text(&resp).starts_with("RTSP/1.0 404 Not Found\r\n"));
    }

    #[test]
    fn read_response_with_body() {
        let raw = b"RTSP/1.0 200 OK\r\nCSeq: 2\r\nContent-Length: 4\r\n\r\nv=0\n";
        let resp = RtspResponse::read_from(&mut raw.as_slice()).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.status_text, "OK");
        assert_eq!(resp.cseq(), Some("2"));
        assert_eq!(resp.body, b"v=0\n");
    }

    #[test]
    fn read_multi_word_reason() {
        let raw = b"RTSP/1.0 454 Session Not Found\r\nCSeq: 7\r\n\r\n";
        let resp = RtspResponse::read_from(&mut raw.as_slice()).unwrap();
        assert_eq!(resp.status_code, 454);
        assert_eq!(resp.status_text, "Session Not Found");
    }

    #[test]
    fn read_invalid_status_line() {
        for raw in [
            &b"HTTP/1.1 200 OK\r\n\r\n"[..],
            &b"RTSP/1.0 abc OK\r\n\r\n"[..],
            &b"\r\n"[..],
        ] {
            assert!(matches!(
                RtspResponse::read_from(&mut &raw[..]),
                Err(RtspError::Parse {
                    kind: ParseErrorKind::InvalidStatusLine
                })
            ));
        }
    }
}
