use std::io::BufRead;

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::{find_header, read_body, read_headers, read_line, write_headers_and_body};

/// Protocol version written on outgoing requests.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// A parsed RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. The body length
/// comes from `Content-Length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    /// RTSP method (OPTIONS, DESCRIBE, SETUP, PLAY, etc.).
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:port/stream/track1`).
    pub uri: String,
    /// Protocol version (expected: `RTSP/1.0`).
    pub version: String,
    /// Headers as ordered (name, value) pairs. Names are stored as-received;
    /// lookups via [`get_header`](Self::get_header) are case-insensitive.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RtspRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        RtspRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            version: RTSP_VERSION.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse an RTSP request from its text representation.
    ///
    /// Expects a complete request: request line, headers, trailing blank
    /// line and `Content-Length` bytes of body.
    pub fn parse(raw: &str) -> Result<Self> {
        Self::read_from(&mut raw.as_bytes())
    }

    /// Read one request from a buffered byte source.
    ///
    /// Returns [`RtspError::Parse`] on malformed input and [`RtspError::Io`]
    /// when the source fails or ends early.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let request_line = read_line(reader)?;
        if request_line.is_empty() {
            return Err(RtspError::parse(ParseErrorKind::EmptyRequest));
        }

        let parts: Vec<&str> = request_line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRequestLine));
        }

        let method = parts[0].to_string();
        let uri = parts[1].to_string();
        let version = parts[2].to_string();

        if !version.starts_with("RTSP/") {
            return Err(RtspError::parse(ParseErrorKind::InvalidRequestLine));
        }
        if version != RTSP_VERSION {
            tracing::warn!(version, "peer sent non-RTSP/1.0 version");
        }

        let headers = read_headers(reader)?;
        let body = read_body(reader, &headers)?;

        Ok(RtspRequest {
            method,
            uri,
            version,
            headers,
            body,
        })
    }

    /// Serialize to the RTSP wire format.
    ///
    /// `Content-Length` is (re)computed from the body (RFC 2326 §12.14).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("{} {} {}\r\n", self.method, self.uri, self.version).into_bytes();
        write_headers_and_body(&mut out, &self.headers, &self.body);
        out
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17).
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_options_request() {
        let raw = "OPTIONS rtsp://localhost:8554/test RTSP/1.0\r\nCSeq: 1\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, "OPTIONS");
        assert_eq!(req.uri, "rtsp://localhost:8554/test");
        assert_eq!(req.version, "RTSP/1.0");
        assert_eq!(req.cseq(), Some("1"));
        assert!(req.body.is_empty());
    }

    #[test]
    fn parse_setup_with_transport() {
        let raw = "SETUP rtsp://localhost:8554/test/track1 RTSP/1.0\r\n\
                   CSeq: 3\r\n\
                   Transport: RTP/AVP/TCP;unicast;interleaved=0-1\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.method, "SETUP");
        assert_eq!(req.cseq(), Some("3"));
        assert_eq!(
            req.get_header("Transport"),
            Some("RTP/AVP/TCP;unicast;interleaved=0-1")
        );
    }

    #[test]
    fn parse_with_body() {
        let raw = "SET_PARAMETER rtsp://h/s RTSP/1.0\r\nCSeq: 9\r\nContent-Length: 5\r\n\r\nhello";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn parse_empty_request() {
        assert!(RtspRequest::parse("").is_err());
        assert!(matches!(
            RtspRequest::parse("\r\n"),
            Err(RtspError::Parse {
                kind: ParseErrorKind::EmptyRequest
            })
        ));
    }

    #[test]
    fn parse_invalid_request_line() {
        assert!(RtspRequest::parse("JUST_A_METHOD\r\n\r\n").is_err());
        assert!(RtspRequest::parse("GET / HTTP/1.1\r\n\r\n").is_err());
    }

    #[test]
    fn parse_invalid_header() {
        assert!(matches!(
            RtspRequest::parse("OPTIONS * RTSP/1.0\r\nno colon here\r\n\r\n"),
            Err(RtspError::Parse {
                kind: ParseErrorKind::InvalidHeader
            })
        ));
    }

    #[test]
    fn header_lookup_case_insensitive() {
        let raw = "OPTIONS rtsp://localhost RTSP/1.0\r\ncseq: 42\r\n\r\n";
        let req = RtspRequest::parse(raw).unwrap();
        assert_eq!(req.get_header("CSeq"), Some("42"));
        assert_eq!(req.get_header("cseq"), Some("42"));
        assert_eq!(req.get_header("CSEQ"), Some("42"));
    }

    #[test]
    fn serialize_then_parse() {
        let req = RtspRequest::new("ANNOUNCE", "rtsp://h/s")
            .add_header("CSeq", "4")
            .add_header("Content-Type", "application/sdp")
            .with_body("v=0\r\n");
        let bytes = req.serialize();
        assert!(bytes.starts_with(b"ANNOUNCE rtsp://h/s RTSP/1.0\r\n"));

        let parsed = RtspRequest::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(parsed.cseq(), Some("4"));
        assert_eq!(parsed.get_header("Content-Length"), Some("5"));
        assert_eq!(parsed.body, b"v=0\r\n");
    }
}
