//! Error types for the RTSP framing and distribution library.

use std::fmt;

/// Errors that can occur in the RTSP framing and distribution library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io): socket/stream failures, including EOF.
/// - **Framing**: [`Parse`](Self::Parse), [`TruncatedFrame`](Self::TruncatedFrame),
///   [`FrameTooLarge`](Self::FrameTooLarge): the byte stream can no longer be
///   trusted and the owning connection must be torn down.
/// - **Outbound packets**: [`PacketTooLarge`](Self::PacketTooLarge).
/// - **Stream**: [`MediaNotFound`](Self::MediaNotFound),
///   [`DuplicatePayloadType`](Self::DuplicatePayloadType),
///   [`StreamClosed`](Self::StreamClosed).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RTSP message or binary packet.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The stream ended before the declared interleaved frame length was read.
    #[error("truncated interleaved frame: expected {expected} bytes, got {received}")]
    TruncatedFrame { expected: usize, received: usize },

    /// An interleaved frame declared a payload larger than [`MAX_PACKET_SIZE`](crate::protocol::MAX_PACKET_SIZE).
    #[error("interleaved frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// A packet does not fit in the buffer it is being serialized into.
    #[error("packet too large: {size} bytes (buffer {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// No media with the given index exists in the [`Stream`](crate::stream::Stream).
    #[error("media not found: {0}")]
    MediaNotFound(usize),

    /// Two formats of the same media share a payload type.
    #[error("media {media}: duplicate payload type {payload_type}")]
    DuplicatePayloadType { media: usize, payload_type: u8 },

    /// The [`Stream`](crate::stream::Stream) has been closed.
    #[error("stream closed")]
    StreamClosed,
}

impl RtspError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        RtspError::Parse { kind }
    }
}

/// Specific kind of parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no start line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// Status line did not have the expected `Version Code Reason` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `Content-Length` was not a valid size or exceeded the body limit.
    InvalidContentLength,
    /// A single line exceeded the maximum line length.
    HeaderTooLong,
    /// The message carried more headers than allowed.
    TooManyHeaders,
    /// Message text was not valid UTF-8.
    InvalidUtf8,
    /// An interleaved frame did not start with the `$` magic byte.
    InvalidFrameMagic,
    /// RTP/RTCP version field was not 2.
    InvalidRtpVersion,
    /// An RTP header field is out of range (payload type > 127, > 15 CSRCs).
    InvalidRtpHeader,
    /// A binary packet was shorter than its fixed header.
    PacketTooShort,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
            Self::HeaderTooLong => write!(f, "line too long"),
            Self::TooManyHeaders => write!(f, "too many headers"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8"),
            Self::InvalidFrameMagic => write!(f, "invalid interleaved frame magic byte"),
            Self::InvalidRtpVersion => write!(f, "invalid RTP version"),
            Self::InvalidRtpHeader => write!(f, "invalid RTP header field"),
            Self::PacketTooShort => write!(f, "packet too short"),
        }
    }
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
