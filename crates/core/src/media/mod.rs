//! Media descriptions, codec formats and RTP packets.
//!
//! A live stream is made of one or more [`Media`] (tracks). Each media lists
//! the [`Format`]s that may appear on it, keyed by RTP payload type.
//!
//! ## Supported formats
//!
//! | Codec | Module | RFC | PTS == DTS |
//! |-------|--------|-----|------------|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) | only on IDR/SPS/PPS |
//! | H.265 | [`h265`] | [RFC 7798](https://tools.ietf.org/html/rfc7798) | always |
//! | Other | [`generic`] | | always |
//!
//! Payloadization and depayloadization are left to callers: this crate
//! only needs the clock rate, payload type and timing policy of a format.

pub mod generic;
pub mod h264;
pub mod h265;
pub mod rtp;

use std::fmt;
use std::sync::Arc;

pub use generic::Generic;
pub use h264::H264;
pub use h265::H265;
pub use rtp::{RtpPacket, random_ssrc};

/// Codec-specific capabilities of an RTP payload format.
///
/// Each supported codec implements this trait. Formats are selected by
/// payload type when a [`Media`] is built, never by inspecting packets.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/aac.rs`)
/// 2. Implement `Format` for your type
/// 3. Add it to a [`Media`] passed to [`crate::stream::Stream::new`]
pub trait Format: Send + Sync + fmt::Debug {
    /// RTP payload type number (RFC 3551).
    ///
    /// Dynamic types use 96–127.
    fn payload_type(&self) -> u8;

    /// RTP clock rate in Hz.
    ///
    /// Video codecs use 90000 (90 kHz) per RFC 3551 §4.
    fn clock_rate(&self) -> u32;

    /// Encoding part of the SDP `a=rtpmap` attribute (e.g. `"H264/90000"`).
    fn rtpmap(&self) -> String;

    /// Parameters of the SDP `a=fmtp` attribute, if any.
    fn fmtp(&self) -> Option<String> {
        None
    }

    /// Whether the presentation timestamp of `packet` equals its decode
    /// timestamp.
    ///
    /// Only such packets may be used to correlate RTP time with wall-clock
    /// time in RTCP sender reports.
    fn pts_equals_dts(&self, packet: &RtpPacket) -> bool;

    /// SDP media-level attribute lines for this format.
    ///
    /// Returned strings include the `a=` prefix, e.g.:
    /// - `"a=rtpmap:96 H264/90000"`
    /// - `"a=fmtp:96 packetization-mode=1"`
    fn sdp_attributes(&self) -> Vec<String> {
        let pt = self.payload_type();
        let mut attrs = vec![format!("a=rtpmap:{} {}", pt, self.rtpmap())];
        if let Some(fmtp) = self.fmtp() {
            attrs.push(format!("a=fmtp:{} {}", pt, fmtp));
        }
        attrs
    }
}

/// Media type of a track (SDP `m=` line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Application,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// One track of a stream.
#[derive(Debug, Clone)]
pub struct Media {
    pub kind: MediaKind,
    /// Track control path (SDP `a=control`), e.g. `track1`.
    pub control: String,
    pub formats: Vec<Arc<dyn Format>>,
}

impl Media {
    pub fn new(kind: MediaKind, control: &str, formats: Vec<Arc<dyn Format>>) -> Self {
        Self {
            kind,
            control: control.to_string(),
            formats,
        }
    }

    /// Look up a format by RTP payload type.
    pub fn format(&self, payload_type: u8) -> Option<&Arc<dyn Format>> {
        self.formats
            .iter()
            .find(|f| f.payload_type() == payload_type)
    }
}
