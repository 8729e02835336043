use super::{Format, RtpPacket};

/// A format this crate has no codec knowledge of.
///
/// The caller supplies the clock rate and `rtpmap` encoding. Every packet is
/// treated as having PTS equal to DTS, which holds for audio and for video
/// codecs without B-frames.
#[derive(Debug, Clone)]
pub struct Generic {
    payload_type: u8,
    clock_rate: u32,
    rtpmap: String,
    fmtp: Option<String>,
}

impl Generic {
    /// `rtpmap` is the encoding part of the attribute, e.g. `"PCMU/8000"`.
    pub fn new(payload_type: u8, clock_rate: u32, rtpmap: &str) -> Self {
        Self {
            payload_type,
            clock_rate,
            rtpmap: rtpmap.to_string(),
            fmtp: None,
        }
    }

    pub fn with_fmtp(mut self, fmtp: &str) -> Self {
        self.fmtp = Some(fmtp.to_string());
        self
    }
}

impl Format for Generic {
    fn payload_type(&self) -> u8 {
        self.payload_type
    }

    fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    fn rtpmap(&self) -> String {
        self.rtpmap.clone()
    }

    fn fmtp(&self) -> Option<String> {
        self.fmtp.clone()
    }

    fn pts_equals_dts(&self, _packet: &RtpPacket) -> bool {
        true
    }
}
