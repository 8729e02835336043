//! H.265 (HEVC) format (RFC 7798).
//!
//! - **SDP attributes** (RFC 7798 §7.1):
//!   ```text
//!   a=rtpmap:96 H265/90000
//!   a=fmtp:96 sprop-vps=...; sprop-sps=...; sprop-pps=...
//!   ```
//!
//! Every packet is reported as PTS == DTS.

use base64::prelude::{BASE64_STANDARD, Engine as _};
use parking_lot::RwLock;

use super::{Format, RtpPacket};

#[derive(Debug, Default)]
struct ParameterSets {
    vps: Option<Vec<u8>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

/// H.265 format (RFC 7798).
#[derive(Debug)]
pub struct H265 {
    payload_type: u8,
    max_don_diff: u32,
    params: RwLock<ParameterSets>,
}

impl H265 {
    pub fn new(payload_type: u8) -> Self {
        Self {
            payload_type,
            max_don_diff: 0,
            params: RwLock::new(ParameterSets::default()),
        }
    }

    /// `sprop-max-don-diff` (RFC 7798 §7.1); 0 omits the parameter.
    pub fn with_max_don_diff(mut self, max_don_diff: u32) -> Self {
        self.max_don_diff = max_don_diff;
        self
    }

    pub fn vps(&self) -> Option<Vec<u8>> {
        self.params.read().vps.clone()
    }

    pub fn sps(&self) -> Option<Vec<u8>> {
        self.params.read().sps.clone()
    }

    pub fn pps(&self) -> Option<Vec<u8>> {
        self.params.read().pps.clone()
    }

    pub fn set_vps(&self, vps: Vec<u8>) {
        self.params.write().vps = Some(vps);
    }

    pub fn set_sps(&self, sps: Vec<u8>) {
        self.params.write().sps = Some(sps);
    }

    pub fn set_pps(&self, pps: Vec<u8>) {
        self.params.write().pps = Some(pps);
    }
}

impl Format for H265 {
    fn payload_type(&self) -> u8 {
        self.payload_type
    }

    fn clock_rate(&self) -> u32 {
        90000
    }

    fn rtpmap(&self) -> String {
        "H265/90000".to_string()
    }

    fn fmtp(&self) -> Option<String> {
        let params = self.params.read();
        let mut out = Vec::new();

        if let Some(vps) = &params.vps {
            out.push(format!("sprop-vps={}", BASE64_STANDARD.encode(vps)));
        }
        if let Some(sps) = &params.sps {
            out.push(format!("sprop-sps={}", BASE64_STANDARD.encode(sps)));
        }
        if let Some(pps) = &params.pps {
            out.push(format!("sprop-pps={}", BASE64_STANDARD.encode(pps)));
        }
        if self.max_don_diff != 0 {
            out.push(format!("sprop-max-don-diff={}", self.max_don_diff));
        }

        if out.is_empty() {
            None
        } else {
            Some(out.join("; "))
        }
    }

    fn pts_equals_dts(&self, _packet: &RtpPacket) -> bool {
        true
    }
}
