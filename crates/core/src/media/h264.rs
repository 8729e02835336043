use base64::prelude::{BASE64_STANDARD, Engine as _};
use parking_lot::RwLock;

use super::{Format, RtpPacket};

const NALU_TYPE_IDR: u8 = 5;
const NALU_TYPE_SPS: u8 = 7;
const NALU_TYPE_PPS: u8 = 8;
const NALU_TYPE_STAP_A: u8 = 24;
const NALU_TYPE_FU_A: u8 = 28;

/// H.264 format (RFC 6184).
///
/// ## PTS and DTS
///
/// H.264 streams may contain B-frames, so only packets that start a random
/// access point (IDR slice, SPS or PPS) are guaranteed to have PTS == DTS.
/// [`pts_equals_dts`](Format::pts_equals_dts) looks inside single NAL unit
/// packets, STAP-A aggregates (§5.7.1) and the first FU-A fragment (§5.8).
///
/// ## SDP attributes (RFC 6184 §8.1)
///
/// - `a=rtpmap:96 H264/90000`
/// - `a=fmtp:96 packetization-mode=1; profile-level-id=42e01f; sprop-parameter-sets=...`
///
/// SPS/PPS can be updated at any time from the media pipeline while
/// other threads read them to build SDP.
#[derive(Debug)]
pub struct H264 {
    payload_type: u8,
    packetization_mode: u8,
    sps: RwLock<Option<Vec<u8>>>,
    pps: RwLock<Option<Vec<u8>>>,
}

impl H264 {
    pub fn new(payload_type: u8) -> Self {
        Self {
            payload_type,
            packetization_mode: 1,
            sps: RwLock::new(None),
            pps: RwLock::new(None),
        }
    }

    pub fn with_parameter_sets(self, sps: Vec<u8>, pps: Vec<u8>) -> Self {
        self.set_sps(sps);
        self.set_pps(pps);
        self
    }

    pub fn sps(&self) -> Option<Vec<u8>> {
        self.sps.read().clone()
    }

    pub fn pps(&self) -> Option<Vec<u8>> {
        self.pps.read().clone()
    }

    pub fn set_sps(&self, sps: Vec<u8>) {
        *self.sps.write() = Some(sps);
    }

    pub fn set_pps(&self, pps: Vec<u8>) {
        *self.pps.write() = Some(pps);
    }

    /// Derive profile-level-id from SPS NAL (RFC 6184 §8.1): bytes 1–3 are profile_idc, constraint_set, level_idc.
    fn profile_level_id(sps: &[u8]) -> Option<String> {
        if sps.len() < 4 {
            return None;
        }
        Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
    }
}

fn is_random_access(nalu_type: u8) -> bool {
    matches!(nalu_type, NALU_TYPE_IDR | NALU_TYPE_SPS | NALU_TYPE_PPS)
}

impl Format for H264 {
    fn payload_type(&self) -> u8 {
        self.payload_type
    }

    fn clock_rate(&self) -> u32 {
        90000
    }

    fn rtpmap(&self) -> String {
        "H264/90000".to_string()
    }

    fn fmtp(&self) -> Option<String> {
        let mut params = vec![format!("packetization-mode={}", self.packetization_mode)];

        let sps = self.sps.read();
        let pps = self.pps.read();

        if let Some(sps) = sps.as_deref() {
            if let Some(id) = Self::profile_level_id(sps) {
                params.push(format!("profile-level-id={}", id));
            }
            if let Some(pps) = pps.as_deref() {
                params.push(format!(
                    "sprop-parameter-sets={},{}",
                    BASE64_STANDARD.encode(sps),
                    BASE64_STANDARD.encode(pps)
                ));
            }
        }

        Some(params.join("; "))
    }

    fn pts_equals_dts(&self, packet: &RtpPacket) -> bool {
        let payload = &packet.payload[..];
        let Some(&first) = payload.first() else {
            return false;
        };

        match first & 0x1f {
            NALU_TYPE_STAP_A => {
                let mut rest = &payload[1..];
                while rest.len() >= 2 {
                    let size = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                    rest = &rest[2..];
                    if size == 0 || size > rest.len() {
                        return false;
                    }
                    if is_random_access(rest[0] & 0x1f) {
                        return true;
                    }
                    rest = &rest[size..];
                }
                false
            }
            NALU_TYPE_FU_A => {
                let Some(&fu_header) = payload.get(1) else {
                    return false;
                };
                fu_header & 0x80 != 0 && is_random_access(fu_header & 0x1f)
            }
            typ => is_random_access(typ),
        }
    }
}
