//! RTCP packets (RFC 3550 §6) and sender-report bookkeeping.
//!
//! Only the packets a sender needs are modelled: Sender Report (SR, PT=200)
//! without reception report blocks, and Goodbye (BYE, PT=203). Anything else
//! produced elsewhere can be passed through as [`RtcpPacket::Raw`].

pub mod sender;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ParseErrorKind, Result, RtspError};

pub use sender::{RtcpSender, SenderStats};

pub const PACKET_TYPE_SENDER_REPORT: u8 = 200;
pub const PACKET_TYPE_GOODBYE: u8 = 203;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// Encode a wall-clock time as a 64-bit NTP timestamp (RFC 3550 §4).
///
/// Times before the Unix epoch encode as 0.
pub fn ntp_encode(t: SystemTime) -> u64 {
    let Ok(since_unix) = t.duration_since(UNIX_EPOCH) else {
        return 0;
    };
    let secs = since_unix.as_secs() + NTP_UNIX_OFFSET_SECS;
    let frac = ((since_unix.subsec_nanos() as u64) << 32) / 1_000_000_000;
    (secs << 32) | frac
}

/// Decode a 64-bit NTP timestamp into wall-clock time.
pub fn ntp_decode(ntp: u64) -> SystemTime {
    let secs = (ntp >> 32).saturating_sub(NTP_UNIX_OFFSET_SECS);
    let nanos = ((ntp & 0xffff_ffff) * 1_000_000_000) >> 32;
    UNIX_EPOCH + Duration::new(secs, nanos as u32)
}

/// RTCP Sender Report (RFC 3550 §6.4.1), without report blocks.
///
/// ```text
/// |V=2|P|  RC=0   |   PT=200      |          length=6             |
/// |                         SSRC of sender                        |
/// |              NTP timestamp, most significant word             |
/// |             NTP timestamp, least significant word             |
/// |                         RTP timestamp                         |
/// |                     sender's packet count                     |
/// |                      sender's octet count                     |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_time: u64,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

impl SenderReport {
    pub const SIZE: usize = 28;

    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(0x80);
        buf.put_u8(PACKET_TYPE_SENDER_REPORT);
        buf.put_u16((Self::SIZE / 4 - 1) as u16);
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_time);
        buf.put_u32(self.rtp_time);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);
        buf.freeze()
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
        }
        if data[0] >> 6 != 2 || data[1] != PACKET_TYPE_SENDER_REPORT {
            return Err(RtspError::parse(ParseErrorKind::InvalidRtpVersion));
        }

        let word = |i: usize| u32::from_be_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
        Ok(SenderReport {
            ssrc: word(4),
            ntp_time: ((word(8) as u64) << 32) | word(12) as u64,
            rtp_time: word(16),
            packet_count: word(20),
            octet_count: word(24),
        })
    }
}

/// RTCP Goodbye (RFC 3550 §6.6), without a reason string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goodbye {
    pub sources: Vec<u32>,
}

impl Goodbye {
    pub fn marshal(&self) -> Result<Bytes> {
        if self.sources.len() > 31 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRtpHeader));
        }

        let mut buf = BytesMut::with_capacity(4 + 4 * self.sources.len());
        buf.put_u8(0x80 | self.sources.len() as u8);
        buf.put_u8(PACKET_TYPE_GOODBYE);
        buf.put_u16(self.sources.len() as u16);
        for ssrc in &self.sources {
            buf.put_u32(*ssrc);
        }
        Ok(buf.freeze())
    }
}

/// An outbound RTCP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    Goodbye(Goodbye),
    /// Already serialized (possibly compound) RTCP.
    Raw(Bytes),
}

impl RtcpPacket {
    pub fn marshal(&self) -> Result<Bytes> {
        match self {
            Self::SenderReport(sr) => Ok(sr.marshal()),
            Self::Goodbye(bye) => bye.marshal(),
            Self::Raw(data) => {
                if data.len() < 4 || data[0] >> 6 != 2 {
                    return Err(RtspError::parse(ParseErrorKind::InvalidRtpVersion));
                }
                Ok(data.clone())
            }
        }
    }
}

impl From<SenderReport> for RtcpPacket {
    fn from(sr: SenderReport) -> Self {
        Self::SenderReport(sr)
    }
}

impl From<Goodbye> for RtcpPacket {
    fn from(bye: Goodbye) -> Self {
        Self::Goodbye(bye)
    }
}
