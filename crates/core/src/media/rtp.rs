use bytes::Bytes;
use rand::RngExt;

use crate::error::{ParseErrorKind, Result, RtspError};

/// Size of the RTP fixed header without CSRCs.
pub const RTP_HEADER_SIZE: usize = 12;

/// Pick an SSRC at random (RFC 3550 §8.1).
pub fn random_ssrc() -> u32 {
    rand::rng().random::<u32>()
}

/// An RTP packet (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        CSRC list (0-15)                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Packets are always written with version 2, no padding and no header
/// extension. [`unmarshal`](Self::unmarshal) accepts both and strips them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpPacket {
    /// Set on the last packet of an access unit.
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Encoded size on the wire.
    pub fn marshal_size(&self) -> usize {
        RTP_HEADER_SIZE + 4 * self.csrc.len() + self.payload.len()
    }

    /// Serialize into `buf`, returning the number of bytes written.
    ///
    /// Fails when the packet does not fit, when the payload type does not
    /// fit in 7 bits, or when there are more than 15 CSRCs.
    pub fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if size > buf.len() {
            return Err(RtspError::PacketTooLarge {
                size,
                max: buf.len(),
            });
        }
        if self.payload_type > 0x7f || self.csrc.len() > 15 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRtpHeader));
        }

        buf[0] = (2 << 6) | self.csrc.len() as u8;
        buf[1] = ((self.marker as u8) << 7) | self.payload_type;
        buf[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        let mut offset = RTP_HEADER_SIZE;
        for csrc in &self.csrc {
            buf[offset..offset + 4].copy_from_slice(&csrc.to_be_bytes());
            offset += 4;
        }

        buf[offset..size].copy_from_slice(&self.payload);
        Ok(size)
    }

    /// Parse a packet, sharing the payload with `data`.
    pub fn unmarshal(data: &Bytes) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
        }
        if data[0] >> 6 != 2 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRtpVersion));
        }

        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0f) as usize;

        let mut offset = RTP_HEADER_SIZE + 4 * csrc_count;
        if data.len() < offset {
            return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
        }

        let csrc = data[RTP_HEADER_SIZE..offset]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if extension {
            if data.len() < offset + 4 {
                return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
            }
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + 4 * words;
            if data.len() < offset {
                return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
            }
        }

        let mut end = data.len();
        if padding {
            let pad = data[end - 1] as usize;
            if pad == 0 || end - offset < pad {
                return Err(RtspError::parse(ParseErrorKind::PacketTooShort));
            }
            end -= pad;
        }

        Ok(RtpPacket {
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7f,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
            csrc,
            payload: data.slice(offset..end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_packet() -> RtpPacket {
        RtpPacket {
            marker: false,
            payload_type: 96,
            sequence_number: 1234,
            timestamp: 90000,
            ssrc: 0xAABBCCDD,
            csrc: Vec::new(),
            payload: Bytes::from_static(&[1, 2, 3]),
        }
    }

    fn marshal(pkt: &RtpPacket) -> Vec<u8> {
        let mut buf = vec![0u8; pkt.marshal_size()];
        pkt.marshal_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn version_is_2() {
        let buf = marshal(&make_packet());
        assert_eq!(buf[0] >> 6, 2);
    }

    #[test]
    fn marker_bit() {
        let mut pkt = make_packet();
        assert_eq!(marshal(&pkt)[1] & 0x80, 0);
        pkt.marker = true;
        assert_eq!(marshal(&pkt)[1] & 0x80, 0x80);
    }

    #[test]
    fn header_fields_written() {
        let buf = marshal(&make_packet());
        assert_eq!(buf[1] & 0x7f, 96);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 1234);
        assert_eq!(u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]), 90000);
        assert_eq!(
            u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            0xAABBCCDD
        );
        assert_eq!(&buf[12..], &[1, 2, 3]);
    }

    #[test]
    fn csrc_list_survives_parse() {
        let mut pkt = make_packet();
        pkt.csrc = vec![1, 2];
        let buf = Bytes::from(marshal(&pkt));
        assert_eq!(buf[0] & 0x0f, 2);
        assert_eq!(RtpPacket::unmarshal(&buf).unwrap(), pkt);
    }

    #[test]
    fn buffer_too_small() {
        let pkt = make_packet();
        let mut buf = [0u8; 8];
        assert!(matches!(
            pkt.marshal_to(&mut buf),
            Err(RtspError::PacketTooLarge { size: 15, max: 8 })
        ));
    }

    #[test]
    fn invalid_payload_type_rejected() {
        let mut pkt = make_packet();
        pkt.payload_type = 200;
        let mut buf = [0u8; 64];
        assert!(pkt.marshal_to(&mut buf).is_err());
    }

    #[test]
    fn unmarshal_strips_extension_and_padding() {
        let mut raw = vec![0xB0, 96, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3];
        raw.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01, 9, 9, 9, 9]);
        raw.extend_from_slice(&[0xAA, 0xBB]);
        raw.extend_from_slice(&[0, 2]);
        let pkt = RtpPacket::unmarshal(&Bytes::from(raw)).unwrap();
        assert_eq!(pkt.sequence_number, 1);
        assert_eq!(&pkt.payload[..], &[0xAA, 0xBB]);
    }

    #[test]
    fn unmarshal_rejects_short_and_bad_version() {
        assert!(RtpPacket::unmarshal(&Bytes::from_static(&[0x80, 96])).is_err());
        assert!(RtpPacket::unmarshal(&Bytes::from_static(&[0u8; 12])).is_err());
    }

    #[test]
    fn random_ssrc_differs() {
        let picks: Vec<u32> = (0..4).map(|_| random_ssrc()).collect();
        assert!(picks.windows(2).any(|w| w[0] != w[1]));
    }
}
