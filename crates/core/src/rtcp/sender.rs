use std::time::{Instant, SystemTime};

use parking_lot::Mutex;

use crate::media::RtpPacket;
use crate::rtcp::{SenderReport, ntp_encode};

/// Cumulative counters of an [`RtcpSender`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// SSRC of the most recent packet, if any.
    pub ssrc: Option<u32>,
    pub packet_count: u64,
    /// Payload octets (RTP header and padding excluded, RFC 3550 §6.4.1).
    pub octet_count: u64,
}

#[derive(Debug)]
struct Correlation {
    rtp_time: u32,
    ntp_time: SystemTime,
    observed_at: Instant,
}

#[derive(Debug, Default)]
struct SenderState {
    stats: SenderStats,
    last: Option<Correlation>,
    closed: bool,
}

/// Sender-report state for one (media, payload type) pair.
///
/// Every outbound RTP packet is passed to [`observe`](Self::observe), in
/// production order. A periodic timer then calls [`report`](Self::report)
/// to obtain the current Sender Report, extrapolating the RTP/NTP
/// correlation from the last packet whose PTS equals its DTS:
///
/// ```text
/// ntp = last_ntp + elapsed
/// rtp = last_rtp + elapsed * clock_rate
/// ```
#[derive(Debug)]
pub struct RtcpSender {
    clock_rate: u32,
    state: Mutex<SenderState>,
}

impl RtcpSender {
    pub fn new(clock_rate: u32) -> Self {
        Self {
            clock_rate,
            state: Mutex::new(SenderState::default()),
        }
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Record an outbound packet sent at wall-clock time `ntp`.
    pub fn observe(&self, packet: &RtpPacket, ntp: SystemTime, pts_equals_dts: bool) {
        self.observe_at(packet, ntp, pts_equals_dts, Instant::now());
    }

    pub(crate) fn observe_at(
        &self,
        packet: &RtpPacket,
        ntp: SystemTime,
        pts_equals_dts: bool,
        now: Instant,
    ) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        if pts_equals_dts {
            state.last = Some(Correlation {
                rtp_time: packet.timestamp,
                ntp_time: ntp,
                observed_at: now,
            });
        }

        state.stats.ssrc = Some(packet.ssrc);
        state.stats.packet_count += 1;
        state.stats.octet_count += packet.payload.len() as u64;
    }

    /// Current cumulative counters.
    pub fn stats(&self) -> SenderStats {
        self.state.lock().stats
    }

    /// Build a Sender Report for the current instant.
    ///
    /// Returns `None` until a packet with PTS == DTS has been observed, and
    /// after [`close`](Self::close).
    pub fn report(&self) -> Option<SenderReport> {
        self.report_at(Instant::now())
    }

    pub(crate) fn report_at(&self, now: Instant) -> Option<SenderReport> {
        let state = self.state.lock();
        if state.closed {
            return None;
        }

        let last = state.last.as_ref()?;
        let ssrc = state.stats.ssrc?;

        let elapsed = now.saturating_duration_since(last.observed_at);
        let rtp_elapsed = (elapsed.as_secs_f64() * self.clock_rate as f64) as u64;

        Some(SenderReport {
            ssrc,
            ntp_time: ntp_encode(last.ntp_time + elapsed),
            rtp_time: last.rtp_time.wrapping_add(rtp_elapsed as u32),
            packet_count: state.stats.packet_count as u32,
            octet_count: state.stats.octet_count as u32,
        })
    }

    /// Stop producing reports. Counters stay readable through [`stats`](Self::stats).
    pub fn close(&self) {
        self.state.lock().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::{Duration, UNIX_EPOCH};

    fn packet(seq: u16, ts: u32, len: usize) -> RtpPacket {
        RtpPacket {
            payload_type: 96,
            sequence_number: seq,
            timestamp: ts,
            ssrc: 0x1234,
            payload: Bytes::from(vec![0u8; len]),
            ..Default::default()
        }
    }

    #[test]
    fn counters_accumulate() {
        let sender = RtcpSender::new(90000);
        let ntp = SystemTime::now();
        sender.observe(&packet(1, 0, 100), ntp, true);
        sender.observe(&packet(2, 0, 50), ntp, false);
        sender.observe(&packet(3, 3000, 25), ntp, true);

        let stats = sender.stats();
        assert_eq!(stats.packet_count, 3);
        assert_eq!(stats.octet_count, 175);
        assert_eq!(stats.ssrc, Some(0x1234));
    }

    #[test]
    fn no_report_before_correlation() {
        let sender = RtcpSender::new(90000);
        assert!(sender.report().is_none());

        sender.observe(&packet(1, 0, 10), SystemTime::now(), false);
        assert!(sender.report().is_none());
        assert_eq!(sender.stats().packet_count, 1);
    }

    #[test]
    fn report_extrapolates_from_last_correlation() {
        let sender = RtcpSender::new(90000);
        let base = Instant::now();
        let ntp = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        sender.observe_at(&packet(1, 1000, 10), ntp, true, base);
        // Not a correlation point: must not move the reference.
        sender.observe_at(&packet(2, 999_999, 10), ntp, false, base);

        let sr = sender.report_at(base + Duration::from_secs(2)).unwrap();
        assert_eq!(sr.ssrc, 0x1234);
        assert_eq!(sr.rtp_time, 1000 + 180_000);
        assert_eq!(sr.ntp_time, ntp_encode(ntp + Duration::from_secs(2)));
        assert_eq!(sr.packet_count, 2);
        assert_eq!(sr.octet_count, 20);
    }

    #[test]
    fn rtp_time_wraps() {
        let sender = RtcpSender::new(90000);
        let base = Instant::now();
        sender.observe_at(&packet(1, u32::MAX, 1), SystemTime::now(), true, base);
        let sr = sender.report_at(base + Duration::from_secs(1)).unwrap();
        assert_eq!(sr.rtp_time, 89_999);
    }

    #[test]
    fn closed_sender_reports_nothing() {
        let sender = RtcpSender::new(48000);
        sender.observe(&packet(1, 0, 10), SystemTime::now(), true);
        sender.close();
        assert!(sender.report().is_none());
        sender.observe(&packet(2, 0, 10), SystemTime::now(), true);
        assert_eq!(sender.stats().packet_count, 1);
    }
}
