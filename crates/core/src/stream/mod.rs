//! Live stream fan-out.
//!
//! A [`Stream`] is built from the [`Media`]s of a live source and owns one
//! [`MediaDistributor`] per media:
//!
//! ```text
//!                       ┌─> FormatTracker (per payload type) ── sender reports
//! producer ─> Stream ─> MediaDistributor ─┬─> UnicastReader queue ─> MediaSink
//!             (index)                     ├─> UnicastReader queue ─> MediaSink
//!                                         └─> MulticastWriter
//! ```
//!
//! The producer never blocks on a reader: packets are handed to each
//! reader's [`WriteQueue`](crate::queue::WriteQueue) and dropped for that
//! reader alone when its queue is full.

pub mod distributor;
pub mod multicast;
pub mod reader;
pub mod sink;

use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Sender, bounded, select, tick};
use parking_lot::{Mutex, RwLock};
use rand::RngExt;

use crate::error::{Result, RtspError};
use crate::media::{Media, RtpPacket};
use crate::queue::DEFAULT_WRITE_QUEUE_CAPACITY;
use crate::rtcp::RtcpPacket;

pub use distributor::{FormatTracker, MediaDistributor};
pub use multicast::{MulticastGroup, MulticastWriter};
pub use reader::UnicastReader;
pub use sink::{InterleavedSink, MediaSink, SharedConnWriter, UdpSink};

/// Default interval between RTCP sender reports.
pub const DEFAULT_SENDER_REPORT_PERIOD: Duration = Duration::from_secs(10);

/// Default TTL of multicast packets.
pub const DEFAULT_MULTICAST_TTL: u32 = 16;

/// Stream-level configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Pending packets per reader beyond which new ones are dropped.
    pub write_queue_capacity: usize,
    /// Interval between RTCP sender reports. `None` or a zero period
    /// disables them.
    pub sender_report_period: Option<Duration>,
    pub multicast_ttl: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            write_queue_capacity: DEFAULT_WRITE_QUEUE_CAPACITY,
            sender_report_period: Some(DEFAULT_SENDER_REPORT_PERIOD),
            multicast_ttl: DEFAULT_MULTICAST_TTL,
        }
    }
}

/// Random 16-char hex identifier.
fn random_id() -> String {
    format!("{:016X}", rand::rng().random::<u64>())
}

struct ReportTimer {
    done: Sender<()>,
    handle: JoinHandle<()>,
}

/// A live stream served to any number of readers.
pub struct Stream {
    id: String,
    config: StreamConfig,
    distributors: Arc<Vec<MediaDistributor>>,
    timer: Mutex<Option<ReportTimer>>,
    /// Held shared by every distribution and subscription, exclusively by
    /// [`close`](Stream::close), so nothing reaches a reader after its BYE.
    closed: RwLock<bool>,
}

impl Stream {
    pub fn new(medias: Vec<Media>, config: StreamConfig) -> Result<Self> {
        for (index, media) in medias.iter().enumerate() {
            let mut seen = HashSet::new();
            for format in &media.formats {
                if !seen.insert(format.payload_type()) {
                    return Err(RtspError::DuplicatePayloadType {
                        media: index,
                        payload_type: format.payload_type(),
                    });
                }
            }
        }

        let id = random_id();
        let distributors: Arc<Vec<MediaDistributor>> = Arc::new(
            medias
                .into_iter()
                .map(|m| MediaDistributor::new(&id, random_id(), m, config.multicast_ttl))
                .collect(),
        );

        let timer = match config.sender_report_period.filter(|p| !p.is_zero()) {
            Some(period) => Some(spawn_report_timer(&id, period, distributors.clone())?),
            None => None,
        };

        tracing::info!(stream = %id, medias = distributors.len(), "stream created");

        Ok(Self {
            id,
            config,
            distributors,
            timer: Mutex::new(timer),
            closed: RwLock::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn medias(&self) -> impl Iterator<Item = &Media> {
        self.distributors.iter().map(|d| d.media())
    }

    pub fn distributor(&self, media: usize) -> Option<&MediaDistributor> {
        self.distributors.get(media)
    }

    /// Create a reader whose queue uses this stream's capacity.
    pub fn new_reader(&self, id: &str) -> Arc<UnicastReader> {
        Arc::new(UnicastReader::new(id, self.config.write_queue_capacity))
    }

    /// Write an RTP packet produced now.
    pub fn write_packet_rtp(&self, media: usize, packet: &RtpPacket) -> Result<()> {
        self.write_packet_rtp_with_ntp(media, packet, SystemTime::now())
    }

    /// Write an RTP packet produced at wall-clock time `ntp`.
    pub fn write_packet_rtp_with_ntp(
        &self,
        media: usize,
        packet: &RtpPacket,
        ntp: SystemTime,
    ) -> Result<()> {
        self.with_open(media, |d| {
            d.distribute_rtp(packet, ntp);
            Ok(())
        })
    }

    pub fn write_packet_rtcp(&self, media: usize, packet: &RtcpPacket) -> Result<()> {
        self.with_open(media, |d| {
            d.distribute_rtcp(packet);
            Ok(())
        })
    }

    /// Subscribe `reader` to a media, delivering through `sink`.
    pub fn add_reader(
        &self,
        media: usize,
        reader: Arc<UnicastReader>,
        sink: Arc<dyn MediaSink>,
    ) -> Result<()> {
        self.with_open(media, |d| {
            d.subscribe(reader, sink);
            Ok(())
        })
    }

    /// Unsubscribe a reader from every media.
    pub fn remove_reader(&self, reader_id: &str) {
        for d in self.distributors.iter() {
            d.unsubscribe(reader_id);
        }
    }

    /// Multicast sink of a media, allocated on first call.
    pub fn allocate_multicast(
        &self,
        media: usize,
        group: MulticastGroup,
    ) -> Result<Arc<MulticastWriter>> {
        self.with_open(media, |d| d.ensure_multicast(group))
    }

    /// Say goodbye to every reader, then stop.
    ///
    /// Readers are closed once the BYE is queued, so it is still written.
    /// Waits for in-flight writes to finish first. Idempotent.
    pub fn close(&self) {
        let mut closed = self.closed.write();
        if *closed {
            return;
        }
        *closed = true;

        if let Some(timer) = self.timer.lock().take() {
            drop(timer.done);
            if timer.handle.join().is_err() {
                tracing::warn!(stream = %self.id, "sender report timer panicked");
            }
        }

        let mut readers: Vec<Arc<UnicastReader>> = Vec::new();
        for d in self.distributors.iter() {
            d.send_goodbye();
            for reader in d.close() {
                if !readers.iter().any(|r| r.id() == reader.id()) {
                    readers.push(reader);
                }
            }
        }
        for reader in &readers {
            reader.close();
        }

        drop(closed);

        tracing::info!(stream = %self.id, readers = readers.len(), "stream closed");
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Run `f` on an open media's distributor, holding off [`close`](Self::close)
    /// until it returns.
    fn with_open<T>(
        &self,
        media: usize,
        f: impl FnOnce(&MediaDistributor) -> Result<T>,
    ) -> Result<T> {
        let closed = self.closed.read();
        if *closed {
            return Err(RtspError::StreamClosed);
        }
        let distributor = self
            .distributors
            .get(media)
            .ok_or(RtspError::MediaNotFound(media))?;
        f(distributor)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_report_timer(
    stream_id: &str,
    period: Duration,
    distributors: Arc<Vec<MediaDistributor>>,
) -> Result<ReportTimer> {
    let (done, done_rx) = bounded::<()>(0);
    let ticker = tick(period);
    let stream = stream_id.to_string();

    let handle = thread::Builder::new()
        .name(format!("rtcp-{}", stream_id))
        .spawn(move || {
            loop {
                select! {
                    recv(ticker) -> _ => {
                        for d in distributors.iter() {
                            d.send_reports();
                        }
                    }
                    recv(done_rx) -> _ => break,
                }
            }
            tracing::debug!(stream = %stream, "sender report timer stopped");
        })?;

    Ok(ReportTimer { done, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Generic, H264, MediaKind};
    use crate::rtcp::{PACKET_TYPE_GOODBYE, PACKET_TYPE_SENDER_REPORT};
    use bytes::Bytes;
    use crossbeam_channel::{Receiver, unbounded};

    struct RecordingSink {
        tx: crossbeam_channel::Sender<Vec<u8>>,
    }

    impl MediaSink for RecordingSink {
        fn write_rtp(&self, packet: &[u8]) -> Result<()> {
            let _ = self.tx.send(packet.to_vec());
            Ok(())
        }

        fn write_rtcp(&self, packet: &[u8]) -> Result<()> {
            let _ = self.tx.send(packet.to_vec());
            Ok(())
        }
    }

    fn recording_sink() -> (Arc<RecordingSink>, Receiver<Vec<u8>>) {
        let (tx, rx) = unbounded();
        (Arc::new(RecordingSink { tx }), rx)
    }

    fn medias() -> Vec<Media> {
        vec![
            Media::new(MediaKind::Video, "track1", vec![Arc::new(H264::new(96))]),
            Media::new(
                MediaKind::Audio,
                "track2",
                vec![Arc::new(Generic::new(0, 8000, "PCMU/8000"))],
            ),
        ]
    }

    fn no_reports() -> StreamConfig {
        StreamConfig {
            sender_report_period: None,
            ..Default::default()
        }
    }

    fn idr(seq: u16) -> RtpPacket {
        RtpPacket {
            payload_type: 96,
            sequence_number: seq,
            timestamp: 90 * seq as u32,
            ssrc: 0xCAFE,
            payload: Bytes::from_static(&[0x65, 0xAA]),
            ..Default::default()
        }
    }

    #[test]
    fn packets_routed_by_media_index() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        let reader = stream.new_reader("r1");
        reader.start().unwrap();

        let (video, video_rx) = recording_sink();
        let (audio, audio_rx) = recording_sink();
        stream.add_reader(0, reader.clone(), video).unwrap();
        stream.add_reader(1, reader.clone(), audio).unwrap();

        stream.write_packet_rtp(0, &idr(1)).unwrap();
        let mut pcmu = idr(2);
        pcmu.payload_type = 0;
        stream.write_packet_rtp(1, &pcmu).unwrap();

        let data = video_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(data[1] & 0x7f, 96);
        let data = audio_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(data[1] & 0x7f, 0);
        assert!(video_rx.try_recv().is_err());
    }

    #[test]
    fn unknown_media_is_an_error() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        assert!(matches!(
            stream.write_packet_rtp(5, &idr(1)),
            Err(RtspError::MediaNotFound(5))
        ));
        let (sink, _) = recording_sink();
        assert!(stream.add_reader(2, stream.new_reader("r"), sink).is_err());
    }

    #[test]
    fn remove_reader_unsubscribes_from_all_medias() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        let reader = stream.new_reader("r1");
        let (sink, _) = recording_sink();
        stream.add_reader(0, reader.clone(), sink.clone()).unwrap();
        stream.add_reader(1, reader, sink).unwrap();

        stream.remove_reader("r1");
        assert_eq!(stream.distributor(0).unwrap().reader_count(), 0);
        assert_eq!(stream.distributor(1).unwrap().reader_count(), 0);
    }

    #[test]
    fn close_sends_goodbye_and_closes_readers() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        let reader = stream.new_reader("r1");
        reader.start().unwrap();
        let (sink, rx) = recording_sink();
        stream.add_reader(0, reader.clone(), sink).unwrap();

        stream.write_packet_rtp(0, &idr(1)).unwrap();
        stream.close();
        stream.close();
        reader.join();

        let packets: Vec<Vec<u8>> = rx.try_iter().collect();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[1][1], PACKET_TYPE_GOODBYE);
        assert_eq!(&packets[1][4..8], &0xCAFEu32.to_be_bytes());

        assert!(stream.is_closed());
        assert!(matches!(
            stream.write_packet_rtp(0, &idr(2)),
            Err(RtspError::StreamClosed)
        ));
    }

    #[test]
    fn nothing_follows_goodbye_when_closed_mid_write() {
        let config = StreamConfig {
            write_queue_capacity: 1 << 16,
            ..no_reports()
        };
        for _ in 0..20 {
            let stream = Arc::new(Stream::new(medias(), config.clone()).unwrap());
            let reader = stream.new_reader("r1");
            reader.start().unwrap();
            let (sink, rx) = recording_sink();
            stream.add_reader(0, reader.clone(), sink).unwrap();

            let producer = {
                let stream = stream.clone();
                thread::spawn(move || {
                    for seq in 0..20_000u16 {
                        if let Err(e) = stream.write_packet_rtp(0, &idr(seq)) {
                            return Some(e);
                        }
                        thread::yield_now();
                    }
                    None
                })
            };

            let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            stream.close();
            let stopped_by = producer.join().unwrap();
            reader.join();

            let mut packets = vec![first];
            packets.extend(rx.try_iter());
            let goodbyes: Vec<usize> = packets
                .iter()
                .enumerate()
                .filter(|(_, p)| p[1] == PACKET_TYPE_GOODBYE)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(goodbyes, vec![packets.len() - 1]);
            assert!(matches!(stopped_by, None | Some(RtspError::StreamClosed)));
        }
    }

    #[test]
    fn adding_a_reader_after_close_fails() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        stream.close();
        let (sink, _) = recording_sink();
        assert!(matches!(
            stream.add_reader(0, stream.new_reader("late"), sink),
            Err(RtspError::StreamClosed)
        ));
        assert_eq!(stream.distributor(0).unwrap().reader_count(), 0);
    }

    #[test]
    fn duplicate_payload_type_is_rejected() {
        let media = Media::new(
            MediaKind::Audio,
            "track1",
            vec![
                Arc::new(Generic::new(96, 8000, "L16/8000")),
                Arc::new(Generic::new(96, 48000, "L16/48000")),
            ],
        );
        let mut all = medias();
        all.push(media);
        assert!(matches!(
            Stream::new(all, no_reports()),
            Err(RtspError::DuplicatePayloadType {
                media: 2,
                payload_type: 96
            })
        ));
    }

    #[test]
    fn zero_report_period_disables_timer() {
        let config = StreamConfig {
            sender_report_period: Some(Duration::ZERO),
            ..Default::default()
        };
        let stream = Stream::new(medias(), config).unwrap();
        assert!(stream.timer.lock().is_none());
    }

    #[test]
    fn timer_emits_sender_reports() {
        let config = StreamConfig {
            sender_report_period: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let stream = Stream::new(medias(), config).unwrap();
        let reader = stream.new_reader("r1");
        reader.start().unwrap();
        let (sink, rx) = recording_sink();
        stream.add_reader(0, reader, sink).unwrap();

        stream.write_packet_rtp(0, &idr(1)).unwrap();

        let got_report = (0..10).any(|_| {
            rx.recv_timeout(Duration::from_secs(5))
                .is_ok_and(|p| p[1] == PACKET_TYPE_SENDER_REPORT)
        });
        assert!(got_report);
        stream.close();
    }

    #[test]
    fn ids_are_hex() {
        let stream = Stream::new(medias(), no_reports()).unwrap();
        assert_eq!(stream.id().len(), 16);
        assert!(stream.id().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(
            stream.distributor(0).unwrap().track_id(),
            stream.distributor(1).unwrap().track_id()
        );
        assert_eq!(stream.medias().count(), 2);
    }
}
