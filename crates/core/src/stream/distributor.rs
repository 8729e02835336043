use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::media::{Format, Media, RtpPacket};
use crate::protocol::MAX_PACKET_SIZE;
use crate::queue::QueueError;
use crate::rtcp::{Goodbye, RtcpPacket, RtcpSender};
use crate::stream::{MediaSink, MulticastGroup, MulticastWriter, UnicastReader};

/// Sender-report bookkeeping for one payload type of a media.
#[derive(Debug)]
pub struct FormatTracker {
    format: Arc<dyn Format>,
    sender: RtcpSender,
}

impl FormatTracker {
    fn new(format: Arc<dyn Format>) -> Self {
        let sender = RtcpSender::new(format.clock_rate());
        Self { format, sender }
    }

    pub fn format(&self) -> &Arc<dyn Format> {
        &self.format
    }

    pub fn sender(&self) -> &RtcpSender {
        &self.sender
    }

    fn observe(&self, packet: &RtpPacket, ntp: SystemTime) {
        let pts_equals_dts = self.format.pts_equals_dts(packet);
        self.sender.observe(packet, ntp, pts_equals_dts);
    }
}

#[derive(Clone)]
struct Subscriber {
    reader: Arc<UnicastReader>,
    sink: Arc<dyn MediaSink>,
}

#[derive(Clone, Copy)]
enum PacketKind {
    Rtp,
    Rtcp,
}

/// Fan-out of one media of a [`Stream`](super::Stream).
///
/// Each outbound packet is serialized once, then handed to the write queue
/// of every subscribed reader and written directly to the multicast sink,
/// if any. A reader whose queue is full loses that packet; nobody else
/// does.
pub struct MediaDistributor {
    stream_id: String,
    track_id: String,
    media: Media,
    trackers: HashMap<u8, FormatTracker>,
    readers: RwLock<HashMap<String, Subscriber>>,
    multicast: Mutex<Option<Arc<MulticastWriter>>>,
    multicast_ttl: u32,
}

impl MediaDistributor {
    pub(crate) fn new(stream_id: &str, track_id: String, media: Media, multicast_ttl: u32) -> Self {
        let trackers = media
            .formats
            .iter()
            .map(|f| (f.payload_type(), FormatTracker::new(f.clone())))
            .collect();

        Self {
            stream_id: stream_id.to_string(),
            track_id,
            media,
            trackers,
            readers: RwLock::new(HashMap::new()),
            multicast: Mutex::new(None),
            multicast_ttl,
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    /// Tracker of a registered payload type.
    pub fn tracker(&self, payload_type: u8) -> Option<&FormatTracker> {
        self.trackers.get(&payload_type)
    }

    /// Add a reader, or replace its sink if already subscribed.
    pub fn subscribe(&self, reader: Arc<UnicastReader>, sink: Arc<dyn MediaSink>) {
        let id = reader.id().to_string();
        let total = {
            let mut readers = self.readers.write();
            readers.insert(id.clone(), Subscriber { reader, sink });
            readers.len()
        };
        tracing::debug!(stream = %self.stream_id, track = %self.track_id, reader = %id, total, "reader subscribed");
    }

    /// Remove a reader. Returns whether it was subscribed.
    pub fn unsubscribe(&self, reader_id: &str) -> bool {
        let removed = self.readers.write().remove(reader_id).is_some();
        if removed {
            tracing::debug!(stream = %self.stream_id, track = %self.track_id, reader = reader_id, "reader unsubscribed");
        }
        removed
    }

    pub fn reader_count(&self) -> usize {
        self.readers.read().len()
    }

    /// Multicast sink of this media, created on first call.
    pub fn ensure_multicast(&self, group: MulticastGroup) -> Result<Arc<MulticastWriter>> {
        let mut multicast = self.multicast.lock();
        if let Some(writer) = multicast.as_ref() {
            return Ok(writer.clone());
        }

        let writer = Arc::new(MulticastWriter::new(group, self.multicast_ttl)?);
        *multicast = Some(writer.clone());
        tracing::info!(
            stream = %self.stream_id,
            track = %self.track_id,
            rtp = %writer.rtp_addr(),
            rtcp = %writer.rtcp_addr(),
            "multicast sink allocated"
        );
        Ok(writer)
    }

    pub fn multicast(&self) -> Option<Arc<MulticastWriter>> {
        self.multicast.lock().clone()
    }

    /// Deliver an RTP packet produced at wall-clock time `ntp`.
    ///
    /// A packet that cannot be serialized is dropped and never reaches the
    /// trackers or any reader.
    pub fn distribute_rtp(&self, packet: &RtpPacket, ntp: SystemTime) {
        let mut buf = BytesMut::zeroed(MAX_PACKET_SIZE);
        let n = match packet.marshal_to(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(
                    stream = %self.stream_id,
                    track = %self.track_id,
                    seq = packet.sequence_number,
                    error = %e,
                    "dropping unserializable RTP packet"
                );
                return;
            }
        };
        buf.truncate(n);

        if let Some(tracker) = self.trackers.get(&packet.payload_type) {
            tracker.observe(packet, ntp);
        }

        self.fan_out(buf.freeze(), PacketKind::Rtp, |reader| {
            tracing::warn!(
                stream = %self.stream_id,
                track = %self.track_id,
                reader,
                ssrc = packet.ssrc,
                pt = packet.payload_type,
                seq = packet.sequence_number,
                ts = packet.timestamp,
                "write queue full, RTP packet dropped"
            )
        });
    }

    /// Deliver an RTCP packet to every reader and the multicast sink.
    pub fn distribute_rtcp(&self, packet: &RtcpPacket) {
        let data = match packet.marshal() {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(stream = %self.stream_id, track = %self.track_id, error = %e, "dropping unserializable RTCP packet");
                return;
            }
        };

        self.fan_out(data, PacketKind::Rtcp, |reader| {
            tracing::warn!(
                stream = %self.stream_id,
                track = %self.track_id,
                reader,
                "write queue full, RTCP packet dropped"
            )
        });
    }

    fn fan_out(&self, data: Bytes, kind: PacketKind, on_full: impl Fn(&str)) {
        let subscribers: Vec<Subscriber> = self.readers.read().values().cloned().collect();

        for sub in subscribers {
            let sink = sub.sink;
            let data = data.clone();
            let reader_id = sub.reader.id().to_string();
            let task = Box::new(move || {
                let res = match kind {
                    PacketKind::Rtp => sink.write_rtp(&data),
                    PacketKind::Rtcp => sink.write_rtcp(&data),
                };
                if let Err(e) = res {
                    tracing::debug!(reader = %reader_id, error = %e, "write to reader failed");
                }
            });

            match sub.reader.enqueue(task) {
                Ok(()) => {}
                Err(QueueError::Full) => on_full(sub.reader.id()),
                Err(QueueError::Closed) => {}
            }
        }

        let multicast = self.multicast.lock().clone();
        if let Some(writer) = multicast {
            let res = match kind {
                PacketKind::Rtp => writer.write_rtp(&data),
                PacketKind::Rtcp => writer.write_rtcp(&data),
            };
            if let Err(e) = res {
                tracing::debug!(stream = %self.stream_id, track = %self.track_id, error = %e, "multicast write failed");
            }
        }
    }

    /// Send a Sender Report for every format that has one.
    pub(crate) fn send_reports(&self) {
        for tracker in self.trackers.values() {
            if let Some(sr) = tracker.sender.report() {
                self.distribute_rtcp(&RtcpPacket::from(sr));
            }
        }
    }

    /// Send a BYE for every SSRC seen on this media.
    pub(crate) fn send_goodbye(&self) {
        let mut sources: Vec<u32> = self
            .trackers
            .values()
            .filter_map(|t| t.sender.stats().ssrc)
            .collect();
        sources.sort_unstable();
        sources.dedup();

        if !sources.is_empty() {
            self.distribute_rtcp(&RtcpPacket::from(Goodbye { sources }));
        }
    }

    /// Close the trackers, release the multicast sink and forget every
    /// reader. Returns the readers that were subscribed.
    pub(crate) fn close(&self) -> Vec<Arc<UnicastReader>> {
        for tracker in self.trackers.values() {
            tracker.sender.close();
        }
        self.multicast.lock().take();

        self.readers
            .write()
            .drain()
            .map(|(_, sub)| sub.reader)
            .collect()
    }
}
