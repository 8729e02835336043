use std::io::Write;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::conn::ConnWriter;
use crate::error::Result;
use crate::protocol::{INTERLEAVED_FRAME_HEADER_SIZE, MAX_PACKET_SIZE};

/// Where a reader's packets for one media end up.
///
/// Called from the reader's queue consumer, so implementations may block.
pub trait MediaSink: Send + Sync {
    fn write_rtp(&self, packet: &[u8]) -> Result<()>;
    fn write_rtcp(&self, packet: &[u8]) -> Result<()>;
}

/// Write half of a connection shared by all the medias of one reader.
pub type SharedConnWriter<W> = Arc<Mutex<ConnWriter<W>>>;

/// Delivers packets as interleaved frames on the reader's RTSP connection.
///
/// Media `n` conventionally uses channels `2n` (RTP) and `2n + 1` (RTCP),
/// as negotiated in the SETUP `interleaved=` parameter.
pub struct InterleavedSink<W> {
    writer: SharedConnWriter<W>,
    rtp_channel: u8,
    rtcp_channel: u8,
    scratch: Mutex<Vec<u8>>,
}

impl<W: Write + Send> InterleavedSink<W> {
    pub fn new(writer: SharedConnWriter<W>, rtp_channel: u8, rtcp_channel: u8) -> Self {
        Self {
            writer,
            rtp_channel,
            rtcp_channel,
            scratch: Mutex::new(vec![0u8; INTERLEAVED_FRAME_HEADER_SIZE + MAX_PACKET_SIZE]),
        }
    }

    /// Channels `2n` / `2n + 1` for the `n`-th media.
    pub fn for_media(writer: SharedConnWriter<W>, media_index: u8) -> Self {
        let rtp = media_index.wrapping_mul(2);
        Self::new(writer, rtp, rtp.wrapping_add(1))
    }

    fn write(&self, channel: u8, packet: &[u8]) -> Result<()> {
        let mut scratch = self.scratch.lock();
        self.writer
            .lock()
            .write_interleaved(channel, packet, &mut scratch)
    }
}

impl<W: Write + Send> MediaSink for InterleavedSink<W> {
    fn write_rtp(&self, packet: &[u8]) -> Result<()> {
        self.write(self.rtp_channel, packet)
    }

    fn write_rtcp(&self, packet: &[u8]) -> Result<()> {
        self.write(self.rtcp_channel, packet)
    }
}

/// Delivers packets over UDP to the client ports given in SETUP.
///
/// The socket is shared between all UDP readers of a server.
pub struct UdpSink {
    socket: Arc<UdpSocket>,
    rtp_addr: SocketAddr,
    rtcp_addr: SocketAddr,
}

impl UdpSink {
    pub fn new(socket: Arc<UdpSocket>, rtp_addr: SocketAddr, rtcp_addr: SocketAddr) -> Self {
        Self {
            socket,
            rtp_addr,
            rtcp_addr,
        }
    }
}

impl MediaSink for UdpSink {
    fn write_rtp(&self, packet: &[u8]) -> Result<()> {
        self.socket.send_to(packet, self.rtp_addr)?;
        Ok(())
    }

    fn write_rtcp(&self, packet: &[u8]) -> Result<()> {
        self.socket.send_to(packet, self.rtcp_addr)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn interleaved_sink_uses_media_channels() {
        let writer = Arc::new(Mutex::new(ConnWriter::new(Vec::new())));
        let video = InterleavedSink::for_media(writer.clone(), 0);
        let audio = InterleavedSink::for_media(writer.clone(), 1);

        video.write_rtp(&[1]).unwrap();
        audio.write_rtp(&[2]).unwrap();
        audio.write_rtcp(&[3, 4]).unwrap();

        assert_eq!(
            writer.lock().get_ref().as_slice(),
            &[0x24, 0, 0, 1, 1, 0x24, 2, 0, 1, 2, 0x24, 3, 0, 2, 3, 4]
        );
    }

    #[test]
    fn interleaved_sink_rejects_oversized_packet() {
        let writer = Arc::new(Mutex::new(ConnWriter::new(Vec::new())));
        let sink = InterleavedSink::for_media(writer.clone(), 0);
        assert!(sink.write_rtp(&vec![0u8; MAX_PACKET_SIZE + 1]).is_err());
        assert!(writer.lock().get_ref().is_empty());
    }

    #[test]
    fn udp_sink_splits_rtp_and_rtcp() {
        let rtp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let rtcp = UdpSocket::bind("127.0.0.1:0").unwrap();
        rtp.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        rtcp.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let sink = UdpSink::new(socket, rtp.local_addr().unwrap(), rtcp.local_addr().unwrap());
        sink.write_rtp(&[0x80, 96]).unwrap();
        sink.write_rtcp(&[0x80, 200]).unwrap();

        let mut buf = [0u8; 16];
        let n = rtp.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x80, 96]);
        let n = rtcp.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x80, 200]);
    }
}
