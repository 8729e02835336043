use std::io::{ErrorKind, Read};

use crate::error::{ParseErrorKind, Result, RtspError};

/// First byte of every interleaved frame (`$`, RFC 2326 §10.12).
///
/// No RTSP request method or `RTSP/` status line starts with this byte.
pub const INTERLEAVED_FRAME_MAGIC_BYTE: u8 = 0x24;

/// Maximum size of an RTP/RTCP packet carried by this library.
///
/// 1500 (Ethernet MTU) - 20 (IPv4 header) - 8 (UDP header).
pub const MAX_PACKET_SIZE: usize = 1472;

/// Size of the `$ | channel | length` prefix.
pub const INTERLEAVED_FRAME_HEADER_SIZE: usize = 4;

/// An RTP or RTCP packet tunneled on the RTSP connection (RFC 2326 §10.12).
///
/// ```text
///  0               1               2               3
/// +---------------+---------------+-------------------------------+
/// |  magic ($)    |   channel     |        length (BE u16)        |
/// +---------------+---------------+-------------------------------+
/// |                     payload (length bytes)                    |
/// +---------------------------------------------------------------+
/// ```
///
/// By convention, channel `2n` carries RTP and `2n + 1` carries RTCP for
/// the `n`-th media set up on the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterleavedFrame {
    pub channel: u8,
    pub payload: Vec<u8>,
}

impl InterleavedFrame {
    pub fn new(channel: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            channel,
            payload: payload.into(),
        }
    }

    /// Encoded size on the wire.
    pub fn marshal_size(&self) -> usize {
        INTERLEAVED_FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Serialize into `buf`, returning the number of bytes written.
    ///
    /// Fails if the payload exceeds [`MAX_PACKET_SIZE`] or `buf` is too small.
    pub fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        encode_frame(self.channel, &self.payload, buf)
    }

    /// Serialize into a freshly allocated buffer.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.marshal_size()];
        self.marshal_to(&mut buf)?;
        Ok(buf)
    }

    /// Read one frame from `reader`, reusing this frame's payload allocation.
    ///
    /// EOF before the first byte is an [`RtspError::Io`]; EOF anywhere after
    /// it is an [`RtspError::TruncatedFrame`].
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<()> {
        let mut header = [0u8; INTERLEAVED_FRAME_HEADER_SIZE];

        let n = read_full(reader, &mut header)?;
        if n == 0 {
            return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into());
        }
        if header[0] != INTERLEAVED_FRAME_MAGIC_BYTE {
            return Err(RtspError::parse(ParseErrorKind::InvalidFrameMagic));
        }
        if n < header.len() {
            return Err(RtspError::TruncatedFrame {
                expected: header.len(),
                received: n,
            });
        }

        let len = u16::from_be_bytes([header[2], header[3]]) as usize;
        if len > MAX_PACKET_SIZE {
            return Err(RtspError::FrameTooLarge {
                len,
                max: MAX_PACKET_SIZE,
            });
        }

        self.channel = header[1];
        self.payload.resize(len, 0);

        let n = read_full(reader, &mut self.payload)?;
        if n < len {
            self.payload.truncate(n);
            return Err(RtspError::TruncatedFrame {
                expected: len,
                received: n,
            });
        }

        Ok(())
    }
}

/// Write `$ | channel | length | payload` into `buf`, returning the encoded size.
pub fn encode_frame(channel: u8, payload: &[u8], buf: &mut [u8]) -> Result<usize> {
    if payload.len() > MAX_PACKET_SIZE {
        return Err(RtspError::FrameTooLarge {
            len: payload.len(),
            max: MAX_PACKET_SIZE,
        });
    }

    let size = INTERLEAVED_FRAME_HEADER_SIZE + payload.len();
    if buf.len() < size {
        return Err(RtspError::PacketTooLarge {
            size,
            max: buf.len(),
        });
    }

    buf[0] = INTERLEAVED_FRAME_MAGIC_BYTE;
    buf[1] = channel;
    buf[2..4].copy_from_slice(&(payload.len() as u16).to_be_bytes());
    buf[4..size].copy_from_slice(payload);
    Ok(size)
}

/// Like `read_exact`, but reports how many bytes arrived before EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
