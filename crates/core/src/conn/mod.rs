//! RTSP connection: text messages and interleaved frames on one byte stream.
//!
//! A [`Conn`] is made of two halves that can be used from two different
//! threads: a [`ConnReader`] (buffered, with one byte of lookahead) and a
//! [`ConnWriter`] (unbuffered, one `write_all` per message). Neither half is
//! shared: each read or write operation takes `&mut self`, so one reader and
//! one writer may run concurrently but never two reads or two writes.
//!
//! ## Telling messages and frames apart
//!
//! ```text
//! peek 1 byte ── '$' ──> InterleavedFrame
//!             └─ else ─> RtspRequest / RtspResponse
//! ```
//!
//! RTSP start lines begin with a method token or `RTSP/`, never with `$`,
//! so the decision needs no backtracking beyond that single byte.

pub mod observed;

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::TcpStream;

use crate::error::Result;
use crate::protocol::{
    INTERLEAVED_FRAME_MAGIC_BYTE, InterleavedFrame, RtspRequest, RtspResponse, encode_frame,
};

pub use observed::{IoObserver, ObservedStream};

/// Default size of the read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Result of reading "a frame or a message".
///
/// Frames borrow the reader's scratch frame, which is overwritten by the
/// next read.
#[derive(Debug)]
pub enum Received<'a, M> {
    Frame(&'a InterleavedFrame),
    Message(M),
}

/// Read half of an RTSP connection.
pub struct ConnReader<R> {
    br: BufReader<R>,
    frame: InterleavedFrame,
}

impl<R: Read> ConnReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_SIZE, reader)
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        Self {
            br: BufReader::with_capacity(capacity.max(1), reader),
            frame: InterleavedFrame::default(),
        }
    }

    /// Read one RTSP request.
    pub fn read_request(&mut self) -> Result<RtspRequest> {
        RtspRequest::read_from(&mut self.br)
    }

    /// Read one RTSP response.
    pub fn read_response(&mut self) -> Result<RtspResponse> {
        RtspResponse::read_from(&mut self.br)
    }

    /// Read one interleaved frame into the scratch frame.
    pub fn read_interleaved_frame(&mut self) -> Result<&InterleavedFrame> {
        self.frame.read_from(&mut self.br)?;
        tracing::trace!(
            channel = self.frame.channel,
            len = self.frame.payload.len(),
            "interleaved frame received"
        );
        Ok(&self.frame)
    }

    /// Read a frame or a request, whichever comes next.
    pub fn read_frame_or_request(&mut self) -> Result<Received<'_, RtspRequest>> {
        if self.peek_byte()? == INTERLEAVED_FRAME_MAGIC_BYTE {
            return self.read_interleaved_frame().map(Received::Frame);
        }
        self.read_request().map(Received::Message)
    }

    /// Read a frame or a response, whichever comes next.
    pub fn read_frame_or_response(&mut self) -> Result<Received<'_, RtspResponse>> {
        if self.peek_byte()? == INTERLEAVED_FRAME_MAGIC_BYTE {
            return self.read_interleaved_frame().map(Received::Frame);
        }
        self.read_response().map(Received::Message)
    }

    /// Read the next request, discarding any interleaved frames before it.
    pub fn read_request_skipping_frames(&mut self) -> Result<RtspRequest> {
        loop {
            match self.read_frame_or_request()? {
                Received::Message(req) => return Ok(req),
                Received::Frame(frame) => {
                    tracing::trace!(channel = frame.channel, "skipped frame while awaiting request")
                }
            }
        }
    }

    /// Read the next response, discarding any interleaved frames before it.
    pub fn read_response_skipping_frames(&mut self) -> Result<RtspResponse> {
        loop {
            match self.read_frame_or_response()? {
                Received::Message(res) => return Ok(res),
                Received::Frame(frame) => {
                    tracing::trace!(channel = frame.channel, "skipped frame while awaiting response")
                }
            }
        }
    }

    /// Look at the next byte without consuming it. EOF is an error.
    fn peek_byte(&mut self) -> Result<u8> {
        let buf = self.br.fill_buf()?;
        match buf.first() {
            Some(b) => Ok(*b),
            None => Err(std::io::Error::from(ErrorKind::UnexpectedEof).into()),
        }
    }

    pub fn get_ref(&self) -> &R {
        self.br.get_ref()
    }
}

/// Write half of an RTSP connection.
///
/// Every operation issues exactly one `write_all` on the underlying
/// stream; there is no internal buffering.
pub struct ConnWriter<W> {
    w: W,
}

impl<W: Write> ConnWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { w: writer }
    }

    pub fn write_request(&mut self, req: &RtspRequest) -> Result<()> {
        self.w.write_all(&req.serialize())?;
        Ok(())
    }

    pub fn write_response(&mut self, res: &RtspResponse) -> Result<()> {
        self.w.write_all(&res.serialize())?;
        Ok(())
    }

    /// Write a frame, encoding it into the caller's scratch buffer.
    pub fn write_interleaved_frame(&mut self, frame: &InterleavedFrame, buf: &mut [u8]) -> Result<()> {
        self.write_interleaved(frame.channel, &frame.payload, buf)
    }

    /// Write `payload` as a frame on `channel`, without building an
    /// [`InterleavedFrame`] first.
    pub fn write_interleaved(&mut self, channel: u8, payload: &[u8], buf: &mut [u8]) -> Result<()> {
        let n = encode_frame(channel, payload, buf)?;
        self.w.write_all(&buf[..n])?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }
}

/// An RTSP connection over a duplex byte stream.
pub struct Conn<R, W> {
    reader: ConnReader<R>,
    writer: ConnWriter<W>,
}

impl Conn<TcpStream, TcpStream> {
    /// Wrap a TCP stream; the write half is a `try_clone` of it.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self::new(stream, writer))
    }
}

impl<R: Read, W: Write> Conn<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_capacity(DEFAULT_READ_BUFFER_SIZE, reader, writer)
    }

    pub fn with_capacity(read_buffer_size: usize, reader: R, writer: W) -> Self {
        Self {
            reader: ConnReader::with_capacity(read_buffer_size, reader),
            writer: ConnWriter::new(writer),
        }
    }

    /// Separate the halves so they can move to different threads.
    pub fn split(self) -> (ConnReader<R>, ConnWriter<W>) {
        (self.reader, self.writer)
    }

    pub fn read_request(&mut self) -> Result<RtspRequest> {
        self.reader.read_request()
    }

    pub fn read_response(&mut self) -> Result<RtspResponse> {
        self.reader.read_response()
    }

    pub fn read_interleaved_frame(&mut self) -> Result<&InterleavedFrame> {
        self.reader.read_interleaved_frame()
    }

    pub fn read_frame_or_request(&mut self) -> Result<Received<'_, RtspRequest>> {
        self.reader.read_frame_or_request()
    }

    pub fn read_frame_or_response(&mut self) -> Result<Received<'_, RtspResponse>> {
        self.reader.read_frame_or_response()
    }

    pub fn read_request_skipping_frames(&mut self) -> Result<RtspRequest> {
        self.reader.read_request_skipping_frames()
    }

    pub fn read_response_skipping_frames(&mut self) -> Result<RtspResponse> {
        self.reader.read_response_skipping_frames()
    }

    pub fn write_request(&mut self, req: &RtspRequest) -> Result<()> {
        self.writer.write_request(req)
    }

    pub fn write_response(&mut self, res: &RtspResponse) -> Result<()> {
        self.writer.write_response(res)
    }

    pub fn write_interleaved_frame(&mut self, frame: &InterleavedFrame, buf: &mut [u8]) -> Result<()> {
        self.writer.write_interleaved_frame(frame, buf)
    }
}
