pub mod conn;
pub mod error;
pub mod media;
pub mod protocol;
pub mod queue;
pub mod rtcp;
pub mod stream;

pub use conn::{Conn, ConnReader, ConnWriter, Received};
pub use error::{Result, RtspError};
pub use media::{Format, Media, MediaKind, RtpPacket};
pub use queue::WriteQueue;
pub use stream::{MediaDistributor, MediaSink, Stream, StreamConfig, UnicastReader};
