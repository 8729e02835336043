use std::fmt;
use std::io::{self, Read, Write};

/// Callback invoked with the bytes moved by one read or write call, and the
/// error if the call failed.
pub type IoObserver = Box<dyn FnMut(&[u8], Option<&io::Error>) + Send>;

/// Pass-through decorator that reports every read/write outcome.
///
/// Data is never altered. Use [`traced`](Self::traced) to log traffic at
/// `trace` level, or [`new`](Self::new) to install custom observers (e.g. a
/// byte counter or a capture file).
pub struct ObservedStream<T> {
    inner: T,
    on_read: Option<IoObserver>,
    on_write: Option<IoObserver>,
}

impl<T> ObservedStream<T> {
    pub fn new(inner: T, on_read: Option<IoObserver>, on_write: Option<IoObserver>) -> Self {
        Self {
            inner,
            on_read,
            on_write,
        }
    }

    /// Log every transfer through `tracing` with the given peer label.
    pub fn traced(inner: T, peer: &str) -> Self {
        let read_peer = peer.to_string();
        let write_peer = peer.to_string();
        Self::new(
            inner,
            Some(Box::new(move |data: &[u8], err: Option<&io::Error>| match err {
                Some(e) => tracing::trace!(peer = %read_peer, error = %e, "read failed"),
                None => tracing::trace!(peer = %read_peer, len = data.len(), "read"),
            })),
            Some(Box::new(move |data: &[u8], err: Option<&io::Error>| match err {
                Some(e) => tracing::trace!(peer = %write_peer, error = %e, "write failed"),
                None => tracing::trace!(peer = %write_peer, len = data.len(), "write"),
            })),
        )
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Read for ObservedStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let res = self.inner.read(buf);
        if let Some(observer) = self.on_read.as_mut() {
            match &res {
                Ok(n) => observer(&buf[..*n], None),
                Err(e) => observer(&[], Some(e)),
            }
        }
        res
    }
}

impl<T: Write> Write for ObservedStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res = self.inner.write(buf);
        if let Some(observer) = self.on_write.as_mut() {
            match &res {
                Ok(n) => observer(&buf[..*n], None),
                Err(e) => observer(&[], Some(e)),
            }
        }
        res
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedStream")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn observers_see_data_unchanged() {
        let reads = Arc::new(Mutex::new(Vec::new()));
        let writes = Arc::new(Mutex::new(Vec::new()));
        let (r, w) = (reads.clone(), writes.clone());

        let mut stream = ObservedStream::new(
            Cursor::new(vec![1u8, 2, 3]),
            Some(Box::new(move |data: &[u8], _: Option<&io::Error>| r.lock().extend_from_slice(data))),
            Some(Box::new(move |data: &[u8], _: Option<&io::Error>| w.lock().extend_from_slice(data))),
        );

        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(*reads.lock(), vec![1, 2, 3]);

        stream.write_all(&[9, 9]).unwrap();
        assert_eq!(*writes.lock(), vec![9, 9]);
        assert_eq!(&stream.get_ref().get_ref()[..], &[1, 2, 3, 9, 9]);
    }
}
