//! Asynchronous IRC line framing.
//!
//! [`LineReader`] turns any [`AsyncRead`] into a stream of protocol lines:
//! split on LF, one CR before the LF stripped, over-long lines silently
//! truncated to [`MAX_LINE_LENGTH`] bytes before anyone parses them.

use memchr::memchr;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// How many bytes of one line are kept for parsing; the rest is dropped.
pub const MAX_LINE_LENGTH: usize = 495;

/// Total buffering bound. A line that grows past this without a newline is a
/// protocol error and kills the connection.
const MAX_BUFFER_LENGTH: usize = 64 * 1024;

/// A buffered line reader over one connection.
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    /// Prefix of `buf` already scanned for a newline.
    scanned: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> LineReader<R> {
        LineReader {
            inner,
            buf: Vec::with_capacity(1024),
            scanned: 0,
        }
    }

    /// Reads the next line, without its line ending.
    ///
    /// Returns `Ok(None)` at the end of the stream; a final unterminated line
    /// is yielded before that. Invalid UTF-8 is replaced, not rejected.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(i) = memchr(b'\n', &self.buf[self.scanned..]) {
                let mut line: Vec<u8> = self.buf.drain(..=self.scanned + i).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.scanned = 0;
                return Ok(Some(finish(line)));
            }
            self.scanned = self.buf.len();
            if self.buf.len() > MAX_BUFFER_LENGTH {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
            }
            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let mut line = std::mem::take(&mut self.buf);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                self.scanned = 0;
                return Ok(Some(finish(line)));
            }
        }
    }
}

fn finish(mut line: Vec<u8>) -> String {
    line.truncate(MAX_LINE_LENGTH);
    match String::from_utf8(line) {
        Ok(line) => line,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn splits_on_crlf_and_bare_lf() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        tx.write_all(b"NICK alice\r\nUSER alice\ntail").await.unwrap();
        drop(tx);
        let mut reader = LineReader::new(rx);
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("NICK alice"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("USER alice"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn lines_spread_over_many_reads() {
        let (mut tx, rx) = tokio::io::duplex(1024);
        let mut reader = LineReader::new(rx);
        tx.write_all(b"PRIVMSG bob").await.unwrap();
        let pending = tokio::spawn(async move {
            tx.write_all(b" :hello\r\nPING\r\n").await.unwrap();
            tx
        });
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PRIVMSG bob :hello"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PING"));
        drop(pending.await.unwrap());
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn long_lines_are_silently_truncated() {
        let (mut tx, rx) = tokio::io::duplex(4096);
        let mut line = b"PRIVMSG #room :".to_vec();
        line.resize(600, b'x');
        line.extend_from_slice(b"\r\nPING\r\n");
        tx.write_all(&line).await.unwrap();
        drop(tx);
        let mut reader = LineReader::new(rx);
        let line = reader.read_line().await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_LENGTH);
        assert!(line.starts_with("PRIVMSG #room :"));
        assert_eq!(reader.read_line().await.unwrap().as_deref(), Some("PING"));
    }

    #[tokio::test]
    async fn unterminated_lines_past_the_buffer_bound_fail() {
        let (mut tx, rx) = tokio::io::duplex(128 * 1024);
        tx.write_all(&vec![b'a'; 70_000]).await.unwrap();
        drop(tx);
        let mut reader = LineReader::new(rx);
        let err = reader.read_line().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
