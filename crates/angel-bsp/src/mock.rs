//! In-memory serial link for driver tests.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{sleep, Sleep};

/// Bytes the test injects come out of `poll_read` one at a time; once they
/// run out the port reads as EOF. Everything written is recorded and can be
/// inspected through a [`TxLog`] handle even after the port has been moved
/// into a driver.
#[derive(Debug, Default)]
pub struct MockPort {
    rx: VecDeque<u8>,
    tx: TxLog,
    write_limit: Option<usize>,
    stall_when_empty: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TxLog(Arc<Mutex<Vec<u8>>>);

impl TxLog {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rx(data: &[u8]) -> Self {
        let mut port = Self::new();
        port.inject_rx(data);
        port
    }

    pub fn inject_rx(&mut self, data: &[u8]) {
        self.rx.extend(data.iter().copied());
    }

    pub fn tx_log(&self) -> TxLog {
        self.tx.clone()
    }

    /// Accept at most `n` bytes per write call.
    pub fn limit_writes(mut self, n: usize) -> Self {
        self.write_limit = Some(n);
        self
    }

    /// Once RX is drained, pend forever instead of reporting EOF, the way a
    /// quiet serial line behaves.
    pub fn stall_when_empty(mut self) -> Self {
        self.stall_when_empty = true;
        self
    }
}

impl AsyncRead for MockPort {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.rx.pop_front() {
            Some(b) => {
                buf.put_slice(&[b]);
                Poll::Ready(Ok(()))
            }
            None if self.stall_when_empty => Poll::Pending,
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncWrite for MockPort {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<usize>> {
        let n = self.write_limit.map_or(data.len(), |l| l.min(data.len()));
        let mut tx = self.tx.0.lock().map_err(|_| io::Error::other("tx log poisoned"))?;
        tx.extend_from_slice(&data[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Read-only link that never goes quiet: after an optional prefix it repeats
/// `pattern` forever, one byte every `gap`.
pub struct TricklePort {
    prefix: VecDeque<u8>,
    pattern: Vec<u8>,
    pos: usize,
    gap: Duration,
    delay: Option<Pin<Box<Sleep>>>,
}

impl TricklePort {
    pub fn new(pattern: &[u8], gap: Duration) -> Self {
        Self { prefix: VecDeque::new(), pattern: pattern.to_vec(), pos: 0, gap, delay: None }
    }

    /// Bytes served once, before the repeating pattern starts.
    pub fn after(mut self, prefix: &[u8]) -> Self {
        self.prefix.extend(prefix.iter().copied());
        self
    }
}

impl AsyncRead for TricklePort {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let gap = this.gap;
        let delay = this.delay.get_or_insert_with(|| Box::pin(sleep(gap)));
        ready!(delay.as_mut().poll(cx));
        this.delay = None;

        let byte = match this.prefix.pop_front() {
            Some(b) => b,
            None if this.pattern.is_empty() => return Poll::Ready(Ok(())),
            None => {
                let b = this.pattern[this.pos % this.pattern.len()];
                this.pos += 1;
                b
            }
        };
        buf.put_slice(&[byte]);
        Poll::Ready(Ok(()))
    }
}
