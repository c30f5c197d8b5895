//! Bidirectional stream communications.
//!
//! A registered stream entry is only a template: its entry handler runs once
//! per opened session. Opening a session creates two endpoints and
//! cross-connects them, so each side's `send` lands in the peer's inbound
//! queue. Delivery is FIFO per endpoint, blocked receivers park on a condvar
//! and are woken by the next send or by either side closing.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::value::Value;

/// Errors surfaced by stream endpoint operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The session was closed by either endpoint.
    #[error("stream is closed")]
    Closed,

    /// A bounded receive expired before a value arrived.
    #[error("timed out waiting for a value")]
    Timeout,
}

/// Inbound queue of one endpoint.
struct Inbox {
    queue: Mutex<VecDeque<Value>>,
    available: Condvar,
}

impl Inbox {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        })
    }
}

/// One endpoint of a connected stream pair.
///
/// Cloning an endpoint clones the handle, not the session: all clones share
/// the same queues and close state.
#[derive(Clone)]
pub struct Stream {
    inbox: Arc<Inbox>,
    peer: Arc<Inbox>,
    closed: Arc<AtomicBool>,
}

impl Stream {
    /// Create two endpoints cross-connected to each other.
    pub fn pair() -> (Stream, Stream) {
        let left = Inbox::new();
        let right = Inbox::new();
        let closed = Arc::new(AtomicBool::new(false));

        (
            Stream {
                inbox: left.clone(),
                peer: right.clone(),
                closed: closed.clone(),
            },
            Stream {
                inbox: right,
                peer: left,
                closed,
            },
        )
    }

    /// Push a value into the peer's inbound queue and wake its receiver.
    pub fn send(&self, value: impl Into<Value>) -> Result<(), StreamError> {
        if self.is_closed() {
            return Err(StreamError::Closed);
        }
        let mut queue = self.peer.queue.lock();
        queue.push_back(value.into());
        self.peer.available.notify_one();
        Ok(())
    }

    /// Block the calling thread until a value arrives, oldest first.
    ///
    /// Values buffered before a close are still drained; once the queue is
    /// empty on a closed stream this returns [`StreamError::Closed`]. The
    /// wait parks on a condvar — there is no polling.
    pub fn recv_block(&self) -> Result<Value, StreamError> {
        let mut queue = self.inbox.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return Ok(value);
            }
            if self.is_closed() {
                return Err(StreamError::Closed);
            }
            self.inbox.available.wait(&mut queue);
        }
    }

    /// Like [`recv_block`](Self::recv_block), bounded by a deadline.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Value, StreamError> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inbox.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                return Ok(value);
            }
            if self.is_closed() {
                return Err(StreamError::Closed);
            }
            if self
                .inbox
                .available
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                return match queue.pop_front() {
                    Some(value) => Ok(value),
                    None => Err(StreamError::Timeout),
                };
            }
        }
    }

    /// Wait for the next inbound value on a dedicated thread and hand it to
    /// `handler` exactly once.
    ///
    /// The handler does not re-arm itself; a consumer wanting a continuous
    /// stream calls this again from inside the handler. If the session closes
    /// before a value arrives the handler is dropped without being called.
    pub fn recv_callback(&self, handler: impl FnOnce(Value) + Send + 'static) -> JoinHandle<()> {
        let endpoint = self.clone();
        thread::spawn(move || {
            if let Ok(value) = endpoint.recv_block() {
                handler(value);
            }
        })
    }

    /// Close both endpoints of the pair and wake every blocked receiver.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // take each queue lock so a receiver is either parked (and woken) or
        // will observe the closed flag before parking
        for inbox in [&self.inbox, &self.peer] {
            let _queue = inbox.queue.lock();
            inbox.available.notify_all();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("closed", &self.is_closed())
            .field("buffered", &self.inbox.queue.lock().len())
            .finish()
    }
}

/// Entry handler run against the template side's endpoint of each session.
pub type StreamEntryHandler = Arc<dyn Fn(Stream) + Send + Sync>;

/// A registered stream template.
pub struct StreamCommunication {
    entry: StreamEntryHandler,
}

impl StreamCommunication {
    pub fn new(entry: impl Fn(Stream) + Send + Sync + 'static) -> Self {
        Self {
            entry: Arc::new(entry),
        }
    }

    /// Open one session against this template.
    ///
    /// Two endpoints are created and cross-connected; the template's entry
    /// handler and the opener's session handler each run to completion on a
    /// dedicated thread, and each endpoint is closed when its handler
    /// returns, which propagates to the peer.
    pub fn open(&self, session_handler: impl FnOnce(Stream) + Send + 'static) -> StreamSession {
        let (local, remote) = Stream::pair();
        let entry = self.entry.clone();

        let template_side = thread::spawn(move || {
            let endpoint = remote.clone();
            entry(remote);
            endpoint.close();
        });

        let opener_side = thread::spawn(move || {
            let endpoint = local.clone();
            session_handler(local);
            endpoint.close();
        });

        StreamSession {
            opener_side,
            template_side,
        }
    }
}

impl std::fmt::Debug for StreamCommunication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCommunication").finish_non_exhaustive()
    }
}

/// Handle over one opened session's two handler threads.
#[derive(Debug)]
pub struct StreamSession {
    opener_side: JoinHandle<()>,
    template_side: JoinHandle<()>,
}

impl StreamSession {
    /// Wait for both session handlers to run to completion.
    pub fn join(self) {
        let _ = self.opener_side.join();
        let _ = self.template_side.join();
    }
}
