//! Long-lived subscription streams.
//!
//! A subscription owns its connection. A background task reads frames off
//! the socket and hands each decoded message to the caller's callback until
//! the engine closes the stream, the stream idles out, or the handle is
//! stopped or dropped.

use crate::reply::{Failure, Reply};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_protocol::{LineDecoder, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

/// Receives every message of a subscription, in arrival order.
pub type MessageCallback = Box<dyn FnMut(Reply) + Send + 'static>;

/// Read-side limits shared by request and subscription reads.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadSettings {
    pub idle_timeout: Duration,
    pub read_buffer_size: usize,
    pub max_frame_size: usize,
}

#[derive(Debug, Default)]
struct SubscriptionState {
    stopped: AtomicBool,
    finished: AtomicBool,
}

/// Handle to a running subscription.
///
/// Dropping the handle stops the subscription.
pub struct SubscriptionHandle {
    state: Arc<SubscriptionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Starts pumping `stream` into `callback`. Must be called inside a
    /// tokio runtime.
    pub(crate) fn spawn<S>(
        stream: S,
        settings: ReadSettings,
        callback: Option<MessageCallback>,
    ) -> Self
    where
        S: AsyncRead + Send + Unpin + 'static,
    {
        let state = Arc::new(SubscriptionState::default());
        let task = tokio::spawn(pump(stream, settings, callback, Arc::clone(&state)));
        Self {
            state,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops delivery and closes the connection. No new delivery starts
    /// after this returns; a callback already running on another worker
    /// finishes first. Calling it again does nothing.
    pub fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.lock().take() {
            task.abort();
            tracing::debug!("Subscription stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }

    /// Returns whether the stream ended on its own (closed, idled out or
    /// failed).
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("stopped", &self.is_stopped())
            .field("finished", &self.is_finished())
            .finish()
    }
}

async fn pump<S>(
    mut stream: S,
    settings: ReadSettings,
    mut callback: Option<MessageCallback>,
    state: Arc<SubscriptionState>,
) where
    S: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::with_max_frame_size(settings.max_frame_size);
    let mut buf = vec![0u8; settings.read_buffer_size];

    loop {
        let n = match tokio::time::timeout(settings.idle_timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                tracing::debug!("Subscription closed by peer");
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!("Subscription read error: {}", e);
                break;
            }
            Err(_) => {
                tracing::debug!("Subscription idle for {:?}, closing", settings.idle_timeout);
                break;
            }
        };
        decoder.extend(&buf[..n]);

        loop {
            let line = match decoder.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(ProtocolError::FrameTooLarge { size, max }) => {
                    tracing::warn!("Subscription frame too large: {} bytes (max {})", size, max);
                    state.finished.store(true, Ordering::SeqCst);
                    return;
                }
                Err(e) => {
                    tracing::warn!("Subscription framing error: {}", e);
                    state.finished.store(true, Ordering::SeqCst);
                    return;
                }
            };

            if state.stopped.load(Ordering::SeqCst) {
                return;
            }

            let reply = match tessera_protocol::decode_bytes(&line) {
                Ok(value) => Reply::Message(value),
                Err(e) => Reply::Failure(Failure::InvalidMessage(e.to_string())),
            };

            match callback.as_mut() {
                Some(cb) => cb(reply),
                None => tracing::debug!("Subscription message dropped, no callback"),
            }
        }
    }

    state.finished.store(true, Ordering::SeqCst);
}
