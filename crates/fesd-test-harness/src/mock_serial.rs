//! Mock transport for deterministic testing of the serial console.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Clones share the same script and log, so a test
//! can hand one clone to the code under test and keep another to inspect
//! what reached the wire.
//!
//! # Example
//!
//! ```
//! use fesd_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! mock.expect_flush();
//! mock.expect(b"*IDN? 1 \r", b"Acme,SC2470,1234,1.2\rOK\r>");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use fesd_core::{Error, Result, Transport};
use tokio::time::Instant;

/// Bytes sent when a console opens its port or clears the line.
const FLUSH_REQUEST: &[u8] = b"\x03\r";

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: Vec<u8>,
    delay: Duration,
}

/// A response on its way back, readable from `ready_at`.
#[derive(Debug)]
struct Pending {
    bytes: Vec<u8>,
    cursor: usize,
    ready_at: Instant,
}

#[derive(Debug)]
struct State {
    expectations: VecDeque<Expectation>,
    pending: VecDeque<Pending>,
    connected: bool,
    sent_log: Vec<Vec<u8>>,
    close_count: usize,
    reopen_count: usize,
    fail_reopen: bool,
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation. The
/// corresponding response is queued behind any unread earlier response and
/// returned by subsequent `receive()` calls.
///
/// A `receive()` with nothing pending waits for the full timeout before
/// returning [`Error::Timeout`], like a silent serial line. Tests that rely
/// on this run with paused tokio time.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(State {
                expectations: VecDeque::new(),
                pending: VecDeque::new(),
                connected: true,
                sent_log: Vec::new(),
                close_count: 0,
                reopen_count: 0,
                fail_reopen: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread poisons the lock; the data is still usable.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// An empty `response` models a write the instrument never answers.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.expect_delayed(request, response, Duration::ZERO);
    }

    /// Like [`expect`](Self::expect), but the response only becomes readable
    /// `delay` after the request is sent.
    pub fn expect_delayed(&self, request: &[u8], response: &[u8], delay: Duration) {
        self.state().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
            delay,
        });
    }

    /// Expect the ETX buffer flush a console sends when it opens the port.
    pub fn expect_flush(&self) {
        self.expect(FLUSH_REQUEST, b"");
    }

    /// Expect the ETX a console sends to clear the line after a timeout,
    /// answered with a bare prompt.
    pub fn expect_resync(&self) {
        self.expect(FLUSH_REQUEST, b"\r>");
    }

    /// Every `send()` payload so far, in order.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state().sent_log.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.state().expectations.len()
    }

    /// Set the connected state.
    ///
    /// While `false`, `send()` and `receive()` return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.state().connected = connected;
    }

    /// Make subsequent `reopen()` calls fail with [`Error::Transport`].
    pub fn fail_reopen(&self, fail: bool) {
        self.state().fail_reopen = fail;
    }

    /// How many times `close()` was called on a connected transport.
    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    /// How many times `reopen()` succeeded.
    pub fn reopen_count(&self) -> usize {
        self.state().reopen_count
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(Error::NotConnected);
        }

        state.sent_log.push(data.to_vec());

        let expectation = state
            .expectations
            .pop_front()
            .ok_or_else(|| Error::Transport("no more expectations in mock transport".into()))?;
        if data != expectation.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        if !expectation.response.is_empty() {
            state.pending.push_back(Pending {
                bytes: expectation.response,
                cursor: 0,
                ready_at: Instant::now() + expectation.delay,
            });
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            let ready_at = {
                let mut state = self.state();
                if !state.connected {
                    return Err(Error::NotConnected);
                }

                let now = Instant::now();
                match state.pending.front_mut() {
                    Some(pending) if pending.ready_at <= now => {
                        let remaining = &pending.bytes[pending.cursor..];
                        let n = remaining.len().min(buf.len());
                        buf[..n].copy_from_slice(&remaining[..n]);
                        pending.cursor += n;
                        if pending.cursor >= pending.bytes.len() {
                            state.pending.pop_front();
                        }
                        return Ok(n);
                    }
                    Some(pending) => Some(pending.ready_at),
                    None => None,
                }
            };

            match ready_at {
                Some(at) if at <= deadline => tokio::time::sleep_until(at).await,
                _ => {
                    tokio::time::sleep_until(deadline).await;
                    return Err(Error::Timeout);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.connected {
            state.close_count += 1;
        }
        state.connected = false;
        state.pending.clear();
        Ok(())
    }

    async fn reopen(&mut self) -> Result<()> {
        let mut state = self.state();
        if state.fail_reopen {
            return Err(Error::Transport("mock port unavailable".into()));
        }
        state.connected = true;
        state.reopen_count += 1;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }
}
