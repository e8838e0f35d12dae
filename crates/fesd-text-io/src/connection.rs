//! Shared, lock-serialized access to one instrument port.
//!
//! Several devices can sit behind one port (distinct slot ids), and several
//! tasks can hold commanders for them. [`DeviceConnection`] is the single
//! owner of the port's [`SerialConsole`]; it is shared as
//! `Arc<DeviceConnection>` and admits one transaction at a time.

use std::sync::Arc;
use std::time::Duration;

use fesd_core::{Result, Transport};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::console::{ConsoleConfig, SerialConsole};

/// Wait between dropping and re-acquiring the port during a reset.
///
/// The instrument reloads its configuration from non-volatile memory after
/// a reset and does not answer until that completes; 5 s was too short.
pub const RESET_SETTLE_INTERVAL: Duration = Duration::from_secs(10);

/// One port's console behind an async mutex.
pub struct DeviceConnection {
    port: String,
    console: Mutex<SerialConsole>,
}

impl DeviceConnection {
    /// Open a console on `transport` and wrap it for sharing.
    pub async fn open(
        port: impl Into<String>,
        transport: Box<dyn Transport>,
        config: ConsoleConfig,
    ) -> Result<Arc<Self>> {
        let port = port.into();
        let console = SerialConsole::open(port.clone(), transport, config).await?;
        info!(port = %port, "connection opened");
        Ok(Arc::new(Self {
            port,
            console: Mutex::new(console),
        }))
    }

    /// Name of the underlying port.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Send `message` and return the reply payload.
    ///
    /// Callers queue on the lock; the exchange itself is bounded by the
    /// console's read timeout.
    pub async fn transact(&self, message: &str) -> Result<String> {
        let mut console = self.console.lock().await;
        console.transact(message).await
    }

    /// Drop and re-acquire the port around a device reset.
    ///
    /// `notify_message` (typically the reset command) is written first
    /// without waiting for a reply, since the device goes away. Then the
    /// port is closed, the caller is held for [`RESET_SETTLE_INTERVAL`],
    /// and the port is reopened and flushed. Responsiveness is not
    /// checked here; callers follow up with a query.
    pub async fn reset_connection(&self, notify_message: &str) -> Result<()> {
        let mut console = self.console.lock().await;
        info!(port = %self.port, "resetting connection");

        if !notify_message.is_empty() {
            if let Err(e) = console.write_line(notify_message).await {
                warn!(port = %self.port, error = %e, "reset notify failed (continuing)");
            }
        }

        console.disconnect().await?;
        tokio::time::sleep(RESET_SETTLE_INTERVAL).await;
        console.reconnect().await?;

        info!(port = %self.port, "connection restored");
        Ok(())
    }
}

impl std::fmt::Debug for DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fesd_core::Error;
    use fesd_test_harness::MockTransport;
    use tokio::time::Instant;

    async fn open(mock: &MockTransport) -> Arc<DeviceConnection> {
        mock.expect_flush();
        DeviceConnection::open("mock", Box::new(mock.clone()), ConsoleConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn transact_through_lock() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        mock.expect(b"VER\r", b"2.1.0\rOK\r>");

        assert_eq!(conn.transact("VER").await.unwrap(), "2.1.0");
        assert_eq!(conn.port(), "mock");
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_transactions_are_serialized() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        mock.expect(b"A? 0 \r", b"a\rOK\r>");
        mock.expect(b"A? 0 \r", b"a\rOK\r>");
        mock.expect(b"A? 0 \r", b"a\rOK\r>");

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let conn = Arc::clone(&conn);
                tokio::spawn(async move { conn.transact("A? 0 ").await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "a");
        }
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_closes_waits_and_reopens() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        mock.expect(b"*RST 1 \r", b"");
        mock.expect_flush();
        mock.expect(b"*IDN? 1 \r", b"Acme,SC2470,1.0,2.3\rOK\r>");

        let start = Instant::now();
        conn.reset_connection("*RST 1 ").await.unwrap();
        assert!(start.elapsed() >= RESET_SETTLE_INTERVAL);
        assert_eq!(mock.close_count(), 1);
        assert_eq!(mock.reopen_count(), 1);

        assert_eq!(
            conn.transact("*IDN? 1 ").await.unwrap(),
            "Acme,SC2470,1.0,2.3"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_without_notify() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        mock.expect_flush();

        conn.reset_connection("").await.unwrap();
        assert_eq!(mock.sent_data().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_ignores_notify_failure() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        // The notify line does not match, so the mock fails the write.
        mock.expect(b"SOMETHING ELSE\r", b"");
        mock.expect_flush();

        conn.reset_connection("*RST 1 ").await.unwrap();
        assert_eq!(mock.reopen_count(), 1);
        assert_eq!(mock.remaining_expectations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_fails_when_port_does_not_return() {
        let mock = MockTransport::new();
        let conn = open(&mock).await;
        mock.expect(b"*RST 0 \r", b"");
        mock.fail_reopen(true);

        let err = conn.reset_connection("*RST 0 ").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}
