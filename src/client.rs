//! Public façade over the lifecycle controller.

use std::sync::Arc;

use crate::{
    config::NtripConfig,
    controller::Shared,
    state::{LogLevel, NtripError, NtripState},
    version,
};

/// NTRIP rover client: owns one durable caster session — position
/// acquisition, handshake, periodic GGA upload, RTCM reception, and
/// automatic reconnection with backoff.
///
/// All operations here may be called from any thread; the background
/// worker and its callbacks run on a dedicated [`tokio::task`]. See
/// `DESIGN.md` for the state machine this drives.
pub struct NtripClient {
    shared: Arc<Shared>,
}

impl NtripClient {
    /// Builds a client around `config`. Performs no I/O — nothing happens
    /// until [`NtripClient::connect`].
    pub fn new(config: NtripConfig) -> Self {
        NtripClient {
            shared: Arc::new(Shared::new(config)),
        }
    }

    /// Starts the session. Idempotent: calling it outside `Disconnected`
    /// is a no-op that returns `true`.
    pub fn connect(&self) -> bool {
        self.shared.connect()
    }

    /// Signals the worker to stop, closes the stream, and waits for the
    /// worker to join. Always leaves the client `Disconnected`.
    pub async fn disconnect(&self) {
        self.shared.disconnect().await;
    }

    /// Clears the last error and returns to `Disconnected`. Only valid
    /// from `Error`; returns `false` otherwise.
    pub fn reset(&self) -> bool {
        self.shared.reset()
    }

    /// Recomputes and caches a GPGGA sentence for `(latitude, longitude)`.
    /// If the client is `WaitingLla`, unblocks it into `Connecting`.
    /// Out-of-range coordinates are logged and ignored.
    pub fn set_location(&self, latitude: f64, longitude: f64) {
        self.shared.set_location(latitude, longitude);
    }

    /// Stores a caller-supplied GGA sentence verbatim, bypassing the
    /// builder. Same `WaitingLla` unblock rule as [`NtripClient::set_location`].
    pub fn set_gga_string(&self, gga: impl Into<Vec<u8>>) {
        self.shared.set_gga_string(gga.into());
    }

    /// Injects RTCM bytes from an external source. Synchronously invokes
    /// the RTCM callback on the caller's thread; legal in any state.
    pub fn write_rtcm_data(&self, data: &[u8]) {
        self.shared.write_rtcm_data(data);
    }

    /// Replaces the configuration snapshot. Rejected (returns `false`) if
    /// `host` or `mountpoint` is empty. If a worker is actively connecting
    /// or running, triggers a graceful restart (`Reconnecting` then
    /// `Connecting`, no backoff, no effect on the reconnect budget).
    pub fn update_config(&self, config: NtripConfig) -> bool {
        self.shared.update_config(config)
    }

    /// Current lifecycle state.
    pub fn get_state(&self) -> NtripState {
        self.shared.get_state()
    }

    /// The most recent non-`None` error, cleared on entering `Running` and
    /// on [`NtripClient::reset`].
    pub fn get_last_error(&self) -> NtripError {
        self.shared.get_last_error()
    }

    /// `true` iff [`NtripClient::get_state`] is `Running`.
    pub fn is_running(&self) -> bool {
        self.shared.get_state() == NtripState::Running
    }

    /// Registers the RTCM callback: `(data)`, invoked on the worker thread
    /// as bytes arrive, or synchronously on the caller's thread for
    /// [`NtripClient::write_rtcm_data`].
    pub fn set_rtcm_callback<F>(&self, cb: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.shared.set_rtcm_callback(cb);
    }

    /// Registers the state-transition callback: `(old_state, new_state)`,
    /// fired in transition order with no skipped edges.
    pub fn set_state_callback<F>(&self, cb: F)
    where
        F: Fn(NtripState, NtripState) + Send + Sync + 'static,
    {
        self.shared.set_state_callback(cb);
    }

    /// Registers the error callback: `(error_kind, detail)`, fired before
    /// the state transition it precipitates.
    pub fn set_error_callback<F>(&self, cb: F)
    where
        F: Fn(NtripError, &str) + Send + Sync + 'static,
    {
        self.shared.set_error_callback(cb);
    }

    /// Registers the log callback: `(level, message)`.
    pub fn set_log_callback<F>(&self, cb: F)
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        self.shared.set_log_callback(cb);
    }

    /// Semantic version string, e.g. `"1.0.0"`.
    pub fn version() -> &'static str {
        version::semantic_version()
    }

    /// Build identifier baked in at compile time.
    pub fn build_number() -> &'static str {
        version::build_number()
    }

    /// Short git SHA of the commit this crate was built from.
    pub fn git_sha() -> &'static str {
        version::git_sha()
    }

    /// Composite `"<version> [Build <build>] (<sha>)"` string.
    pub fn version_full() -> String {
        version::version_full()
    }
}

impl Drop for NtripClient {
    /// Requests the worker stop. This cannot `.await` the join the way
    /// [`NtripClient::disconnect`] does — see `DESIGN.md` for why a
    /// synchronous `Drop` can only cancel, not join, in an async runtime.
    fn drop(&mut self) {
        self.shared.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn config() -> NtripConfig {
        NtripConfig {
            host: "127.0.0.1".into(),
            port: 0,
            mountpoint: "MOUNT".into(),
            ..NtripConfig::default()
        }
    }

    #[test]
    fn new_client_is_disconnected() {
        let client = NtripClient::new(config());
        assert_eq!(client.get_state(), NtripState::Disconnected);
        assert_eq!(client.get_last_error(), NtripError::None);
        assert!(!client.is_running());
    }

    #[test]
    fn write_rtcm_data_is_legal_before_connect() {
        let client = NtripClient::new(config());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        client.set_rtcm_callback(move |data: &[u8]| {
            seen_clone.lock().unwrap().extend_from_slice(data);
        });
        client.write_rtcm_data(&[1, 2, 3]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn reset_before_error_state_is_a_no_op() {
        let client = NtripClient::new(config());
        assert!(!client.reset());
    }

    #[test]
    fn version_strings_are_nonempty() {
        assert!(!NtripClient::version().is_empty());
        assert!(NtripClient::version_full().contains(NtripClient::version()));
    }
}
