//! The lifecycle controller: owns the worker task, the shared state cell,
//! and the reconnect governor. `NtripClient` (`client.rs`) is a thin public
//! wrapper around [`Shared`].

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::NtripConfig,
    gga,
    handshake,
    session::{self, SessionExit},
    state::{LogLevel, NtripError, NtripState},
};

type RtcmCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;
type StateCallback = Arc<dyn Fn(NtripState, NtripState) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(NtripError, &str) + Send + Sync>;
type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Everything shared between the caller's thread(s) and the worker task.
/// A single mutex per field, per spec.md §5's "single mutex" option — no
/// field's lock is ever held while invoking a callback.
pub(crate) struct Shared {
    config: Mutex<NtripConfig>,
    gga_cache: Mutex<Vec<u8>>,
    state: Mutex<NtripState>,
    last_error: Mutex<NtripError>,

    rtcm_cb: Mutex<Option<RtcmCallback>>,
    state_cb: Mutex<Option<StateCallback>>,
    error_cb: Mutex<Option<ErrorCallback>>,
    log_cb: Mutex<Option<LogCallback>>,

    /// Woken whenever a cached GGA becomes available, to unblock `WaitingLla`.
    lla_ready: tokio::sync::Notify,
    /// Cancelled by `Disconnect`; present only while a worker is running.
    stop_token: Mutex<Option<CancellationToken>>,
    /// Cancelled (and replaced) by `UpdateConfig` to request a graceful
    /// restart of the current connect attempt or session.
    restart_token: Mutex<CancellationToken>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    pub(crate) fn new(config: NtripConfig) -> Self {
        // If the config already carries real coordinates, seed the cache so
        // `Connect` can go straight to `Connecting` instead of `WaitingLla`.
        let initial_gga = if config.has_initial_location() {
            gga::build_gpgga(config.latitude, config.longitude, Utc::now()).unwrap_or_default()
        } else {
            Vec::new()
        };

        Shared {
            config: Mutex::new(config),
            gga_cache: Mutex::new(initial_gga),
            state: Mutex::new(NtripState::Disconnected),
            last_error: Mutex::new(NtripError::None),
            rtcm_cb: Mutex::new(None),
            state_cb: Mutex::new(None),
            error_cb: Mutex::new(None),
            log_cb: Mutex::new(None),
            lla_ready: tokio::sync::Notify::new(),
            stop_token: Mutex::new(None),
            restart_token: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
        }
    }

    // ---- read-only state -------------------------------------------------

    pub(crate) fn get_state(&self) -> NtripState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn get_last_error(&self) -> NtripError {
        self.last_error.lock().unwrap().clone()
    }

    pub(crate) fn config_snapshot(&self) -> NtripConfig {
        self.config.lock().unwrap().clone()
    }

    fn has_gga(&self) -> bool {
        !self.gga_cache.lock().unwrap().is_empty()
    }

    pub(crate) fn gga_snapshot(&self) -> Vec<u8> {
        self.gga_cache.lock().unwrap().clone()
    }

    pub(crate) fn set_gga(&self, bytes: Vec<u8>) {
        *self.gga_cache.lock().unwrap() = bytes;
    }

    // ---- callback registration -------------------------------------------

    pub(crate) fn set_rtcm_callback<F>(&self, cb: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        *self.rtcm_cb.lock().unwrap() = Some(Arc::new(cb));
    }

    pub(crate) fn set_state_callback<F>(&self, cb: F)
    where
        F: Fn(NtripState, NtripState) + Send + Sync + 'static,
    {
        *self.state_cb.lock().unwrap() = Some(Arc::new(cb));
    }

    pub(crate) fn set_error_callback<F>(&self, cb: F)
    where
        F: Fn(NtripError, &str) + Send + Sync + 'static,
    {
        *self.error_cb.lock().unwrap() = Some(Arc::new(cb));
    }

    pub(crate) fn set_log_callback<F>(&self, cb: F)
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        *self.log_cb.lock().unwrap() = Some(Arc::new(cb));
    }

    // ---- callback dispatch -------------------------------------------

    pub(crate) fn invoke_rtcm(&self, data: &[u8]) {
        let cb = self.rtcm_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(data);
        }
    }

    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Debug => tracing::debug!("{msg}"),
            LogLevel::Info => tracing::info!("{msg}"),
            LogLevel::Warn => tracing::warn!("{msg}"),
            LogLevel::Error => tracing::error!("{msg}"),
        }
        let cb = self.log_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(level, msg);
        }
    }

    fn clear_error(&self) {
        *self.last_error.lock().unwrap() = NtripError::None;
    }

    /// Reports a fault: updates `last_error`, logs it, and fires the error
    /// callback — always *before* the state transition that follows it, so
    /// a user callback can correlate the two (spec.md §7).
    fn report_error(&self, err: NtripError, detail: &str) {
        *self.last_error.lock().unwrap() = err.clone();
        self.log(LogLevel::Error, detail);
        let cb = self.error_cb.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(err, detail);
        }
    }

    /// Moves to `new` and fires the state callback, unless `new` equals the
    /// current state (Connect/Disconnect idempotency: no-ops produce no
    /// extra transitions).
    fn transition(&self, new: NtripState) {
        let old = {
            let mut guard = self.state.lock().unwrap();
            let old = *guard;
            *guard = new;
            old
        };
        if old != new {
            self.log(LogLevel::Info, &format!("{old} -> {new}"));
            let cb = self.state_cb.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(old, new);
            }
        }
    }

    // ---- public operations -------------------------------------------

    /// `SetLocation`: builds and caches a GGA sentence, or logs a warning
    /// and leaves the cache untouched if the coordinate is out of range.
    pub(crate) fn set_location(&self, latitude: f64, longitude: f64) {
        match gga::build_gpgga(latitude, longitude, Utc::now()) {
            Ok(bytes) => {
                self.set_gga(bytes);
                self.unblock_waiting_lla();
            }
            Err(_) => {
                self.log(
                    LogLevel::Warn,
                    &format!("SetLocation ignored: out-of-range coordinate ({latitude}, {longitude})"),
                );
            }
        }
    }

    /// `SetGgaString`: stores caller-supplied bytes verbatim.
    pub(crate) fn set_gga_string(&self, gga: Vec<u8>) {
        if gga.is_empty() {
            self.log(LogLevel::Warn, "SetGgaString ignored: empty sentence");
            return;
        }
        self.set_gga(gga);
        self.unblock_waiting_lla();
    }

    fn unblock_waiting_lla(&self) {
        let was_waiting = *self.state.lock().unwrap() == NtripState::WaitingLla;
        if was_waiting {
            self.transition(NtripState::Connecting);
            self.lla_ready.notify_one();
        }
    }

    /// `WriteRtcmData`: synchronous, on the caller's thread, legal in any
    /// state, orthogonal to the session stream.
    pub(crate) fn write_rtcm_data(&self, data: &[u8]) {
        self.invoke_rtcm(data);
    }

    /// `UpdateConfig`: rejects an invalid config outright; otherwise swaps
    /// the snapshot and, if a worker is actively connecting or running,
    /// requests a graceful restart.
    pub(crate) fn update_config(&self, config: NtripConfig) -> bool {
        if !config.is_valid() {
            self.log(LogLevel::Warn, "UpdateConfig rejected: empty host or mountpoint");
            return false;
        }

        let state_before = self.get_state();
        *self.config.lock().unwrap() = config;

        if matches!(
            state_before,
            NtripState::Connecting | NtripState::Running | NtripState::Reconnecting
        ) {
            let old_token = {
                let mut guard = self.restart_token.lock().unwrap();
                let old = guard.clone();
                *guard = CancellationToken::new();
                old
            };
            old_token.cancel();
        }

        true
    }

    /// `Reset`: only valid from `Error`.
    pub(crate) fn reset(&self) -> bool {
        if self.get_state() != NtripState::Error {
            return false;
        }
        self.clear_error();
        self.transition(NtripState::Disconnected);
        true
    }

    /// `Connect`: idempotent outside `Disconnected`.
    pub(crate) fn connect(self: &Arc<Self>) -> bool {
        let mut worker_guard = self.worker.lock().unwrap();

        if self.get_state() != NtripState::Disconnected {
            return true;
        }

        let stop = CancellationToken::new();
        *self.stop_token.lock().unwrap() = Some(stop.clone());
        *self.restart_token.lock().unwrap() = CancellationToken::new();

        // Fired here on the caller's thread, not the worker's — the one
        // exception to spec.md §5's "state callbacks run on the worker
        // thread". Race-free only because the worker task hasn't been
        // spawned yet at this point, so there's no concurrent transition it
        // could interleave with.
        let initial_state = if self.has_gga() {
            NtripState::Connecting
        } else {
            NtripState::WaitingLla
        };
        self.transition(initial_state);

        let shared = Arc::clone(self);
        *worker_guard = Some(tokio::spawn(async move {
            run_worker(shared, stop).await;
        }));

        true
    }

    /// `Disconnect`: signals the worker, waits for it to join, and leaves
    /// the state `Disconnected` regardless of which state it was called in.
    pub(crate) async fn disconnect(self: &Arc<Self>) {
        let stop = self.stop_token.lock().unwrap().take();
        let handle = self.worker.lock().unwrap().take();

        if let Some(stop) = stop {
            stop.cancel();
        }
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // Also fired on the caller's thread, same exception as `connect()`
        // above — safe here because the `.await` just above guarantees the
        // worker has already exited and fired its own last transition.
        self.transition(NtripState::Disconnected);
    }

    /// Cancels the worker without waiting for it — the best a synchronous
    /// `Drop` can do without blocking the async runtime. See `DESIGN.md`.
    pub(crate) fn request_stop(&self) {
        if let Some(stop) = self.stop_token.lock().unwrap().take() {
            stop.cancel();
        }
    }
}

/// Outcome of one connect attempt, racing the handshake against the
/// cancellation tokens so `Disconnect`/`UpdateConfig` interrupt it promptly.
enum AttemptOutcome {
    Accepted(handshake::Accepted<tokio::net::TcpStream>),
    Fault(NtripError, String),
    Stopped,
    RestartRequested,
}

async fn attempt_connect(
    shared: &Arc<Shared>,
    config: &NtripConfig,
    stop: &CancellationToken,
    restart: &CancellationToken,
) -> AttemptOutcome {
    let gga = shared.gga_snapshot();
    tokio::select! {
        biased;
        _ = stop.cancelled() => AttemptOutcome::Stopped,
        _ = restart.cancelled() => AttemptOutcome::RestartRequested,
        result = handshake::connect_and_handshake(config, &gga) => match result {
            Ok(accepted) => AttemptOutcome::Accepted(accepted),
            Err((err, detail)) => AttemptOutcome::Fault(err, detail),
        },
    }
}

/// Reports and classifies a fault, applying the §4.5 state graph. Returns
/// `true` if the worker should loop back into `Connecting`, `false` if it
/// must terminate (terminal `Error`, or the worker was told to stop).
async fn handle_fault(
    shared: &Arc<Shared>,
    config: &NtripConfig,
    stop: &CancellationToken,
    restart: &CancellationToken,
    attempts: &mut u32,
    err: NtripError,
    detail: String,
) -> bool {
    shared.report_error(err.clone(), &detail);

    if !err.is_retryable() {
        shared.transition(NtripState::Error);
        return false;
    }

    if !config.auto_reconnect {
        shared.transition(NtripState::Error);
        return false;
    }

    *attempts += 1;
    if config.max_reconnect_attempts > 0 && *attempts > config.max_reconnect_attempts {
        shared.report_error(
            NtripError::ReconnectFailed,
            "reconnect attempt budget exhausted",
        );
        shared.transition(NtripState::Error);
        return false;
    }

    shared.transition(NtripState::Reconnecting);

    let shift = (*attempts - 1).min(63);
    let delay_ms = config
        .reconnect_interval_ms
        .saturating_mul(1u64 << shift)
        .min(config.max_reconnect_interval_ms);

    tokio::select! {
        biased;
        _ = stop.cancelled() => {
            shared.transition(NtripState::Disconnected);
            return false;
        }
        _ = restart.cancelled() => {}
        _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
    }

    shared.transition(NtripState::Connecting);
    true
}

async fn run_worker(shared: Arc<Shared>, stop: CancellationToken) {
    let mut attempts: u32 = 0;

    loop {
        if stop.is_cancelled() {
            shared.transition(NtripState::Disconnected);
            return;
        }

        if shared.get_state() == NtripState::WaitingLla {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    shared.transition(NtripState::Disconnected);
                    return;
                }
                _ = shared.lla_ready.notified() => {}
            }
        }

        let config = shared.config_snapshot();
        let restart = shared.restart_token.lock().unwrap().clone();

        shared.log(
            LogLevel::Info,
            &format!("connecting to {}/{}", config.url(), config.mountpoint),
        );

        match attempt_connect(&shared, &config, &stop, &restart).await {
            AttemptOutcome::Stopped => {
                shared.transition(NtripState::Disconnected);
                return;
            }
            AttemptOutcome::RestartRequested => {
                shared.transition(NtripState::Reconnecting);
                shared.transition(NtripState::Connecting);
            }
            AttemptOutcome::Fault(err, detail) => {
                if !handle_fault(&shared, &config, &stop, &restart, &mut attempts, err, detail).await
                {
                    return;
                }
            }
            AttemptOutcome::Accepted(accepted) => {
                attempts = 0;
                shared.clear_error();
                shared.transition(NtripState::Running);

                let exit = session::run(
                    accepted.stream,
                    accepted.leading_rtcm,
                    &shared,
                    config.recv_timeout_ms,
                    config.gga_report_interval_s,
                    &stop,
                    &restart,
                )
                .await;

                match exit {
                    SessionExit::Stopped => {
                        shared.transition(NtripState::Disconnected);
                        return;
                    }
                    SessionExit::RestartRequested => {
                        shared.transition(NtripState::Reconnecting);
                        shared.transition(NtripState::Connecting);
                    }
                    SessionExit::Fault(err, detail) => {
                        if !handle_fault(&shared, &config, &stop, &restart, &mut attempts, err, detail)
                            .await
                        {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_starts_disconnected_with_no_error() {
        let shared = Shared::new(NtripConfig::default());
        assert_eq!(shared.get_state(), NtripState::Disconnected);
        assert_eq!(shared.get_last_error(), NtripError::None);
    }

    #[test]
    fn reset_only_succeeds_from_error() {
        let shared = Shared::new(NtripConfig::default());
        assert!(!shared.reset());
        shared.transition(NtripState::WaitingLla);
        shared.transition(NtripState::Error);
        assert!(shared.reset());
        assert_eq!(shared.get_state(), NtripState::Disconnected);
    }

    #[test]
    fn set_location_out_of_range_is_ignored() {
        let shared = Shared::new(NtripConfig::default());
        shared.set_location(91.0, 0.0);
        assert!(!shared.has_gga());
    }

    #[test]
    fn update_config_rejects_empty_host_or_mountpoint() {
        let shared = Shared::new(NtripConfig::default());
        let mut cfg = NtripConfig::default();
        cfg.mountpoint = "M".into();
        assert!(!shared.update_config(cfg), "host still empty");
    }

    #[test]
    fn write_rtcm_data_reaches_callback_synchronously() {
        let shared = Shared::new(NtripConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        shared.set_rtcm_callback(move |data: &[u8]| {
            seen_clone.lock().unwrap().extend_from_slice(data);
        });
        shared.write_rtcm_data(&[9, 9, 9]);
        assert_eq!(*seen.lock().unwrap(), vec![9, 9, 9]);
    }
}
