//! Connection lifecycle states, error kinds and log levels.

use strum::Display;

/// Connection state. Exactly one of these holds at any time; see
/// [`crate::client::NtripClient`] for the transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NtripState {
    /// No session, no worker task.
    Disconnected,
    /// Worker spawned, waiting for a first [`NtripClient::set_location`] or
    /// [`NtripClient::set_gga_string`] call.
    ///
    /// [`NtripClient::set_location`]: crate::client::NtripClient::set_location
    /// [`NtripClient::set_gga_string`]: crate::client::NtripClient::set_gga_string
    WaitingLla,
    /// TCP connect + NTRIP handshake in progress.
    Connecting,
    /// Handshake accepted; receiving RTCM and reporting GGA.
    Running,
    /// Backing off before the next connect attempt.
    Reconnecting,
    /// Terminal: a non-retryable fault or an exhausted reconnect budget.
    /// Only [`NtripClient::reset`] or [`NtripClient::disconnect`] leave this state.
    ///
    /// [`NtripClient::reset`]: crate::client::NtripClient::reset
    /// [`NtripClient::disconnect`]: crate::client::NtripClient::disconnect
    Error,
}

/// Classification of the most recent fault, if any.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum NtripError {
    /// No error since the last successful connection, or since [`reset`].
    ///
    /// [`reset`]: crate::client::NtripClient::reset
    None,
    /// TCP connect or I/O failure, not a timeout.
    #[strum(to_string = "NetworkError({0})")]
    NetworkError(String),
    /// TCP connect did not complete within `connect_timeout_ms`.
    ConnectTimeout,
    /// Caster rejected the credentials (HTTP 401 / Unauthorized).
    BadPassword,
    /// Caster rejected the request for any other reason; carries the response line.
    #[strum(to_string = "RequestError({0})")]
    RequestError(String),
    /// No data received for `recv_timeout_ms` while running.
    RecvTimeout,
    /// Socket closed by the peer, or a send/recv syscall failed.
    #[strum(to_string = "SocketError({0})")]
    SocketError(String),
    /// `max_reconnect_attempts` was reached without a successful reconnect.
    ReconnectFailed,
}

impl NtripError {
    /// True for faults that are retried by the reconnect governor, subject
    /// to `auto_reconnect` and the attempt budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NtripError::BadPassword | NtripError::RequestError(_))
    }
}

/// Severity carried by the log callback ([`NtripClient::set_log_callback`]).
///
/// [`NtripClient::set_log_callback`]: crate::client::NtripClient::set_log_callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}
