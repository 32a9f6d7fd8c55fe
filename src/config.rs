//! NTRIP client configuration snapshot.

/// Immutable (per-connect-attempt) configuration for an [`NtripClient`].
///
/// Replaced wholesale by [`NtripClient::update_config`] — the worker clones
/// a snapshot at the start of every connect attempt, so a single
/// `UpdateConfig` call never tears a field mid-use.
///
/// [`NtripClient`]: crate::client::NtripClient
/// [`NtripClient::update_config`]: crate::client::NtripClient::update_config
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "clap", derive(clap::Parser))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NtripConfig {
    /// Host name or IP address of the NTRIP caster.
    #[cfg_attr(feature = "clap", clap(long = "ntrip-host", env = "NTRIP_HOST"))]
    pub host: String,

    /// Port number of the NTRIP caster.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-port", env = "NTRIP_PORT", default_value_t = 8002)
    )]
    pub port: u16,

    /// Username for the mountpoint.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-user", env = "NTRIP_USER", default_value = "")
    )]
    pub user: String,

    /// Password for the mountpoint.
    #[cfg_attr(
        feature = "clap",
        clap(long = "ntrip-password", env = "NTRIP_PASSWORD", default_value = "")
    )]
    pub password: String,

    /// Mountpoint name (the request path, without the leading `/`).
    #[cfg_attr(feature = "clap", clap(long = "ntrip-mountpoint", env = "NTRIP_MOUNTPOINT"))]
    pub mountpoint: String,

    /// Initial rover latitude, WGS84 degrees. `(0.0, 0.0)` means "unset" —
    /// [`NtripClient::connect`] enters `WaitingLla` until a real position
    /// arrives via [`NtripClient::set_location`] or
    /// [`NtripClient::set_gga_string`].
    ///
    /// [`NtripClient::connect`]: crate::client::NtripClient::connect
    /// [`NtripClient::set_location`]: crate::client::NtripClient::set_location
    /// [`NtripClient::set_gga_string`]: crate::client::NtripClient::set_gga_string
    #[cfg_attr(
        feature = "clap",
        clap(long = "latitude", default_value_t = 0.0, allow_hyphen_values = true)
    )]
    pub latitude: f64,

    /// Initial rover longitude, WGS84 degrees. See [`NtripConfig::latitude`].
    #[cfg_attr(
        feature = "clap",
        clap(long = "longitude", default_value_t = 0.0, allow_hyphen_values = true)
    )]
    pub longitude: f64,

    /// Seconds between upstream GGA reports while `Running`.
    #[cfg_attr(
        feature = "clap",
        clap(long = "gga-interval", default_value_t = 1)
    )]
    pub gga_report_interval_s: u32,

    /// Whether to reconnect automatically on a retryable fault.
    #[cfg_attr(
        feature = "clap",
        clap(long = "auto-reconnect", default_value_t = true)
    )]
    pub auto_reconnect: bool,

    /// Initial backoff between reconnect attempts, in milliseconds.
    #[cfg_attr(
        feature = "clap",
        clap(long = "reconnect-interval-ms", default_value_t = 3000)
    )]
    pub reconnect_interval_ms: u64,

    /// Backoff ceiling, in milliseconds.
    #[cfg_attr(
        feature = "clap",
        clap(long = "max-reconnect-interval-ms", default_value_t = 5000)
    )]
    pub max_reconnect_interval_ms: u64,

    /// Maximum number of reconnect attempts within one disconnected stretch.
    /// `0` means unbounded.
    #[cfg_attr(
        feature = "clap",
        clap(long = "max-reconnect-attempts", default_value_t = 0)
    )]
    pub max_reconnect_attempts: u32,

    /// TCP connect + handshake deadline, in milliseconds.
    #[cfg_attr(
        feature = "clap",
        clap(long = "connect-timeout-ms", default_value_t = 5000)
    )]
    pub connect_timeout_ms: u64,

    /// "No data implies disconnect" deadline, in milliseconds.
    #[cfg_attr(
        feature = "clap",
        clap(long = "recv-timeout-ms", default_value_t = 10000)
    )]
    pub recv_timeout_ms: u64,
}

impl Default for NtripConfig {
    fn default() -> Self {
        NtripConfig {
            host: String::new(),
            port: 8002,
            user: String::new(),
            password: String::new(),
            mountpoint: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            gga_report_interval_s: 1,
            auto_reconnect: true,
            reconnect_interval_ms: 3000,
            max_reconnect_interval_ms: 5000,
            max_reconnect_attempts: 0,
            connect_timeout_ms: 5000,
            recv_timeout_ms: 10000,
        }
    }
}

impl NtripConfig {
    /// Generate a dial target (`host:port`) from the config.
    pub fn url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `true` when the initial coordinates are something other than the
    /// `(0.0, 0.0)` "unset" sentinel.
    pub fn has_initial_location(&self) -> bool {
        self.latitude != 0.0 || self.longitude != 0.0
    }

    /// Rejects configs [`NtripClient::update_config`] must not accept: an
    /// empty host or mountpoint.
    ///
    /// [`NtripClient::update_config`]: crate::client::NtripClient::update_config
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && !self.mountpoint.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = NtripConfig::default();
        assert_eq!(cfg.port, 8002);
        assert_eq!(cfg.gga_report_interval_s, 1);
        assert!(cfg.auto_reconnect);
        assert_eq!(cfg.reconnect_interval_ms, 3000);
        assert_eq!(cfg.max_reconnect_interval_ms, 5000);
        assert_eq!(cfg.max_reconnect_attempts, 0);
        assert_eq!(cfg.connect_timeout_ms, 5000);
        assert_eq!(cfg.recv_timeout_ms, 10000);
        assert!(!cfg.has_initial_location());
    }

    #[test]
    fn url_joins_host_and_port() {
        let cfg = NtripConfig {
            host: "rtk2go.com".into(),
            port: 2101,
            ..NtripConfig::default()
        };
        assert_eq!(cfg.url(), "rtk2go.com:2101");
    }

    #[test]
    fn empty_host_or_mountpoint_is_invalid() {
        let mut cfg = NtripConfig {
            host: "caster.example.com".into(),
            mountpoint: "M".into(),
            ..NtripConfig::default()
        };
        assert!(cfg.is_valid());
        cfg.mountpoint.clear();
        assert!(!cfg.is_valid());
        cfg.mountpoint = "M".into();
        cfg.host.clear();
        assert!(!cfg.is_valid());
    }
}
