//! The running session: alternates receiving RTCM bytes with sending the
//! cached GGA sentence on a fixed interval, until a terminal event.

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::{controller::Shared, state::NtripError};

/// Minimum per-read buffer size, per spec.md §4.3 ("at least 1024 bytes").
const RECV_BUFFER_SIZE: usize = 4096;

pub(crate) enum SessionExit {
    /// `Disconnect` was called.
    Stopped,
    /// `UpdateConfig` requested a graceful restart.
    RestartRequested,
    /// A transport fault ended the session.
    Fault(NtripError, String),
}

/// Drive one connected session until it ends. `leading_rtcm` is any data
/// the handshake already read past the response headers and must be
/// delivered before the first live read.
pub(crate) async fn run<S>(
    mut stream: S,
    leading_rtcm: Vec<u8>,
    shared: &Shared,
    recv_timeout_ms: u64,
    gga_interval_s: u32,
    stop: &CancellationToken,
    restart: &CancellationToken,
) -> SessionExit
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !leading_rtcm.is_empty() {
        shared.invoke_rtcm(&leading_rtcm);
    }

    let recv_timeout = Duration::from_millis(recv_timeout_ms.max(1));
    let gga_interval = Duration::from_secs(u64::from(gga_interval_s.max(1)));

    // The handshake body already carried the first GGA; the next report is
    // due one full interval after loop entry.
    let mut ticker = tokio::time::interval(gga_interval);
    ticker.tick().await;

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    // The idle deadline is tracked independently of the GGA ticker: a tick
    // races the in-flight read via `select!` and drops it (cancel-safe, no
    // bytes lost), but must not push the deadline out, or a caster that only
    // ever answers GGA uploads would never trip `RecvTimeout` (spec.md §4.3).
    let mut deadline = Instant::now() + recv_timeout;

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => return SessionExit::Stopped,
            _ = restart.cancelled() => return SessionExit::RestartRequested,

            read = tokio::time::timeout_at(deadline, stream.read(&mut buf)) => {
                match read {
                    Err(_elapsed) => {
                        return SessionExit::Fault(
                            NtripError::RecvTimeout,
                            format!("no data for {}ms", recv_timeout.as_millis()),
                        );
                    }
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Ok(Err(e)) => {
                        return SessionExit::Fault(NtripError::SocketError(e.to_string()), e.to_string());
                    }
                    Ok(Ok(0)) => {
                        return SessionExit::Fault(
                            NtripError::SocketError("peer closed the connection".into()),
                            "peer closed the connection".into(),
                        );
                    }
                    Ok(Ok(n)) => {
                        shared.invoke_rtcm(&buf[..n]);
                        deadline = Instant::now() + recv_timeout;
                    }
                }
            }

            _ = ticker.tick() => {
                let gga = shared.gga_snapshot();
                if let Err(e) = stream.write_all(&gga).await {
                    return SessionExit::Fault(NtripError::SocketError(e.to_string()), e.to_string());
                }
            }
        }
    }
}
