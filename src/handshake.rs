//! The NTRIP v1 handshake: request write, response read, response
//! classification. Self-contained and I/O-pure enough to unit test against
//! an in-process duplex stream rather than a real socket.

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{config::NtripConfig, credentials::NtripCredentials, state::NtripError, version};

/// Result of a handshake that the caster accepted.
pub(crate) struct Accepted<S> {
    pub(crate) stream: S,
    /// Any bytes read past the CRLF-CRLF that belong to the RTCM stream.
    pub(crate) leading_rtcm: Vec<u8>,
}

/// Dial `config.url()` and perform the handshake, returning the connected
/// stream on success. The whole attempt — connect, write, response read —
/// is bounded by `config.connect_timeout_ms`.
pub(crate) async fn connect_and_handshake(
    config: &NtripConfig,
    gga: &[u8],
) -> Result<Accepted<TcpStream>, (NtripError, String)> {
    let deadline = Duration::from_millis(config.connect_timeout_ms);

    let stream = timeout(deadline, TcpStream::connect(config.url()))
        .await
        .map_err(|_| {
            (
                NtripError::ConnectTimeout,
                format!("connect to {} timed out", config.url()),
            )
        })?
        .map_err(|e| (NtripError::NetworkError(e.to_string()), e.to_string()))?;

    handshake(stream, config, gga, deadline).await
}

/// The wire exchange itself, generic over the transport so it can be
/// exercised in tests against an in-memory duplex pipe.
pub(crate) async fn handshake<S>(
    mut stream: S,
    config: &NtripConfig,
    gga: &[u8],
    deadline: Duration,
) -> Result<Accepted<S>, (NtripError, String)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = build_request(config, gga);

    timeout(deadline, stream.write_all(&request))
        .await
        .map_err(|_| {
            (
                NtripError::ConnectTimeout,
                "request write timed out".to_string(),
            )
        })?
        .map_err(|e| (NtripError::NetworkError(e.to_string()), e.to_string()))?;

    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = find_crlf_crlf(&buf) {
            break pos;
        }

        if buf.len() > 64 * 1024 {
            return Err((
                NtripError::RequestError("response header too large".into()),
                String::new(),
            ));
        }

        let n = timeout(deadline, stream.read(&mut chunk))
            .await
            .map_err(|_| {
                (
                    NtripError::ConnectTimeout,
                    "response read timed out".to_string(),
                )
            })?
            .map_err(|e| (NtripError::NetworkError(e.to_string()), e.to_string()))?;

        if n == 0 {
            return Err((
                NtripError::SocketError("peer closed during handshake".into()),
                String::new(),
            ));
        }

        buf.extend_from_slice(&chunk[..n]);
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]);
    let status_line = header_text.lines().next().unwrap_or_default();
    classify(status_line)?;

    let leading_rtcm = buf[header_end + 4..].to_vec();

    Ok(Accepted {
        stream,
        leading_rtcm,
    })
}

fn build_request(config: &NtripConfig, gga: &[u8]) -> Vec<u8> {
    let creds = NtripCredentials::new(&config.user, &config.password);

    let mut req = Vec::new();
    req.extend_from_slice(
        format!(
            "{} /{} HTTP/1.1\r\n",
            http::Method::GET,
            config.mountpoint
        )
        .as_bytes(),
    );
    req.extend_from_slice(format!("Host: {}:{}\r\n", config.host, config.port).as_bytes());
    req.extend_from_slice(b"Ntrip-Version: Ntrip/1.0\r\n");
    req.extend_from_slice(
        format!(
            "User-Agent: NTRIP LingaoNtripClient/{}\r\n",
            version::semantic_version()
        )
        .as_bytes(),
    );
    req.extend_from_slice(b"Accept: */*\r\n");
    req.extend_from_slice(format!("Authorization: Basic {}\r\n", creds.encode()).as_bytes());
    req.extend_from_slice(b"Connection: close\r\n");
    req.extend_from_slice(b"\r\n");
    req.extend_from_slice(gga);
    req
}

fn find_crlf_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Classifies the first response line. Case-insensitive, tolerant of
/// leading whitespace. `ICY 200 OK` is the classic NTRIP v1 status line and
/// is not valid HTTP, so it's matched by keyword; a proper `HTTP/1.x <code>`
/// line has its status code parsed through [`http::StatusCode`] so any
/// `200`-class response accepts, not just a literal `200` (spec.md §6).
fn classify(status_line: &str) -> Result<(), (NtripError, String)> {
    let trimmed = status_line.trim();
    let upper = trimmed.to_ascii_uppercase();

    if upper.starts_with("ICY") {
        return if upper.contains("200") {
            Ok(())
        } else if upper.contains("401") || upper.contains("UNAUTHORIZED") {
            Err((NtripError::BadPassword, trimmed.to_string()))
        } else {
            Err((NtripError::RequestError(trimmed.to_string()), trimmed.to_string()))
        };
    }

    if let Some(status) = trimmed
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| http::StatusCode::from_u16(code).ok())
    {
        if status.is_success() {
            return Ok(());
        }
        if status == http::StatusCode::UNAUTHORIZED {
            return Err((NtripError::BadPassword, trimmed.to_string()));
        }
        return Err((NtripError::RequestError(trimmed.to_string()), trimmed.to_string()));
    }

    if upper.contains("401") || upper.contains("UNAUTHORIZED") {
        return Err((NtripError::BadPassword, trimmed.to_string()));
    }

    Err((NtripError::RequestError(trimmed.to_string()), trimmed.to_string()))
}
