use crate::error::{is_resource_exhaustion, ScanError};
use crate::types::ProbeOutcome;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::trace;

/// Read deadline for the banner, independent of the connect timeout.
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on banner bytes read from a service.
pub const BANNER_READ_LIMIT: usize = 256;

/// Per-probe parameters shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    pub grab_banner: bool,
    pub banner_timeout: Duration,
}

impl ProbeOptions {
    pub fn new(timeout: Duration, grab_banner: bool) -> Self {
        Self {
            timeout,
            grab_banner,
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
        }
    }
}

/// Probe one `host:port` with a bounded TCP connect.
///
/// - Any connect failure (refused, timed out, unreachable, name resolution)
///   yields a closed outcome; the cause is not reported.
/// - On success, optionally reads a banner (see [`read_banner`]).
/// - Never waits longer than `timeout` plus `banner_timeout`.
///
/// The only error is [`ScanError::ResourceExhausted`], which means the scanner
/// could not allocate a socket and says nothing about the port.
pub async fn probe_port(
    host: &str,
    port: u16,
    opts: &ProbeOptions,
) -> Result<ProbeOutcome, ScanError> {
    let mut stream = match time::timeout(opts.timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) if is_resource_exhaustion(&e) => return Err(ScanError::ResourceExhausted(e)),
        Ok(Err(e)) => {
            trace!(host, port, error = %e, "connect failed");
            return Ok(ProbeOutcome::closed(port));
        }
        Err(_elapsed) => {
            trace!(host, port, "connect timed out");
            return Ok(ProbeOutcome::closed(port));
        }
    };

    let banner = if opts.grab_banner {
        read_banner(&mut stream, opts.banner_timeout).await
    } else {
        None
    };

    // `stream` is dropped here, closing the connection on every path.
    Ok(ProbeOutcome::open(port, banner))
}

/// Single bounded read of up to [`BANNER_READ_LIMIT`] bytes, decoded as lossy
/// UTF-8 and trimmed. Read errors, timeouts, EOF and all-whitespace data give `None`.
pub async fn read_banner(stream: &mut TcpStream, deadline: Duration) -> Option<String> {
    let mut buf = vec![0u8; BANNER_READ_LIMIT];
    match time::timeout(deadline, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            let s = String::from_utf8_lossy(&buf);
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}
