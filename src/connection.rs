//! gRPC channel bootstrap.
//!
//! The suite holds one [`Channel`] for the whole run. Connecting retries on a
//! short interval until the server accepts the connection or the configured
//! timeout elapses, so the suite can be started alongside the server.

use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::net::UnixStream;
use tokio::time::{Instant, sleep};
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::debug;

/// Default time allowed for the channel to become ready.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

const RETRY_INTERVAL: Duration = Duration::from_millis(250);
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

// Placeholder authority for unix socket endpoints; the connector ignores it.
const UNIX_PLACEHOLDER_URI: &str = "http://[::]:50051";

/// Where the SDK server listens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Filesystem socket path.
    Unix(Utf8PathBuf),
    /// HTTP/2 URI, for example `http://127.0.0.1:9100`.
    Tcp(String),
}

impl Target {
    /// Classifies an address string.
    ///
    /// `unix://` and `unix:` prefixes select a socket. Anything else with a
    /// scheme is used verbatim, `host:port` gains an `http://` scheme, and a
    /// bare path without a colon is treated as a socket path.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::InvalidEndpoint`] for an empty address or an
    /// empty socket path.
    pub fn parse(address: &str) -> Result<Self, ConnectionError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ConnectionError::InvalidEndpoint {
                address: address.to_owned(),
                message: String::from("address is empty"),
            });
        }

        if let Some(path) = trimmed
            .strip_prefix("unix://")
            .or_else(|| trimmed.strip_prefix("unix:"))
        {
            if path.is_empty() {
                return Err(ConnectionError::InvalidEndpoint {
                    address: address.to_owned(),
                    message: String::from("unix socket path is empty"),
                });
            }
            return Ok(Self::Unix(Utf8PathBuf::from(path)));
        }

        if trimmed.contains("://") {
            return Ok(Self::Tcp(trimmed.to_owned()));
        }

        if trimmed.contains(':') {
            return Ok(Self::Tcp(format!("http://{trimmed}")));
        }

        Ok(Self::Unix(Utf8PathBuf::from(trimmed)))
    }
}

/// Errors raised while establishing the channel.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The address could not be turned into an endpoint.
    #[error("invalid endpoint {address}: {message}")]
    InvalidEndpoint {
        /// Address as supplied by the user.
        address: String,
        /// Reason the address was rejected.
        message: String,
    },
    /// The server did not accept a connection before the deadline.
    #[error("connection timed out after {timeout:?} waiting for {address}: {last_error}")]
    Timeout {
        /// Address as supplied by the user.
        address: String,
        /// Time allowed.
        timeout: Duration,
        /// Error from the final attempt.
        last_error: String,
    },
}

/// Connects to `address`, retrying until a channel is established or
/// `timeout` elapses.
///
/// # Errors
///
/// Returns [`ConnectionError::InvalidEndpoint`] for unusable addresses and
/// [`ConnectionError::Timeout`] when the deadline passes.
pub async fn connect(address: &str, timeout: Duration) -> Result<Channel, ConnectionError> {
    let target = Target::parse(address)?;
    let uri = match &target {
        Target::Unix(_) => UNIX_PLACEHOLDER_URI,
        Target::Tcp(uri) => uri.as_str(),
    };
    let endpoint = Endpoint::from_shared(uri.to_owned())
        .map_err(|err| ConnectionError::InvalidEndpoint {
            address: address.to_owned(),
            message: err.to_string(),
        })?
        .connect_timeout(ATTEMPT_TIMEOUT.min(timeout));

    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let result = match &target {
            Target::Unix(path) => {
                let socket = path.clone();
                endpoint
                    .connect_with_connector(service_fn(move |_: Uri| {
                        UnixStream::connect(socket.clone().into_std_path_buf())
                    }))
                    .await
            }
            Target::Tcp(_) => endpoint.connect().await,
        };

        let last_error = match result {
            Ok(channel) => {
                debug!(%address, attempt, "gRPC channel ready");
                return Ok(channel);
            }
            Err(err) => err.to_string(),
        };

        debug!(%address, attempt, error = %last_error, "gRPC channel not ready yet");
        if Instant::now() + RETRY_INTERVAL > deadline {
            return Err(ConnectionError::Timeout {
                address: address.to_owned(),
                timeout,
                last_error,
            });
        }
        sleep(RETRY_INTERVAL).await;
    }
}
