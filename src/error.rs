//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the blob cache crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Http(#[from] http::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Both a cloud signer and a token provider were configured for the same cache; only one may be active.")]
	CredentialConflict,
	#[error("Credential error: {0}")]
	Credentials(String),

	#[error("Connection closed while a request was outstanding.")]
	ConnectionClosed,
	#[error("Protocol handler removed from an active connection while a request was outstanding.")]
	HandlerRemoved,
	#[error("A request is already in flight on this connection.")]
	RequestInFlight,
	#[error("Cache endpoint returned HTTP status {status} for {url}")]
	Status { status: http::StatusCode, url: url::Url },
}
