//! HTTP-backed blob store.

// crates.io
use http::{Method, StatusCode};
use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;
// self
use crate::{
	_prelude::*,
	credentials::HttpCredentials,
	http::{
		handler::{CacheHandler, CacheResponse, ChannelEvent},
		request::{self, CacheRequest},
	},
	store::{BlobStore, Namespace},
};

/// Blob store speaking the HTTP cache protocol against a single base URI.
///
/// One logical connection, serialised use: the handler behind the mutex carries at most
/// one pending request, and every caller borrows the whole connection for its round trip.
/// Concurrency across build actions comes from pooling stores above this layer.
pub struct HttpBlobStore {
	base: Url,
	client: Client,
	credentials: Arc<HttpCredentials>,
	handler: Mutex<CacheHandler>,
	timeout: Duration,
}
impl HttpBlobStore {
	/// Construct a store for the given base URI, request timeout, and credential adapter.
	pub fn new(base: Url, timeout: Duration, credentials: HttpCredentials) -> Result<Self> {
		let client = Client::builder()
			.user_agent(format!("blob-cache/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;
		let credentials = Arc::new(credentials);
		let handler = Mutex::new(CacheHandler::new(base.clone(), credentials.clone()));

		Ok(Self { base, client, credentials, handler, timeout })
	}

	/// Tear the connection down, failing any pending request with a closed-channel error.
	pub async fn shutdown(&self) {
		self.handler.lock().await.channel_event(ChannelEvent::Close);
	}

	/// Issue one request and resolve it through the pending-request slot.
	///
	/// Timeouts are enforced by the transport and surface here as teardown or transport
	/// failures; this layer never retries.
	async fn round_trip(
		&self,
		method: Method,
		namespace: Namespace,
		key: &str,
		body: Option<Vec<u8>>,
	) -> Result<CacheResponse> {
		let mut handler = self.handler.lock().await;
		let (request, receiver) = handler.begin(method, namespace, key).await?;
		let CacheRequest { method, url, headers } = request;
		let mut builder =
			self.client.request(method, url.clone()).headers(headers).timeout(self.timeout);

		if let Some(bytes) = body {
			builder = builder.body(bytes);
		}

		match builder.send().await {
			Ok(response) => {
				let status = response.status();

				match response.bytes().await {
					Ok(bytes) =>
						handler.complete(CacheResponse { status, body: bytes.to_vec() }),
					Err(err) => handler.fail(err.into()),
				}
			},
			Err(err) if err.is_connect() || err.is_timeout() => {
				tracing::debug!(url = %url, error = %err, "connection unusable, tearing down");

				handler.channel_event(ChannelEvent::Inactive);
			},
			Err(err) => handler.fail(err.into()),
		}

		// The sender cannot outlive the block above; a lost promise means teardown.
		receiver.await.map_err(|_| Error::ConnectionClosed)?
	}

	/// Map an unexpected status onto an error, refreshing credentials on auth failures.
	///
	/// The refresh is throttled and only primes the next request; retrying is a caller
	/// decision.
	async fn status_error(&self, status: StatusCode, namespace: Namespace, key: &str) -> Error {
		let url = request::target_url(&self.base, key, namespace);

		if status == StatusCode::UNAUTHORIZED {
			tracing::warn!(url = %url, "cache endpoint rejected credentials, refreshing");

			if let Err(err) = self.credentials.refresh().await {
				tracing::warn!(error = %err, "credential refresh failed");
			}
		}

		Error::Status { status, url }
	}
}
#[async_trait::async_trait]
impl BlobStore for HttpBlobStore {
	async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
		let response = self.round_trip(Method::GET, namespace, key, None).await?;

		match response.status {
			StatusCode::OK => Ok(Some(response.body)),
			StatusCode::NOT_FOUND => Ok(None),
			status => Err(self.status_error(status, namespace, key).await),
		}
	}

	async fn put(&self, namespace: Namespace, key: &str, bytes: Vec<u8>) -> Result<()> {
		let response = self.round_trip(Method::PUT, namespace, key, Some(bytes)).await?;

		if response.status.is_success() {
			tracing::debug!(namespace = namespace.segment(), key, "blob uploaded");

			Ok(())
		} else {
			Err(self.status_error(response.status, namespace, key).await)
		}
	}

	async fn contains(&self, namespace: Namespace, key: &str) -> Result<bool> {
		let response = self.round_trip(Method::HEAD, namespace, key, None).await?;

		match response.status {
			StatusCode::OK => Ok(true),
			StatusCode::NOT_FOUND => Ok(false),
			status => Err(self.status_error(status, namespace, key).await),
		}
	}
}
impl std::fmt::Debug for HttpBlobStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpBlobStore")
			.field("base", &self.base.as_str())
			.field("timeout", &self.timeout)
			.field("credentials", &self.credentials)
			.finish()
	}
}
