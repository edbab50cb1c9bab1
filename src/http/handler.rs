//! Per-connection cache protocol handler.
//!
//! A connection carries at most one outstanding request. The handler owns that slot as an
//! explicit state machine and resolves the caller's promise exactly once, whether the
//! transport delivers a response, an error, or a teardown event. Serialised use per
//! connection is a caller-side precondition (a pool lends one connection per concurrent
//! request); [`CacheHandler::begin`] rejects violations instead of queueing.

// std
use std::mem;
// crates.io
use http::{HeaderMap, Method, StatusCode, header::HOST};
use tokio::sync::oneshot;
use url::Url;
// self
use crate::{
	_prelude::*,
	credentials::HttpCredentials,
	http::request::{self, CacheRequest},
	store::Namespace,
};

/// Response payload delivered to the pending caller.
#[derive(Clone, Debug)]
pub struct CacheResponse {
	/// HTTP status returned by the cache endpoint.
	pub status: StatusCode,
	/// Response body bytes.
	pub body: Vec<u8>,
}

/// Connection-lifecycle transitions observed on the transport.
///
/// Every variant implies the outstanding request, if any, can no longer complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
	/// Peer disconnected.
	Disconnect,
	/// Connection closed locally.
	Close,
	/// Connection deregistered from its event loop.
	Deregister,
	/// Connection became inactive.
	Inactive,
	/// This handler was removed from an active connection.
	HandlerRemoved,
}

/// Promise receiver handed to the caller that issued a request.
pub type ResponseReceiver = oneshot::Receiver<Result<CacheResponse>>;

/// Protocol handler state for one connection.
pub struct CacheHandler {
	base: Url,
	credentials: Arc<HttpCredentials>,
	state: PendingState,
}
impl CacheHandler {
	/// Create an idle handler for the given base URI and credential adapter.
	pub fn new(base: Url, credentials: Arc<HttpCredentials>) -> Self {
		Self { base, credentials, state: PendingState::Idle }
	}

	/// Whether no request is currently outstanding.
	pub fn is_idle(&self) -> bool {
		matches!(self.state, PendingState::Idle)
	}

	/// Prepare a request for `key` and record it as the pending operation.
	///
	/// Builds the target path and `Host` header from the base URI, attaches credentials,
	/// and transitions to awaiting-response. Errors with [`Error::RequestInFlight`] when a
	/// request is already outstanding.
	pub async fn begin(
		&mut self,
		method: Method,
		namespace: Namespace,
		key: &str,
	) -> Result<(CacheRequest, ResponseReceiver)> {
		if !self.is_idle() {
			return Err(Error::RequestInFlight);
		}

		let url = request::target_url(&self.base, key, namespace);
		let mut headers = HeaderMap::new();

		headers.insert(
			HOST,
			request::host_header(&self.base).parse().map_err(http::Error::from)?,
		);
		self.credentials.attach(&mut headers, &self.base).await?;

		let (sender, receiver) = oneshot::channel();

		self.state = PendingState::AwaitingResponse(sender);

		tracing::debug!(method = %method, url = %url, "cache request pending");

		Ok((CacheRequest { method, url, headers }, receiver))
	}

	/// Resolve the pending request with a transport response.
	pub fn complete(&mut self, response: CacheResponse) {
		self.resolve(Ok(response));
	}

	/// Resolve the pending request with a transport error.
	///
	/// The original cause reaches the waiting caller through the promise; the call site is
	/// expected to keep propagating it to any further observers.
	pub fn fail(&mut self, error: Error) {
		self.resolve(Err(error));
	}

	/// React to a connection-lifecycle transition.
	///
	/// Resolves the pending request, if any, before the event is forwarded onward. Teardown
	/// variants surface as [`Error::ConnectionClosed`]; handler removal keeps its own kind
	/// so callers can tell the two apart.
	pub fn channel_event(&mut self, event: ChannelEvent) {
		let error = match event {
			ChannelEvent::Disconnect
			| ChannelEvent::Close
			| ChannelEvent::Deregister
			| ChannelEvent::Inactive => Error::ConnectionClosed,
			ChannelEvent::HandlerRemoved => Error::HandlerRemoved,
		};

		self.resolve(Err(error));
	}

	/// Resolve and clear the pending slot.
	///
	/// No-op when idle, so a request resolved by one event is never resolved again by a
	/// later one; a caller that dropped its receiver is ignored for the same reason.
	fn resolve(&mut self, outcome: Result<CacheResponse>) {
		if let PendingState::AwaitingResponse(sender) =
			mem::replace(&mut self.state, PendingState::Idle)
		{
			let _ = sender.send(outcome);
		}
	}
}
impl std::fmt::Debug for CacheHandler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CacheHandler")
			.field("base", &self.base.as_str())
			.field("idle", &self.is_idle())
			.finish()
	}
}

enum PendingState {
	Idle,
	AwaitingResponse(oneshot::Sender<Result<CacheResponse>>),
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn handler() -> CacheHandler {
		CacheHandler::new(
			Url::parse("https://cache.example.com/v1").expect("url"),
			Arc::new(HttpCredentials::anonymous()),
		)
	}

	#[tokio::test]
	async fn begin_builds_path_and_host() {
		let mut handler = handler();
		let (request, _receiver) = handler
			.begin(Method::GET, Namespace::ContentAddressable, "abcd1234")
			.await
			.expect("begin");

		assert_eq!(request.url.path(), "/v1/cas/abcd1234");
		assert_eq!(
			request.headers.get(HOST).map(|v| v.to_str().unwrap()),
			Some("cache.example.com")
		);
		assert!(!handler.is_idle());
	}

	#[tokio::test]
	async fn second_begin_while_pending_is_protocol_misuse() {
		let mut handler = handler();
		let _pending = handler
			.begin(Method::GET, Namespace::ContentAddressable, "k1")
			.await
			.expect("begin");

		assert!(matches!(
			handler.begin(Method::GET, Namespace::ContentAddressable, "k2").await,
			Err(Error::RequestInFlight)
		));
	}

	#[tokio::test]
	async fn complete_resolves_pending_with_response() {
		let mut handler = handler();
		let (_request, receiver) = handler
			.begin(Method::GET, Namespace::ActionCache, "k")
			.await
			.expect("begin");

		handler.complete(CacheResponse { status: StatusCode::OK, body: b"blob".to_vec() });

		let response = receiver.await.expect("resolved").expect("success");

		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(response.body, b"blob");
		assert!(handler.is_idle());
	}

	#[tokio::test]
	async fn teardown_events_resolve_with_connection_closed() {
		for event in
			[ChannelEvent::Disconnect, ChannelEvent::Close, ChannelEvent::Deregister, ChannelEvent::Inactive]
		{
			let mut handler = handler();
			let (_request, receiver) = handler
				.begin(Method::GET, Namespace::ContentAddressable, "k")
				.await
				.expect("begin");

			handler.channel_event(event);

			assert!(matches!(
				receiver.await.expect("resolved"),
				Err(Error::ConnectionClosed)
			));
			assert!(handler.is_idle());
		}
	}

	#[tokio::test]
	async fn handler_removal_uses_distinct_error_kind() {
		let mut handler = handler();
		let (_request, receiver) = handler
			.begin(Method::PUT, Namespace::ContentAddressable, "k")
			.await
			.expect("begin");

		handler.channel_event(ChannelEvent::HandlerRemoved);

		assert!(matches!(receiver.await.expect("resolved"), Err(Error::HandlerRemoved)));
	}

	#[tokio::test]
	async fn first_failure_wins_over_later_teardown() {
		let mut handler = handler();
		let (_request, receiver) = handler
			.begin(Method::GET, Namespace::ContentAddressable, "k")
			.await
			.expect("begin");

		handler.fail(Error::Credentials("token expired".into()));
		handler.channel_event(ChannelEvent::Inactive);

		// The promise resolved once, with the first failure's cause.
		assert!(matches!(receiver.await.expect("resolved"), Err(Error::Credentials(_))));
	}

	#[tokio::test]
	async fn events_on_idle_handler_are_no_ops() {
		let mut handler = handler();

		handler.channel_event(ChannelEvent::Close);
		handler.fail(Error::ConnectionClosed);
		handler.complete(CacheResponse { status: StatusCode::OK, body: Vec::new() });

		assert!(handler.is_idle());
	}

	#[tokio::test]
	async fn dropped_receiver_does_not_poison_the_handler() {
		let mut handler = handler();
		let (_request, receiver) = handler
			.begin(Method::GET, Namespace::ContentAddressable, "k")
			.await
			.expect("begin");

		drop(receiver);
		handler.complete(CacheResponse { status: StatusCode::OK, body: Vec::new() });

		assert!(handler.is_idle());
		assert!(
			handler.begin(Method::GET, Namespace::ContentAddressable, "k2").await.is_ok()
		);
	}
}
