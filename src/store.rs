//! Backend-agnostic blob store contract and the backend-selection factory.

pub mod disk;
pub mod http;

// std
use std::path::Path;
// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	config::{CacheOptions, CacheTarget},
	credentials::{HttpCredentials, RequestSigner, SigningScope, TokenProvider},
	store::{disk::OnDiskStore, http::HttpBlobStore},
};

/// Service name used in the cloud signing scope.
const S3_SERVICE: &str = "s3";

/// Cache namespace a key lives under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
	/// Content-addressable storage: blobs keyed by content hash.
	ContentAddressable,
	/// Action cache: action-result records keyed by action fingerprint.
	ActionCache,
}
impl Namespace {
	/// Path segment selecting this namespace under a backend root.
	pub fn segment(self) -> &'static str {
		match self {
			Namespace::ContentAddressable => "cas",
			Namespace::ActionCache => "ac",
		}
	}
}

/// Backend-agnostic blob store capability set.
///
/// Implementations are bound at construction; callers never branch on backend type.
#[async_trait]
pub trait BlobStore: Send + Sync {
	/// Fetch the blob stored under `key`, or `None` when absent.
	async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>>;

	/// Store `bytes` under `key`.
	async fn put(&self, namespace: Namespace, key: &str, bytes: Vec<u8>) -> Result<()>;

	/// Whether a blob is stored under `key`.
	async fn contains(&self, namespace: Namespace, key: &str) -> Result<bool>;
}

/// Resolved identity providers offered to the factory.
///
/// Provider resolution from SDK-specific option parsing happens outside this crate; the
/// factory only enforces that at most one source is active.
#[derive(Clone, Default)]
pub struct CredentialSources {
	/// Cloud request signer, when cloud credentials resolved.
	pub signer: Option<Arc<dyn RequestSigner>>,
	/// Generic token provider, when OAuth-style credentials resolved.
	pub token_provider: Option<Arc<dyn TokenProvider>>,
}

/// Whether the options describe any cache backend worth constructing.
pub fn is_remote_cache_configured(options: &CacheOptions) -> bool {
	options.is_remote_cache_configured()
}

/// Construct exactly one blob store backend from configuration.
///
/// An HTTP URL takes the HTTP branch; otherwise the disk flag plus a working directory
/// takes the disk branch; anything else is a configuration error. Credential conflicts on
/// the HTTP branch are hard errors, never a silent pick-one.
pub fn create(
	options: &CacheOptions,
	sources: CredentialSources,
	working_directory: Option<&Path>,
) -> Result<Box<dyn BlobStore>> {
	match options.resolve_target(working_directory)? {
		CacheTarget::Http { uri, timeout } => {
			let credentials = resolve_http_credentials(options, sources, &uri)?;
			let store = HttpBlobStore::new(uri, timeout, credentials)?;

			Ok(Box::new(store))
		},
		CacheTarget::LocalDisk { root } => Ok(Box::new(OnDiskStore::new(root))),
	}
}

fn resolve_http_credentials(
	options: &CacheOptions,
	sources: CredentialSources,
	uri: &url::Url,
) -> Result<HttpCredentials> {
	match (sources.signer, sources.token_provider) {
		(Some(_), Some(_)) => Err(Error::CredentialConflict),
		(Some(signer), None) => {
			let Some(region) = options.aws_region.clone() else {
				return Err(Error::Config(
					"A cloud signer is configured but no signing region was set.".into(),
				));
			};
			let scope = SigningScope {
				region,
				host: uri.host_str().unwrap_or_default().to_string(),
				service: S3_SERVICE.to_string(),
			};

			Ok(HttpCredentials::from_signer(scope, signer))
		},
		(None, Some(provider)) => Ok(HttpCredentials::from_token_provider(provider)),
		(None, None) => Ok(HttpCredentials::anonymous()),
	}
}
