//! Async remote build-artifact cache client with HTTP and local-disk backends, credential
//! injection, and throttled token refresh — the storage layer a build tool talks to when it
//! reuses outputs across machines.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod credentials;
pub mod http;
pub mod store;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	config::{CacheOptions, CacheTarget},
	credentials::{HttpCredentials, RequestSigner, SigningScope, TokenProvider},
	error::{Error, Result},
	store::{BlobStore, CredentialSources, Namespace, create, is_remote_cache_configured},
};
