//! Cache backend configuration and target resolution.
//!
//! Options arrive pre-parsed from whatever flag/option layer the embedding build tool uses;
//! this module only decides which single backend they describe.

// std
use std::path::{Path, PathBuf};
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::_prelude::*;

/// Default request timeout applied to HTTP cache operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration inputs consumed by the backend factory.
///
/// At most one backend and at most one credential source may be described;
/// violations surface as typed errors at construction, never at first use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheOptions {
	/// Base URL of the HTTP cache endpoint. May embed `user:pass@` credentials.
	#[serde(default)]
	pub http_cache_url: Option<String>,
	/// Request timeout for HTTP cache operations.
	#[serde(default = "default_timeout")]
	pub timeout: Duration,
	/// Whether the local on-disk cache backend is enabled.
	#[serde(default)]
	pub local_disk_cache: bool,
	/// Cache root relative to the working directory, required when `local_disk_cache` is set.
	#[serde(default)]
	pub local_disk_cache_path: Option<PathBuf>,
	/// Signing region for cloud-credential request signing.
	#[serde(default)]
	pub aws_region: Option<String>,
}
impl CacheOptions {
	/// Whether these options describe any cache backend at all.
	///
	/// True iff [`resolve_target`](Self::resolve_target) would take either backend branch;
	/// callers use this to decide whether to enable caching without constructing it.
	pub fn is_remote_cache_configured(&self) -> bool {
		self.http_cache_url.is_some() || self.local_disk_cache
	}

	/// Resolve these options into exactly one backend target.
	///
	/// Evaluated in order: an HTTP URL wins over the disk flag; the disk branch requires both
	/// the flag and a working directory; anything else is a configuration error.
	pub fn resolve_target(&self, working_directory: Option<&Path>) -> Result<CacheTarget> {
		if let Some(raw) = &self.http_cache_url {
			let uri = Url::parse(raw)?;

			if uri.host_str().is_none() {
				return Err(Error::Config(format!(
					"HTTP cache URL '{raw}' has no host component."
				)));
			}

			return Ok(CacheTarget::Http { uri, timeout: self.timeout });
		}

		if self.local_disk_cache && let Some(working_directory) = working_directory {
			let Some(relative) = &self.local_disk_cache_path else {
				return Err(Error::Config(
					"Local disk cache is enabled but no cache path was configured.".into(),
				));
			};

			return Ok(CacheTarget::LocalDisk { root: working_directory.join(relative) });
		}

		Err(Error::Config(
			"No recognized backend configuration: specify either an HTTP cache URL or local disk cache options."
				.into(),
		))
	}
}

/// Resolved configuration identifying exactly one backend.
#[derive(Clone, Debug)]
pub enum CacheTarget {
	/// HTTP-backed cache at the given base URI.
	Http {
		/// Base URI of the cache endpoint.
		uri: Url,
		/// Per-request timeout enforced by the transport.
		timeout: Duration,
	},
	/// Local on-disk cache rooted at the given directory.
	LocalDisk {
		/// Absolute cache root, `working_directory/configured_relative_path`.
		root: PathBuf,
	},
}

impl Default for CacheOptions {
	fn default() -> Self {
		Self {
			http_cache_url: None,
			timeout: DEFAULT_TIMEOUT,
			local_disk_cache: false,
			local_disk_cache_path: None,
			aws_region: None,
		}
	}
}

fn default_timeout() -> Duration {
	DEFAULT_TIMEOUT
}

#[cfg(test)]
mod tests {
	// std
	use std::path::Path;
	// self
	use super::*;

	fn http_options(url: &str) -> CacheOptions {
		CacheOptions { http_cache_url: Some(url.into()), ..Default::default() }
	}

	#[test]
	fn http_url_resolves_to_http_target() {
		let target = http_options("https://cache.example.com/v1")
			.resolve_target(None)
			.expect("http target");

		match target {
			CacheTarget::Http { uri, timeout } => {
				assert_eq!(uri.as_str(), "https://cache.example.com/v1");
				assert_eq!(timeout, DEFAULT_TIMEOUT);
			},
			other => panic!("expected Http target, got {other:?}"),
		}
	}

	#[test]
	fn http_branch_precedes_disk_branch() {
		let mut options = http_options("https://cache.example.com/v1");

		options.local_disk_cache = true;
		options.local_disk_cache_path = Some("cache".into());

		let target =
			options.resolve_target(Some(Path::new("/work"))).expect("http target wins");

		assert!(matches!(target, CacheTarget::Http { .. }));
	}

	#[test]
	fn disk_target_joins_working_directory() {
		let options = CacheOptions {
			local_disk_cache: true,
			local_disk_cache_path: Some("cache/blobs".into()),
			..Default::default()
		};
		let target =
			options.resolve_target(Some(Path::new("/work"))).expect("disk target");

		match target {
			CacheTarget::LocalDisk { root } => assert_eq!(root, Path::new("/work/cache/blobs")),
			other => panic!("expected LocalDisk target, got {other:?}"),
		}
	}

	#[test]
	fn disk_flag_without_path_is_rejected() {
		let options = CacheOptions { local_disk_cache: true, ..Default::default() };

		assert!(matches!(
			options.resolve_target(Some(Path::new("/work"))),
			Err(Error::Config(_))
		));
	}

	#[test]
	fn disk_flag_without_working_directory_is_rejected() {
		let options = CacheOptions {
			local_disk_cache: true,
			local_disk_cache_path: Some("cache".into()),
			..Default::default()
		};

		assert!(matches!(options.resolve_target(None), Err(Error::Config(_))));
	}

	#[test]
	fn neither_backend_is_rejected() {
		assert!(matches!(
			CacheOptions::default().resolve_target(Some(Path::new("/work"))),
			Err(Error::Config(_))
		));
	}

	#[test]
	fn predicate_reports_either_branch_precondition() {
		assert!(http_options("https://cache.example.com").is_remote_cache_configured());
		assert!(
			CacheOptions { local_disk_cache: true, ..Default::default() }
				.is_remote_cache_configured()
		);
		assert!(!CacheOptions::default().is_remote_cache_configured());
	}
}
