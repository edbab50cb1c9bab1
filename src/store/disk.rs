//! Local on-disk blob store.

// std
use std::{
	io::ErrorKind,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use tokio::fs;
// self
use crate::{
	_prelude::*,
	store::{BlobStore, Namespace},
};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Blob store rooted at a local directory, one subdirectory per namespace.
///
/// Keys are used verbatim as file names. Writes land in a temp file first and rename into
/// place so concurrent readers never observe a partial blob.
#[derive(Debug)]
pub struct OnDiskStore {
	root: PathBuf,
}
impl OnDiskStore {
	/// Create a store rooted at `root`. Directories are created lazily on first write.
	pub fn new(root: PathBuf) -> Self {
		Self { root }
	}

	fn blob_path(&self, namespace: Namespace, key: &str) -> PathBuf {
		self.root.join(namespace.segment()).join(key)
	}
}
#[async_trait::async_trait]
impl BlobStore for OnDiskStore {
	async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<Vec<u8>>> {
		match fs::read(self.blob_path(namespace, key)).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	async fn put(&self, namespace: Namespace, key: &str, bytes: Vec<u8>) -> Result<()> {
		let path = self.blob_path(namespace, key);
		let dir = self.root.join(namespace.segment());

		fs::create_dir_all(&dir).await?;

		let temp = dir.join(format!(
			".{key}.{}.{}.tmp",
			std::process::id(),
			TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
		));

		fs::write(&temp, &bytes).await?;

		if let Err(err) = fs::rename(&temp, &path).await {
			let _ = fs::remove_file(&temp).await;

			return Err(err.into());
		}

		tracing::debug!(namespace = namespace.segment(), key, bytes = bytes.len(), "blob written");

		Ok(())
	}

	async fn contains(&self, namespace: Namespace, key: &str) -> Result<bool> {
		match fs::metadata(self.blob_path(namespace, key)).await {
			Ok(metadata) => Ok(metadata.is_file()),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}
}
