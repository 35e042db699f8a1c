//! File-backed [`SignatureStore`] so signatures survive process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	credential::{QueryTarget, Signature},
	store::{self, SignatureStore, StoreError, StoreFuture},
};

/// Persists cached signatures to a JSON file after each mutation.
///
/// Writes go to a sibling temp file that is synced and renamed over the snapshot, so the
/// file on disk always holds a complete set of entries.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<HashMap<QueryTarget, Signature>>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the snapshot location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<HashMap<QueryTarget, Signature>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<Signature> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().map(|signature| (signature.target.clone(), signature)).collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<QueryTarget, Signature>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let mut snapshot: Vec<_> = contents.values().collect();

		snapshot.sort_by(|a, b| a.target.cmp(&b.target));

		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SignatureStore for FileStore {
	fn save(&self, signature: Signature) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			store::prune_expired(&mut guard, OffsetDateTime::now_utc());
			guard.insert(signature.target.clone(), signature);
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn fetch<'a>(&'a self, target: &'a QueryTarget) -> StoreFuture<'a, Option<Signature>> {
		Box::pin(async move { Ok(self.inner.read().get(target).cloned()) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"seo_mcp_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn build_signature(domain: &str) -> Signature {
		let target = QueryTarget::subdomains(domain).expect("Failed to build target fixture.");

		Signature::builder(target)
			.signature(format!("sig-{domain}"))
			.valid_until(OffsetDateTime::now_utc() + Duration::hours(1))
			.overview(Some(serde_json::json!({ "domainRating": 91 })))
			.build()
			.expect("Failed to build file-store test signature.")
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("round_trip");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let signature = build_signature("example.com");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.save(signature.clone()))
			.expect("Failed to save fixture signature to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.fetch(&signature.target))
			.expect("Failed to fetch fixture signature from file store.")
			.expect("File store lost signature after reopen.");

		assert_eq!(fetched, signature);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn save_drops_expired_entries_from_the_snapshot() {
		let path = temp_path("prune");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let stale = Signature::builder(
			QueryTarget::subdomains("stale.example").expect("Failed to build target fixture."),
		)
		.signature("sig-stale")
		.valid_until(OffsetDateTime::now_utc() - Duration::minutes(1))
		.build()
		.expect("Failed to build stale signature fixture.");
		let live = build_signature("example.com");

		rt.block_on(store.save(stale.clone())).expect("Failed to save stale fixture.");
		rt.block_on(store.save(live.clone())).expect("Failed to save live fixture.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert!(
			rt.block_on(reopened.fetch(&stale.target))
				.expect("Failed to fetch stale target.")
				.is_none()
		);
		assert_eq!(
			rt.block_on(reopened.fetch(&live.target)).expect("Failed to fetch live target."),
			Some(live)
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_snapshot_is_an_empty_cache() {
		let path = temp_path("empty");

		File::create(&path).expect("Failed to create empty snapshot.");

		let store = FileStore::open(&path).expect("Empty snapshot should open.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let target = QueryTarget::subdomains("example.com").expect("Target should be valid.");

		assert!(rt.block_on(store.fetch(&target)).expect("Fetch should succeed.").is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_is_a_serialization_error() {
		let path = temp_path("corrupt");

		fs::write(&path, b"{not json").expect("Failed to write corrupt snapshot.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshot must be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
