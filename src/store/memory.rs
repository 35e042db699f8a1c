//! Thread-safe in-memory [`SignatureStore`] implementation.

// self
use crate::{
	_prelude::*,
	credential::{QueryTarget, Signature},
	store::{self, SignatureStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<QueryTarget, Signature>>>;

/// Process-local signature cache shared by every tool invocation.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of cached entries, including expired ones not yet pruned by a save.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing has been cached yet.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn save_now(map: StoreMap, signature: Signature) -> Result<(), StoreError> {
		let mut entries = map.write();

		store::prune_expired(&mut entries, OffsetDateTime::now_utc());
		entries.insert(signature.target.clone(), signature);

		Ok(())
	}

	fn fetch_now(map: StoreMap, target: QueryTarget) -> Option<Signature> {
		map.read().get(&target).cloned()
	}
}
impl SignatureStore for MemoryStore {
	fn save(&self, signature: Signature) -> StoreFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::save_now(map, signature) })
	}

	fn fetch<'a>(&'a self, target: &'a QueryTarget) -> StoreFuture<'a, Option<Signature>> {
		let map = self.0.clone();
		let target = target.to_owned();

		Box::pin(async move { Ok(Self::fetch_now(map, target)) })
	}
}
