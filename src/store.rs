//! Signature cache contracts and built-in store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	credential::{QueryTarget, Signature},
};

/// Boxed future returned by [`SignatureStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by signature caches.
///
/// Implementations replace entries as a whole, so a concurrent reader observes either the
/// previous signature or the new one, never a mix of both.
pub trait SignatureStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the signature for its query target (last write wins).
	///
	/// Built-in stores also drop other entries that have already expired.
	fn save(&self, signature: Signature) -> StoreFuture<'_, ()>;

	/// Fetches the raw entry for the target, expired or not.
	fn fetch<'a>(&'a self, target: &'a QueryTarget) -> StoreFuture<'a, Option<Signature>>;
}
impl<'s> dyn SignatureStore + 's {
	/// Looks up a usable signature, treating entries that expire at or before
	/// `now + margin` as misses.
	pub async fn lookup(
		&self,
		target: &QueryTarget,
		now: OffsetDateTime,
		margin: Duration,
	) -> Result<CacheLookup, StoreError> {
		let lookup = match self.fetch(target).await? {
			Some(signature) if signature.is_valid_at(now + margin) => CacheLookup::Hit(signature),
			Some(_) => CacheLookup::Miss(MissReason::Expired),
			None => CacheLookup::Miss(MissReason::Absent),
		};

		Ok(lookup)
	}
}

/// Drops entries whose validity has passed at `now`; runs on every save.
pub(crate) fn prune_expired(entries: &mut HashMap<QueryTarget, Signature>, now: OffsetDateTime) {
	entries.retain(|_, signature| signature.is_valid_at(now));
}

/// Result of a cache lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheLookup {
	/// A signature that is valid at the lookup instant.
	Hit(Signature),
	/// No usable signature; callers must re-acquire.
	Miss(MissReason),
}

/// Why a lookup missed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissReason {
	/// No entry exists for the target.
	Absent,
	/// An entry exists but its validity has passed.
	Expired,
}
impl MissReason {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Absent => "absent",
			Self::Expired => "expired",
		}
	}
}

/// Error type produced by [`SignatureStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
