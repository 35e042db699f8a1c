//! Signature acquisition with caching and per-target singleflight guards.
//!
//! [`SignatureAcquirer::acquire`] checks the cache first and only solves a challenge when the
//! cached signature is missing, expired, inside the caller's expiry margin, or bypassed via
//! `force`. Concurrent callers for one target queue behind the same guard, so the second caller
//! observes the signature stored by the first instead of solving again.

pub mod exchange;

pub use exchange::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	challenge::ChallengeSolver,
	credential::{QueryTarget, Signature},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::{CacheLookup, SignatureStore},
};

/// Parameters for one acquisition.
#[derive(Clone, Debug)]
pub struct CachedSignatureRequest {
	/// Target the signature must cover.
	pub target: QueryTarget,
	/// Skips the cache when true.
	pub force: bool,
	/// Entries expiring within this window count as misses.
	pub expiry_margin: Duration,
}
impl CachedSignatureRequest {
	/// Creates a cache-first request with no expiry margin.
	pub fn new(target: QueryTarget) -> Self {
		Self { target, force: false, expiry_margin: Duration::ZERO }
	}

	/// Forces a fresh solve regardless of the cache.
	pub fn force_refresh(mut self) -> Self {
		self.force = true;

		self
	}

	/// Overrides the expiry margin; negative values clamp to zero.
	pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
		self.expiry_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}
}

/// Thread-safe counters for acquisitions.
#[derive(Debug, Default)]
pub struct AcquireMetrics {
	attempts: AtomicU64,
	cache_hits: AtomicU64,
	solves: AtomicU64,
	failures: AtomicU64,
}
impl AcquireMetrics {
	/// Total acquisitions requested.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Acquisitions answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Acquisitions that went through a challenge solve.
	pub fn solves(&self) -> u64 {
		self.solves.load(Ordering::Relaxed)
	}

	/// Acquisitions that returned an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	fn record_solve(&self) {
		self.solves.fetch_add(1, Ordering::Relaxed);
	}

	fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}

/// Coordinates the cache, the challenge solver, and the signature exchange.
#[derive(Clone)]
pub struct SignatureAcquirer {
	/// Signature cache.
	pub store: Arc<dyn SignatureStore>,
	/// Challenge solver consulted on cache misses.
	pub solver: Arc<dyn ChallengeSolver>,
	/// Token-for-signature exchange.
	pub exchange: Arc<dyn SignatureExchange>,
	/// Shared acquisition counters.
	pub metrics: Arc<AcquireMetrics>,
	flow_guards: Arc<Mutex<HashMap<QueryTarget, Arc<AsyncMutex<()>>>>>,
}
impl SignatureAcquirer {
	/// Creates an acquirer over the provided collaborators.
	pub fn new(
		store: Arc<dyn SignatureStore>,
		solver: Arc<dyn ChallengeSolver>,
		exchange: Arc<dyn SignatureExchange>,
	) -> Self {
		Self {
			store,
			solver,
			exchange,
			metrics: Arc::new(AcquireMetrics::default()),
			flow_guards: Default::default(),
		}
	}

	/// Site page whose challenge guards signature issuance for `target`.
	pub fn site_url(target: &QueryTarget) -> Result<Url> {
		crate::tools::backlink_checker_url(target)
	}

	/// Returns a signature that is valid at call time, solving a challenge only on a miss.
	pub async fn acquire(&self, request: CachedSignatureRequest) -> Result<Signature> {
		const KIND: FlowKind = FlowKind::Acquire;

		let span = FlowSpan::new(KIND, "acquire");

		self.metrics.record_attempt();
		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let guard = self.flow_guard(&request.target);
				let _singleflight = guard.lock().await;

				if !request.force {
					let now = OffsetDateTime::now_utc();
					let lookup = <dyn SignatureStore>::lookup(
						self.store.as_ref(),
						&request.target,
						now,
						request.expiry_margin,
					)
					.await?;

					match lookup {
						CacheLookup::Hit(signature) => {
							obs::cache_lookup(&request.target, "hit");
							self.metrics.record_cache_hit();

							return Ok(signature);
						},
						CacheLookup::Miss(reason) => obs::cache_lookup(&request.target, reason.as_str()),
					}
				}

				self.metrics.record_solve();

				let signature = self.solve_and_exchange(&request.target).await?;

				self.store.save(signature.clone()).await?;

				Ok(signature)
			})
			.await;

		if result.is_err() {
			self.metrics.record_failure();
		}

		obs::record_result(KIND, &result);

		result
	}

	async fn solve_and_exchange(&self, target: &QueryTarget) -> Result<Signature> {
		let site_url = Self::site_url(target)?;
		let token = self.solver.verification_token(&site_url).await?;
		let response = self.exchange.exchange(token, target).await?;
		let now = OffsetDateTime::now_utc();
		let failed = |reason: &str| Error::AcquisitionFailed {
			target: target.domain().to_owned(),
			reason: reason.to_owned(),
		};
		let signature = Signature::builder(target.clone())
			.signature(response.signature.unwrap_or_default())
			.issued_at(now)
			.overview(response.overview);
		let signature = match response.valid_until {
			Some(valid_until) => signature.valid_until(valid_until),
			None => signature,
		}
		.build()
		.map_err(|e| failed(e.to_string().trim_end_matches('.')))?;

		if !signature.is_valid_at(now) {
			return Err(failed("signature was already expired when issued"));
		}

		Ok(signature)
	}

	fn flow_guard(&self, target: &QueryTarget) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(target.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Debug for SignatureAcquirer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignatureAcquirer").field("metrics", &self.metrics).finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// self
	use super::*;
	use crate::{
		challenge::{ChallengeError, ProviderKind, SolveFuture},
		credential::VerificationToken,
		store::MemoryStore,
	};

	#[derive(Default)]
	struct CountingSolver {
		calls: AtomicUsize,
		fail: bool,
	}
	impl ChallengeSolver for CountingSolver {
		fn verification_token<'a>(&'a self, _site_url: &'a Url) -> SolveFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				if self.fail {
					return Err(Error::AllProvidersFailed {
						failures: vec![ChallengeError::Timeout {
							provider: ProviderKind::CapSolver,
							attempts: 120,
						}],
					});
				}

				Ok(VerificationToken::new("token"))
			})
		}
	}

	struct FixedExchange(ExchangeResponse);
	impl SignatureExchange for FixedExchange {
		fn exchange<'a>(
			&'a self,
			token: VerificationToken,
			_target: &'a QueryTarget,
		) -> ExchangeFuture<'a> {
			assert_eq!(token.expose(), "token");

			let response = self.0.clone();

			Box::pin(async move { Ok(response) })
		}
	}

	fn issued(valid_for: Duration) -> ExchangeResponse {
		ExchangeResponse {
			signature: Some("sig".into()),
			valid_until: Some(OffsetDateTime::now_utc() + valid_for),
			overview: Some(serde_json::json!({ "domainRating": 50 })),
		}
	}

	fn build_acquirer(
		solver: Arc<CountingSolver>,
		response: ExchangeResponse,
	) -> (SignatureAcquirer, MemoryStore) {
		let store = MemoryStore::default();
		let acquirer =
			SignatureAcquirer::new(Arc::new(store.clone()), solver, Arc::new(FixedExchange(response)));

		(acquirer, store)
	}

	fn target() -> QueryTarget {
		QueryTarget::subdomains("example.com").expect("Target fixture should be valid.")
	}

	#[tokio::test]
	async fn miss_solves_stores_and_then_hits() {
		let solver = Arc::new(CountingSolver::default());
		let (acquirer, store) = build_acquirer(solver.clone(), issued(Duration::hours(1)));
		let first = acquirer
			.acquire(CachedSignatureRequest::new(target()))
			.await
			.expect("First acquisition should solve.");
		let second = acquirer
			.acquire(CachedSignatureRequest::new(target()))
			.await
			.expect("Second acquisition should hit the cache.");

		assert_eq!(first, second);
		assert_eq!(first.overview, Some(serde_json::json!({ "domainRating": 50 })));
		assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
		assert_eq!(store.len(), 1);
		assert_eq!(acquirer.metrics.attempts(), 2);
		assert_eq!(acquirer.metrics.cache_hits(), 1);
		assert_eq!(acquirer.metrics.solves(), 1);
	}

	#[tokio::test]
	async fn force_and_margin_bypass_the_cache() {
		let solver = Arc::new(CountingSolver::default());
		let (acquirer, _store) = build_acquirer(solver.clone(), issued(Duration::minutes(5)));

		acquirer.acquire(CachedSignatureRequest::new(target())).await.expect("Solve should work.");
		acquirer
			.acquire(CachedSignatureRequest::new(target()).force_refresh())
			.await
			.expect("Forced solve should work.");
		acquirer
			.acquire(CachedSignatureRequest::new(target()).with_expiry_margin(Duration::minutes(10)))
			.await
			.expect("Margin solve should work.");

		assert_eq!(solver.calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn empty_or_stale_exchange_is_not_cached() {
		for response in [
			ExchangeResponse::default(),
			ExchangeResponse { signature: None, ..issued(Duration::hours(1)) },
			ExchangeResponse { valid_until: None, ..issued(Duration::hours(1)) },
			issued(Duration::minutes(-1)),
		] {
			let solver = Arc::new(CountingSolver::default());
			let (acquirer, store) = build_acquirer(solver, response);
			let err = acquirer
				.acquire(CachedSignatureRequest::new(target()))
				.await
				.expect_err("Unusable exchange must fail.");

			assert!(matches!(err, Error::AcquisitionFailed { ref target, .. } if target == "example.com"));
			assert!(store.is_empty());
			assert_eq!(acquirer.metrics.failures(), 1);
		}
	}

	#[tokio::test]
	async fn solver_failure_terminates_acquisition() {
		let solver = Arc::new(CountingSolver { fail: true, ..Default::default() });
		let (acquirer, store) = build_acquirer(solver, issued(Duration::hours(1)));
		let err = acquirer
			.acquire(CachedSignatureRequest::new(target()))
			.await
			.expect_err("Solver failure must propagate.");

		assert!(matches!(err, Error::AllProvidersFailed { .. }));
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_solve() {
		let solver = Arc::new(CountingSolver::default());
		let (acquirer, _store) = build_acquirer(solver.clone(), issued(Duration::hours(1)));
		let a = acquirer.clone();
		let b = acquirer.clone();
		let (left, right) = tokio::join!(
			a.acquire(CachedSignatureRequest::new(target())),
			b.acquire(CachedSignatureRequest::new(target())),
		);

		assert_eq!(
			left.expect("Left acquisition should succeed."),
			right.expect("Right acquisition should succeed.")
		);
		assert_eq!(solver.calls.load(Ordering::SeqCst), 1);
	}
}
