//! Priority-ordered fallback across configured challenge providers.

// self
use crate::{
	_prelude::*,
	challenge::{ChallengeClient, ProviderConfig},
	credential::VerificationToken,
	http::JsonHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future returned by [`ChallengeSolver::verification_token`].
pub type SolveFuture<'a> = Pin<Box<dyn Future<Output = Result<VerificationToken>> + 'a + Send>>;

/// Anything that can turn a challenge-guarded page into a verification token.
///
/// The signature acquirer and tools depend on this seam rather than on the selector so tests
/// can count or script solves.
pub trait ChallengeSolver
where
	Self: Send + Sync,
{
	/// Produces a fresh token for `site_url`.
	fn verification_token<'a>(&'a self, site_url: &'a Url) -> SolveFuture<'a>;

	/// Returns `false` when every solve would fail with [`Error::NoProviderConfigured`].
	fn is_configured(&self) -> bool {
		true
	}
}

/// Tries providers one at a time in priority order and stops at the first success.
#[derive(Debug)]
pub struct ProviderSelector<C>
where
	C: ?Sized + JsonHttpClient,
{
	client: ChallengeClient<C>,
	providers: Vec<ProviderConfig>,
}
impl<C> ProviderSelector<C>
where
	C: ?Sized + JsonHttpClient,
{
	/// Creates a selector; providers are ordered by ascending priority, ties keeping their
	/// configured order.
	pub fn new(
		client: ChallengeClient<C>,
		providers: impl IntoIterator<Item = ProviderConfig>,
	) -> Self {
		let mut providers = providers.into_iter().collect::<Vec<_>>();

		providers.sort_by_key(|provider| provider.priority);

		Self { client, providers }
	}

	/// Providers in attempt order.
	pub fn providers(&self) -> &[ProviderConfig] {
		&self.providers
	}

	/// Returns `true` when at least one provider carries a usable key.
	pub fn has_usable_provider(&self) -> bool {
		self.providers.iter().any(|provider| provider.usable_key().is_some())
	}

	/// Obtains a verification token, falling back through providers on failure.
	///
	/// Fails with [`Error::NoProviderConfigured`] before any request when no provider carries a
	/// key and with [`Error::AllProvidersFailed`] once every provider has failed.
	pub async fn get_token(&self, site_url: &Url) -> Result<VerificationToken> {
		const KIND: FlowKind = FlowKind::Solve;

		if !self.has_usable_provider() {
			return Err(Error::NoProviderConfigured);
		}

		let span = FlowSpan::new(KIND, "get_token");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut failures = Vec::new();

				for provider in &self.providers {
					match self.client.solve(provider, site_url).await {
						Ok(token) => return Ok(token),
						Err(failure) => {
							obs::provider_failed(provider.kind.as_str(), &failure);
							failures.push(failure);
						},
					}
				}

				Err(Error::AllProvidersFailed { failures })
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}
impl<C> ChallengeSolver for ProviderSelector<C>
where
	C: ?Sized + JsonHttpClient,
{
	fn verification_token<'a>(&'a self, site_url: &'a Url) -> SolveFuture<'a> {
		Box::pin(self.get_token(site_url))
	}

	fn is_configured(&self) -> bool {
		self.has_usable_provider()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		challenge::{ChallengeError, ProviderKind},
		http::{HttpFuture, JsonResponse},
	};

	#[derive(Debug, Default)]
	struct Counting {
		calls: AtomicUsize,
	}
	impl JsonHttpClient for Counting {
		fn post_json<'a>(
			&'a self,
			_url: &'a Url,
			_body: &'a serde_json::Value,
			_bearer: Option<&'a str>,
		) -> HttpFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async { Ok(JsonResponse::ok(&serde_json::json!({ "errorId": 1 }))) })
		}
	}

	fn site() -> Url {
		Url::parse("https://ahrefs.com/keyword-generator/?country=us&input=seo")
			.expect("Site URL should parse.")
	}

	#[test]
	fn providers_sort_by_priority_stably() {
		let http = Arc::new(Counting::default());
		let selector = ProviderSelector::new(
			ChallengeClient::new(http),
			[
				ProviderConfig::new(ProviderKind::AntiCaptcha, "b").with_priority(1),
				ProviderConfig::new(ProviderKind::CapSolver, "a").with_priority(1),
				ProviderConfig::new(ProviderKind::AntiCaptcha, "c").with_priority(0),
			],
		);
		let order = selector
			.providers()
			.iter()
			.map(|provider| provider.api_key.as_ref().map(|key| key.expose().to_owned()))
			.collect::<Vec<_>>();

		assert_eq!(order, [Some("c".into()), Some("b".into()), Some("a".into())]);
	}

	#[tokio::test]
	async fn empty_list_is_unconfigured_without_network() {
		let http = Arc::new(Counting::default());
		let selector = ProviderSelector::new(ChallengeClient::new(http.clone()), []);
		let err = selector.get_token(&site()).await.expect_err("Empty list must fail.");

		assert!(matches!(err, Error::NoProviderConfigured));
		assert_eq!(http.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn keyless_providers_are_unconfigured_without_network() {
		let http = Arc::new(Counting::default());
		let mut keyless = ProviderConfig::new(ProviderKind::AntiCaptcha, "");

		keyless.api_key = None;

		let selector = ProviderSelector::new(
			ChallengeClient::new(http.clone()),
			[keyless, ProviderConfig::new(ProviderKind::CapSolver, "   ")],
		);

		assert!(!selector.has_usable_provider());

		let err = selector.get_token(&site()).await.expect_err("Keyless providers must fail.");

		assert!(matches!(err, Error::NoProviderConfigured));
		assert_eq!(http.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn every_failure_is_reported_in_order() {
		let http = Arc::new(Counting::default());
		let mut keyless = ProviderConfig::new(ProviderKind::CapSolver, "");

		keyless.api_key = None;

		let selector = ProviderSelector::new(
			ChallengeClient::new(http.clone()),
			[keyless, ProviderConfig::new(ProviderKind::AntiCaptcha, "key")],
		);
		let err = selector.get_token(&site()).await.expect_err("Every provider fails.");

		match err {
			Error::AllProvidersFailed { failures } => {
				assert_eq!(failures.len(), 2);
				assert_eq!(
					failures[0],
					ChallengeError::Unavailable { provider: ProviderKind::CapSolver }
				);
				assert_eq!(failures[1].provider(), ProviderKind::AntiCaptcha);
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}

		assert_eq!(http.calls.load(Ordering::SeqCst), 1);
	}
}
