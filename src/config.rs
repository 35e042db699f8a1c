//! Immutable runtime configuration, usually read once from the environment.

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	challenge::{PollPolicy, ProviderConfig, ProviderKind},
	credential::Secret,
	http::DEFAULT_REQUEST_TIMEOUT,
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient};

/// Environment variable carrying the OpenRouter API key.
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
/// Environment variable pointing the signature cache at a JSON file.
pub const CACHE_PATH_ENV: &str = "SEO_MCP_CACHE_PATH";

/// Transport settings shared by every outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpConfig {
	/// Per-request timeout.
	pub request_timeout: StdDuration,
}
impl HttpConfig {
	/// Builds the reqwest transport with rustls and the configured timeout.
	#[cfg(feature = "reqwest")]
	pub fn build_client(&self) -> Result<ReqwestHttpClient> {
		let client = ReqwestClient::builder()
			.timeout(self.request_timeout)
			.build()
			.map_err(ConfigError::from)?;

		Ok(ReqwestHttpClient::with_client(client).with_timeout(self.request_timeout))
	}
}
impl Default for HttpConfig {
	fn default() -> Self {
		Self { request_timeout: DEFAULT_REQUEST_TIMEOUT }
	}
}

/// Everything the tools need to run; built once and passed explicitly.
#[derive(Clone, Debug, Default)]
pub struct SeoConfig {
	/// Challenge providers with usable keys.
	pub providers: Vec<ProviderConfig>,
	/// OpenRouter key; AI generation fails without it.
	pub openrouter_api_key: Option<Secret>,
	/// OpenRouter API base override.
	pub openrouter_base: Option<Url>,
	/// Signature exchange endpoint override.
	pub exchange_endpoint: Option<Url>,
	/// Challenge polling schedule.
	pub poll: PollPolicy,
	/// Transport settings.
	pub http: HttpConfig,
	/// Signature cache snapshot; in-memory when unset.
	pub cache_path: Option<PathBuf>,
}
impl SeoConfig {
	/// Reads configuration from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads configuration through `lookup`; blank values count as absent.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let providers = [ProviderKind::CapSolver, ProviderKind::AntiCaptcha]
			.into_iter()
			.filter_map(|kind| read(kind.env_var()).map(|key| ProviderConfig::new(kind, key)))
			.collect();

		Self {
			providers,
			openrouter_api_key: read(OPENROUTER_API_KEY_ENV).map(Secret::new),
			cache_path: read(CACHE_PATH_ENV).map(PathBuf::from),
			..Default::default()
		}
	}

	/// Adds a challenge provider.
	pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
		self.providers.push(provider);

		self
	}

	/// Sets the OpenRouter key.
	pub fn with_openrouter_key(mut self, key: impl Into<String>) -> Self {
		self.openrouter_api_key = Some(Secret::new(key));

		self
	}

	/// Overrides the OpenRouter API base.
	pub fn with_openrouter_base(mut self, base: Url) -> Self {
		self.openrouter_base = Some(base);

		self
	}

	/// Overrides the signature exchange endpoint.
	pub fn with_exchange_endpoint(mut self, endpoint: Url) -> Self {
		self.exchange_endpoint = Some(endpoint);

		self
	}

	/// Overrides the polling schedule.
	pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
		self.poll = poll;

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.http.request_timeout = timeout;

		self
	}

	/// Persists the signature cache at `path`.
	pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.cache_path = Some(path.into());

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
		move |name: &str| pairs.iter().find(|(key, _)| *key == name).map(|(_, value)| (*value).to_owned())
	}

	#[test]
	fn both_keys_configure_providers_in_default_order() {
		let config = SeoConfig::from_lookup(lookup(&[
			("ANTICAPTCHA_API_KEY", "anti"),
			("CAPSOLVER_API_KEY", "cap"),
			("OPENROUTER_API_KEY", "or"),
		]));
		let kinds = config.providers.iter().map(|provider| provider.kind).collect::<Vec<_>>();

		assert_eq!(kinds, [ProviderKind::CapSolver, ProviderKind::AntiCaptcha]);
		assert!(config.openrouter_api_key.is_some());
		assert_eq!(config.poll, PollPolicy::default());
		assert_eq!(config.http.request_timeout, StdDuration::from_secs(30));
	}

	#[test]
	fn blank_values_count_as_absent() {
		let config = SeoConfig::from_lookup(lookup(&[
			("CAPSOLVER_API_KEY", "   "),
			("OPENROUTER_API_KEY", ""),
			("SEO_MCP_CACHE_PATH", " "),
		]));

		assert!(config.providers.is_empty());
		assert!(config.openrouter_api_key.is_none());
		assert!(config.cache_path.is_none());
	}

	#[test]
	fn anticaptcha_alone_is_enough() {
		let config = SeoConfig::from_lookup(lookup(&[("ANTICAPTCHA_API_KEY", "anti")]));

		assert_eq!(config.providers.len(), 1);
		assert_eq!(config.providers[0].kind, ProviderKind::AntiCaptcha);
		assert!(config.providers[0].usable_key().is_some());
	}
}
