//! Crate-level error types shared across challenge providers, the signature cache, and tools.

// self
use crate::{_prelude::*, challenge::ChallengeError, credential::TargetError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// `Display` output is written for end users: tool callers surface it verbatim, so messages
/// name the failure class without leaking provider internals.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No challenge provider key is configured.
	#[error(
		"No CAPTCHA provider configured. Set CAPSOLVER_API_KEY or ANTICAPTCHA_API_KEY environment variable."
	)]
	NoProviderConfigured,
	/// Every configured challenge provider failed or timed out.
	#[error("Failed to solve CAPTCHA with available provider(s): {}.", summarize_failures(.failures))]
	AllProvidersFailed {
		/// Failures reported by each provider, in attempt order.
		failures: Vec<ChallengeError>,
	},
	/// A fresh signature could not be obtained for the query target.
	#[error("Failed to get signature for {target}: {reason}.")]
	AcquisitionFailed {
		/// Normalized query target.
		target: String,
		/// Human-readable reason.
		reason: String,
	},
	/// An optional upstream integration was invoked without credentials.
	#[error("{provider} API key not configured. Set {env_var} environment variable.")]
	ProviderNotConfigured {
		/// Integration display name.
		provider: &'static str,
		/// Environment variable that supplies the key.
		env_var: &'static str,
	},
}
impl Error {
	/// Returns `true` when the error stems from missing challenge configuration.
	pub fn is_unconfigured(&self) -> bool {
		matches!(self, Self::NoProviderConfigured | Self::ProviderNotConfigured { .. })
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// An endpoint URL could not be derived or parsed.
	#[error("Endpoint `{endpoint}` is not a valid URL.")]
	InvalidEndpoint {
		/// Endpoint text that failed to parse.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be encoded.
	#[error("Request body could not be encoded as JSON.")]
	RequestEncode(#[source] serde_json::Error),
	/// Query target failed validation.
	#[error(transparent)]
	InvalidTarget(#[from] TargetError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned an unexpected but non-fatal response.
	#[error("Upstream endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with malformed JSON that could not be parsed.
	#[error("Upstream endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

fn summarize_failures(failures: &[ChallengeError]) -> String {
	if failures.is_empty() {
		return "no provider was attempted".into();
	}

	failures.iter().map(|failure| failure.kind().as_str()).collect::<Vec<_>>().join(", ")
}
