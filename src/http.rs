//! Transport primitives for JSON-over-HTTP calls to providers, the target site, and the
//! language model.
//!
//! [`JsonHttpClient`] is the crate's only dependency on an HTTP stack. Every outbound call is
//! a JSON `POST`; implementations return the raw [`JsonResponse`] (status, Retry-After hint,
//! body bytes) and leave interpretation to the caller, because the challenge providers report
//! failures inside 200 responses while the language model uses HTTP status codes.

// std
use std::time::Duration as StdDuration;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError},
};

/// Per-request timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Boxed future returned by [`JsonHttpClient::post_json`].
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<JsonResponse>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of posting JSON bodies.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared by every
/// provider, the signature exchange, and the query generator behind an `Arc`.
pub trait JsonHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Posts `body` to `url`, attaching `bearer` as an `Authorization` header when supplied.
	fn post_json<'a>(
		&'a self,
		url: &'a Url,
		body: &'a serde_json::Value,
		bearer: Option<&'a str>,
	) -> HttpFuture<'a>;
}

/// Metadata captured from an HTTP response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Raw response handed back by a [`JsonHttpClient`].
#[derive(Clone, Debug, Default)]
pub struct JsonResponse {
	/// Status and retry metadata.
	pub metadata: ResponseMetadata,
	/// Undecoded response body.
	pub body: Vec<u8>,
}
impl JsonResponse {
	/// Builds a `200 OK` response around a JSON value; handy for fake transports.
	pub fn ok(value: &serde_json::Value) -> Self {
		Self {
			metadata: ResponseMetadata { status: Some(200), retry_after: None },
			body: value.to_string().into_bytes(),
		}
	}

	/// Returns `true` when the status is missing or in the 2xx range.
	pub fn is_success(&self) -> bool {
		self.metadata.status.is_none_or(|status| (200..300).contains(&status))
	}

	/// Fails with [`TransientError::Endpoint`] unless [`is_success`](Self::is_success).
	pub fn ensure_success(self, endpoint: &str) -> Result<Self> {
		if self.is_success() {
			return Ok(self);
		}

		Err(TransientError::Endpoint {
			message: format!(
				"{endpoint} responded with HTTP {}: {}",
				self.metadata.status.unwrap_or_default(),
				body_preview(&self.body),
			),
			status: self.metadata.status,
			retry_after: self.metadata.retry_after,
		}
		.into())
	}

	/// Decodes the body, reporting the JSON path of the first mismatch.
	pub fn decode<T>(&self) -> Result<T>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ResponseParse { source, status: self.metadata.status }.into()
		})
	}
}

/// Joins `path` onto an API base URL, tolerating a missing trailing slash on the base.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
	let mut base = base.clone();

	if !base.path().ends_with('/') {
		let with_slash = format!("{}/", base.path());

		base.set_path(&with_slash);
	}

	base.join(path)
		.map_err(|source| ConfigError::InvalidEndpoint { endpoint: path.to_owned(), source }.into())
}

/// Thin wrapper around [`ReqwestClient`] that applies a per-request timeout.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient {
	client: ReqwestClient,
	timeout: StdDuration,
}
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, timeout: DEFAULT_REQUEST_TIMEOUT }
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestHttpClient {
	fn default() -> Self {
		Self::with_client(ReqwestClient::default())
	}
}
#[cfg(feature = "reqwest")]
impl JsonHttpClient for ReqwestHttpClient {
	fn post_json<'a>(
		&'a self,
		url: &'a Url,
		body: &'a serde_json::Value,
		bearer: Option<&'a str>,
	) -> HttpFuture<'a> {
		Box::pin(async move {
			let payload = serde_json::to_vec(body).map_err(ConfigError::RequestEncode)?;
			let mut request = self
				.client
				.post(url.clone())
				.timeout(self.timeout)
				.header(CONTENT_TYPE, "application/json")
				.body(payload);

			if let Some(token) = bearer {
				request = request.header(AUTHORIZATION, format!("Bearer {token}"));
			}

			let response = request.send().await.map_err(|e| map_reqwest_error(url, e))?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await.map_err(|e| map_reqwest_error(url, e))?.to_vec();

			Ok(JsonResponse {
				metadata: ResponseMetadata { status: Some(status), retry_after },
				body,
			})
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(url: &Url, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Endpoint {
			message: format!("Request to {} timed out", url.host_str().unwrap_or("upstream")),
			status: err.status().map(|code| code.as_u16()),
			retry_after: None,
		}
		.into();
	}

	crate::error::TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

fn body_preview(body: &[u8]) -> String {
	const LIMIT: usize = 256;

	let text = String::from_utf8_lossy(body);

	if text.chars().count() <= LIMIT {
		return text.into_owned();
	}

	let mut buf: String = text.chars().take(LIMIT).collect();

	buf.push('…');

	buf
}
