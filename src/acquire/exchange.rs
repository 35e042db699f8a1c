//! Trades a verification token for a site-issued signature.

// crates.io
use time::format_description::well_known::{Iso8601, Rfc3339};
// self
use crate::{
	_prelude::*,
	credential::{QueryTarget, VerificationToken},
	error::ConfigError,
	http::JsonHttpClient,
};

/// Overview endpoint that issues signatures for free backlink lookups.
pub const DEFAULT_EXCHANGE_ENDPOINT: &str = "https://ahrefs.com/v4/stGetFreeBacklinksOverview";

/// Boxed future returned by [`SignatureExchange::exchange`].
pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<ExchangeResponse>> + 'a + Send>>;

/// Raw fields returned by the exchange; any of them may be missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExchangeResponse {
	/// Signature string, when issued.
	pub signature: Option<String>,
	/// Validity deadline, when issued and parseable.
	pub valid_until: Option<OffsetDateTime>,
	/// Overview payload shipped with the signature.
	pub overview: Option<serde_json::Value>,
}
impl ExchangeResponse {
	/// Reads the `[_, {signedInput: {signature, input: {validUntil}}, data}]` shape.
	///
	/// Anything else yields an empty response rather than an error so the acquirer can report
	/// which field was missing.
	pub fn from_body(body: &serde_json::Value) -> Self {
		let Some(entry) = body.as_array().and_then(|items| items.get(1)) else {
			return Self::default();
		};
		let signed = entry.get("signedInput");
		let signature = signed
			.and_then(|signed| signed.get("signature"))
			.and_then(serde_json::Value::as_str)
			.filter(|value| !value.trim().is_empty())
			.map(str::to_owned);
		let valid_until = signed
			.and_then(|signed| signed.get("input"))
			.and_then(|input| input.get("validUntil"))
			.and_then(parse_valid_until);
		let overview = entry.get("data").filter(|data| !data.is_null()).cloned();

		Self { signature, valid_until, overview }
	}
}

/// Exchange collaborator consumed by the acquirer.
pub trait SignatureExchange
where
	Self: Send + Sync,
{
	/// Consumes `token` to obtain a signature for `target`.
	fn exchange<'a>(&'a self, token: VerificationToken, target: &'a QueryTarget)
	-> ExchangeFuture<'a>;
}

/// Posts `{captcha, mode, url}` to the site's overview endpoint.
#[derive(Debug)]
pub struct HttpSignatureExchange<C>
where
	C: ?Sized + JsonHttpClient,
{
	http: Arc<C>,
	endpoint: Url,
}
impl<C> HttpSignatureExchange<C>
where
	C: ?Sized + JsonHttpClient,
{
	/// Creates an exchange against [`DEFAULT_EXCHANGE_ENDPOINT`].
	pub fn new(http: Arc<C>) -> Result<Self> {
		let endpoint = Url::parse(DEFAULT_EXCHANGE_ENDPOINT).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: DEFAULT_EXCHANGE_ENDPOINT.into(), source }
		})?;

		Ok(Self::with_endpoint(http, endpoint))
	}

	/// Creates an exchange against a custom endpoint (proxies, tests).
	pub fn with_endpoint(http: Arc<C>, endpoint: Url) -> Self {
		Self { http, endpoint }
	}

	/// Returns the endpoint receiving exchange requests.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}
}
impl<C> SignatureExchange for HttpSignatureExchange<C>
where
	C: ?Sized + JsonHttpClient,
{
	fn exchange<'a>(
		&'a self,
		token: VerificationToken,
		target: &'a QueryTarget,
	) -> ExchangeFuture<'a> {
		Box::pin(async move {
			let body = serde_json::json!({
				"captcha": token.into_inner(),
				"mode": target.mode().as_str(),
				"url": target.domain(),
			});
			let response = self
				.http
				.post_json(&self.endpoint, &body, None)
				.await?
				.ensure_success("signature exchange")?;
			let payload: serde_json::Value = response.decode()?;

			Ok(ExchangeResponse::from_body(&payload))
		})
	}
}

fn parse_valid_until(value: &serde_json::Value) -> Option<OffsetDateTime> {
	match value {
		serde_json::Value::String(raw) => OffsetDateTime::parse(raw, &Rfc3339)
			.or_else(|_| OffsetDateTime::parse(raw, &Iso8601::DEFAULT))
			.ok(),
		serde_json::Value::Number(n) =>
			n.as_i64().and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn from_body_reads_signed_input() {
		let response = ExchangeResponse::from_body(&serde_json::json!([
			"Ok",
			{
				"signedInput": {
					"signature": "sig-123",
					"input": { "validUntil": "2030-01-01T00:00:00Z" },
				},
				"data": { "domainRating": 91, "backlinks": 1200 },
			},
		]));

		assert_eq!(response.signature.as_deref(), Some("sig-123"));
		assert_eq!(response.valid_until, Some(datetime!(2030-01-01 0:00 UTC)));
		assert_eq!(response.overview, Some(serde_json::json!({ "domainRating": 91, "backlinks": 1200 })));
	}

	#[test]
	fn from_body_tolerates_unexpected_shapes() {
		assert_eq!(ExchangeResponse::from_body(&serde_json::json!({ "error": "x" })), Default::default());
		assert_eq!(ExchangeResponse::from_body(&serde_json::json!(["Error"])), Default::default());

		let partial = ExchangeResponse::from_body(&serde_json::json!([
			"Ok",
			{ "signedInput": { "signature": "", "input": { "validUntil": "soon" } } },
		]));

		assert_eq!(partial, ExchangeResponse::default());
	}
}
