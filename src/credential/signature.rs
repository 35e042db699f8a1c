//! Site-issued signature records, lifecycle helpers, and builders.

// self
use crate::{
	_prelude::*,
	credential::{QueryTarget, Secret},
};

/// Current lifecycle status for a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureStatus {
	/// Signature is still within its validity window.
	Valid,
	/// Signature reached or passed its `valid_until` instant.
	Expired,
}

/// Errors produced by [`SignatureBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SignatureBuilderError {
	/// The exchange returned no signature (or an empty one).
	#[error("Signature is required.")]
	MissingSignature,
	/// The exchange returned no validity deadline.
	#[error("Validity deadline is required.")]
	MissingValidity,
}

/// Short-lived credential permitting data queries for one target.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
	/// Query target the signature was issued for.
	pub target: QueryTarget,
	/// Signature string; callers must avoid logging it.
	pub signature: Secret,
	/// Instant the signature was obtained.
	#[serde(with = "time::serde::rfc3339")]
	pub issued_at: OffsetDateTime,
	/// Instant after which the site rejects the signature.
	#[serde(with = "time::serde::rfc3339")]
	pub valid_until: OffsetDateTime,
	/// Overview payload returned alongside the signature, if any.
	pub overview: Option<serde_json::Value>,
}
impl Signature {
	/// Returns a builder for the provided target.
	pub fn builder(target: QueryTarget) -> SignatureBuilder {
		SignatureBuilder::new(target)
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> SignatureStatus {
		if instant < self.valid_until { SignatureStatus::Valid } else { SignatureStatus::Expired }
	}

	/// Returns `true` if the signature may be used at the provided instant.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), SignatureStatus::Valid)
	}

	/// Returns `true` if the signature is usable relative to the current clock.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Time left before expiry at the provided instant, clamped at zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.valid_until - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}
}
impl Debug for Signature {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Signature")
			.field("target", &self.target)
			.field("signature", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("valid_until", &self.valid_until)
			.field("overview", &self.overview.as_ref().map(|_| ".."))
			.finish()
	}
}

/// Builder for [`Signature`].
#[derive(Clone, Debug)]
pub struct SignatureBuilder {
	target: QueryTarget,
	signature: Option<Secret>,
	issued_at: Option<OffsetDateTime>,
	valid_until: Option<OffsetDateTime>,
	overview: Option<serde_json::Value>,
}
impl SignatureBuilder {
	fn new(target: QueryTarget) -> Self {
		Self { target, signature: None, issued_at: None, valid_until: None, overview: None }
	}

	/// Provides the signature value.
	pub fn signature(mut self, value: impl Into<String>) -> Self {
		self.signature = Some(Secret::new(value));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the validity deadline.
	pub fn valid_until(mut self, instant: OffsetDateTime) -> Self {
		self.valid_until = Some(instant);

		self
	}

	/// Attaches the overview payload captured at issuance.
	pub fn overview(mut self, overview: Option<serde_json::Value>) -> Self {
		self.overview = overview;

		self
	}

	/// Consumes the builder and produces a [`Signature`].
	pub fn build(self) -> Result<Signature, SignatureBuilderError> {
		let signature = self
			.signature
			.filter(|value| !value.is_blank())
			.ok_or(SignatureBuilderError::MissingSignature)?;
		let valid_until = self.valid_until.ok_or(SignatureBuilderError::MissingValidity)?;

		Ok(Signature {
			target: self.target,
			signature,
			issued_at: self.issued_at.unwrap_or_else(OffsetDateTime::now_utc),
			valid_until,
			overview: self.overview,
		})
	}
}
