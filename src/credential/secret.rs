//! Redacting wrappers for API keys, verification tokens, and signatures.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping API keys and signatures out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when the secret is empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}
impl AsRef<str> for Secret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Single-use token produced by a solved challenge.
///
/// The type is intentionally not `Clone`: handing it to an exchange or fetch call moves it,
/// so a token is consumed exactly once.
#[derive(PartialEq, Eq)]
pub struct VerificationToken(String);
impl VerificationToken {
	/// Wraps a solved challenge token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Consumes the token and returns the raw string for the outbound request.
	pub fn into_inner(self) -> String {
		self.0
	}
}
impl Debug for VerificationToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("VerificationToken").field(&"<redacted>").finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = Secret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Secret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(
			format!("{:?}", VerificationToken::new("turnstile")),
			"VerificationToken(\"<redacted>\")"
		);
	}

	#[test]
	fn blank_secrets_are_detected() {
		assert!(Secret::new("  ").is_blank());
		assert!(!Secret::new("CAP-123").is_blank());
	}
}
