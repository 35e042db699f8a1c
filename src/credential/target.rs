//! Normalized query targets that key the signature cache.

// self
use crate::_prelude::*;

const TARGET_MAX_LEN: usize = 2048;

/// Error returned when a query target fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum TargetError {
	/// The target was empty once trimmed and stripped of its scheme.
	#[error("Query target cannot be empty.")]
	Empty,
	/// The target contains whitespace characters.
	#[error("Query target contains whitespace.")]
	ContainsWhitespace,
	/// The target exceeded the allowed character count.
	#[error("Query target exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
	/// The mode label is not recognized.
	#[error("Unknown query mode `{0}`; expected `subdomains` or `exact`.")]
	UnknownMode(String),
}

/// How much of the target's URL space a lookup covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
	/// The domain and every subdomain beneath it.
	#[default]
	Subdomains,
	/// Only the exact URL or host supplied.
	Exact,
}
impl QueryMode {
	/// Returns the wire label used by the target site.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Subdomains => "subdomains",
			Self::Exact => "exact",
		}
	}
}
impl Display for QueryMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for QueryMode {
	type Err = TargetError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim() {
			v if v.eq_ignore_ascii_case("subdomains") => Ok(Self::Subdomains),
			v if v.eq_ignore_ascii_case("exact") => Ok(Self::Exact),
			other => Err(TargetError::UnknownMode(other.to_owned())),
		}
	}
}

/// Normalized domain/URL plus mode identifying what is being looked up.
///
/// Construction trims whitespace, strips an `http://` or `https://` scheme and trailing
/// slashes, and lowercases the host portion, so `https://Example.com/` and `example.com`
/// share one cache entry.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TargetParts", into = "TargetParts")]
pub struct QueryTarget {
	domain: String,
	mode: QueryMode,
}
impl QueryTarget {
	/// Validates and normalizes a target for the provided mode.
	pub fn new(input: impl AsRef<str>, mode: QueryMode) -> Result<Self, TargetError> {
		Ok(Self { domain: normalize(input.as_ref())?, mode })
	}

	/// Convenience constructor for [`QueryMode::Subdomains`] lookups.
	pub fn subdomains(input: impl AsRef<str>) -> Result<Self, TargetError> {
		Self::new(input, QueryMode::Subdomains)
	}

	/// Returns the normalized domain or URL.
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Returns the lookup mode.
	pub fn mode(&self) -> QueryMode {
		self.mode
	}
}
impl Debug for QueryTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "QueryTarget({}, {})", self.domain, self.mode)
	}
}
impl Display for QueryTarget {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} (mode={})", self.domain, self.mode)
	}
}

#[derive(Serialize, Deserialize)]
struct TargetParts {
	domain: String,
	mode: QueryMode,
}
impl TryFrom<TargetParts> for QueryTarget {
	type Error = TargetError;

	fn try_from(parts: TargetParts) -> Result<Self, Self::Error> {
		Self::new(parts.domain, parts.mode)
	}
}
impl From<QueryTarget> for TargetParts {
	fn from(target: QueryTarget) -> Self {
		Self { domain: target.domain, mode: target.mode }
	}
}

fn normalize(input: &str) -> Result<String, TargetError> {
	let mut view = input.trim();

	for scheme in ["https://", "http://"] {
		if view.get(..scheme.len()).is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme)) {
			view = &view[scheme.len()..];

			break;
		}
	}

	let view = view.trim_end_matches('/');

	if view.is_empty() {
		return Err(TargetError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(TargetError::ContainsWhitespace);
	}
	if view.len() > TARGET_MAX_LEN {
		return Err(TargetError::TooLong { max: TARGET_MAX_LEN });
	}

	let (host, rest) = view.split_at(view.find('/').unwrap_or(view.len()));

	Ok(format!("{}{rest}", host.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn normalization_collapses_equivalent_inputs() {
		let plain = QueryTarget::subdomains("example.com").expect("Plain domain should be valid.");
		let decorated = QueryTarget::subdomains("  HTTPS://Example.COM/ ")
			.expect("Decorated domain should be valid.");

		assert_eq!(plain, decorated);
		assert_eq!(decorated.domain(), "example.com");
	}

	#[test]
	fn path_case_is_preserved() {
		let target = QueryTarget::new("http://Blog.Example.com/Posts/A", QueryMode::Exact)
			.expect("URL target should be valid.");

		assert_eq!(target.domain(), "blog.example.com/Posts/A");
		assert_eq!(target.mode(), QueryMode::Exact);
	}

	#[test]
	fn invalid_targets_are_rejected() {
		assert_eq!(QueryTarget::subdomains("   "), Err(TargetError::Empty));
		assert_eq!(QueryTarget::subdomains("https://"), Err(TargetError::Empty));
		assert_eq!(QueryTarget::subdomains("exa mple.com"), Err(TargetError::ContainsWhitespace));
		assert_eq!(
			QueryTarget::subdomains("a".repeat(TARGET_MAX_LEN + 1)),
			Err(TargetError::TooLong { max: TARGET_MAX_LEN })
		);
	}

	#[test]
	fn modes_differ_in_cache_identity() {
		let sub = QueryTarget::new("example.com", QueryMode::Subdomains)
			.expect("Subdomain target should be valid.");
		let exact =
			QueryTarget::new("example.com", QueryMode::Exact).expect("Exact target should be valid.");

		assert_ne!(sub, exact);
		assert_eq!("EXACT".parse::<QueryMode>(), Ok(QueryMode::Exact));
		assert!("everything".parse::<QueryMode>().is_err());
	}

	#[test]
	fn serde_round_trip_revalidates() {
		let target = QueryTarget::subdomains("example.com").expect("Target should be valid.");
		let json = serde_json::to_string(&target).expect("Target should serialize.");

		assert_eq!(json, r#"{"domain":"example.com","mode":"subdomains"}"#);
		assert!(
			serde_json::from_str::<QueryTarget>(r#"{"domain":" ","mode":"exact"}"#).is_err()
		);
	}
}
