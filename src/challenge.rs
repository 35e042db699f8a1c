//! Challenge (Turnstile CAPTCHA) solving through third-party providers.
//!
//! [`ChallengeProvider`] captures what differs between vendors: how to build the
//! create-task and get-task-result requests and how to read their responses. The polling
//! skeleton shared by every vendor lives in [`ChallengeClient`], and [`ProviderSelector`]
//! walks the configured providers in priority order until one returns a token.

pub mod anticaptcha;
pub mod capsolver;
pub mod client;
pub mod selector;

pub use anticaptcha::AntiCaptcha;
pub use capsolver::CapSolver;
pub use client::*;
pub use selector::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	credential::{Secret, VerificationToken},
	error::ConfigError,
};

/// Turnstile site key published by the target site's public tools.
pub const TURNSTILE_SITE_KEY: &str = "0x4AAAAAAAAzi9ITzSN9xKMi";

/// Supported challenge-solving vendors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	/// CapSolver (`api.capsolver.com`).
	CapSolver,
	/// Anti-Captcha (`api.anti-captcha.com`).
	AntiCaptcha,
}
impl ProviderKind {
	/// Returns a stable label suitable for span or log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::CapSolver => "capsolver",
			Self::AntiCaptcha => "anticaptcha",
		}
	}

	/// Environment variable that carries the vendor's API key.
	pub const fn env_var(self) -> &'static str {
		match self {
			Self::CapSolver => "CAPSOLVER_API_KEY",
			Self::AntiCaptcha => "ANTICAPTCHA_API_KEY",
		}
	}

	/// Public API base URL.
	pub const fn default_endpoint(self) -> &'static str {
		match self {
			Self::CapSolver => "https://api.capsolver.com",
			Self::AntiCaptcha => "https://api.anti-captcha.com",
		}
	}

	/// Priority used when configuration does not assign one (lower runs first).
	pub const fn default_priority(self) -> u8 {
		match self {
			Self::CapSolver => 0,
			Self::AntiCaptcha => 1,
		}
	}

	/// Returns the wire protocol implementation for the vendor.
	pub fn protocol(self) -> &'static dyn ChallengeProvider {
		match self {
			Self::CapSolver => &CapSolver,
			Self::AntiCaptcha => &AntiCaptcha,
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable per-provider configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
	/// Vendor this entry configures.
	pub kind: ProviderKind,
	/// API key; `None` or blank makes the provider unavailable.
	pub api_key: Option<Secret>,
	/// Priority rank (lower is attempted first).
	pub priority: u8,
	/// API base URL override; the vendor default is used when unset.
	pub endpoint: Option<Url>,
}
impl ProviderConfig {
	/// Creates a configuration using the vendor's default priority and endpoint.
	pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
		Self {
			kind,
			api_key: Some(Secret::new(api_key)),
			priority: kind.default_priority(),
			endpoint: None,
		}
	}

	/// Overrides the priority rank.
	pub fn with_priority(mut self, priority: u8) -> Self {
		self.priority = priority;

		self
	}

	/// Overrides the API base URL (proxies, tests).
	pub fn with_endpoint(mut self, endpoint: Url) -> Self {
		self.endpoint = Some(endpoint);

		self
	}

	/// Returns the API key when it is present and not blank.
	pub fn usable_key(&self) -> Option<&Secret> {
		self.api_key.as_ref().filter(|key| !key.is_blank())
	}

	/// Resolves the API base URL.
	pub fn resolved_endpoint(&self) -> Result<Url> {
		match &self.endpoint {
			Some(url) => Ok(url.clone()),
			None => Url::parse(self.kind.default_endpoint()).map_err(|source| {
				ConfigError::InvalidEndpoint {
					endpoint: self.kind.default_endpoint().to_owned(),
					source,
				}
				.into()
			}),
		}
	}
}

/// Bounded polling schedule for challenge tasks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
	/// Wait before each poll.
	pub interval: StdDuration,
	/// Maximum number of polls before giving up.
	pub max_attempts: u32,
}
impl PollPolicy {
	/// Default wait between polls.
	pub const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(1);
	/// Default poll budget (two minutes at the default interval).
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

	/// Creates a policy with the provided interval and attempt budget.
	pub const fn new(interval: StdDuration, max_attempts: u32) -> Self {
		Self { interval, max_attempts }
	}

	/// Upper bound on time spent waiting across all polls.
	pub fn ceiling(&self) -> StdDuration {
		self.interval.saturating_mul(self.max_attempts)
	}
}
impl Default for PollPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
	}
}

/// Provider-assigned task identifier kept in its wire form.
///
/// CapSolver issues string ids while Anti-Captcha issues integers; polls echo the value back
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskId(serde_json::Value);
impl TaskId {
	/// Extracts a task id from a JSON value, accepting non-empty strings and numbers.
	pub fn from_json(value: &serde_json::Value) -> Option<Self> {
		match value {
			serde_json::Value::String(s) if !s.trim().is_empty() => Some(Self(value.clone())),
			serde_json::Value::Number(_) => Some(Self(value.clone())),
			_ => None,
		}
	}

	/// Returns the wire value to send back to the provider.
	pub fn as_json(&self) -> &serde_json::Value {
		&self.0
	}
}
impl Display for TaskId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.0 {
			serde_json::Value::String(s) => f.write_str(s),
			other => write!(f, "{other}"),
		}
	}
}

/// Lifecycle of a submitted challenge task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
	/// Submitted; the provider has not finished.
	Pending,
	/// The provider produced a token.
	Ready,
	/// The provider gave up or reported an error.
	Failed,
}

/// A challenge submitted to a provider, mutated only by polling.
#[derive(Clone, Debug)]
pub struct ChallengeTask {
	/// Vendor the task was submitted to.
	pub provider: ProviderKind,
	/// Page the challenge guards.
	pub site_url: Url,
	/// Provider-assigned id.
	pub task_id: TaskId,
	/// Latest known status.
	pub status: TaskStatus,
	/// Number of polls performed so far.
	pub attempts: u32,
}
impl ChallengeTask {
	/// Creates a pending task.
	pub fn new(provider: ProviderKind, site_url: Url, task_id: TaskId) -> Self {
		Self { provider, site_url, task_id, status: TaskStatus::Pending, attempts: 0 }
	}
}

/// Request a provider wants sent (always a JSON `POST`).
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
	/// Absolute endpoint URL.
	pub url: Url,
	/// JSON body.
	pub body: serde_json::Value,
}

/// Provider verdict on a create-task response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
	/// The task was accepted under the given id.
	Accepted(TaskId),
	/// The provider refused the task.
	Rejected(String),
}

/// Provider verdict on a get-task-result response.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
	/// Keep polling.
	Pending,
	/// The challenge was solved.
	Ready(VerificationToken),
	/// The provider failed the task or reported an error.
	Failed(String),
}

/// Vendor-specific half of the challenge protocol: the submit-task and poll-task
/// capabilities.
pub trait ChallengeProvider
where
	Self: Send + Sync + Debug,
{
	/// Vendor identity.
	fn kind(&self) -> ProviderKind;

	/// Builds the create-task request.
	fn submit_task(&self, endpoint: &Url, api_key: &str, site_url: &Url) -> Result<ProviderRequest>;

	/// Interprets the create-task response.
	fn read_submission(&self, body: &serde_json::Value) -> Submission;

	/// Builds the get-task-result request.
	fn poll_task(&self, endpoint: &Url, api_key: &str, task_id: &TaskId) -> Result<ProviderRequest>;

	/// Interprets the get-task-result response.
	fn read_poll(&self, body: &serde_json::Value) -> PollOutcome;
}

/// Per-provider failure; recoverable by falling back to the next provider.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ChallengeError {
	/// The provider has no usable API key.
	#[error("{provider} is not configured with an API key.")]
	Unavailable {
		/// Vendor that was skipped.
		provider: ProviderKind,
	},
	/// The provider rejected the task, failed it, or spoke an unexpected protocol.
	#[error("{provider} failed to solve the challenge: {reason}.")]
	SolveFailed {
		/// Vendor that failed.
		provider: ProviderKind,
		/// Provider- or transport-supplied reason.
		reason: String,
	},
	/// The provider never reported `ready` or `failed` within the poll budget.
	#[error("{provider} did not solve the challenge within {attempts} polls.")]
	Timeout {
		/// Vendor that timed out.
		provider: ProviderKind,
		/// Polls performed.
		attempts: u32,
	},
}
impl ChallengeError {
	/// Vendor the failure belongs to.
	pub fn provider(&self) -> ProviderKind {
		match self {
			Self::Unavailable { provider }
			| Self::SolveFailed { provider, .. }
			| Self::Timeout { provider, .. } => *provider,
		}
	}

	/// Provider-agnostic failure class.
	pub fn kind(&self) -> ChallengeFailureKind {
		match self {
			Self::Unavailable { .. } => ChallengeFailureKind::Unavailable,
			Self::SolveFailed { .. } => ChallengeFailureKind::Rejected,
			Self::Timeout { .. } => ChallengeFailureKind::TimedOut,
		}
	}
}

/// Failure classes surfaced to callers without provider details.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChallengeFailureKind {
	/// No key configured.
	Unavailable,
	/// Explicit failure or protocol error.
	Rejected,
	/// Poll budget exhausted.
	TimedOut,
}
impl ChallengeFailureKind {
	/// Returns a stable human-readable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unavailable => "unavailable",
			Self::Rejected => "rejected",
			Self::TimedOut => "timed out",
		}
	}
}

/// Returns the provider's error description when `errorId` is set to a non-zero value.
pub(crate) fn reported_error(body: &serde_json::Value) -> Option<String> {
	let flagged = match body.get("errorId")? {
		serde_json::Value::Number(n) => n.as_f64().is_some_and(|id| id != 0.0),
		serde_json::Value::Bool(flag) => *flag,
		serde_json::Value::String(s) => !s.is_empty() && s != "0",
		_ => false,
	};

	if !flagged {
		return None;
	}

	let text = |key: &str| body.get(key).and_then(serde_json::Value::as_str).map(str::to_owned);

	Some(text("errorDescription").or_else(|| text("errorCode")).unwrap_or_else(|| {
		let id = body.get("errorId").map(ToString::to_string).unwrap_or_default();

		format!("provider returned errorId {id}")
	}))
}

/// Reads `solution.token` from a ready response.
pub(crate) fn solution_token(body: &serde_json::Value) -> PollOutcome {
	match body
		.get("solution")
		.and_then(|solution| solution.get("token"))
		.and_then(serde_json::Value::as_str)
		.filter(|token| !token.is_empty())
	{
		Some(token) => PollOutcome::Ready(VerificationToken::new(token)),
		None => PollOutcome::Failed("task reported ready without a token".into()),
	}
}
