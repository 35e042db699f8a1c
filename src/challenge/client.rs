//! Submit-then-poll loop shared by every challenge provider.

// self
use crate::{
	_prelude::*,
	challenge::{
		ChallengeError, ChallengeProvider, ChallengeTask, PollOutcome, PollPolicy, ProviderConfig,
		ProviderKind, ProviderRequest, Submission, TaskStatus,
	},
	credential::{Secret, VerificationToken},
	http::JsonHttpClient,
	obs,
};

/// Drives a single provider through create-task and bounded polling.
#[derive(Debug)]
pub struct ChallengeClient<C>
where
	C: ?Sized + JsonHttpClient,
{
	http: Arc<C>,
	policy: PollPolicy,
}
impl<C> ChallengeClient<C>
where
	C: ?Sized + JsonHttpClient,
{
	/// Creates a client with the default poll policy.
	pub fn new(http: Arc<C>) -> Self {
		Self { http, policy: PollPolicy::default() }
	}

	/// Overrides the poll policy.
	pub fn with_policy(mut self, policy: PollPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Solves the challenge guarding `site_url` with one provider.
	///
	/// Every failure is reported as a [`ChallengeError`] so the selector can fall back to the
	/// next provider; nothing here is retried.
	pub async fn solve(
		&self,
		config: &ProviderConfig,
		site_url: &Url,
	) -> Result<VerificationToken, ChallengeError> {
		let kind = config.kind;
		let api_key =
			config.usable_key().ok_or(ChallengeError::Unavailable { provider: kind })?;
		let endpoint = config.resolved_endpoint().map_err(|e| rejected(kind, e))?;
		let provider = kind.protocol();
		let mut task = self.submit(provider, &endpoint, api_key, site_url).await?;

		self.poll(provider, &endpoint, api_key, &mut task).await
	}

	async fn submit(
		&self,
		provider: &dyn ChallengeProvider,
		endpoint: &Url,
		api_key: &Secret,
		site_url: &Url,
	) -> Result<ChallengeTask, ChallengeError> {
		let kind = provider.kind();
		let request = provider
			.submit_task(endpoint, api_key.expose(), site_url)
			.map_err(|e| rejected(kind, e))?;
		let body = self.send(kind, &request).await?;

		match provider.read_submission(&body) {
			Submission::Accepted(task_id) => Ok(ChallengeTask::new(kind, site_url.clone(), task_id)),
			Submission::Rejected(reason) =>
				Err(ChallengeError::SolveFailed { provider: kind, reason }),
		}
	}

	async fn poll(
		&self,
		provider: &dyn ChallengeProvider,
		endpoint: &Url,
		api_key: &Secret,
		task: &mut ChallengeTask,
	) -> Result<VerificationToken, ChallengeError> {
		let kind = provider.kind();

		for attempt in 1..=self.policy.max_attempts {
			tokio::time::sleep(self.policy.interval).await;

			task.attempts = attempt;

			let request = provider
				.poll_task(endpoint, api_key.expose(), &task.task_id)
				.map_err(|e| rejected(kind, e))?;
			let body = self.send(kind, &request).await?;

			match provider.read_poll(&body) {
				PollOutcome::Pending => obs::poll_pending(kind.as_str(), attempt),
				PollOutcome::Ready(token) => {
					task.status = TaskStatus::Ready;

					return Ok(token);
				},
				PollOutcome::Failed(reason) => {
					task.status = TaskStatus::Failed;

					return Err(ChallengeError::SolveFailed { provider: kind, reason });
				},
			}
		}

		task.status = TaskStatus::Failed;

		Err(ChallengeError::Timeout { provider: kind, attempts: task.attempts })
	}

	async fn send(
		&self,
		kind: ProviderKind,
		request: &ProviderRequest,
	) -> Result<serde_json::Value, ChallengeError> {
		let response =
			self.http.post_json(&request.url, &request.body, None).await.map_err(|e| rejected(kind, e))?;

		response.decode().map_err(|e| rejected(kind, e))
	}
}
impl<C> Clone for ChallengeClient<C>
where
	C: ?Sized + JsonHttpClient,
{
	fn clone(&self) -> Self {
		Self { http: self.http.clone(), policy: self.policy }
	}
}

fn rejected(provider: ProviderKind, error: Error) -> ChallengeError {
	ChallengeError::SolveFailed { provider, reason: error.to_string() }
}
