//! Anti-Captcha wire protocol (`TurnstileTaskProxyless`).
//!
//! Anti-Captcha reports failures through `errorId` on every response, including polls that
//! would otherwise look pending, so the error check runs before status inspection.

// self
use crate::{
	_prelude::*,
	challenge::{
		ChallengeProvider, PollOutcome, ProviderKind, ProviderRequest, Submission,
		TURNSTILE_SITE_KEY, TaskId, reported_error, solution_token,
	},
	http,
};

/// Anti-Captcha adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct AntiCaptcha;
impl ChallengeProvider for AntiCaptcha {
	fn kind(&self) -> ProviderKind {
		ProviderKind::AntiCaptcha
	}

	fn submit_task(&self, endpoint: &Url, api_key: &str, site_url: &Url) -> Result<ProviderRequest> {
		Ok(ProviderRequest {
			url: http::endpoint(endpoint, "createTask")?,
			body: serde_json::json!({
				"clientKey": api_key,
				"task": {
					"type": "TurnstileTaskProxyless",
					"websiteURL": site_url.as_str(),
					"websiteKey": TURNSTILE_SITE_KEY,
				},
			}),
		})
	}

	fn read_submission(&self, body: &serde_json::Value) -> Submission {
		if let Some(reason) = reported_error(body) {
			return Submission::Rejected(reason);
		}

		match body.get("taskId").and_then(TaskId::from_json) {
			Some(id) => Submission::Accepted(id),
			None => Submission::Rejected("no task id returned".into()),
		}
	}

	fn poll_task(&self, endpoint: &Url, api_key: &str, task_id: &TaskId) -> Result<ProviderRequest> {
		Ok(ProviderRequest {
			url: http::endpoint(endpoint, "getTaskResult")?,
			body: serde_json::json!({ "clientKey": api_key, "taskId": task_id.as_json() }),
		})
	}

	fn read_poll(&self, body: &serde_json::Value) -> PollOutcome {
		if let Some(reason) = reported_error(body) {
			return PollOutcome::Failed(reason);
		}

		match body.get("status").and_then(serde_json::Value::as_str) {
			Some("ready") => solution_token(body),
			Some("failed") => PollOutcome::Failed("task status failed".into()),
			_ => PollOutcome::Pending,
		}
	}
}
