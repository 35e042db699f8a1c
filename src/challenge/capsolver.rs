//! CapSolver wire protocol (`AntiTurnstileTaskProxyLess`).

// self
use crate::{
	_prelude::*,
	challenge::{
		ChallengeProvider, PollOutcome, ProviderKind, ProviderRequest, Submission,
		TURNSTILE_SITE_KEY, TaskId, reported_error, solution_token,
	},
	http,
};

/// CapSolver adapter.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapSolver;
impl ChallengeProvider for CapSolver {
	fn kind(&self) -> ProviderKind {
		ProviderKind::CapSolver
	}

	fn submit_task(&self, endpoint: &Url, api_key: &str, site_url: &Url) -> Result<ProviderRequest> {
		Ok(ProviderRequest {
			url: http::endpoint(endpoint, "createTask")?,
			body: serde_json::json!({
				"clientKey": api_key,
				"task": {
					"type": "AntiTurnstileTaskProxyLess",
					"websiteURL": site_url.as_str(),
					"websiteKey": TURNSTILE_SITE_KEY,
					"metadata": { "action": "" },
				},
			}),
		})
	}

	fn read_submission(&self, body: &serde_json::Value) -> Submission {
		if let Some(id) = body.get("taskId").and_then(TaskId::from_json) {
			return Submission::Accepted(id);
		}

		Submission::Rejected(reported_error(body).unwrap_or_else(|| "no task id returned".into()))
	}

	fn poll_task(&self, endpoint: &Url, api_key: &str, task_id: &TaskId) -> Result<ProviderRequest> {
		Ok(ProviderRequest {
			url: http::endpoint(endpoint, "getTaskResult")?,
			body: serde_json::json!({ "clientKey": api_key, "taskId": task_id.as_json() }),
		})
	}

	fn read_poll(&self, body: &serde_json::Value) -> PollOutcome {
		match body.get("status").and_then(serde_json::Value::as_str) {
			Some("ready") => solution_token(body),
			Some("failed") => PollOutcome::Failed(
				reported_error(body).unwrap_or_else(|| "task status failed".into()),
			),
			_ => match reported_error(body) {
				Some(reason) => PollOutcome::Failed(reason),
				None => PollOutcome::Pending,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn submit_task_targets_turnstile_proxyless() {
		let endpoint = Url::parse("https://api.capsolver.com").expect("Endpoint should parse.");
		let site = Url::parse("https://ahrefs.com/backlink-checker/?input=example.com&mode=subdomains")
			.expect("Site URL should parse.");
		let request =
			CapSolver.submit_task(&endpoint, "key-1", &site).expect("Request should build.");

		assert_eq!(request.url.as_str(), "https://api.capsolver.com/createTask");
		assert_eq!(request.body["clientKey"], "key-1");
		assert_eq!(request.body["task"]["type"], "AntiTurnstileTaskProxyLess");
		assert_eq!(request.body["task"]["websiteKey"], TURNSTILE_SITE_KEY);
		assert_eq!(request.body["task"]["websiteURL"], site.as_str());
		assert_eq!(request.body["task"]["metadata"]["action"], "");
	}

	#[test]
	fn read_poll_maps_statuses() {
		assert_eq!(
			CapSolver.read_poll(&serde_json::json!({ "errorId": 0, "status": "processing" })),
			PollOutcome::Pending
		);
		assert_eq!(
			CapSolver.read_poll(&serde_json::json!({
				"errorId": 0,
				"status": "ready",
				"solution": { "token": "tok" },
			})),
			PollOutcome::Ready(crate::credential::VerificationToken::new("tok"))
		);
		assert!(matches!(
			CapSolver.read_poll(&serde_json::json!({ "status": "failed" })),
			PollOutcome::Failed(_)
		));
		assert!(matches!(
			CapSolver.read_poll(&serde_json::json!({
				"errorId": 1,
				"errorDescription": "ERROR_CAPTCHA_UNSOLVABLE",
			})),
			PollOutcome::Failed(reason) if reason == "ERROR_CAPTCHA_UNSOLVABLE"
		));
	}

	#[test]
	fn read_submission_requires_task_id() {
		assert_eq!(
			CapSolver.read_submission(&serde_json::json!({ "errorId": 0, "taskId": "abc" })),
			Submission::Accepted(
				TaskId::from_json(&serde_json::json!("abc")).expect("Task id should parse.")
			)
		);
		assert_eq!(
			CapSolver.read_submission(&serde_json::json!({ "errorId": 0 })),
			Submission::Rejected("no task id returned".into())
		);
	}
}
