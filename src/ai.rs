//! Language-model search query generation over an OpenRouter-compatible chat API.
//!
//! Unlike the challenge-gated tools this path needs only an API key. A completion whose
//! content is empty or not the expected JSON degrades into an empty report carrying an
//! `error` string; failures of the HTTP call itself still surface as errors.

// self
use crate::{
	_prelude::*,
	credential::Secret,
	error::ConfigError,
	http::{self, JsonHttpClient},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Default OpenRouter API base.
pub const DEFAULT_OPENROUTER_BASE: &str = "https://openrouter.ai/api/v1";
/// Model used when the caller does not pick one.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

const SYSTEM_MESSAGE: &str = "You are an SEO expert. Return only valid JSON.";
const SEARCH_QUERY_PROMPT: &str = r#"You are an expert SEO researcher. Given the keyword "{keyword}", generate exactly {count} Google search queries that would help thoroughly research this topic.

For each query, categorize the search intent as one of:
- informational: seeking knowledge (what, how, why, guide, tutorial)
- commercial: researching before purchase (best, top, reviews, comparison, vs)
- transactional: ready to take action (buy, price, discount, near me, order)
- navigational: looking for specific site/brand

Return a JSON object with a "queries" array containing objects with "query" and "intent" fields.
Language: {language}

Example output:
{"queries": [
  {"query": "what is coworking space", "intent": "informational"},
  {"query": "best coworking spaces in city", "intent": "commercial"}
]}

Generate diverse queries covering different angles and intents."#;

/// Parameters for one generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryRequest {
	/// Keyword or topic to research.
	pub keyword: String,
	/// Number of queries requested.
	pub count: u32,
	/// Model identifier routed by the API.
	pub model: String,
	/// Language the queries should be written in.
	pub language: String,
}
impl SearchQueryRequest {
	/// Creates a request with ten queries, the default model, and English output.
	pub fn new(keyword: impl Into<String>) -> Self {
		Self {
			keyword: keyword.into(),
			count: 10,
			model: DEFAULT_MODEL.into(),
			language: "en".into(),
		}
	}

	/// Overrides the query count.
	pub fn with_count(mut self, count: u32) -> Self {
		self.count = count;

		self
	}

	/// Overrides the model.
	pub fn with_model(mut self, model: impl Into<String>) -> Self {
		self.model = model.into();

		self
	}

	/// Overrides the output language.
	pub fn with_language(mut self, language: impl Into<String>) -> Self {
		self.language = language.into();

		self
	}

	/// Renders the user prompt.
	pub fn prompt(&self) -> String {
		SEARCH_QUERY_PROMPT
			.replace("{keyword}", &self.keyword)
			.replace("{count}", &self.count.to_string())
			.replace("{language}", &self.language)
	}
}

/// One generated query with its search intent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
	/// Query text.
	pub query: String,
	/// Intent label (`informational`, `commercial`, `transactional`, `navigational`).
	#[serde(default)]
	pub intent: String,
}

/// Tool result; `error` is present only when the completion could not be used.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryReport {
	/// Keyword from the request.
	pub keyword: String,
	/// Generated queries; empty on degradation.
	pub queries: Vec<SearchQuery>,
	/// Model from the request.
	pub model_used: String,
	/// `queries.len()`.
	pub total_queries: usize,
	/// Why the completion could not be used.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Non-fatal problems with the model's output.
#[derive(Debug, ThisError)]
pub enum UpstreamParseError {
	/// No choices or empty content.
	#[error("Empty response from model")]
	EmptyResponse,
	/// Content was not JSON.
	#[error("JSON parsing error: {0}")]
	Json(#[source] serde_json::Error),
	/// Content was JSON but not the expected shape.
	#[error("Unexpected error parsing response: {0}")]
	Shape(String),
}

/// Calls the chat completions endpoint and shapes the answer into a [`SearchQueryReport`].
#[derive(Debug)]
pub struct QueryGenerator<C>
where
	C: ?Sized + JsonHttpClient,
{
	http: Arc<C>,
	api_key: Option<Secret>,
	base: Url,
}
impl<C> QueryGenerator<C>
where
	C: ?Sized + JsonHttpClient,
{
	/// Creates a generator against [`DEFAULT_OPENROUTER_BASE`].
	pub fn new(http: Arc<C>, api_key: Option<Secret>) -> Result<Self> {
		let base = Url::parse(DEFAULT_OPENROUTER_BASE).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: DEFAULT_OPENROUTER_BASE.into(), source }
		})?;

		Ok(Self { http, api_key, base })
	}

	/// Overrides the API base (self-hosted gateways, tests).
	pub fn with_base(mut self, base: Url) -> Self {
		self.base = base;

		self
	}

	/// Returns `true` when an API key is configured.
	pub fn is_configured(&self) -> bool {
		self.api_key.as_ref().is_some_and(|key| !key.is_blank())
	}

	/// Generates search queries for `request.keyword`.
	///
	/// Fails with [`Error::ProviderNotConfigured`] before any network call when no key is set.
	pub async fn generate(&self, request: &SearchQueryRequest) -> Result<SearchQueryReport> {
		const KIND: FlowKind = FlowKind::Tool;

		let api_key = self.api_key.as_ref().filter(|key| !key.is_blank()).ok_or(
			Error::ProviderNotConfigured { provider: "OpenRouter", env_var: "OPENROUTER_API_KEY" },
		)?;
		let span = FlowSpan::new(KIND, "ai_search_queries");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let url = http::endpoint(&self.base, "chat/completions")?;
				let body = serde_json::json!({
					"model": request.model,
					"messages": [
						{ "role": "system", "content": SYSTEM_MESSAGE },
						{ "role": "user", "content": request.prompt() },
					],
					"response_format": { "type": "json_object" },
				});
				let completion: ChatCompletion = self
					.http
					.post_json(&url, &body, Some(api_key.expose()))
					.await?
					.ensure_success("chat completions")?
					.decode()?;
				let content = completion
					.choices
					.into_iter()
					.next()
					.and_then(|choice| choice.message.content);

				Ok(match parse_queries(content.as_deref()) {
					Ok(queries) => SearchQueryReport {
						keyword: request.keyword.clone(),
						total_queries: queries.len(),
						queries,
						model_used: request.model.clone(),
						error: None,
					},
					Err(e) => {
						obs::upstream_degraded("openrouter", &e);

						SearchQueryReport {
							keyword: request.keyword.clone(),
							queries: Vec::new(),
							model_used: request.model.clone(),
							total_queries: 0,
							error: Some(e.to_string()),
						}
					},
				})
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
	#[serde(default)]
	choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
	#[serde(default)]
	content: Option<String>,
}

fn parse_queries(content: Option<&str>) -> Result<Vec<SearchQuery>, UpstreamParseError> {
	let content =
		content.filter(|text| !text.trim().is_empty()).ok_or(UpstreamParseError::EmptyResponse)?;
	let value: serde_json::Value =
		serde_json::from_str(content).map_err(UpstreamParseError::Json)?;
	let Some(object) = value.as_object() else {
		return Err(UpstreamParseError::Shape("expected a JSON object".into()));
	};

	match object.get("queries") {
		None | Some(serde_json::Value::Null) => Ok(Vec::new()),
		Some(queries) => serde_json::from_value(queries.clone())
			.map_err(|e| UpstreamParseError::Shape(e.to_string())),
	}
}
