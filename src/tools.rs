//! Tool orchestrators: build the guarded page URL, obtain a credential, and hand off to the
//! data source.
//!
//! Backlinks reuse cached signatures through [`SignatureAcquirer`]. Keyword ideas, keyword
//! difficulty, and traffic consume a fresh verification token per call because the site binds
//! those tokens to the page they were solved on. AI query generation skips challenges
//! entirely.

// self
#[cfg(feature = "reqwest")]
use crate::store::{FileStore, MemoryStore};
use crate::{
	_prelude::*,
	acquire::{CachedSignatureRequest, HttpSignatureExchange, SignatureAcquirer, SignatureExchange},
	ai::{QueryGenerator, SearchQueryReport, SearchQueryRequest},
	challenge::{ChallengeClient, ChallengeSolver, ProviderSelector},
	config::SeoConfig,
	credential::{QueryMode, QueryTarget, Signature, VerificationToken},
	error::ConfigError,
	http::JsonHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::SignatureStore,
};

/// Origin of the challenge-gated tool pages.
pub const SITE_ORIGIN: &str = "https://ahrefs.com";

/// Boxed future returned by [`SeoDataSource`] calls.
pub type DataFuture<'a> = Pin<Box<dyn Future<Output = Result<serde_json::Value>> + 'a + Send>>;

/// Fetches domain data once a credential is in hand.
pub trait SeoDataSource
where
	Self: Send + Sync,
{
	/// Lists backlinks for the signature's target.
	fn backlinks<'a>(&'a self, signature: &'a Signature) -> DataFuture<'a>;

	/// Lists keyword ideas.
	fn keyword_ideas<'a>(&'a self, token: VerificationToken, query: &'a KeywordQuery)
	-> DataFuture<'a>;

	/// Scores keyword difficulty.
	fn keyword_difficulty<'a>(
		&'a self,
		token: VerificationToken,
		query: &'a KeywordQuery,
	) -> DataFuture<'a>;

	/// Estimates search traffic.
	fn traffic<'a>(&'a self, token: VerificationToken, query: &'a TrafficQuery) -> DataFuture<'a>;
}

/// Keyword lookup parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordQuery {
	/// Keyword text.
	pub keyword: String,
	/// Two-letter country code.
	pub country: String,
	/// Search engine label.
	pub search_engine: String,
}
impl KeywordQuery {
	/// Creates a query for the US Google index.
	pub fn new(keyword: impl Into<String>) -> Self {
		Self { keyword: keyword.into(), country: "us".into(), search_engine: "Google".into() }
	}

	/// Overrides the country.
	pub fn with_country(mut self, country: impl Into<String>) -> Self {
		self.country = country.into();

		self
	}

	/// Overrides the search engine.
	pub fn with_search_engine(mut self, search_engine: impl Into<String>) -> Self {
		self.search_engine = search_engine.into();

		self
	}
}

/// Traffic lookup parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficQuery {
	/// Domain or URL plus mode.
	pub target: QueryTarget,
	/// Country filter; `"None"` means worldwide.
	pub country: String,
}
impl TrafficQuery {
	/// Creates a worldwide query.
	pub fn new(target: QueryTarget) -> Self {
		Self { target, country: "None".into() }
	}

	/// Parses `domain_or_url` and `mode` into a worldwide query.
	pub fn parse(domain_or_url: &str, mode: &str) -> Result<Self> {
		let mode = mode.parse::<QueryMode>().map_err(ConfigError::from)?;
		let target = QueryTarget::new(domain_or_url, mode).map_err(ConfigError::from)?;

		Ok(Self::new(target))
	}

	/// Overrides the country.
	pub fn with_country(mut self, country: impl Into<String>) -> Self {
		self.country = country.into();

		self
	}
}

/// Backlink checker page for `target`.
pub fn backlink_checker_url(target: &QueryTarget) -> Result<Url> {
	site_url("backlink-checker/", &[("input", target.domain()), ("mode", target.mode().as_str())])
}

/// Keyword generator page for `query`.
pub fn keyword_generator_url(query: &KeywordQuery) -> Result<Url> {
	site_url("keyword-generator/", &[
		("country", query.country.as_str()),
		("input", query.keyword.as_str()),
	])
}

/// Keyword difficulty page for `query`.
pub fn keyword_difficulty_url(query: &KeywordQuery) -> Result<Url> {
	site_url("keyword-difficulty/", &[
		("country", query.country.as_str()),
		("input", query.keyword.as_str()),
	])
}

/// Traffic checker page for `query`.
pub fn traffic_checker_url(query: &TrafficQuery) -> Result<Url> {
	site_url("traffic-checker/", &[
		("input", query.target.domain()),
		("mode", query.target.mode().as_str()),
	])
}

fn site_url(path: &str, params: &[(&str, &str)]) -> Result<Url> {
	let raw = format!("{SITE_ORIGIN}/{path}");

	Url::parse_with_params(&raw, params)
		.map_err(|source| ConfigError::InvalidEndpoint { endpoint: raw, source }.into())
}

/// Entry point for the five SEO operations.
pub struct SeoTools {
	acquirer: SignatureAcquirer,
	data: Arc<dyn SeoDataSource>,
	queries: QueryGenerator<dyn JsonHttpClient>,
}
impl SeoTools {
	/// Wires the tools from configuration over the reqwest transport.
	///
	/// Assembly succeeds without challenge provider keys. The challenge tools then fail with
	/// [`Error::NoProviderConfigured`] before any request while AI generation keeps working.
	#[cfg(feature = "reqwest")]
	pub fn from_config(config: &SeoConfig, data: Arc<dyn SeoDataSource>) -> Result<Self> {
		let http: Arc<dyn JsonHttpClient> = Arc::new(config.http.build_client()?);
		let store: Arc<dyn SignatureStore> = match &config.cache_path {
			Some(path) => Arc::new(FileStore::open(path)?),
			None => Arc::new(MemoryStore::default()),
		};

		Self::with_http(config, http, store, data)
	}

	/// Wires the tools from configuration over a caller-supplied transport and cache.
	pub fn with_http(
		config: &SeoConfig,
		http: Arc<dyn JsonHttpClient>,
		store: Arc<dyn SignatureStore>,
		data: Arc<dyn SeoDataSource>,
	) -> Result<Self> {
		let client = ChallengeClient::new(http.clone()).with_policy(config.poll);
		let selector = ProviderSelector::new(client, config.providers.iter().cloned());

		if !selector.has_usable_provider() {
			obs::challenge_unconfigured();
		}

		let solver: Arc<dyn ChallengeSolver> = Arc::new(selector);
		let exchange: Arc<dyn SignatureExchange> = match &config.exchange_endpoint {
			Some(endpoint) =>
				Arc::new(HttpSignatureExchange::with_endpoint(http.clone(), endpoint.clone())),
			None => Arc::new(HttpSignatureExchange::new(http.clone())?),
		};
		let mut queries = QueryGenerator::new(http, config.openrouter_api_key.clone())?;

		if let Some(base) = &config.openrouter_base {
			queries = queries.with_base(base.clone());
		}

		Ok(Self::with_parts(SignatureAcquirer::new(store, solver, exchange), data, queries))
	}

	/// Assembles the tools from pre-built parts.
	pub fn with_parts(
		acquirer: SignatureAcquirer,
		data: Arc<dyn SeoDataSource>,
		queries: QueryGenerator<dyn JsonHttpClient>,
	) -> Self {
		Self { acquirer, data, queries }
	}

	/// Returns the signature acquirer (cache, solver, counters).
	pub fn acquirer(&self) -> &SignatureAcquirer {
		&self.acquirer
	}

	/// Returns `true` when challenge-gated tools can solve fresh challenges.
	pub fn challenge_ready(&self) -> bool {
		self.acquirer.solver.is_configured()
	}

	/// Backlinks plus the overview captured with the signature.
	///
	/// A cached signature is served without a challenge provider; a miss then fails with
	/// [`Error::NoProviderConfigured`].
	pub async fn backlinks(&self, domain: &str) -> Result<serde_json::Value> {
		observe("backlinks", async {
			let target = QueryTarget::subdomains(domain).map_err(ConfigError::from)?;
			let signature = self.acquirer.acquire(CachedSignatureRequest::new(target)).await?;
			let backlinks = self.data.backlinks(&signature).await?;

			Ok(serde_json::json!({ "overview": signature.overview, "backlinks": backlinks }))
		})
		.await
	}

	/// Keyword ideas for `query.keyword`.
	pub async fn keyword_ideas(&self, query: &KeywordQuery) -> Result<serde_json::Value> {
		observe("keyword_ideas", async {
			let token = self.fresh_token(&keyword_generator_url(query)?).await?;

			self.data.keyword_ideas(token, query).await
		})
		.await
	}

	/// Difficulty score for `query.keyword`.
	pub async fn keyword_difficulty(&self, query: &KeywordQuery) -> Result<serde_json::Value> {
		observe("keyword_difficulty", async {
			let token = self.fresh_token(&keyword_difficulty_url(query)?).await?;

			self.data.keyword_difficulty(token, query).await
		})
		.await
	}

	/// Traffic estimate for `query.target`.
	pub async fn traffic(&self, query: &TrafficQuery) -> Result<serde_json::Value> {
		observe("traffic", async {
			let token = self.fresh_token(&traffic_checker_url(query)?).await?;

			self.data.traffic(token, query).await
		})
		.await
	}

	/// Language-model search queries; degrades to an `error` field on unusable output.
	pub async fn ai_search_queries(&self, request: &SearchQueryRequest) -> Result<SearchQueryReport> {
		self.queries.generate(request).await
	}

	async fn fresh_token(&self, site_url: &Url) -> Result<VerificationToken> {
		if !self.challenge_ready() {
			return Err(Error::NoProviderConfigured);
		}

		self.acquirer.solver.verification_token(site_url).await
	}
}

impl Debug for SeoTools {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SeoTools")
			.field("acquirer", &self.acquirer)
			.field("challenge_ready", &self.challenge_ready())
			.field("ai_configured", &self.queries.is_configured())
			.finish_non_exhaustive()
	}
}

async fn observe<T, F>(stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	const KIND: FlowKind = FlowKind::Tool;

	let span = FlowSpan::new(KIND, stage);

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	obs::record_result(KIND, &result);

	result
}
