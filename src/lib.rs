//! SEO research tools in front of a challenge-gated analytics site: CAPTCHA provider fallback,
//! cached short-lived signatures, and AI-assisted query generation in one async crate.
//!
//! The moving parts, bottom-up:
//!
//! - [`challenge`] solves Turnstile challenges through CapSolver or Anti-Captcha, polling with a
//!   bounded budget and falling back across providers in priority order.
//! - [`store`] caches site-issued [`credential::Signature`]s per query target, in memory or in a
//!   JSON snapshot.
//! - [`acquire`] returns a valid signature from the cache or solves and exchanges a fresh one,
//!   one in-flight acquisition per target.
//! - [`tools`] and [`ai`] expose the five operations on top of those pieces.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod acquire;
pub mod ai;
pub mod challenge;
pub mod config;
pub mod credential;
pub mod error;
pub mod http;
pub mod obs;
pub mod store;
pub mod tools;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::time::Duration as StdDuration;
	// self
	use crate::{
		challenge::{PollPolicy, ProviderConfig, ProviderKind},
		http::ReqwestHttpClient,
	};

	/// Builds the reqwest transport used against `httpmock` servers.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::default().with_timeout(StdDuration::from_secs(5))
	}

	/// Poll policy with a short interval so timeouts resolve quickly in tests.
	pub fn fast_poll_policy(max_attempts: u32) -> PollPolicy {
		PollPolicy::new(StdDuration::from_millis(5), max_attempts)
	}

	/// Provider configuration pointing at a mock server base URL.
	pub fn provider_at(kind: ProviderKind, api_key: &str, base: &str) -> ProviderConfig {
		let endpoint = Url::parse(base).expect("Mock provider base URL should parse.");

		ProviderConfig::new(kind, api_key).with_endpoint(endpoint)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
