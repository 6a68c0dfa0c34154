//! Gateway configuration: base URL, timeouts, and session endpoint paths.

// self
use crate::{_prelude::*, error::ConfigError};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default timeout for file-transfer requests.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Paths of the session endpoints the gateway treats specially.
///
/// A request whose path contains the refresh path never triggers a second
/// refresh on 401, and a request whose path contains the login path never
/// produces ambient error notifications (the sign-in form renders those
/// inline).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEndpoints {
	/// Sign-in endpoint path.
	pub login: String,
	/// Token-refresh endpoint path.
	pub refresh: String,
}
impl Default for SessionEndpoints {
	fn default() -> Self {
		Self { login: "/auth/login".into(), refresh: "/auth/refresh".into() }
	}
}

/// Validated gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Base URL every request path is joined onto (scheme, host, API prefix).
	pub base_url: Url,
	/// Default per-request timeout.
	pub timeout: Duration,
	/// Timeout applied to file-transfer requests.
	pub transfer_timeout: Duration,
	/// Session endpoint paths.
	pub endpoints: SessionEndpoints,
}
impl GatewayConfig {
	/// Creates a configuration for the provided base URL with default
	/// timeouts and endpoint paths.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
		let base_url = Url::parse(base_url.as_ref())
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

		Ok(Self {
			base_url,
			timeout: DEFAULT_TIMEOUT,
			transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
			endpoints: SessionEndpoints::default(),
		})
	}

	/// Overrides the default per-request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the file-transfer timeout.
	pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
		self.transfer_timeout = timeout;

		self
	}

	/// Overrides the session endpoint paths.
	pub fn with_endpoints(mut self, endpoints: SessionEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Joins a request path and query parameters onto the base URL.
	///
	/// Joining is plain concatenation (the base URL's path prefix is kept),
	/// not RFC 3986 resolution, so a base of `https://host/api/v1` and a path
	/// of `/items` yield `https://host/api/v1/items`.
	pub fn request_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, ConfigError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let joined = if path.starts_with('/') {
			format!("{base}{path}")
		} else {
			format!("{base}/{path}")
		};
		let mut url = Url::parse(&joined)
			.map_err(|source| ConfigError::InvalidRequestUrl { path: path.to_owned(), source })?;

		if !query.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in query {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}
}
