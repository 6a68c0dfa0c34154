//! Outgoing request descriptors and the closed per-request option set.

// self
use crate::_prelude::*;

/// Canonical header names used by the gateway pipeline.
pub mod headers {
	/// Standard Authorization header.
	pub const AUTHORIZATION: &str = "Authorization";
	/// Standard Content-Type header.
	pub const CONTENT_TYPE: &str = "Content-Type";
	/// Anti-CSRF marker attached to every request.
	pub const X_REQUESTED_WITH: &str = "X-Requested-With";
	/// Double-submit CSRF token header.
	pub const X_CSRF_TOKEN: &str = "X-CSRF-Token";
}

/// HTTP methods the gateway issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// GET request.
	Get,
	/// POST request.
	Post,
	/// PUT request.
	Put,
	/// PATCH request.
	Patch,
	/// DELETE request.
	Delete,
}
impl Method {
	/// Returns the wire representation of the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mutable descriptor for one outgoing request.
///
/// The descriptor carries everything the transport needs (method, path, query,
/// headers, JSON body, timeout preference) plus a crate-internal `retried`
/// marker that prevents a request from entering the refresh protocol twice.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	headers: BTreeMap<String, String>,
	body: Option<serde_json::Value>,
	timeout: Option<Duration>,
	transfer: bool,
	retried: bool,
}
impl RequestDescriptor {
	fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			headers: BTreeMap::new(),
			body: None,
			timeout: None,
			transfer: false,
			retried: false,
		}
	}

	/// Creates a GET descriptor for the provided path.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Creates a POST descriptor for the provided path.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Creates a PUT descriptor for the provided path.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::Put, path)
	}

	/// Creates a PATCH descriptor for the provided path.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Creates a DELETE descriptor for the provided path.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a header, replacing any existing value for the same name.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.set_header(name, value);

		self
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Marks the request as a file-transfer operation, selecting the longer
	/// default timeout when no explicit override is present.
	pub fn transfer(mut self) -> Self {
		self.transfer = true;

		self
	}

	/// Returns the HTTP method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Returns the request path (joined onto the configured base URL).
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Returns the accumulated query parameters.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// Returns the current header map.
	pub fn headers(&self) -> &BTreeMap<String, String> {
		&self.headers
	}

	/// Returns the JSON body, if one is attached.
	pub fn body(&self) -> Option<&serde_json::Value> {
		self.body.as_ref()
	}

	/// Returns the explicit timeout override, if any.
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	/// Returns `true` for file-transfer requests.
	pub fn is_transfer(&self) -> bool {
		self.transfer
	}

	/// Looks up a header value case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Sets a header, replacing any value stored under a differently-cased name.
	pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();

		self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
		self.headers.insert(name, value.into());
	}

	/// Sets a header only when no value is present under any casing.
	pub fn set_header_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();

		if self.header(&name).is_none() {
			self.headers.insert(name, value.into());
		}
	}

	/// Returns `true` once the request has been replayed after a refresh.
	pub fn was_retried(&self) -> bool {
		self.retried
	}

	pub(crate) fn mark_retried(&mut self) {
		self.retried = true;
	}
}

/// Closed per-request option set evaluated by the pipeline.
///
/// Every flag defaults to off; the struct travels alongside the descriptor and
/// is never mutated by the gateway.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Skip bearer and CSRF token injection (public endpoints, sign-in calls).
	pub skip_auth: bool,
	/// Suppress the ambient error notification for this request.
	pub skip_error_notify: bool,
	/// Authenticate with HTTP Basic credentials instead of the session tokens.
	pub basic_auth: Option<BasicCredentials>,
}
impl RequestOptions {
	/// Skips bearer and CSRF injection for this request.
	pub fn anonymous(mut self) -> Self {
		self.skip_auth = true;

		self
	}

	/// Suppresses the ambient error notification for this request.
	pub fn silent(mut self) -> Self {
		self.skip_error_notify = true;

		self
	}

	/// Authenticates this request with HTTP Basic credentials.
	pub fn with_basic_auth(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.basic_auth = Some(BasicCredentials { username: username.into(), password: password.into() });

		self
	}
}

/// Username/password pair for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
	/// Basic-auth username.
	pub username: String,
	/// Basic-auth password; redacted from `Debug` output.
	pub password: String,
}
impl Debug for BasicCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicCredentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}
