//! Transport primitives for gateway request execution.
//!
//! The module exposes [`GatewayHttpClient`] alongside [`PreparedRequest`],
//! [`GatewayResponse`], and [`TransportFailure`] so downstream crates can plug
//! custom HTTP stacks into the gateway. A transport either yields a complete
//! [`GatewayResponse`] (any status, including errors) or a
//! [`TransportFailure`] when no response arrived at all; the gateway performs
//! classification and user messaging on top of that split.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	envelope::{self, ApiEnvelope, ErrorBody},
	error::ApiError,
	request::Method,
};

/// Future returned by [`GatewayHttpClient::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<GatewayResponse, TransportFailure>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing gateway requests.
///
/// The trait is the gateway's only dependency on an HTTP stack. Implementations
/// must be `Send + Sync + 'static` so one transport can be shared across
/// gateway clones, and the returned futures must be `Send` so callers can hop
/// executors freely.
pub trait GatewayHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes a fully prepared request.
	///
	/// Implementations return `Err` only when no HTTP response was received
	/// (DNS failure, refused connection, reset, timeout). A response with an
	/// error status is still `Ok`; the gateway owns status handling.
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_>;
}

/// A request after pipeline processing, ready for the wire.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL including query parameters.
	pub url: Url,
	/// Final header map produced by the request stages.
	pub headers: BTreeMap<String, String>,
	/// Serialized JSON body, if any.
	pub body: Option<Vec<u8>>,
	/// Effective timeout for this request.
	pub timeout: Duration,
}

/// Raw transport failure carrying enough material for classification.
///
/// `message` should include the transport error's full cause chain;
/// `code` is the normalized platform error code when one is known.
#[derive(Clone, Debug)]
pub struct TransportFailure {
	/// Human-readable failure description.
	pub message: String,
	/// Normalized platform error code (`ECONNREFUSED`, `ETIMEDOUT`, ...).
	pub code: Option<String>,
}
impl TransportFailure {
	/// Creates a failure from a message and optional platform code.
	pub fn new(message: impl Into<String>, code: Option<impl Into<String>>) -> Self {
		Self { message: message.into(), code: code.map(Into::into) }
	}
}

/// Complete HTTP response as seen by the gateway.
///
/// Header names are lowercased at construction so lookups are
/// case-insensitive regardless of the server's header casing.
#[derive(Clone, Debug)]
pub struct GatewayResponse {
	status: u16,
	headers: HashMap<String, String>,
	body: Vec<u8>,
}
impl GatewayResponse {
	/// Builds a response from raw parts, normalizing header names.
	pub fn new(
		status: u16,
		headers: impl IntoIterator<Item = (String, String)>,
		body: Vec<u8>,
	) -> Self {
		let headers = headers.into_iter().map(|(name, value)| (name.to_ascii_lowercase(), value)).collect();

		Self { status, headers, body }
	}

	/// Returns the HTTP status code.
	pub fn status(&self) -> u16 {
		self.status
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Looks up a header value case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns the raw response body.
	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Decodes the body as an [`ApiEnvelope`] around the provided payload type.
	pub fn envelope<T>(&self) -> Result<ApiEnvelope<T>, ApiError>
	where
		T: for<'de> Deserialize<'de>,
	{
		envelope::decode_envelope(&self.body, Some(self.status))
	}

	/// Leniently decodes the error fields of the body, when it is JSON at all.
	pub(crate) fn error_body(&self) -> Option<ErrorBody> {
		serde_json::from_slice(&self.body).ok()
	}
}

/// Formats an error and its cause chain into one classification-friendly line.
pub(crate) fn describe_error_chain(err: &dyn StdError) -> String {
	let mut message = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}

	message
}

/// Walks an error's cause chain looking for an IO error with a known code.
pub(crate) fn io_code_in_chain(err: &dyn StdError) -> Option<&'static str> {
	let mut source = err.source();

	while let Some(cause) = source {
		if let Some(io) = cause.downcast_ref::<std::io::Error>() {
			return match io.kind() {
				std::io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
				std::io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
				std::io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
				_ => None,
			};
		}

		source = cause.source();
	}

	None
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Deployments that rely on the refresh cookie should supply a client
/// built with `cookie_store(true)` via [`ReqwestHttpClient::with_client`]; the
/// default client keeps no cookie jar.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn build_request(
		&self,
		request: PreparedRequest,
	) -> Result<reqwest::Request, TransportFailure> {
		let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
			.map_err(|e| TransportFailure::new(describe_error_chain(&e), None::<String>))?;
		let mut headers = HeaderMap::new();

		for (name, value) in &request.headers {
			let name = HeaderName::try_from(name.as_str()).map_err(|e| {
				TransportFailure::new(
					format!("invalid request header `{name}`: {e}"),
					None::<String>,
				)
			})?;
			let value = HeaderValue::try_from(value.as_str()).map_err(|e| {
				TransportFailure::new(
					format!("invalid request header value for `{name}`: {e}"),
					None::<String>,
				)
			})?;

			headers.insert(name, value);
		}

		let mut builder =
			self.0.request(method, request.url).headers(headers).timeout(request.timeout);

		if let Some(body) = request.body {
			builder = builder.body(body);
		}

		builder.build().map_err(|e| failure_from_reqwest(&e))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl std::ops::Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl GatewayHttpClient for ReqwestHttpClient {
	fn execute(&self, request: PreparedRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = self.build_request(request)?;
			let response =
				self.0.execute(request).await.map_err(|e| failure_from_reqwest(&e))?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect::<Vec<_>>();
			let body = response.bytes().await.map_err(|e| failure_from_reqwest(&e))?.to_vec();

			Ok(GatewayResponse::new(status, headers, body))
		})
	}
}

#[cfg(feature = "reqwest")]
fn failure_from_reqwest(err: &ReqwestError) -> TransportFailure {
	let code = if err.is_timeout() { Some("ETIMEDOUT") } else { io_code_in_chain(err) };

	TransportFailure::new(describe_error_chain(err), code)
}
