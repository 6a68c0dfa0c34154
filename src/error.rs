//! Gateway-level error types shared across the pipeline, coordinator, and stores.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential-store persistence failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session is missing, expired, or could not be refreshed.
	#[error(transparent)]
	Session(#[from] SessionError),
	/// Transport failure (DNS, TCP, timeout) before any response arrived.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Server answered with an error status.
	#[error(transparent)]
	Api(#[from] ApiError),
}
impl Error {
	/// Returns the HTTP status carried by the error, when one exists.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Api(api) => api.status(),
			_ => None,
		}
	}
}

/// Configuration and request-construction failures raised by the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Joined request URL cannot be parsed.
	#[error("Request URL `{path}` is invalid.")]
	InvalidRequestUrl {
		/// Request path that failed to join onto the base URL.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Session lifecycle failures.
///
/// The variants are cloneable because a refresh rejection is broadcast to every
/// waiter queued behind the in-flight refresh.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionError {
	/// No usable credentials are stored at all.
	#[error("No valid session is available. Sign in again.")]
	NoValidSession,
	/// An access token exists but the refresh token is gone.
	#[error("The session credentials have expired. Sign in again.")]
	MissingRefreshToken,
	/// The refresh call itself failed; queued requests reject with this.
	#[error("Session refresh was rejected: {reason}")]
	RefreshRejected {
		/// Human-readable summary of the refresh failure.
		reason: String,
	},
}

/// Transport-level failure carrying the classified category and raw detail.
#[derive(Clone, Debug, ThisError)]
#[error("Transport failure while calling the server: {detail}")]
pub struct TransportError {
	/// User-messaging category derived from the raw failure.
	pub kind: TransportErrorKind,
	/// Raw failure detail reported by the transport, including its cause chain.
	pub detail: String,
	/// Normalized platform error code, when the transport exposed one.
	pub code: Option<String>,
}
impl TransportError {
	/// Classifies a raw transport failure into a [`TransportError`].
	pub fn classify(detail: impl Into<String>, code: Option<impl Into<String>>) -> Self {
		let detail = detail.into();
		let code = code.map(Into::into);
		let kind = TransportErrorKind::classify(&detail, code.as_deref());

		Self { kind, detail, code }
	}
}

/// User-messaging categories for transport failures.
///
/// Matching runs in declaration order; the first matching rule wins. Both the
/// human-readable detail (lowercased) and the normalized platform code
/// (uppercased) are consulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
	/// Nothing is listening on the target port.
	ConnectionRefused,
	/// The connection or request timed out.
	TimedOut,
	/// The server name could not be resolved.
	NameNotResolved,
	/// The connection was reset mid-exchange.
	ConnectionReset,
	/// The server could not be reached for another reason.
	ServerUnavailable,
	/// Generic connectivity problem; the fallback category.
	Connection,
}
impl TransportErrorKind {
	/// Classifies a raw failure message + platform code into a category.
	pub fn classify(detail: &str, code: Option<&str>) -> Self {
		let detail = detail.to_ascii_lowercase();
		let code = code.map(str::to_ascii_uppercase).unwrap_or_default();

		if detail.contains("connection refused") || code.contains("ECONNREFUSED") {
			return Self::ConnectionRefused;
		}
		if detail.contains("timed out")
			|| detail.contains("timeout")
			|| code.contains("ETIMEDOUT")
			|| code.contains("ECONNABORTED")
		{
			return Self::TimedOut;
		}
		if detail.contains("name not resolved")
			|| detail.contains("failed to lookup")
			|| detail.contains("dns error")
			|| code.contains("ENOTFOUND")
			|| code.contains("EAI_AGAIN")
		{
			return Self::NameNotResolved;
		}
		if detail.contains("connection reset")
			|| detail.contains("broken pipe")
			|| code.contains("ECONNRESET")
		{
			return Self::ConnectionReset;
		}
		if detail.contains("error sending request") || detail.contains("connect") {
			return Self::ServerUnavailable;
		}

		Self::Connection
	}

	/// Returns the notification text surfaced to the user for this category.
	pub const fn user_message(self) -> &'static str {
		match self {
			Self::ConnectionRefused => "Unable to connect to the server. Check that it is running.",
			Self::TimedOut => "The server is not responding. Try again in a moment.",
			Self::NameNotResolved => "The server address could not be resolved. Check the URL.",
			Self::ConnectionReset => "The connection to the server was interrupted. Try again.",
			Self::ServerUnavailable =>
				"The server cannot be reached right now. Try again in a moment.",
			Self::Connection => "Check your network connection.",
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ConnectionRefused => "connection_refused",
			Self::TimedOut => "timed_out",
			Self::NameNotResolved => "name_not_resolved",
			Self::ConnectionReset => "connection_reset",
			Self::ServerUnavailable => "server_unavailable",
			Self::Connection => "connection",
		}
	}
}
impl Display for TransportErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failures reported by the server after a response arrived.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// Server answered with an error status and (possibly) an envelope body.
	#[error("Server rejected the request with status {status}: {message}")]
	Rejected {
		/// HTTP status code of the rejection.
		status: u16,
		/// Machine-readable error code supplied by the server, if any.
		code: Option<String>,
		/// Human-readable message (server-provided or a status fallback).
		message: String,
		/// Field-level validation errors supplied by the server.
		errors: Vec<String>,
	},
	/// Response body did not decode as the expected envelope.
	#[error("Server response could not be decoded.")]
	EnvelopeParse {
		/// Structured parsing failure including the JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the undecodable response.
		status: Option<u16>,
	},
}
impl ApiError {
	/// Returns the HTTP status carried by this error, when known.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			Self::EnvelopeParse { status, .. } => *status,
		}
	}
}

/// Returns the generic user-facing message for an HTTP error status.
///
/// Used when the server's envelope omits a `message` and as the fixed text for
/// access-denied notifications.
pub fn status_fallback_message(status: u16) -> &'static str {
	match status {
		400 => "The request was invalid.",
		401 => "Authentication is required.",
		403 => "You do not have permission to perform this action.",
		404 => "The requested resource could not be found.",
		405 => "That request method is not allowed.",
		408 => "The request timed out.",
		409 => "The request conflicted with existing data.",
		413 => "The request payload is too large.",
		422 => "Check the submitted values.",
		429 => "Too many requests. Try again shortly.",
		502 => "The server connection is having problems.",
		503 => "The service is temporarily unavailable.",
		504 => "The server took too long to respond.",
		_ => "A server error occurred. Try again shortly.",
	}
}
