//! Wire-contract types for the backend's JSON response envelope.
//!
//! Every JSON body the backend produces has the shape
//! `{ message, code, statusCode, errors, payload }`; list endpoints nest
//! `{ list, totalCount }` inside `payload`, and the refresh endpoint returns
//! the rotated token pair there. Decoding goes through `serde_path_to_error`
//! so an undecodable response reports the exact JSON path that failed.

// self
use crate::{_prelude::*, error::ApiError};

/// Standard response envelope wrapping every JSON payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
	/// Human-readable outcome message.
	pub message: String,
	/// Machine-readable outcome code.
	pub code: String,
	/// HTTP status the server believes it sent.
	pub status_code: u16,
	/// Field-level errors; `null` on success.
	pub errors: Option<Vec<String>>,
	/// Operation payload.
	pub payload: T,
}

/// Paginated list payload nested inside an [`ApiEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPayload<T> {
	/// Page of records.
	pub list: Vec<T>,
	/// Total record count, when the backend computes one.
	pub total_count: Option<u64>,
}

/// Envelope alias for list endpoints.
pub type ListEnvelope<T> = ApiEnvelope<ListPayload<T>>;

/// Payload returned by the token-refresh endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
	/// Newly minted access token.
	pub access_token: String,
	/// Rotated refresh token.
	pub refresh_token: String,
}
impl Debug for RefreshPayload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshPayload")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.finish()
	}
}

/// Lenient view of an error response body; every field optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
	pub message: Option<String>,
	pub code: Option<String>,
	pub errors: Option<Vec<String>>,
}

/// Decodes a response body as an envelope, reporting the failing JSON path.
pub(crate) fn decode_envelope<T>(bytes: &[u8], status: Option<u16>) -> Result<ApiEnvelope<T>, ApiError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ApiError::EnvelopeParse { source, status })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn envelope_decodes_camel_case_payloads() {
		let body = br#"{
			"message": "OK",
			"code": "SUCCESS",
			"statusCode": 200,
			"errors": null,
			"payload": { "accessToken": "A2", "refreshToken": "R2" }
		}"#;
		let envelope: ApiEnvelope<RefreshPayload> =
			decode_envelope(body, Some(200)).expect("Refresh envelope should decode.");

		assert_eq!(envelope.code, "SUCCESS");
		assert_eq!(envelope.payload.access_token, "A2");
		assert_eq!(envelope.payload.refresh_token, "R2");
	}

	#[test]
	fn list_envelope_decodes_total_count() {
		let body = br#"{
			"message": "OK",
			"code": "SUCCESS",
			"statusCode": 200,
			"errors": null,
			"payload": { "list": [1, 2, 3], "totalCount": 17 }
		}"#;
		let envelope: ListEnvelope<u32> =
			decode_envelope(body, Some(200)).expect("List envelope should decode.");

		assert_eq!(envelope.payload.list, vec![1, 2, 3]);
		assert_eq!(envelope.payload.total_count, Some(17));
	}

	#[test]
	fn decode_failure_reports_the_json_path() {
		let body = br#"{
			"message": "OK",
			"code": "SUCCESS",
			"statusCode": 200,
			"errors": null,
			"payload": { "accessToken": 42, "refreshToken": "R2" }
		}"#;
		let err = decode_envelope::<RefreshPayload>(body, Some(200))
			.expect_err("Numeric access token should fail to decode.");
		let ApiError::EnvelopeParse { source, status } = err else {
			panic!("Expected an envelope parse error.");
		};

		assert_eq!(status, Some(200));
		assert!(source.path().to_string().contains("payload.accessToken"));
	}

	#[test]
	fn refresh_payload_debug_redacts_tokens() {
		let payload = RefreshPayload { access_token: "A2".into(), refresh_token: "R2".into() };
		let rendered = format!("{payload:?}");

		assert!(!rendered.contains("A2"));
		assert!(rendered.contains("<redacted>"));
	}
}
