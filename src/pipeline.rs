//! Explicit pre-request / post-response middleware chain owned by the gateway.
//!
//! Stages are pure header transforms: they may read the credential store and
//! the per-request options, may mutate the outgoing header map, and must never
//! block or fail. A request stage returning [`StageFlow::Halt`] stops the
//! chain, which is how Basic-auth requests skip every session-header stage.
//! Running the chain twice over the same descriptor is a no-op; each stage
//! checks for an existing header before writing one.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
// self
use crate::{
	_prelude::*,
	http::GatewayResponse,
	request::{RequestDescriptor, RequestOptions, headers},
	store::CredentialStore,
};

/// Continuation decision returned by every request stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageFlow {
	/// Evaluate the next stage.
	Continue,
	/// Stop the chain; later stages are skipped for this request.
	Halt,
}

/// Read-only context shared with every stage invocation.
pub struct StageContext<'a> {
	/// Credential store backing token lookups and CSRF capture.
	pub store: &'a dyn CredentialStore,
	/// Options of the request being processed.
	pub options: &'a RequestOptions,
	/// Full `Bearer ...` value installed by the most recent refresh, if any.
	///
	/// Takes precedence over the stored access token so requests issued right
	/// after a rotation pick up the new credential even if a slow store write
	/// has not landed yet.
	pub default_authorization: Option<String>,
}

/// Transform applied to every outgoing request before dispatch.
pub trait RequestStage
where
	Self: Send + Sync,
{
	/// Applies the stage, optionally mutating the request headers.
	fn apply(&self, ctx: &StageContext<'_>, request: &mut RequestDescriptor) -> StageFlow;
}

/// Inspection applied to every successful response.
pub trait ResponseStage
where
	Self: Send + Sync,
{
	/// Observes the response; side effects go through the context's store.
	fn inspect(&self, ctx: &StageContext<'_>, response: &GatewayResponse);
}

/// Attaches `Authorization: Basic ...` and halts the chain.
///
/// Basic-authenticated requests carry no session headers at all, so none of
/// the later stages run for them.
pub struct BasicAuthStage;
impl RequestStage for BasicAuthStage {
	fn apply(&self, ctx: &StageContext<'_>, request: &mut RequestDescriptor) -> StageFlow {
		let Some(credentials) = &ctx.options.basic_auth else {
			return StageFlow::Continue;
		};
		let encoded = BASE64.encode(format!("{}:{}", credentials.username, credentials.password));

		request.set_header(headers::AUTHORIZATION, format!("Basic {encoded}"));

		StageFlow::Halt
	}
}

/// Attaches `Authorization: Bearer ...` from the store or the refresh default.
pub struct BearerStage;
impl RequestStage for BearerStage {
	fn apply(&self, ctx: &StageContext<'_>, request: &mut RequestDescriptor) -> StageFlow {
		if ctx.options.skip_auth || request.header(headers::AUTHORIZATION).is_some() {
			return StageFlow::Continue;
		}

		let value = ctx
			.default_authorization
			.clone()
			.or_else(|| ctx.store.access_token().map(|token| format!("Bearer {token}")));

		if let Some(value) = value {
			request.set_header(headers::AUTHORIZATION, value);
		}

		StageFlow::Continue
	}
}

/// Attaches the fixed `X-Requested-With: XMLHttpRequest` anti-CSRF marker.
///
/// Applied regardless of `skip_auth`; the marker is not a credential.
pub struct RequestedWithStage;
impl RequestStage for RequestedWithStage {
	fn apply(&self, _: &StageContext<'_>, request: &mut RequestDescriptor) -> StageFlow {
		request.set_header_if_absent(headers::X_REQUESTED_WITH, "XMLHttpRequest");

		StageFlow::Continue
	}
}

/// Echoes the stored CSRF token back in the double-submit header.
pub struct CsrfSubmitStage;
impl RequestStage for CsrfSubmitStage {
	fn apply(&self, ctx: &StageContext<'_>, request: &mut RequestDescriptor) -> StageFlow {
		if ctx.options.skip_auth {
			return StageFlow::Continue;
		}
		if let Some(token) = ctx.store.csrf_token() {
			request.set_header_if_absent(headers::X_CSRF_TOKEN, token);
		}

		StageFlow::Continue
	}
}

/// Persists a rotated CSRF token arriving in a response header.
pub struct CsrfCaptureStage;
impl ResponseStage for CsrfCaptureStage {
	fn inspect(&self, ctx: &StageContext<'_>, response: &GatewayResponse) {
		if let Some(token) = response.header(headers::X_CSRF_TOKEN) {
			ctx.store.store_csrf_token(token);
		}
	}
}

/// Returns the default pre-request chain in evaluation order.
pub fn default_request_stages() -> Vec<Arc<dyn RequestStage>> {
	vec![
		Arc::new(BasicAuthStage),
		Arc::new(BearerStage),
		Arc::new(RequestedWithStage),
		Arc::new(CsrfSubmitStage),
	]
}

/// Returns the default post-response chain.
pub fn default_response_stages() -> Vec<Arc<dyn ResponseStage>> {
	vec![Arc::new(CsrfCaptureStage)]
}

/// Runs the request chain, honoring [`StageFlow::Halt`].
pub fn run_request_stages(
	stages: &[Arc<dyn RequestStage>],
	ctx: &StageContext<'_>,
	request: &mut RequestDescriptor,
) {
	for stage in stages {
		if matches!(stage.apply(ctx, request), StageFlow::Halt) {
			break;
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn seeded_store() -> MemoryStore {
		let store = MemoryStore::default();

		store.store_tokens("A1", "R1");
		store.store_csrf_token("C1");

		store
	}

	fn ctx<'a>(store: &'a MemoryStore, options: &'a RequestOptions) -> StageContext<'a> {
		StageContext { store, options, default_authorization: None }
	}

	#[test]
	fn default_chain_attaches_session_headers() {
		let store = seeded_store();
		let options = RequestOptions::default();
		let mut request = RequestDescriptor::get("/items");

		run_request_stages(&default_request_stages(), &ctx(&store, &options), &mut request);

		assert_eq!(request.header(headers::AUTHORIZATION), Some("Bearer A1"));
		assert_eq!(request.header(headers::X_REQUESTED_WITH), Some("XMLHttpRequest"));
		assert_eq!(request.header(headers::X_CSRF_TOKEN), Some("C1"));
	}

	#[test]
	fn running_the_chain_twice_is_a_no_op() {
		let store = seeded_store();
		let options = RequestOptions::default();
		let stages = default_request_stages();
		let mut request = RequestDescriptor::get("/items");

		run_request_stages(&stages, &ctx(&store, &options), &mut request);

		let first_pass = request.headers().clone();

		run_request_stages(&stages, &ctx(&store, &options), &mut request);

		assert_eq!(request.headers(), &first_pass);
	}

	#[test]
	fn basic_auth_halts_the_chain() {
		let store = seeded_store();
		let options = RequestOptions::default().with_basic_auth("svc-user", "hunter2");
		let mut request = RequestDescriptor::post("/auth/token");

		run_request_stages(&default_request_stages(), &ctx(&store, &options), &mut request);

		// "svc-user:hunter2" in Base64.
		assert_eq!(request.header(headers::AUTHORIZATION), Some("Basic c3ZjLXVzZXI6aHVudGVyMg=="));
		assert_eq!(request.header(headers::X_REQUESTED_WITH), None);
		assert_eq!(request.header(headers::X_CSRF_TOKEN), None);
	}

	#[test]
	fn skip_auth_keeps_the_marker_but_no_tokens() {
		let store = seeded_store();
		let options = RequestOptions::default().anonymous();
		let mut request = RequestDescriptor::post("/auth/login");

		run_request_stages(&default_request_stages(), &ctx(&store, &options), &mut request);

		assert_eq!(request.header(headers::AUTHORIZATION), None);
		assert_eq!(request.header(headers::X_REQUESTED_WITH), Some("XMLHttpRequest"));
		assert_eq!(request.header(headers::X_CSRF_TOKEN), None);
	}

	#[test]
	fn bearer_stage_respects_existing_authorization() {
		let store = seeded_store();
		let options = RequestOptions::default();
		let mut request = RequestDescriptor::get("/items").with_header(headers::AUTHORIZATION, "Bearer custom");

		run_request_stages(&default_request_stages(), &ctx(&store, &options), &mut request);

		assert_eq!(request.header(headers::AUTHORIZATION), Some("Bearer custom"));
	}

	#[test]
	fn bearer_stage_prefers_the_refresh_default() {
		let store = seeded_store();
		let options = RequestOptions::default();
		let ctx = StageContext {
			store: &store,
			options: &options,
			default_authorization: Some("Bearer A2".into()),
		};
		let mut request = RequestDescriptor::get("/items");

		run_request_stages(&default_request_stages(), &ctx, &mut request);

		assert_eq!(request.header(headers::AUTHORIZATION), Some("Bearer A2"));
	}

	#[test]
	fn csrf_capture_persists_rotated_tokens() {
		let store = seeded_store();
		let options = RequestOptions::default();
		let response = GatewayResponse::new(
			200,
			[("X-CSRF-Token".to_owned(), "C2".to_owned())],
			Vec::new(),
		);

		CsrfCaptureStage.inspect(&ctx(&store, &options), &response);

		assert_eq!(store.csrf_token().as_deref(), Some("C2"));
	}
}
