//! The refresh coordination protocol: single-flight rotation with queued
//! replay.
//!
//! A 401 on a request that still holds stored credentials enters
//! [`Gateway::handle_unauthorized`]. The first such request becomes the leader
//! of a refresh cycle: it calls the refresh endpoint, persists the rotated
//! token pair, releases every queued waiter with the new access token, and
//! replays itself. Requests failing while the refresh is in flight suspend on
//! a oneshot continuation and replay themselves once released. A failed
//! refresh clears the session, redirects to sign-in, and rejects the leader
//! with the original error and every waiter with a rejection derived from it.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	coordinator::{RefreshTicket, TokenCoordinator},
	envelope::RefreshPayload,
	error::SessionError,
	gateway::Gateway,
	http::{GatewayHttpClient, GatewayResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{RequestDescriptor, RequestOptions, headers},
};

impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Runs the refresh protocol for a request that just received 401.
	pub(crate) async fn handle_unauthorized(
		&self,
		request: RequestDescriptor,
		options: RequestOptions,
	) -> Result<GatewayResponse> {
		// Without both tokens there is nothing to refresh with: fail closed
		// before touching the network.
		if self.store.access_token().is_none() || self.store.refresh_token().is_none() {
			self.store.clear_session();
			self.navigator.go_to_login();

			return Err(SessionError::NoValidSession.into());
		}

		match TokenCoordinator::begin(self.coordinator()) {
			RefreshTicket::Follower(waiter) => {
				let outcome = waiter.await.unwrap_or_else(|_| {
					Err(SessionError::RefreshRejected {
						reason: "The refresh attempt was abandoned before completing.".into(),
					})
				});

				match outcome {
					Ok(token) => self.replay(request, options, &token).await,
					Err(rejection) => Err(rejection.into()),
				}
			},
			RefreshTicket::Leader(lease) => {
				self.refresh_metrics.record_attempt();

				match self.perform_refresh().await {
					Ok(token) => {
						self.refresh_metrics.record_success();
						// Queued waiters are released before the triggering
						// request replays itself.
						lease.fulfill(Ok(token.clone()));

						self.replay(request, options, &token).await
					},
					Err(err) => {
						self.refresh_metrics.record_failure();
						lease.fulfill(Err(SessionError::RefreshRejected {
							reason: err.to_string(),
						}));

						Err(err)
					},
				}
			},
		}
	}

	/// Resubmits a request exactly once with the freshly minted access token.
	async fn replay(
		&self,
		mut request: RequestDescriptor,
		options: RequestOptions,
		token: &str,
	) -> Result<GatewayResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::new(KIND, "replay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				// One refresh per request: a replay that hits 401 again
				// surfaces as a plain rejection instead of a new cycle.
				request.mark_retried();
				request.set_header(headers::AUTHORIZATION, format!("Bearer {token}"));

				let response = self.execute_once(&mut request, &options).await?;

				if response.is_success() {
					Ok(response)
				} else {
					Err(self.reject_with_notifications(&request, &options, response))
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Calls the refresh endpoint and rotates the stored token pair.
	pub(crate) async fn perform_refresh(&self) -> Result<String> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "perform_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async {
				// The stored copy only gates the attempt; the server reads the
				// refresh token from its own cookie.
				if self.store.refresh_token().is_none() {
					return Err(SessionError::MissingRefreshToken.into());
				}

				match self.refresh_call().await {
					Ok(token) => Ok(token),
					Err(err) => {
						// A rejected refresh is unrecoverable: fail closed.
						self.store.clear_session();
						self.navigator.go_to_login();

						Err(err)
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn refresh_call(&self) -> Result<String> {
		let mut request = RequestDescriptor::post(self.config.endpoints.refresh.clone())
			.with_json(serde_json::json!({}));
		let options = RequestOptions::default().anonymous();
		let response = self.execute_once(&mut request, &options).await?;

		if !response.is_success() {
			return Err(self.reject_with_notifications(&request, &options, response));
		}

		let envelope = response.envelope::<RefreshPayload>()?;
		let RefreshPayload { access_token, refresh_token } = envelope.payload;

		self.store.store_tokens(&access_token, &refresh_token);
		self.install_bearer_default(&access_token);

		Ok(access_token)
	}
}
