//! The authenticated HTTP gateway: pre-request pipeline, dispatch, failure
//! branching, and the entry point into the refresh protocol.

pub mod refresh;

pub use refresh::RefreshMetrics;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	coordinator::TokenCoordinator,
	envelope::ApiEnvelope,
	error::{ApiError, ConfigError, TransportError, status_fallback_message},
	http::{GatewayHttpClient, GatewayResponse, PreparedRequest, TransportFailure},
	notify::{Navigator, Notifier, Severity},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	pipeline::{self, RequestStage, ResponseStage, StageContext},
	request::{RequestDescriptor, RequestOptions, headers},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

pub(crate) const STATUS_UNAUTHORIZED: u16 = 401;
pub(crate) const STATUS_FORBIDDEN: u16 = 403;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestHttpClient>;

/// Authenticated HTTP gateway coordinating headers, dispatch, and refresh.
///
/// The gateway owns the transport, the credential store, the user-facing side
/// effects (notifier + navigator), the middleware chains, and the refresh
/// coordinator, so callers only deal with descriptors and options. Cloning is
/// cheap and every clone shares the same coordinator, which is what makes the
/// single-flight refresh guarantee hold process-wide.
pub struct Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// HTTP transport used for every outbound request.
	pub http_client: Arc<C>,
	/// Credential store backing token reads and writes.
	pub store: Arc<dyn CredentialStore>,
	/// Sink for ambient user notifications.
	pub notifier: Arc<dyn Notifier>,
	/// Redirect surface used when the session is unrecoverable.
	pub navigator: Arc<dyn Navigator>,
	/// Validated gateway configuration.
	pub config: GatewayConfig,
	/// Counters for refresh attempts coordinated by this gateway.
	pub refresh_metrics: Arc<RefreshMetrics>,
	request_stages: Vec<Arc<dyn RequestStage>>,
	response_stages: Vec<Arc<dyn ResponseStage>>,
	coordinator: Arc<TokenCoordinator>,
	bearer_default: Arc<RwLock<Option<String>>>,
}
impl<C> Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	/// Creates a gateway that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		notifier: Arc<dyn Notifier>,
		navigator: Arc<dyn Navigator>,
		config: GatewayConfig,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			notifier,
			navigator,
			config,
			refresh_metrics: Default::default(),
			request_stages: pipeline::default_request_stages(),
			response_stages: pipeline::default_response_stages(),
			coordinator: Arc::new(TokenCoordinator::new()),
			bearer_default: Arc::new(RwLock::new(None)),
		}
	}

	/// Replaces the refresh coordinator.
	///
	/// Gateways that should share one single-flight domain (e.g. two transports
	/// against the same backend) can be handed the same coordinator instance.
	pub fn with_coordinator(mut self, coordinator: Arc<TokenCoordinator>) -> Self {
		self.coordinator = coordinator;

		self
	}

	/// Returns the refresh coordinator this gateway participates in.
	pub fn coordinator(&self) -> &Arc<TokenCoordinator> {
		&self.coordinator
	}

	/// Sends a request through the full gateway pipeline.
	///
	/// On 401 the refresh protocol runs (unless the request opted out of auth
	/// or was already replayed); other failures notify per the options and
	/// propagate a typed error. A failed request is never resolved as success.
	pub async fn send(
		&self,
		request: RequestDescriptor,
		options: RequestOptions,
	) -> Result<GatewayResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.send_inner(request, options)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn send_inner(
		&self,
		mut request: RequestDescriptor,
		options: RequestOptions,
	) -> Result<GatewayResponse> {
		let response = self.execute_once(&mut request, &options).await?;

		if response.is_success() {
			return Ok(response);
		}
		if response.status() == STATUS_UNAUTHORIZED
			&& !request.was_retried()
			&& !options.skip_auth
		{
			// The refresh endpoint rejecting its own credentials is
			// unrecoverable; refreshing again would loop.
			if self.targets_refresh_endpoint(&request) {
				self.store.clear_session();
				self.navigator.go_to_login();

				return Err(self.api_rejection(&response).into());
			}

			return self.handle_unauthorized(request, options).await;
		}

		Err(self.reject_with_notifications(&request, &options, response))
	}

	/// Runs the pipeline and transport exactly once, without any 401 handling.
	pub(crate) async fn execute_once(
		&self,
		request: &mut RequestDescriptor,
		options: &RequestOptions,
	) -> Result<GatewayResponse> {
		let ctx = StageContext {
			store: self.store.as_ref(),
			options,
			default_authorization: self.bearer_default.read().clone(),
		};

		pipeline::run_request_stages(&self.request_stages, &ctx, request);

		let prepared = self.prepare(request)?;
		let response = match self.http_client.execute(prepared).await {
			Ok(response) => response,
			Err(failure) => return Err(self.transport_error(failure).into()),
		};

		if response.is_success() {
			for stage in &self.response_stages {
				stage.inspect(&ctx, &response);
			}
		}

		Ok(response)
	}

	fn prepare(&self, request: &RequestDescriptor) -> Result<PreparedRequest> {
		let url = self.config.request_url(request.path(), request.query())?;
		let mut headers = request.headers().clone();
		let body = request
			.body()
			.map(serde_json::to_vec)
			.transpose()
			.map_err(ConfigError::BodySerialize)?;

		if body.is_some()
			&& !headers.keys().any(|name| name.eq_ignore_ascii_case(headers::CONTENT_TYPE))
		{
			headers.insert(headers::CONTENT_TYPE.to_owned(), "application/json".to_owned());
		}

		let timeout = match request.timeout() {
			Some(timeout) => timeout,
			None if request.is_transfer() => self.config.transfer_timeout,
			None => self.config.timeout,
		};

		Ok(PreparedRequest { method: request.method(), url, headers, body, timeout })
	}

	fn transport_error(&self, failure: TransportFailure) -> TransportError {
		let error = TransportError::classify(failure.message, failure.code);

		// Transport failures surface even for sign-in requests; only
		// authentication failures are left to the form.
		self.notifier.notify(error.kind.user_message(), Severity::Error);

		error
	}

	fn reject_with_notifications(
		&self,
		request: &RequestDescriptor,
		options: &RequestOptions,
		response: GatewayResponse,
	) -> Error {
		let status = response.status();
		let body = response.error_body().unwrap_or_default();
		let notify = !options.skip_error_notify && !self.targets_login_endpoint(request);

		if notify {
			if status == STATUS_FORBIDDEN {
				self.notifier.notify(status_fallback_message(STATUS_FORBIDDEN), Severity::Error);
			} else if let Some(message) = body.message.as_deref() {
				self.notifier.notify(message, Severity::Error);
			}
		}

		ApiError::Rejected {
			status,
			code: body.code,
			message: body
				.message
				.unwrap_or_else(|| status_fallback_message(status).to_owned()),
			errors: body.errors.unwrap_or_default(),
		}
		.into()
	}

	fn api_rejection(&self, response: &GatewayResponse) -> ApiError {
		let body = response.error_body().unwrap_or_default();

		ApiError::Rejected {
			status: response.status(),
			code: body.code,
			message: body
				.message
				.unwrap_or_else(|| status_fallback_message(response.status()).to_owned()),
			errors: body.errors.unwrap_or_default(),
		}
	}

	pub(crate) fn targets_refresh_endpoint(&self, request: &RequestDescriptor) -> bool {
		request.path().contains(self.config.endpoints.refresh.as_str())
	}

	fn targets_login_endpoint(&self, request: &RequestDescriptor) -> bool {
		request.path().contains(self.config.endpoints.login.as_str())
	}

	pub(crate) fn install_bearer_default(&self, token: &str) {
		*self.bearer_default.write() = Some(format!("Bearer {token}"));
	}

	/// Sends a GET request and decodes the response envelope.
	pub async fn get<T>(
		&self,
		path: impl Into<String>,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.request_envelope(RequestDescriptor::get(path), options).await
	}

	/// Sends a POST request with a JSON body and decodes the response envelope.
	pub async fn post<T, B>(
		&self,
		path: impl Into<String>,
		body: &B,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::BodySerialize)?;

		self.request_envelope(RequestDescriptor::post(path).with_json(body), options).await
	}

	/// Sends a PUT request with a JSON body and decodes the response envelope.
	pub async fn put<T, B>(
		&self,
		path: impl Into<String>,
		body: &B,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::BodySerialize)?;

		self.request_envelope(RequestDescriptor::put(path).with_json(body), options).await
	}

	/// Sends a PATCH request with a JSON body and decodes the response envelope.
	pub async fn patch<T, B>(
		&self,
		path: impl Into<String>,
		body: &B,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::BodySerialize)?;

		self.request_envelope(RequestDescriptor::patch(path).with_json(body), options).await
	}

	/// Sends a DELETE request and decodes the response envelope.
	pub async fn delete<T>(
		&self,
		path: impl Into<String>,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		self.request_envelope(RequestDescriptor::delete(path), options).await
	}

	/// Sends an arbitrary descriptor and decodes the response envelope.
	pub async fn request_envelope<T>(
		&self,
		request: RequestDescriptor,
		options: RequestOptions,
	) -> Result<ApiEnvelope<T>>
	where
		T: DeserializeOwned,
	{
		let response = self.send(request, options).await?;

		Ok(response.envelope::<T>()?)
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestHttpClient> {
	/// Creates a gateway backed by the default reqwest transport.
	///
	/// Use [`Gateway::with_http_client`] with a cookie-enabled client when the
	/// backend delivers the refresh token via a cookie.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		notifier: Arc<dyn Notifier>,
		navigator: Arc<dyn Navigator>,
		config: GatewayConfig,
	) -> Self {
		Self::with_http_client(store, notifier, navigator, config, ReqwestHttpClient::default())
	}
}
impl<C> Clone for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			store: self.store.clone(),
			notifier: self.notifier.clone(),
			navigator: self.navigator.clone(),
			config: self.config.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			request_stages: self.request_stages.clone(),
			response_stages: self.response_stages.clone(),
			coordinator: self.coordinator.clone(),
			bearer_default: self.bearer_default.clone(),
		}
	}
}
impl<C> Debug for Gateway<C>
where
	C: ?Sized + GatewayHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("config", &self.config)
			.field("refreshing", &self.coordinator.is_refreshing())
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{
		notify::{NoopNavigator, NoopNotifier},
		store::MemoryStore,
	};

	fn build_gateway() -> ReqwestGateway {
		let config = GatewayConfig::new("http://localhost:3001/api/v1")
			.expect("Test base URL should parse.");

		Gateway::new(
			Arc::new(MemoryStore::default()),
			Arc::new(NoopNotifier),
			Arc::new(NoopNavigator),
			config,
		)
	}

	#[test]
	fn endpoint_matching_uses_path_containment() {
		let gateway = build_gateway();

		assert!(gateway.targets_refresh_endpoint(&RequestDescriptor::post("/auth/refresh")));
		assert!(gateway.targets_refresh_endpoint(&RequestDescriptor::post("/v2/auth/refresh")));
		assert!(!gateway.targets_refresh_endpoint(&RequestDescriptor::post("/auth/login")));
		assert!(gateway.targets_login_endpoint(&RequestDescriptor::post("/auth/login")));
	}

	#[test]
	fn prepare_selects_the_transfer_timeout() {
		let gateway = build_gateway();
		let request = RequestDescriptor::post("/files/export").transfer();
		let prepared = gateway.prepare(&request).expect("Prepare should succeed.");

		assert_eq!(prepared.timeout, gateway.config.transfer_timeout);

		let request = RequestDescriptor::get("/items");
		let prepared = gateway.prepare(&request).expect("Prepare should succeed.");

		assert_eq!(prepared.timeout, gateway.config.timeout);

		let request = RequestDescriptor::get("/items").with_timeout(Duration::from_secs(3));
		let prepared = gateway.prepare(&request).expect("Prepare should succeed.");

		assert_eq!(prepared.timeout, Duration::from_secs(3));
	}

	#[test]
	fn prepare_adds_a_json_content_type_only_with_a_body() {
		let gateway = build_gateway();
		let request = RequestDescriptor::post("/items").with_json(serde_json::json!({"name": "x"}));
		let prepared = gateway.prepare(&request).expect("Prepare should succeed.");

		assert_eq!(
			prepared.headers.get(headers::CONTENT_TYPE).map(String::as_str),
			Some("application/json"),
		);

		let request = RequestDescriptor::get("/items");
		let prepared = gateway.prepare(&request).expect("Prepare should succeed.");

		assert!(!prepared.headers.contains_key(headers::CONTENT_TYPE));
	}
}
