//! Shared fixtures for the gateway integration tests: recording collaborators,
//! seeded in-memory stores, and envelope body builders.

// Each integration test target compiles this module independently and uses a
// different subset of it.
#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use parking_lot::Mutex;
// self
use session_gateway::{
	config::GatewayConfig,
	gateway::Gateway,
	http::ReqwestHttpClient,
	notify::{Navigator, Notifier, Severity},
	store::{CredentialStore, MemoryStore},
};

/// Notifier that records every message for later assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier(Mutex<Vec<(String, Severity)>>);
impl RecordingNotifier {
	pub fn messages(&self) -> Vec<(String, Severity)> {
		self.0.lock().clone()
	}

	pub fn contains(&self, message: &str) -> bool {
		self.0.lock().iter().any(|(recorded, _)| recorded == message)
	}
}
impl Notifier for RecordingNotifier {
	fn notify(&self, message: &str, severity: Severity) {
		self.0.lock().push((message.to_owned(), severity));
	}
}

/// Navigator that counts sign-in redirects.
#[derive(Debug, Default)]
pub struct RecordingNavigator(AtomicUsize);
impl RecordingNavigator {
	pub fn visits(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}
}
impl Navigator for RecordingNavigator {
	fn go_to_login(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

/// Gateway plus its recording collaborators, as one bundle.
pub struct TestHarness {
	pub gateway: Gateway<ReqwestHttpClient>,
	pub store: Arc<MemoryStore>,
	pub notifier: Arc<RecordingNotifier>,
	pub navigator: Arc<RecordingNavigator>,
}

/// Builds a gateway from an explicit configuration and store.
pub fn build_gateway_with(config: GatewayConfig, store: Arc<MemoryStore>) -> TestHarness {
	let notifier = Arc::new(RecordingNotifier::default());
	let navigator = Arc::new(RecordingNavigator::default());
	let gateway = Gateway::with_http_client(
		store.clone(),
		notifier.clone(),
		navigator.clone(),
		config,
		ReqwestHttpClient::default(),
	);

	TestHarness { gateway, store, notifier, navigator }
}

/// Builds a gateway against the provided base URL with an empty store.
pub fn build_test_gateway(base_url: &str) -> TestHarness {
	let config = GatewayConfig::new(base_url).expect("Test base URL should be valid.");

	build_gateway_with(config, Arc::new(MemoryStore::default()))
}

/// Builds a harness whose store already holds the `A1`/`R1` session.
pub fn build_seeded_gateway(base_url: &str) -> TestHarness {
	let harness = build_test_gateway(base_url);

	harness.store.store_tokens("A1", "R1");

	harness
}

/// Renders a success envelope around the provided payload JSON.
pub fn success_envelope(payload: &str) -> String {
	format!(
		r#"{{"message":"OK","code":"SUCCESS","statusCode":200,"errors":null,"payload":{payload}}}"#
	)
}

/// Renders an error envelope with the provided status and message.
pub fn error_envelope(status: u16, code: &str, message: &str) -> String {
	format!(
		r#"{{"message":"{message}","code":"{code}","statusCode":{status},"errors":null,"payload":null}}"#
	)
}
