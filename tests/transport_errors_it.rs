#![cfg(feature = "reqwest")]

mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
use serde_json::Value;
// self
use common::*;
use session_gateway::{
	config::GatewayConfig,
	error::{Error, TransportErrorKind},
	request::RequestOptions,
	store::MemoryStore,
};

#[tokio::test]
async fn connection_refused_is_classified_and_notified() {
	// Nothing listens on port 1; the connect attempt is refused immediately.
	let harness = build_test_gateway("http://127.0.0.1:1");
	let err = harness
		.gateway
		.get::<Value>("/items", RequestOptions::default())
		.await
		.expect_err("Request against a closed port should fail.");
	let Error::Transport(transport) = err else {
		panic!("Expected a transport error for a refused connection.");
	};

	assert_eq!(transport.kind, TransportErrorKind::ConnectionRefused);
	assert!(harness.notifier.contains(TransportErrorKind::ConnectionRefused.user_message()));
	// Transport failures never redirect.
	assert_eq!(harness.navigator.visits(), 0);
}

#[tokio::test]
async fn transport_failures_notify_even_for_sign_in_requests() {
	let harness = build_test_gateway("http://127.0.0.1:1");
	let err = harness
		.gateway
		.post::<Value, _>(
			"/auth/login",
			&serde_json::json!({ "email": "user@example.com", "password": "pw" }),
			RequestOptions::default().anonymous(),
		)
		.await
		.expect_err("Sign-in against a dead server should fail.");

	assert!(matches!(err, Error::Transport(_)));
	// Unlike authentication failures, transport failures are always surfaced.
	assert_eq!(harness.notifier.messages().len(), 1);
}

#[tokio::test]
async fn slow_responses_time_out_and_classify_as_timed_out() {
	let server = MockServer::start_async().await;
	let config = GatewayConfig::new(server.base_url())
		.expect("Test base URL should be valid.")
		.with_timeout(Duration::from_millis(100));
	let harness = build_gateway_with(config, Arc::new(MemoryStore::default()));
	let _slow = server
		.mock_async(|when, then| {
			when.method(GET).path("/slow");
			then.status(200)
				.header("content-type", "application/json")
				.delay(Duration::from_secs(2))
				.body(success_envelope("null"));
		})
		.await;
	let err = harness
		.gateway
		.get::<Value>("/slow", RequestOptions::default())
		.await
		.expect_err("Request should give up before the mock responds.");
	let Error::Transport(transport) = err else {
		panic!("Expected a transport error for the timeout.");
	};

	assert_eq!(transport.kind, TransportErrorKind::TimedOut);
	assert!(harness.notifier.contains(TransportErrorKind::TimedOut.user_message()));
}
