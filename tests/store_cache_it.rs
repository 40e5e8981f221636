// crates.io
use httpmock::prelude::*;
// self
use portier_client::{
	discovery::DiscoveryDocument,
	error::{Error, FetchError},
	serde_json::{Value, json},
	store::{MemoryStore, Store},
	url::Url,
};
use std::sync::Arc;

fn new_store() -> Arc<dyn Store> {
	Arc::new(MemoryStore::new().expect("Default memory store should build."))
}

fn url_of(server: &MockServer, path: &str) -> Url {
	Url::parse(&server.url(path)).expect("Mock server URL should parse.")
}

#[tokio::test]
async fn sequential_fetches_share_one_network_call() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/doc");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "answer": 42 }));
		})
		.await;
	let store = new_store();
	let first = store
		.fetch_json::<Value>(url_of(&server, "/doc"))
		.await
		.expect("First fetch should succeed.");
	let second = store
		.fetch_json::<Value>(url_of(&server, "/doc"))
		.await
		.expect("Second fetch should be served from cache.");

	assert_eq!(*first, *second);
	assert!(Arc::ptr_eq(&first, &second), "The cache should hand out shared copies.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_fetches_coalesce_into_one_call() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/doc");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "answer": 42 }))
				.delay(std::time::Duration::from_millis(250));
		})
		.await;
	let store = new_store();
	let handles = (0..8)
		.map(|_| {
			let store = store.clone();
			let url = url_of(&server, "/doc");

			tokio::spawn(async move { store.fetch_json::<Value>(url).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let document = handle
			.await
			.expect("Fetch task should not panic.")
			.expect("Every coalesced fetch should observe the single refresh.");

		assert_eq!(*document, json!({ "answer": 42 }));
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn failing_endpoint_is_backed_off_then_retried() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/doc");
			then.status(500);
		})
		.await;
	let store = new_store();

	for _ in 0..2 {
		let err = store
			.fetch_json::<Value>(url_of(&server, "/doc"))
			.await
			.expect_err("Fetch against a failing endpoint should fail.");

		assert!(matches!(err, Error::Fetch(FetchError::Status { status: 500, .. })));
	}

	// Both calls fall inside the error backoff window, so only one request went out.
	mock.assert_calls_async(1).await;

	tokio::time::sleep(std::time::Duration::from_millis(3_200)).await;

	store
		.fetch_json::<Value>(url_of(&server, "/doc"))
		.await
		.expect_err("The endpoint is still failing after the backoff.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn malformed_documents_fail_with_a_decode_error() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/doc");
			then.status(200).body("certainly not json");
		})
		.await;
	let store = new_store();

	for _ in 0..2 {
		let err = store
			.fetch_json::<Value>(url_of(&server, "/doc"))
			.await
			.expect_err("A malformed body should fail to decode.");

		assert!(matches!(err, Error::Fetch(FetchError::Decode { .. })));
	}

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unreachable_endpoints_surface_transport_errors() {
	let store = new_store();
	let url = Url::parse("http://127.0.0.1:9/doc").expect("Closed-port URL should parse.");
	let err = store
		.fetch_json::<Value>(url)
		.await
		.expect_err("Fetching from a closed port should fail.");

	assert!(matches!(err, Error::Fetch(FetchError::Transport { .. })));
}

#[tokio::test]
async fn distinct_shapes_of_one_url_are_cached_separately() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/doc");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"jwks_uri": "https://idp.example/keys",
				"authorization_endpoint": "https://idp.example/auth",
			}));
		})
		.await;
	let store = new_store();
	let raw = store
		.fetch_json::<Value>(url_of(&server, "/doc"))
		.await
		.expect("Fetching as a raw value should succeed.");
	let typed = store
		.fetch_json::<DiscoveryDocument>(url_of(&server, "/doc"))
		.await
		.expect("Fetching as a discovery document should succeed.");

	assert_eq!(raw["jwks_uri"], "https://idp.example/keys");
	assert_eq!(typed.jwks_uri, "https://idp.example/keys");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn different_urls_are_fetched_independently() {
	let server = MockServer::start_async().await;
	let mock_a = server
		.mock_async(|when, then| {
			when.method(GET).path("/a");
			then.status(200).json_body(json!({ "document": "a" }));
		})
		.await;
	let mock_b = server
		.mock_async(|when, then| {
			when.method(GET).path("/b");
			then.status(200).json_body(json!({ "document": "b" }));
		})
		.await;
	let store = new_store();
	let a = store
		.fetch_json::<Value>(url_of(&server, "/a"))
		.await
		.expect("Fetching the first document should succeed.");
	let b = store
		.fetch_json::<Value>(url_of(&server, "/b"))
		.await
		.expect("Fetching the second document should succeed.");

	assert_eq!(a["document"], "a");
	assert_eq!(b["document"], "b");

	mock_a.assert_calls_async(1).await;
	mock_b.assert_calls_async(1).await;
}
