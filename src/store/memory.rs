//! Thread-safe in-memory [`Store`] implementation for single-process deployments.

// self
use crate::{
	_prelude::*,
	error::FetchError,
	http::{self, DocumentHttpClient},
	nonce::{NonceGenerator, SecureNonceGenerator},
	store::{DocumentShape, SharedDocument, Store, StoreError, StoreFuture},
};
#[cfg(feature = "reqwest")]
use crate::{error::ConfigError, http::ReqwestHttpClient};

type CacheSlotHandle = Arc<AsyncMutex<CacheSlot>>;

/// Cache key: URL plus destination shape, so one URL can serve distinct document types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
	url: Url,
	shape: TypeId,
}

#[derive(Default)]
struct CacheSlot {
	cached: Option<CachedOutcome>,
}

struct CachedOutcome {
	document: Result<SharedDocument, FetchError>,
	expires_at: OffsetDateTime,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct NoncePair {
	nonce: String,
	email: String,
}

/// In-memory [`Store`] keeping cached documents and active nonces in-process.
///
/// This is the default store when a [`Client`](crate::flows::Client) is built without one. It
/// is safe for concurrent use and designed to be shared across many clients.
///
/// The document cache only grows, which is fine: it is assumed to hold a handful of
/// periodically refreshed broker documents. Nonce pairs likewise persist until consumed.
/// Because all state is process-local, the store only behaves as expected when the
/// application runs as a single process.
pub struct MemoryStore<C>
where
	C: DocumentHttpClient,
{
	http_client: C,
	slots: Mutex<HashMap<CacheKey, CacheSlotHandle>>,
	nonces: Mutex<HashSet<NoncePair>>,
	nonce_generator: Arc<dyn NonceGenerator>,
}
#[cfg(feature = "reqwest")]
impl MemoryStore<ReqwestHttpClient> {
	/// Creates a store on top of a reqwest transport with the recommended timeout applied.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(ReqwestHttpClient::with_default_timeout()?))
	}
}
impl<C> MemoryStore<C>
where
	C: DocumentHttpClient,
{
	/// Creates a store on top of a caller-provided transport.
	///
	/// When handing over a custom transport, make sure it carries a timeout; a hung broker
	/// otherwise blocks callers indefinitely.
	pub fn with_http_client(http_client: C) -> Self {
		Self {
			http_client,
			slots: Mutex::default(),
			nonces: Mutex::default(),
			nonce_generator: Arc::new(SecureNonceGenerator),
		}
	}

	/// Replaces the nonce generator, e.g. with a deterministic sequence in tests.
	pub fn with_nonce_generator(mut self, generator: Arc<dyn NonceGenerator>) -> Self {
		self.nonce_generator = generator;

		self
	}

	/// Returns (and creates on demand) the slot guarding one cached document.
	///
	/// The map lock is only ever held for this lookup, never during network I/O, so requests
	/// for different documents proceed independently.
	fn slot(&self, key: &CacheKey) -> CacheSlotHandle {
		let mut slots = self.slots.lock();

		slots.entry(key.clone()).or_default().clone()
	}

	async fn fetch_cached(&self, url: Url, shape: DocumentShape) -> Result<SharedDocument> {
		let handle = self.slot(&CacheKey { url: url.clone(), shape: shape.type_id() });
		// Held across the refresh: overlapping requests for one document serialize here, so
		// exactly one performs the network call and the rest observe its outcome.
		let mut slot = handle.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(cached) = slot.cached.as_ref() {
			if now < cached.expires_at {
				return cached.document.clone().map_err(Error::from);
			}
		}

		let outcome = http::fetch_document(&self.http_client, &url, &shape).await;
		let document = outcome.document;

		slot.cached =
			Some(CachedOutcome { document: document.clone(), expires_at: now + outcome.lifespan });

		document.map_err(Error::from)
	}
}
impl<C> Store for MemoryStore<C>
where
	C: DocumentHttpClient,
{
	fn fetch(&self, url: Url, shape: DocumentShape) -> StoreFuture<'_, SharedDocument> {
		Box::pin(self.fetch_cached(url, shape))
	}

	fn new_nonce<'a>(&'a self, email: &'a str) -> StoreFuture<'a, String> {
		Box::pin(async move {
			let nonce = self.nonce_generator.generate();

			self.nonces
				.lock()
				.insert(NoncePair { nonce: nonce.clone(), email: email.to_owned() });

			Ok(nonce)
		})
	}

	fn consume_nonce<'a>(&'a self, nonce: &'a str, email: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let pair = NoncePair { nonce: nonce.to_owned(), email: email.to_owned() };

			if self.nonces.lock().remove(&pair) {
				Ok(())
			} else {
				Err(StoreError::InvalidNonce.into())
			}
		})
	}
}
impl<C> Debug for MemoryStore<C>
where
	C: DocumentHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MemoryStore")
			.field("cached_documents", &self.slots.lock().len())
			.field("active_nonces", &self.nonces.lock().len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::http::{DocumentResponse, HttpFuture};

	/// Serves a fixed JSON body and counts how often it is actually contacted.
	struct CountingHttpClient {
		body: &'static str,
		status: u16,
		hits: AtomicUsize,
	}
	impl CountingHttpClient {
		fn ok(body: &'static str) -> Arc<Self> {
			Arc::new(Self { body, status: 200, hits: AtomicUsize::new(0) })
		}

		fn failing(status: u16) -> Arc<Self> {
			Arc::new(Self { body: "", status, hits: AtomicUsize::new(0) })
		}

		fn hits(&self) -> usize {
			self.hits.load(Ordering::SeqCst)
		}
	}
	impl DocumentHttpClient for Arc<CountingHttpClient> {
		fn get_document<'a>(
			&'a self,
			_url: &'a Url,
		) -> HttpFuture<'a, Result<DocumentResponse, FetchError>> {
			Box::pin(async move {
				self.hits.fetch_add(1, Ordering::SeqCst);

				Ok(DocumentResponse {
					status: self.status,
					cache_control: None,
					body: self.body.as_bytes().to_vec(),
				})
			})
		}
	}

	fn doc_url() -> Url {
		Url::parse("https://idp.example/doc").expect("Document URL fixture should parse.")
	}

	#[tokio::test]
	async fn repeated_fetches_share_one_network_call_and_one_document() {
		let transport = CountingHttpClient::ok(r#"{"answer":42}"#);
		let store: Arc<dyn Store> = Arc::new(MemoryStore::with_http_client(transport.clone()));
		let first = store
			.fetch_json::<serde_json::Value>(doc_url())
			.await
			.expect("First fetch should succeed.");
		let second = store
			.fetch_json::<serde_json::Value>(doc_url())
			.await
			.expect("Second fetch should be served from cache.");

		assert_eq!(transport.hits(), 1);
		assert!(Arc::ptr_eq(&first, &second), "Cache should hand out shared copies.");
	}

	#[tokio::test]
	async fn failed_fetches_are_memoized_for_the_backoff_window() {
		let transport = CountingHttpClient::failing(503);
		let store: Arc<dyn Store> = Arc::new(MemoryStore::with_http_client(transport.clone()));

		for _ in 0..3 {
			let err = store
				.fetch_json::<serde_json::Value>(doc_url())
				.await
				.expect_err("Fetch against a failing endpoint should fail.");

			assert!(matches!(err, Error::Fetch(FetchError::Status { status: 503, .. })));
		}

		assert_eq!(transport.hits(), 1, "Rapid retries must not hit the endpoint again.");
	}

	#[tokio::test]
	async fn nonce_pairs_are_consumed_exactly_once() {
		let store: Arc<dyn Store> =
			Arc::new(MemoryStore::with_http_client(CountingHttpClient::ok("{}")));
		let nonce = store
			.new_nonce("user@example.com")
			.await
			.expect("Issuing a nonce should succeed.");

		store
			.consume_nonce(&nonce, "user@example.com")
			.await
			.expect("First consumption should succeed.");

		let err = store
			.consume_nonce(&nonce, "user@example.com")
			.await
			.expect_err("Second consumption should fail.");

		assert!(matches!(err, Error::Store(StoreError::InvalidNonce)));
	}

	#[tokio::test]
	async fn consuming_with_the_wrong_email_leaves_the_pair_intact() {
		let store: Arc<dyn Store> =
			Arc::new(MemoryStore::with_http_client(CountingHttpClient::ok("{}")));
		let nonce = store
			.new_nonce("user@example.com")
			.await
			.expect("Issuing a nonce should succeed.");
		let err = store
			.consume_nonce(&nonce, "other@example.com")
			.await
			.expect_err("Consumption bound to another address should fail.");

		assert!(matches!(err, Error::Store(StoreError::InvalidNonce)));

		store
			.consume_nonce(&nonce, "user@example.com")
			.await
			.expect("The original pair should survive a failed attempt.");
	}

	#[tokio::test]
	async fn injected_generator_controls_issued_nonces() {
		struct SequenceGenerator(AtomicUsize);
		impl NonceGenerator for SequenceGenerator {
			fn generate(&self) -> String {
				format!("nonce-{}", self.0.fetch_add(1, Ordering::SeqCst))
			}
		}

		let store = MemoryStore::with_http_client(CountingHttpClient::ok("{}"))
			.with_nonce_generator(Arc::new(SequenceGenerator(AtomicUsize::new(0))));
		let store: Arc<dyn Store> = Arc::new(store);

		assert_eq!(
			store.new_nonce("a@example.com").await.expect("Issuing should succeed."),
			"nonce-0",
		);
		assert_eq!(
			store.new_nonce("b@example.com").await.expect("Issuing should succeed."),
			"nonce-1",
		);
	}
}
