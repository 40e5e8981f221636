//! Storage contracts and the typed document-fetch abstraction.

pub mod memory;

pub use memory::MemoryStore;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::FetchError};

/// Boxed future returned by [`Store`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;
/// Shared handle to a decoded document served from cache.
pub type SharedDocument = Arc<dyn Any + Send + Sync>;

/// Backing store used by a [`Client`](crate::flows::Client) for two purposes: fetching JSON
/// documents over HTTP GET with caching, and managing the nonces that tie a login request to
/// its later verification.
///
/// This is the single abstraction boundary the client depends on. The bundled
/// [`MemoryStore`] works for single-process applications; alternative implementations (a
/// distributed cache, an external nonce table) must honor the same contracts so they can be
/// substituted without touching the client. Whether a store (and thus the clients sharing it)
/// is safe for concurrent use is left to the implementation.
pub trait Store
where
	Self: Send + Sync,
{
	/// Fetches a JSON document via HTTP GET, decoding it through `shape` and caching the whole
	/// decoded result per URL.
	///
	/// Implementors should honor the `max-age` cache header with a sensible floor, and keep
	/// failures around briefly so a broken endpoint is not hammered;
	/// [`fetch_document`](crate::http::fetch_document) is the default fallback for cache
	/// misses.
	fn fetch(&self, url: Url, shape: DocumentShape) -> StoreFuture<'_, SharedDocument>;

	/// Generates a random nonce and records the nonce/email pair.
	///
	/// Most implementations should use the [`NonceGenerator`](crate::nonce::NonceGenerator)
	/// helpers, but a different scheme may better fit the backing store as long as the result
	/// is URL-safe. Implementors must not bound the number of active nonces; that is left to
	/// the calling application.
	fn new_nonce<'a>(&'a self, email: &'a str) -> StoreFuture<'a, String>;

	/// Deletes the nonce/email pair if it exists, or fails with [`StoreError::InvalidNonce`]
	/// when the exact pair was never issued or has already been consumed.
	///
	/// Concurrent consumption attempts for one pair must yield exactly one success.
	fn consume_nonce<'a>(&'a self, nonce: &'a str, email: &'a str) -> StoreFuture<'a, ()>;
}
impl dyn Store {
	/// Typed wrapper around [`Store::fetch`] returning a shared copy of the decoded document.
	pub async fn fetch_json<T>(&self, url: Url) -> Result<Arc<T>>
	where
		T: DeserializeOwned + Send + Sync + 'static,
	{
		let document = self.fetch(url, DocumentShape::of::<T>()).await?;

		document.downcast::<T>().map_err(|_| {
			StoreError::Backend { message: "cached document does not match the requested shape".into() }
				.into()
		})
	}
}

/// Error type produced by [`Store`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum StoreError {
	/// The nonce/email pair is not present in the store.
	///
	/// A distinguished kind so callers can map it to a user-facing "session invalid" message
	/// without leaking whether the pair never existed, was already consumed, or was bound to a
	/// different address.
	#[error("Invalid nonce.")]
	InvalidNonce,
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Expected shape of a fetched document: a cache discriminator plus a decode routine.
///
/// Stores stay object-safe by carrying the destination type statically inside the shape: the
/// [`TypeId`] keys the cache (one URL may serve distinct document types without collision)
/// and the decode function produces a freshly allocated [`SharedDocument`] for the cache to
/// own. Decoding goes through `serde_path_to_error` so malformed documents name the failing
/// JSON path.
#[derive(Clone, Copy)]
pub struct DocumentShape {
	type_id: TypeId,
	decode: fn(&Url, &[u8]) -> Result<SharedDocument, FetchError>,
}
impl DocumentShape {
	/// Builds the shape for destination type `T`.
	pub fn of<T>() -> Self
	where
		T: DeserializeOwned + Send + Sync + 'static,
	{
		Self { type_id: TypeId::of::<T>(), decode: decode_document::<T> }
	}

	/// Cache discriminator distinguishing destination types that share a URL.
	pub fn type_id(&self) -> TypeId {
		self.type_id
	}

	/// Decodes `body` into a freshly allocated shared document.
	pub fn decode(&self, url: &Url, body: &[u8]) -> Result<SharedDocument, FetchError> {
		(self.decode)(url, body)
	}
}
impl Debug for DocumentShape {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DocumentShape").field("type_id", &self.type_id).finish()
	}
}

fn decode_document<T>(url: &Url, body: &[u8]) -> Result<SharedDocument, FetchError>
where
	T: DeserializeOwned + Send + Sync + 'static,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let document: T = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| FetchError::Decode { url: url.as_str().into(), message: e.to_string() })?;

	Ok(Arc::new(document))
}
