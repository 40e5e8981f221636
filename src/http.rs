//! Transport primitives for broker document fetches.
//!
//! The module exposes [`DocumentHttpClient`], the crate's only dependency on an HTTP stack,
//! alongside [`fetch_document`], which turns one GET into a decoded document plus the cache
//! lifespan the result may be served for. Caching stores call [`fetch_document`] on a cache
//! miss and apply the returned lifespan themselves; the fetcher mutates no shared state.

// self
use crate::{_prelude::*, error::FetchError, store::{DocumentShape, SharedDocument}};

/// Boxed future returned by [`DocumentHttpClient::get_document`].
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a + Send>>;

/// Cache lifespan applied to successful fetches when the broker supplies no larger `max-age`.
pub const DEFAULT_MAX_AGE: Duration = Duration::seconds(60);
/// Backoff lifespan applied to failed fetches so rapid retries do not hit a broken endpoint.
pub const ERROR_MAX_AGE: Duration = Duration::seconds(3);
/// Transport timeout baked into the default reqwest client.
#[cfg(feature = "reqwest")]
pub const DEFAULT_HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Abstraction over HTTP transports capable of one blocking document GET.
///
/// Implementations must be `Send + Sync + 'static` so stores can be shared across clients and
/// concurrent callers. Cancellation and timeouts are the transport's concern; a hung endpoint
/// blocks the calling future until the transport gives up.
pub trait DocumentHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs one GET and returns the undecoded response.
	///
	/// Transport-level failures (DNS, TCP, TLS) map to [`FetchError::Transport`]; status
	/// handling and body decoding are left to [`fetch_document`].
	fn get_document<'a>(
		&'a self,
		url: &'a Url,
	) -> HttpFuture<'a, Result<DocumentResponse, FetchError>>;
}

/// Undecoded GET response handed back by a [`DocumentHttpClient`].
#[derive(Clone, Debug)]
pub struct DocumentResponse {
	/// HTTP status code.
	pub status: u16,
	/// Raw `Cache-Control` header value, if present.
	pub cache_control: Option<String>,
	/// Response body bytes.
	pub body: Vec<u8>,
}

/// Outcome of a single fetch: the decoded document (or the failure to memoize) plus the
/// lifespan it may be served from cache for.
#[derive(Clone)]
pub struct FetchOutcome {
	/// Decoded document, or the failure callers within the lifespan will observe.
	pub document: Result<SharedDocument, FetchError>,
	/// How long the outcome may be served without a new network call.
	pub lifespan: Duration,
}
impl FetchOutcome {
	fn failure(error: FetchError) -> Self {
		Self { document: Err(error), lifespan: ERROR_MAX_AGE }
	}
}

/// Performs one GET against `url`, decodes the body through `shape`, and computes the cache
/// lifespan from the response.
///
/// Failures (transport, non-2xx status, malformed body) carry the short [`ERROR_MAX_AGE`]
/// backoff. Successful decodes carry the `max-age` parsed from the `Cache-Control` header,
/// floored at [`DEFAULT_MAX_AGE`]; a smaller server value never lowers the baseline, and no
/// other directive is interpreted.
pub async fn fetch_document<C>(client: &C, url: &Url, shape: &DocumentShape) -> FetchOutcome
where
	C: ?Sized + DocumentHttpClient,
{
	let response = match client.get_document(url).await {
		Ok(response) => response,
		Err(e) => return FetchOutcome::failure(e),
	};

	if !(200..300).contains(&response.status) {
		return FetchOutcome::failure(FetchError::Status {
			url: url.as_str().into(),
			status: response.status,
		});
	}

	match shape.decode(url, &response.body) {
		Ok(document) => FetchOutcome {
			document: Ok(document),
			lifespan: document_lifespan(response.cache_control.as_deref()),
		},
		Err(e) => FetchOutcome::failure(e),
	}
}

fn document_lifespan(cache_control: Option<&str>) -> Duration {
	cache_control
		.and_then(parse_max_age)
		.filter(|lifespan| *lifespan > DEFAULT_MAX_AGE)
		.unwrap_or(DEFAULT_MAX_AGE)
}

fn parse_max_age(value: &str) -> Option<Duration> {
	value.split(',').find_map(|directive| {
		let (name, seconds) = directive.split_once('=')?;

		if !name.trim().eq_ignore_ascii_case("max-age") {
			return None;
		}

		let seconds = seconds.trim().parse::<u32>().ok()?;

		Some(Duration::seconds(seconds.into()))
	})
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The [`Default`] impl wraps a stock reqwest client with no timeout configured; prefer
/// [`ReqwestHttpClient::with_default_timeout`] (or a caller-configured client) so a hung
/// broker cannot block requests indefinitely.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with the recommended [`DEFAULT_HTTP_TIMEOUT`] applied.
	pub fn with_default_timeout() -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().timeout(DEFAULT_HTTP_TIMEOUT).build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl std::ops::Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl DocumentHttpClient for ReqwestHttpClient {
	fn get_document<'a>(
		&'a self,
		url: &'a Url,
	) -> HttpFuture<'a, Result<DocumentResponse, FetchError>> {
		Box::pin(async move {
			let transport_error = |e: ReqwestError| FetchError::Transport {
				url: url.as_str().into(),
				message: e.to_string(),
			};
			let response = self.0.get(url.clone()).send().await.map_err(transport_error)?;
			let status = response.status().as_u16();
			let cache_control = response
				.headers()
				.get(reqwest::header::CACHE_CONTROL)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let body = response.bytes().await.map_err(transport_error)?.to_vec();

			Ok(DocumentResponse { status, cache_control, body })
		})
	}
}
