//! Client construction and the two protocol flows.

mod start_auth;
mod verify;

// crates.io
use url::Origin;
// self
use crate::{
	_prelude::*,
	discovery::{self, DiscoveryDocument},
	error::ConfigError,
	store::Store,
};
#[cfg(feature = "reqwest")] use crate::store::MemoryStore;

/// Default broker origin used when [`Config`] does not name one.
pub const DEFAULT_BROKER: &str = "https://broker.portier.io";
/// Default claim-validation leeway.
pub const DEFAULT_LEEWAY: Duration = Duration::minutes(3);

/// How the broker delivers the id_token back to the redirect URI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
	/// HTTP POST with the token in a form body (default).
	#[default]
	FormPost,
	/// Token in the URL fragment; requires client-side JavaScript to forward it, because the
	/// fragment is not sent to the server.
	Fragment,
}
impl ResponseMode {
	/// Returns the wire value used in authorization requests.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseMode::FormPost => "form_post",
			ResponseMode::Fragment => "fragment",
		}
	}
}
impl Display for ResponseMode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ResponseMode {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"form_post" => Ok(ResponseMode::FormPost),
			"fragment" => Ok(ResponseMode::Fragment),
			other => Err(ConfigError::UnsupportedResponseMode { value: other.into() }),
		}
	}
}

/// Configuration used with [`Client::new`] to construct a client.
///
/// The only required field is the redirect URI, which must point at a route in your
/// application that receives the id_token and calls [`Client::verify`]. Everything else
/// falls back to a default.
#[derive(Clone)]
pub struct Config {
	/// Store shared by the client; defaults to a fresh in-memory store.
	pub store: Option<Arc<dyn Store>>,
	/// Origin of the broker to use.
	pub broker: String,
	/// Absolute URL of the application route that receives the id_token.
	pub redirect_uri: String,
	/// How the broker calls the redirect URI.
	pub response_mode: ResponseMode,
	/// Time offset allowed when validating token claims.
	pub leeway: Duration,
}
impl Config {
	/// Creates a configuration with defaults for everything but the redirect URI.
	pub fn new(redirect_uri: impl Into<String>) -> Self {
		Self {
			store: None,
			broker: DEFAULT_BROKER.into(),
			redirect_uri: redirect_uri.into(),
			response_mode: ResponseMode::default(),
			leeway: DEFAULT_LEEWAY,
		}
	}

	/// Shares an existing store with this client.
	pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
		self.store = Some(store);

		self
	}

	/// Overrides the broker origin.
	pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
		self.broker = broker.into();

		self
	}

	/// Overrides the response mode.
	pub fn with_response_mode(mut self, response_mode: ResponseMode) -> Self {
		self.response_mode = response_mode;

		self
	}

	/// Overrides the claim-validation leeway.
	pub fn with_leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway;

		self
	}
}
impl Debug for Config {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Config")
			.field("broker", &self.broker)
			.field("redirect_uri", &self.redirect_uri)
			.field("response_mode", &self.response_mode)
			.field("leeway", &self.leeway)
			.field("store_set", &self.store.is_some())
			.finish()
	}
}

/// Performs the two phases of a login: [`start_auth`](Client::start_auth) and
/// [`verify`](Client::verify).
///
/// A client holds no mutable state after construction and is cheap to clone. Whether it is
/// safe for concurrent use is decided by its [`Store`]; the default in-memory store is. The
/// store's lifecycle is external to any client: many clients may share one store.
#[derive(Clone)]
pub struct Client {
	store: Arc<dyn Store>,
	issuer: String,
	discovery_url: Url,
	redirect_uri: Url,
	client_id: String,
	response_mode: ResponseMode,
	leeway: Duration,
}
impl Client {
	/// Validates `config` and derives the client's immutable state.
	///
	/// The broker must be a bare HTTP(S) origin and the redirect URI an absolute URL; its
	/// origin becomes the client identifier the broker knows this application by.
	pub fn new(config: Config) -> Result<Self> {
		let broker =
			Url::parse(&config.broker).map_err(|e| ConfigError::InvalidBroker { source: e })?;

		if !is_origin(&broker) {
			return Err(ConfigError::BrokerNotOrigin.into());
		}

		let discovery_url = discovery::discovery_url(&broker)
			.map_err(|e| ConfigError::InvalidBroker { source: e })?;
		let redirect_uri = Url::parse(&config.redirect_uri)
			.map_err(|e| ConfigError::InvalidRedirect { source: e })?;
		let client_id = origin_of(&redirect_uri);
		let store: Arc<dyn Store> = match config.store {
			Some(store) => store,
			#[cfg(feature = "reqwest")]
			None => Arc::new(MemoryStore::new()?),
			#[cfg(not(feature = "reqwest"))]
			None => return Err(ConfigError::MissingStore.into()),
		};

		Ok(Self {
			store,
			issuer: origin_of(&broker),
			discovery_url,
			redirect_uri,
			client_id,
			response_mode: config.response_mode,
			leeway: config.leeway,
		})
	}

	/// Origin the broker identifies this application by: the origin of the redirect URI.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Store backing this client.
	pub fn store(&self) -> &Arc<dyn Store> {
		&self.store
	}

	pub(crate) async fn fetch_discovery(&self) -> Result<Arc<DiscoveryDocument>> {
		self.store.fetch_json::<DiscoveryDocument>(self.discovery_url.clone()).await
	}
}
impl Debug for Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("issuer", &self.issuer)
			.field("client_id", &self.client_id)
			.field("redirect_uri", &self.redirect_uri)
			.field("response_mode", &self.response_mode)
			.field("leeway", &self.leeway)
			.finish()
	}
}

/// Checks whether a URL is a bare HTTP(S) origin: no user-info, path, query, or fragment.
fn is_origin(url: &Url) -> bool {
	matches!(url.scheme(), "http" | "https")
		&& url.username().is_empty()
		&& url.password().is_none()
		&& matches!(url.path(), "" | "/")
		&& url.query().is_none()
		&& url.fragment().is_none()
}

/// Returns the origin of an absolute URL in serialized form.
fn origin_of(url: &Url) -> String {
	let origin = url.origin();

	match origin {
		Origin::Tuple(..) => origin.ascii_serialization(),
		Origin::Opaque(_) => format!("{}:{}", url.scheme(), url.path()),
	}
}
